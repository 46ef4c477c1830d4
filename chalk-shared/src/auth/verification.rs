/// Emailed verification codes
///
/// A code is mailed first and stored only after the mail went out, so a
/// failed delivery leaves nothing behind. The caller gets back the code id,
/// never the code.

use crate::auth::token::{generate_code, generate_code_id};
use crate::auth::{AuthError, AuthSettings};
use crate::error::UserError;
use crate::mail::{verification_message, Mailer};
use crate::redis::{CodeStore, VerificationCode};
use std::sync::Arc;
use tracing::{info, warn};
use validator::ValidateEmail;

/// Trims, lower-cases and validates an email address
pub fn normalize_email(raw: &str) -> Result<String, UserError> {
    let email = raw.trim().to_lowercase();

    if email.validate_email() {
        Ok(email)
    } else {
        Err(UserError::InvalidEmail)
    }
}

#[derive(Clone)]
pub struct VerificationCodeIssuer {
    codes: Arc<dyn CodeStore>,
    mailer: Arc<dyn Mailer>,
    settings: AuthSettings,
}

impl VerificationCodeIssuer {
    pub fn new(codes: Arc<dyn CodeStore>, mailer: Arc<dyn Mailer>, settings: AuthSettings) -> Self {
        Self {
            codes,
            mailer,
            settings,
        }
    }

    /// Mails a fresh code to `email` and returns its code id
    ///
    /// # Errors
    ///
    /// - [`UserError::InvalidEmail`] for a malformed address
    /// - [`AuthError::Mail`] if delivery fails; nothing is stored
    /// - [`AuthError::CodeStore`] if the code could not be stored
    pub async fn issue(&self, email: &str) -> Result<String, AuthError> {
        let email = normalize_email(email)?;
        let code = generate_code();

        let message = verification_message(
            &self.settings.email_from_name,
            &self.settings.email_from_addr,
            &email,
            &code,
        );
        self.mailer
            .send(&self.settings.email_from_addr, &email, &message)
            .await?;

        let code_id = generate_code_id();
        self.codes
            .set(&code_id, &VerificationCode { email, code }, self.settings.code_ttl)
            .await?;

        info!(%code_id, ttl_secs = self.settings.code_ttl.as_secs(), "Verification code issued");
        Ok(code_id)
    }

    /// The stored code for `code_id`
    ///
    /// # Errors
    ///
    /// - [`UserError::InvalidCodeId`] if unknown, expired or already consumed
    pub async fn lookup(&self, code_id: &str) -> Result<VerificationCode, AuthError> {
        self.codes
            .get(code_id)
            .await?
            .ok_or(AuthError::User(UserError::InvalidCodeId))
    }

    /// Deletes a used code; failures are logged, not returned
    pub async fn consume(&self, code_id: &str) {
        match self.codes.delete(code_id).await {
            Ok(_) => {}
            Err(e) => warn!(%code_id, error = %e, "Failed to delete used verification code"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::{MailError, MemoryMailer};
    use crate::redis::MemoryCodeStore;
    use async_trait::async_trait;

    struct FailingMailer;

    #[async_trait]
    impl Mailer for FailingMailer {
        async fn send(&self, _from: &str, _to: &str, _message: &str) -> Result<(), MailError> {
            Err(MailError::Delivery("connection refused".to_string()))
        }
    }

    fn issuer(codes: Arc<MemoryCodeStore>, mailer: Arc<dyn Mailer>) -> VerificationCodeIssuer {
        VerificationCodeIssuer::new(codes, mailer, AuthSettings::default())
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Ada@Example.COM ").unwrap(), "ada@example.com");
        assert_eq!(normalize_email("not-an-email"), Err(UserError::InvalidEmail));
        assert_eq!(normalize_email(""), Err(UserError::InvalidEmail));
    }

    #[tokio::test]
    async fn test_issue_mails_then_stores() {
        let codes = Arc::new(MemoryCodeStore::new());
        let mailer = Arc::new(MemoryMailer::new());
        let issuer = issuer(codes.clone(), mailer.clone());

        let code_id = issuer.issue("Ada@Example.com").await.unwrap();
        let stored = issuer.lookup(&code_id).await.unwrap();

        assert_eq!(stored.email, "ada@example.com");
        assert_eq!(stored.code.len(), 6);

        let sent = mailer.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "ada@example.com");
        assert!(sent[0].message.ends_with(&format!("Your code is {}\n", stored.code)));
        assert!(!sent[0].message.contains(&code_id));
    }

    #[tokio::test]
    async fn test_failed_delivery_stores_nothing() {
        let codes = Arc::new(MemoryCodeStore::new());
        let issuer = issuer(codes.clone(), Arc::new(FailingMailer));

        let result = issuer.issue("ada@example.com").await;

        assert!(matches!(result, Err(AuthError::Mail(_))));
        assert!(codes.is_empty().await);
    }

    #[tokio::test]
    async fn test_invalid_email_is_user_error() {
        let codes = Arc::new(MemoryCodeStore::new());
        let mailer = Arc::new(MemoryMailer::new());
        let issuer = issuer(codes, mailer.clone());

        let err = issuer.issue("nope").await.unwrap_err();

        assert_eq!(err.user_error(), Some(UserError::InvalidEmail));
        assert!(mailer.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_consumed_code_is_gone() {
        let codes = Arc::new(MemoryCodeStore::new());
        let issuer = issuer(codes, Arc::new(MemoryMailer::new()));

        let code_id = issuer.issue("ada@example.com").await.unwrap();
        issuer.consume(&code_id).await;

        let err = issuer.lookup(&code_id).await.unwrap_err();
        assert_eq!(err.user_error(), Some(UserError::InvalidCodeId));

        // Consuming again is harmless
        issuer.consume(&code_id).await;
    }
}
