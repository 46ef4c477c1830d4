/// Authentication
///
/// # Modules
///
/// - [`password`]: Argon2id hashing
/// - [`token`]: random session tokens, verification codes and code ids
/// - [`verification`]: issuing and checking emailed verification codes
/// - [`sessions`]: sign-up, sign-in, token validation, refresh and sign-out
///
/// # Flow
///
/// ```text
/// send_code(email) ──mail──> user
///      │ code_id
///      ▼
/// sign_up(code_id, code, name, password) ──> user row
///
/// sign_in(email, password) ──> session {access, refresh}
/// validate(access) ──> session
/// refresh(refresh) ──> session {access', refresh'}   (old pair is dead)
/// sign_out(access)
/// ```

pub mod password;
pub mod sessions;
pub mod token;
pub mod verification;

use crate::error::{StoreError, UserError};
use crate::mail::MailError;
use crate::redis::CodeStoreError;
use password::PasswordError;
use std::time::Duration;
use thiserror::Error;

pub use sessions::{SessionManager, SignUp};
pub use verification::VerificationCodeIssuer;

/// Errors from the authentication use cases
#[derive(Error, Debug)]
pub enum AuthError {
    /// Caller-correctable; carries a stable code
    #[error(transparent)]
    User(#[from] UserError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    CodeStore(#[from] CodeStoreError),

    #[error(transparent)]
    Mail(#[from] MailError),

    #[error(transparent)]
    Password(#[from] PasswordError),
}

impl AuthError {
    /// The user error, if this is one
    pub fn user_error(&self) -> Option<UserError> {
        match self {
            AuthError::User(err) => Some(*err),
            _ => None,
        }
    }
}

/// Lifetimes and sender identity for authentication
#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// How long an emailed code stays valid
    pub code_ttl: Duration,

    pub access_token_ttl: chrono::Duration,

    pub refresh_token_ttl: chrono::Duration,

    pub email_from_addr: String,

    pub email_from_name: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            code_ttl: Duration::from_secs(600),
            access_token_ttl: chrono::Duration::minutes(15),
            refresh_token_ttl: chrono::Duration::days(30),
            email_from_addr: "noreply@chalk.local".to_string(),
            email_from_name: "Chalk".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_error_extraction() {
        let err = AuthError::from(UserError::InvalidCode);
        assert_eq!(err.user_error(), Some(UserError::InvalidCode));
        assert_eq!(err.to_string(), "invalid code");

        let err = AuthError::from(StoreError::OrderConflict);
        assert_eq!(err.user_error(), None);
    }
}
