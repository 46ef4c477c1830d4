/// Session lifecycle
///
/// ```text
///             sign_in                 refresh (single use)
/// (no session) ──────> active ──────────────────────────> active'
///                        │  access expires                  │
///                        ▼                                  │
///                   access expired ── refresh ──────────────┘
///                        │  refresh expires
///                        ▼
///                   dead (row purged by delete_expired)
/// ```
///
/// Tokens are opaque random strings compared by exact match against the
/// stored session row. Refreshing rewrites the row in place with a
/// compare-and-swap on the presented refresh token, so two concurrent
/// refreshes with the same token produce exactly one winner.
///
/// # Example
///
/// ```no_run
/// use chalk_shared::auth::{SessionManager, SignUp};
///
/// # async fn example(auth: SessionManager) -> Result<(), chalk_shared::auth::AuthError> {
/// let code_id = auth.send_code("ada@example.com").await?;
/// // ... the user reads the code from their inbox ...
/// auth.sign_up(SignUp {
///     code_id,
///     code: "042917".to_string(),
///     name: "Ada".to_string(),
///     password: "correct horse".to_string(),
/// }).await?;
///
/// let session = auth.sign_in("ada@example.com", "correct horse").await?;
/// let session = auth.refresh(&session.refresh_token).await?;
/// auth.sign_out(&session.access_token).await?;
/// # Ok(())
/// # }
/// ```

use crate::auth::password::{self, PasswordError, MAX_PASSWORD_BYTES};
use crate::auth::token::generate_token;
use crate::auth::verification::{normalize_email, VerificationCodeIssuer};
use crate::auth::{AuthError, AuthSettings};
use crate::error::{StoreError, UserError};
use crate::models::session::{Session, TokenPair};
use crate::models::user::{CreateUser, User};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, info};

/// Input for [`SessionManager::sign_up`]
#[derive(Debug, Clone)]
pub struct SignUp {
    pub code_id: String,
    pub code: String,
    pub name: String,
    pub password: String,
}

#[derive(Clone)]
pub struct SessionManager {
    pool: PgPool,
    codes: VerificationCodeIssuer,
    settings: AuthSettings,
}

impl SessionManager {
    pub fn new(pool: PgPool, codes: VerificationCodeIssuer, settings: AuthSettings) -> Self {
        Self {
            pool,
            codes,
            settings,
        }
    }

    fn mint(&self, now: DateTime<Utc>) -> TokenPair {
        TokenPair {
            access_token: generate_token(),
            refresh_token: generate_token(),
            access_expires_at: now + self.settings.access_token_ttl,
            refresh_expires_at: now + self.settings.refresh_token_ttl,
        }
    }

    /// Mails a verification code; see [`VerificationCodeIssuer::issue`]
    pub async fn send_code(&self, email: &str) -> Result<String, AuthError> {
        self.codes.issue(email).await
    }

    /// Registers the owner of a verified email address
    ///
    /// The code id is consumed on success.
    ///
    /// # Errors
    ///
    /// - [`UserError::InvalidCodeId`] if the code id is unknown or expired
    /// - [`UserError::InvalidCode`] if the code does not match; no user is created
    /// - [`UserError::PasswordTooLong`] above [`MAX_PASSWORD_BYTES`]
    /// - [`UserError::UserAlreadyRegistered`] if the email is taken
    #[tracing::instrument(skip_all, fields(code_id = %data.code_id))]
    pub async fn sign_up(&self, data: SignUp) -> Result<User, AuthError> {
        let stored = self.codes.lookup(&data.code_id).await?;

        if stored.code != data.code {
            debug!("Verification code mismatch");
            return Err(UserError::InvalidCode.into());
        }
        if data.password.len() > MAX_PASSWORD_BYTES {
            return Err(UserError::PasswordTooLong.into());
        }

        // Skip the expensive hash for an address that is already taken
        if User::find_by_email(&self.pool, &stored.email).await?.is_some() {
            return Err(UserError::UserAlreadyRegistered.into());
        }

        let password_hash = password::hash(data.password).await.map_err(|e| match e {
            PasswordError::TooLong => AuthError::User(UserError::PasswordTooLong),
            other => AuthError::Password(other),
        })?;

        let user = User::create(
            &self.pool,
            CreateUser {
                name: data.name,
                email: stored.email,
                password_hash,
            },
        )
        .await
        .map_err(|e| match e {
            StoreError::EmailTaken => AuthError::User(UserError::UserAlreadyRegistered),
            other => AuthError::Store(other),
        })?;

        self.codes.consume(&data.code_id).await;

        info!(user_id = %user.id, "User signed up");
        Ok(user)
    }

    /// Opens a session for valid credentials
    ///
    /// # Errors
    ///
    /// - [`UserError::InvalidEmail`] for a malformed address
    /// - [`UserError::UserIsNotRegistered`] for an unknown address
    /// - [`UserError::InvalidPassword`] for a wrong password or an unusable stored hash
    #[tracing::instrument(skip_all)]
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email = normalize_email(email)?;
        let user = User::find_by_email(&self.pool, &email)
            .await?
            .ok_or(UserError::UserIsNotRegistered)?;

        let matches = match password::verify(password.to_string(), user.password_hash).await {
            Ok(matches) => matches,
            Err(PasswordError::InvalidHash(reason)) => {
                debug!(user_id = %user.id, %reason, "Stored password hash is unusable");
                false
            }
            Err(e) => return Err(e.into()),
        };
        if !matches {
            return Err(UserError::InvalidPassword.into());
        }

        let now = Utc::now();
        let session = Session::create(&self.pool, user.id, &self.mint(now), now).await?;

        info!(user_id = %user.id, session_id = %session.id, "User signed in");
        Ok(session)
    }

    /// Resolves an access token to its live session
    ///
    /// # Errors
    ///
    /// - [`UserError::InvalidAccessToken`] if no session has this token
    /// - [`UserError::AccessTokenExpired`] if the session exists but the token expired
    pub async fn validate_access_token(&self, access_token: &str) -> Result<Session, AuthError> {
        let session = Session::find_by_access_token(&self.pool, access_token)
            .await?
            .ok_or(UserError::InvalidAccessToken)?;

        if session.is_access_expired(Utc::now()) {
            return Err(UserError::AccessTokenExpired.into());
        }

        Ok(session)
    }

    /// Trades a refresh token for a new token pair
    ///
    /// The presented refresh token stops working.
    ///
    /// # Errors
    ///
    /// - [`UserError::InvalidRefreshToken`] if the token is unknown, already used or expired
    #[tracing::instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &str) -> Result<Session, AuthError> {
        let now = Utc::now();
        let session = Session::rotate(&self.pool, refresh_token, &self.mint(now), now)
            .await?
            .ok_or(UserError::InvalidRefreshToken)?;

        debug!(session_id = %session.id, "Session refreshed");
        Ok(session)
    }

    /// Ends the session owning `access_token`
    ///
    /// Works with an expired access token so clients can always log out.
    pub async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        Session::delete_by_access_token(&self.pool, access_token)
            .await
            .map_err(|e| match e {
                StoreError::NotFound(_) => AuthError::User(UserError::InvalidAccessToken),
                other => AuthError::Store(other),
            })
    }

    /// Deletes sessions whose refresh token has expired
    pub async fn purge_expired(&self) -> Result<u64, AuthError> {
        let purged = Session::delete_expired(&self.pool, Utc::now()).await?;
        if purged > 0 {
            info!(purged, "Purged expired sessions");
        }
        Ok(purged)
    }
}
