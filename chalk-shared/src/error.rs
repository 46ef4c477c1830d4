/// Error taxonomy shared by the stores and use-cases
///
/// Stores translate low-level failures at the boundary closest to the
/// failure. Callers branch on the variants below and never see raw
/// constraint violations.
///
/// # Classes
///
/// - [`UserError`]: caller-correctable, carries a stable numeric code
/// - [`StoreError::NotFound`]: a specific entity is missing
/// - constraint translations (`AlreadyEnrolled`, `EmailTaken`, ...)
/// - infrastructure (`Database`, `OrderConflict`): retryable, opaque to clients
///
/// # Example
///
/// ```
/// use chalk_shared::error::{Entity, StoreError, UserError};
///
/// let err = StoreError::NotFound(Entity::Lesson);
/// assert_eq!(err.to_string(), "lesson not found");
/// assert!(!err.is_retryable());
///
/// assert_eq!(UserError::InvalidCode.code(), 26);
/// ```

use serde::Serialize;
use std::fmt;

/// PostgreSQL SQLSTATE for unique violations
pub const UNIQUE_VIOLATION: &str = "23505";

/// PostgreSQL SQLSTATE for foreign key violations
pub const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Entities that can be reported as missing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Account,
    User,
    AccountMember,
    Course,
    Module,
    Lesson,
    Block,
    File,
    Session,
}

impl Entity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Entity::Account => "account",
            Entity::User => "user",
            Entity::AccountMember => "account member",
            Entity::Course => "course",
            Entity::Module => "module",
            Entity::Lesson => "lesson",
            Entity::Block => "block",
            Entity::File => "file",
            Entity::Session => "session",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by the persistence layer
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The referenced entity does not exist
    #[error("{0} not found")]
    NotFound(Entity),

    /// Account names are unique
    #[error("account name already taken")]
    AccountNameTaken,

    /// User emails are unique
    #[error("email already registered")]
    EmailTaken,

    /// The user already belongs to the account
    #[error("user is already a member of the account")]
    AlreadyMember,

    /// The `owner` role is only assigned when the account is created
    #[error("owner role can only be assigned at account creation")]
    OwnerRoleReserved,

    /// Duplicate (user, course) enrollment
    #[error("user already enrolled in course")]
    AlreadyEnrolled,

    /// Unenrolling a user that is not a participant
    #[error("user not enrolled in course")]
    NotEnrolled,

    /// Enrollment requires membership in the course's account
    #[error("user not found in the course's account")]
    UserNotInAccount,

    /// Stored rows contradict each other (e.g. block payload missing)
    #[error("data integrity fault: {0}")]
    Integrity(String),

    /// A concurrent reorder collided with the (parent, order_idx) constraint
    #[error("concurrent reorder conflict, retry the operation")]
    OrderConflict,

    /// Any other database failure
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Whether retrying the same operation may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::OrderConflict | StoreError::Database(_))
    }

    /// Whether this is a not-found of any entity
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Constraint violation reported by PostgreSQL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Violation<'a> {
    /// `23505`, with the violated constraint name if reported
    Unique(Option<&'a str>),

    /// `23503`, with the violated constraint name if reported
    ForeignKey(Option<&'a str>),
}

/// Classifies a sqlx error as a unique or foreign key violation
pub(crate) fn violation(err: &sqlx::Error) -> Option<Violation<'_>> {
    let sqlx::Error::Database(db_err) = err else {
        return None;
    };

    let code = db_err.code()?;
    match code.as_ref() {
        UNIQUE_VIOLATION => Some(Violation::Unique(db_err.constraint())),
        FOREIGN_KEY_VIOLATION => Some(Violation::ForeignKey(db_err.constraint())),
        _ => None,
    }
}

/// Caller-correctable errors with stable numeric codes
///
/// Codes are part of the public API: clients branch on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum UserError {
    #[error("invalid access token")]
    InvalidAccessToken,

    #[error("access token expired")]
    AccessTokenExpired,

    #[error("invalid email")]
    InvalidEmail,

    #[error("password too long")]
    PasswordTooLong,

    #[error("invalid password")]
    InvalidPassword,

    #[error("invalid or expired refresh token")]
    InvalidRefreshToken,

    #[error("invalid or expired code_id")]
    InvalidCodeId,

    #[error("invalid code")]
    InvalidCode,

    #[error("user is not registered")]
    UserIsNotRegistered,

    #[error("user already registered")]
    UserAlreadyRegistered,

    #[error("user not found")]
    UserNotFound,

    #[error("you don't have permission to perform this action")]
    PermissionDenied,

    #[error("user is already in the account")]
    UserAlreadyInAccount,

    #[error("you can't remove yourself")]
    CannotRemoveYourself,

    #[error("you can't change your own role")]
    CannotChangeOwnRole,

    #[error("you can't modify or remove the owner")]
    CannotModifyOwner,
}

impl UserError {
    /// Stable numeric code
    pub fn code(&self) -> u16 {
        match self {
            UserError::InvalidAccessToken => 10,
            UserError::AccessTokenExpired => 11,
            UserError::InvalidEmail => 21,
            UserError::PasswordTooLong => 22,
            UserError::InvalidPassword => 23,
            UserError::InvalidRefreshToken => 24,
            UserError::InvalidCodeId => 25,
            UserError::InvalidCode => 26,
            UserError::UserIsNotRegistered => 27,
            UserError::UserAlreadyRegistered => 28,
            UserError::UserNotFound => 31,
            UserError::PermissionDenied => 41,
            UserError::UserAlreadyInAccount => 42,
            UserError::CannotRemoveYourself => 43,
            UserError::CannotChangeOwnRole => 44,
            UserError::CannotModifyOwner => 45,
        }
    }

    /// Whether the error concerns access or refresh token validity
    pub fn is_token_error(&self) -> bool {
        matches!(
            self,
            UserError::InvalidAccessToken
                | UserError::AccessTokenExpired
                | UserError::InvalidRefreshToken
        )
    }
}
