/// Error handling for the API server
///
/// All handlers return `Result<T, ApiError>`, which converts to an HTTP
/// response with a JSON body:
///
/// ```json
/// { "error": "user_error", "message": "invalid code", "code": 26 }
/// ```
///
/// `code` is only present for user errors. Internal failures are logged
/// and reported without detail.
///
/// # Example
///
/// ```
/// use chalk_api::error::{ApiError, ApiResult};
/// use chalk_shared::error::UserError;
///
/// fn check(code: &str) -> ApiResult<()> {
///     if code.len() != 6 {
///         return Err(UserError::InvalidCode.into());
///     }
///     Ok(())
/// }
///
/// assert!(check("123").is_err());
/// ```

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chalk_shared::auth::AuthError;
use chalk_shared::error::{StoreError, UserError};
use chalk_shared::models::file::FileError;
use chalk_shared::storage::StorageError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Caller-correctable error with a stable code (400, token errors 401)
    User(UserError),

    /// Bad request (400)
    BadRequest(String),

    /// Not found (404)
    NotFound(String),

    /// Conflict (409) - duplicates and concurrent reorders
    Conflict(String),

    /// Unprocessable entity (422) - validation errors
    ValidationError(Vec<ValidationErrorDetail>),

    /// Internal server error (500)
    InternalError(String),

    /// Service unavailable (503)
    ServiceUnavailable(String),
}

/// Validation error detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error kind (e.g., "user_error", "not_found")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Stable user error code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,

    /// Optional validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::User(err) if err.is_token_error() => StatusCode::UNAUTHORIZED,
            ApiError::User(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::User(err) => write!(f, "User error {}: {}", err.code(), err),
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let (error_code, message, code, details) = match self {
            ApiError::User(err) => ("user_error", err.to_string(), Some(err.code()), None),
            ApiError::BadRequest(msg) => ("bad_request", msg, None, None),
            ApiError::NotFound(msg) => ("not_found", msg, None, None),
            ApiError::Conflict(msg) => ("conflict", msg, None, None),
            ApiError::ValidationError(errors) => (
                "validation_error",
                "Request validation failed".to_string(),
                None,
                Some(errors),
            ),
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!("Internal error: {}", msg);
                ("internal_error", "internal error".to_string(), None, None)
            }
            ApiError::ServiceUnavailable(msg) => {
                tracing::warn!("Service unavailable: {}", msg);
                ("service_unavailable", msg, None, None)
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            code,
            details,
        });

        (status, body).into_response()
    }
}

impl From<UserError> for ApiError {
    fn from(err: UserError) -> Self {
        ApiError::User(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) | StoreError::NotEnrolled => ApiError::NotFound(err.to_string()),
            StoreError::AlreadyMember => ApiError::User(UserError::UserAlreadyInAccount),
            StoreError::AccountNameTaken
            | StoreError::EmailTaken
            | StoreError::AlreadyEnrolled
            | StoreError::OrderConflict => ApiError::Conflict(err.to_string()),
            StoreError::UserNotInAccount | StoreError::OwnerRoleReserved => {
                ApiError::BadRequest(err.to_string())
            }
            StoreError::Integrity(_) | StoreError::Database(_) => {
                ApiError::InternalError(err.to_string())
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::User(err) => ApiError::User(err),
            AuthError::Store(err) => err.into(),
            AuthError::Mail(err) => ApiError::ServiceUnavailable(err.to_string()),
            AuthError::CodeStore(_) | AuthError::Password(_) => {
                ApiError::InternalError(err.to_string())
            }
        }
    }
}

impl From<FileError> for ApiError {
    fn from(err: FileError) -> Self {
        match err {
            FileError::Store(err) => err.into(),
            // Metadata exists but the bytes are gone
            FileError::Storage(StorageError::NotFound(key)) => {
                ApiError::InternalError(format!("object missing for stored file: {key}"))
            }
            FileError::Storage(err) => ApiError::InternalError(err.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let details: Vec<ValidationErrorDetail> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| ValidationErrorDetail {
                    field: field.to_string(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "Validation failed".to_string()),
                })
            })
            .collect();

        ApiError::ValidationError(details)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
