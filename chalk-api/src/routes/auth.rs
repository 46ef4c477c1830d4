/// Authentication endpoints
///
/// # Endpoints
///
/// - `POST /v1/auth/sendcode` - Mail a verification code
/// - `POST /v1/auth/signup` - Register with a verified email
/// - `POST /v1/auth/signin` - Open a session
/// - `POST /v1/auth/refresh` - Rotate the session's tokens
/// - `POST /v1/auth/signout` - End the session (bearer token, may be expired)

use crate::{
    app::{bearer_token, AppState},
    error::ApiResult,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chalk_shared::auth::SignUp;
use chalk_shared::models::session::Session;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize)]
pub struct SendCodeRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct SendCodeResponse {
    /// Identifies the mailed code; the code itself is only in the mail
    pub code_id: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SignUpRequest {
    pub code_id: String,

    pub code: String,

    #[validate(length(min = 1, max = 255, message = "Name must be 1 to 255 characters"))]
    pub name: String,

    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SignUpResponse {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Tokens of a session, returned by sign-in and refresh
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: Uuid,
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            session_id: session.id,
            access_token: session.access_token,
            refresh_token: session.refresh_token,
            access_expires_at: session.access_expires_at,
            refresh_expires_at: session.refresh_expires_at,
        }
    }
}

/// Mail a verification code
///
/// ```text
/// POST /v1/auth/sendcode
/// { "email": "ada@example.com" }
/// ```
///
/// # Errors
///
/// - `400` with code 21: Invalid email
/// - `503`: Mail could not be delivered
pub async fn send_code(
    State(state): State<AppState>,
    payload: Result<Json<SendCodeRequest>, JsonRejection>,
) -> ApiResult<Json<SendCodeResponse>> {
    let Json(req) = payload?;
    let code_id = state.sessions.send_code(&req.email).await?;

    Ok(Json(SendCodeResponse { code_id }))
}

/// Register with a mailed code
///
/// ```text
/// POST /v1/auth/signup
/// { "code_id": "...", "code": "042917", "name": "Ada", "password": "..." }
/// ```
///
/// # Errors
///
/// - `400` with codes 22, 25, 26 or 28
/// - `422`: Name empty or too long
pub async fn sign_up(
    State(state): State<AppState>,
    payload: Result<Json<SignUpRequest>, JsonRejection>,
) -> ApiResult<Json<SignUpResponse>> {
    let Json(req) = payload?;
    req.validate()?;

    let user = state
        .sessions
        .sign_up(SignUp {
            code_id: req.code_id,
            code: req.code,
            name: req.name,
            password: req.password,
        })
        .await?;

    Ok(Json(SignUpResponse { user_id: user.id }))
}

/// Open a session
///
/// # Errors
///
/// - `400` with codes 21, 23 or 27
pub async fn sign_in(
    State(state): State<AppState>,
    payload: Result<Json<SignInRequest>, JsonRejection>,
) -> ApiResult<Json<SessionResponse>> {
    let Json(req) = payload?;
    let session = state.sessions.sign_in(&req.email, &req.password).await?;

    Ok(Json(session.into()))
}

/// Trade a refresh token for a new token pair
///
/// # Errors
///
/// - `401` with code 24: Unknown, used or expired refresh token
pub async fn refresh(
    State(state): State<AppState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> ApiResult<Json<SessionResponse>> {
    let Json(req) = payload?;
    let session = state.sessions.refresh(&req.refresh_token).await?;

    Ok(Json(session.into()))
}

/// End the session owning the bearer token
///
/// # Errors
///
/// - `401` with code 10: Missing or unknown access token
pub async fn sign_out(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<StatusCode> {
    let token = bearer_token(&headers)?;
    state.sessions.sign_out(token).await?;

    Ok(StatusCode::NO_CONTENT)
}
