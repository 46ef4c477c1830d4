/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use chalk_api::{app::{build_router, AppState}, config::Config};
/// use chalk_shared::auth::{SessionManager, VerificationCodeIssuer};
/// use chalk_shared::mail::LogMailer;
/// use chalk_shared::redis::MemoryCodeStore;
/// use chalk_shared::storage::FsObjectStore;
/// use std::sync::Arc;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::load()?;
/// let pool = chalk_shared::db::pool::connect(&config.database).await?;
///
/// let settings = config.auth.settings();
/// let issuer = VerificationCodeIssuer::new(
///     Arc::new(MemoryCodeStore::new()),
///     Arc::new(LogMailer),
///     settings.clone(),
/// );
/// let sessions = SessionManager::new(pool.clone(), issuer, settings);
/// let objects = Arc::new(FsObjectStore::new(&config.storage.root));
///
/// let app = build_router(AppState::new(pool, sessions, objects, config));
/// # Ok(())
/// # }
/// ```

use crate::config::Config;
use crate::error::ApiError;
use crate::routes;
use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{header, HeaderMap, HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{get, patch, post},
    Router,
};
use chalk_shared::auth::SessionManager;
use chalk_shared::error::UserError;
use chalk_shared::storage::ObjectStore;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Largest accepted upload body
pub const MAX_UPLOAD_BYTES: usize = 256 * 1024 * 1024;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Sign-up, sign-in and token validation
    pub sessions: SessionManager,

    /// Bytes of uploaded files
    pub objects: Arc<dyn ObjectStore>,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        db: PgPool,
        sessions: SessionManager,
        objects: Arc<dyn ObjectStore>,
        config: Config,
    ) -> Self {
        Self {
            db,
            sessions,
            objects,
            config: Arc::new(config),
        }
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                              # Health check (public)
/// └── /v1/
///     ├── /auth/                           # sendcode, signup, signin, refresh, signout
///     └── (bearer)
///         ├── /accounts[/:id[/members[/:user_id]]]
///         ├── /accounts/:id/courses
///         ├── /courses/:id[/outline|/participants[/:user_id]|/modules]
///         ├── /modules/:id[/move|/lessons]
///         ├── /lessons/:id[/move|/blocks]
///         ├── /blocks/:id[/move]
///         └── /files[/:id]
/// ```
///
/// # Middleware Stack
///
/// Applied in order (outermost first):
/// 1. CORS (tower-http CorsLayer)
/// 2. Request timeout (tower-http TimeoutLayer)
/// 3. Logging (tower-http TraceLayer)
/// 4. Bearer authentication (per-route basis)
pub fn build_router(state: AppState) -> Router {
    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let auth_routes = Router::new()
        .route("/sendcode", post(routes::auth::send_code))
        .route("/signup", post(routes::auth::sign_up))
        .route("/signin", post(routes::auth::sign_in))
        .route("/refresh", post(routes::auth::refresh))
        // Reads the bearer token itself so expired sessions can still sign out
        .route("/signout", post(routes::auth::sign_out));

    let protected_routes = Router::new()
        // Accounts and membership
        .route(
            "/accounts",
            post(routes::accounts::create_account).get(routes::accounts::list_accounts),
        )
        .route("/accounts/:account_id", get(routes::accounts::get_account))
        .route(
            "/accounts/:account_id/members",
            get(routes::accounts::list_members).post(routes::accounts::add_member),
        )
        .route(
            "/accounts/:account_id/members/:user_id",
            patch(routes::accounts::update_member).delete(routes::accounts::remove_member),
        )
        // Courses
        .route(
            "/accounts/:account_id/courses",
            post(routes::courses::create_course).get(routes::courses::list_courses),
        )
        .route(
            "/courses/:course_id",
            get(routes::courses::get_course)
                .patch(routes::courses::rename_course)
                .delete(routes::courses::delete_course),
        )
        .route("/courses/:course_id/outline", get(routes::courses::outline))
        .route(
            "/courses/:course_id/participants",
            get(routes::courses::list_participants).post(routes::courses::enroll),
        )
        .route(
            "/courses/:course_id/participants/:user_id",
            axum::routing::delete(routes::courses::unenroll),
        )
        // Modules
        .route(
            "/courses/:course_id/modules",
            post(routes::content::create_module).get(routes::content::list_modules),
        )
        .route(
            "/modules/:module_id",
            patch(routes::content::rename_module).delete(routes::content::delete_module),
        )
        .route("/modules/:module_id/move", post(routes::content::move_module))
        // Lessons
        .route(
            "/modules/:module_id/lessons",
            post(routes::content::create_lesson).get(routes::content::list_lessons),
        )
        .route(
            "/lessons/:lesson_id",
            patch(routes::content::rename_lesson).delete(routes::content::delete_lesson),
        )
        .route("/lessons/:lesson_id/move", post(routes::content::move_lesson))
        // Blocks
        .route(
            "/lessons/:lesson_id/blocks",
            post(routes::content::create_block).get(routes::content::list_blocks),
        )
        .route(
            "/blocks/:block_id",
            patch(routes::content::update_block).delete(routes::content::delete_block),
        )
        .route("/blocks/:block_id/move", post(routes::content::move_block))
        // Files
        .route(
            "/files",
            post(routes::files::upload_file).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/files/:file_id", get(routes::files::download_file))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            bearer_auth_layer,
        ));

    let v1_routes = Router::new()
        .nest("/auth", auth_routes)
        .merge(protected_routes);

    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(TimeoutLayer::new(state.config.request_timeout()))
        .layer(cors_layer(&state.config.api.cors_origins))
        .with_state(state)
}

/// Permissive CORS for `*`, otherwise only the listed origins
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

/// The token of an `Authorization: Bearer <token>` header
///
/// # Errors
///
/// [`UserError::InvalidAccessToken`] if the header is missing, not a bearer
/// token, or empty.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(ApiError::User(UserError::InvalidAccessToken))
}

/// Bearer token authentication middleware
///
/// Resolves the access token to its session and injects the `Session`
/// into request extensions.
async fn bearer_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers())?;
    let session = state.sessions.validate_access_token(token).await?;

    req.extensions_mut().insert(session);

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_err());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(bearer_token(&headers).is_err());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(bearer_token(&headers).is_err());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer 9f2c"));
        assert_eq!(bearer_token(&headers).unwrap(), "9f2c");
    }

    #[test]
    fn test_cors_accepts_origin_list() {
        // Invalid origins are skipped rather than failing startup
        let _ = cors_layer(&["https://chalk.dev".to_string(), "\n".to_string()]);
        let _ = cors_layer(&["*".to_string()]);
    }
}
