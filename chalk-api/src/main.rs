//! # Chalk API Server
//!
//! Serves accounts, courses and their ordered content over HTTP.
//!
//! ## Usage
//!
//! ```bash
//! CHALK__DATABASE__URL=postgres://localhost/chalk cargo run -p chalk-api
//! ```

use anyhow::Context;
use chalk_api::{
    app::{build_router, AppState},
    config::Config,
    purge, shutdown, telemetry,
};
use chalk_shared::auth::{SessionManager, VerificationCodeIssuer};
use chalk_shared::db::{migrations, pool};
use chalk_shared::mail::LogMailer;
use chalk_shared::redis::{RedisClient, RedisCodeStore};
use chalk_shared::storage::FsObjectStore;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;
    telemetry::init(&config.logging)?;

    tracing::info!("Chalk API Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let db = pool::connect(&config.database)
        .await
        .context("failed to connect to PostgreSQL")?;
    migrations::run_migrations(&db)
        .await
        .context("failed to run migrations")?;

    let redis = RedisClient::connect(&config.redis)
        .await
        .context("failed to connect to Redis")?;

    let settings = config.auth.settings();
    let issuer = VerificationCodeIssuer::new(
        Arc::new(RedisCodeStore::new(redis)),
        Arc::new(LogMailer),
        settings.clone(),
    );
    let sessions = SessionManager::new(db.clone(), issuer, settings);
    let objects = Arc::new(FsObjectStore::new(&config.storage.root));

    let shutdown_token = CancellationToken::new();
    shutdown::cancel_on_signal(shutdown_token.clone());

    let purger = purge::spawn_session_purge(
        sessions.clone(),
        Duration::from_secs(config.auth.purge_interval_secs.max(1)),
        shutdown_token.clone(),
    );

    let addr = config.bind_address();
    let app = build_router(AppState::new(db.clone(), sessions, objects, config));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_token.clone().cancelled_owned())
        .await?;

    shutdown_token.cancel();
    if let Err(e) = purger.await {
        tracing::warn!(error = %e, "Session purge task ended abnormally");
    }
    db.close().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
