/// Periodic removal of dead sessions
///
/// Sessions whose refresh token has expired can never be used again.
/// They are deleted on a fixed interval until the shutdown token fires.

use chalk_shared::auth::SessionManager;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Runs one purge, logging the outcome
pub async fn purge_once(sessions: &SessionManager) -> Option<u64> {
    match sessions.purge_expired().await {
        Ok(removed) => {
            if removed > 0 {
                tracing::info!(removed, "Purged expired sessions");
            }
            Some(removed)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Session purge failed");
            None
        }
    }
}

/// Spawns the purge loop
///
/// The first purge runs immediately. A failed purge is logged and retried
/// on the next tick.
pub fn spawn_session_purge(
    sessions: SessionManager,
    every: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::debug!("Session purge stopped");
                    break;
                }
                _ = ticker.tick() => {
                    purge_once(&sessions).await;
                }
            }
        }
    })
}
