//! Periodic cleanup of expired state.
//!
//! One sweeper per deployment. Each tick removes expired OAuth states and
//! sessions and evicts idle rate-limit buckets through
//! [`AuthenticationService::sweep_expired`]. The request path never waits
//! on it.

use crate::providers::{AccountRepository, IdentityProvider, SessionStore, StateRepository};
use crate::service::AuthenticationService;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Default time between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Handle to a running sweeper task.
#[derive(Debug)]
pub struct Sweeper {
    handle: JoinHandle<()>,
}

impl Sweeper {
    /// Spawn the sweeper on the current runtime.
    ///
    /// The task stops when `shutdown` fires or its sender is dropped.
    pub fn spawn<R, S, A, P>(
        service: Arc<AuthenticationService<R, S, A, P>>,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Self
    where
        R: StateRepository + 'static,
        S: SessionStore + 'static,
        A: AccountRepository + 'static,
        P: IdentityProvider + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            tracing::info!(interval_secs = interval.as_secs(), "Sweeper started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match service.sweep_expired().await {
                            Ok(report) => tracing::debug!(?report, "Sweep finished"),
                            Err(e) => tracing::error!(error = %e, "Sweep failed"),
                        }
                    }
                    _ = shutdown.recv() => {
                        tracing::info!("Sweeper received shutdown signal");
                        break;
                    }
                }
            }
        });

        Self { handle }
    }

    /// Wait for the task to finish after shutdown was signalled.
    pub async fn join(self) {
        if let Err(e) = self.handle.await {
            tracing::error!(error = %e, "Sweeper task panicked");
        }
    }
}
