use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Propagates one cancellation signal through every pipeline stage and
/// blocks exit until the spawned tasks acknowledge completion.
///
/// Every stage token is a child of the root; the tracker counts every
/// spawned task. Triggering twice is a safe no-op.
pub struct ShutdownCoordinator {
    root: CancellationToken,
    tracker: TaskTracker,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            root: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// A token cancelled when shutdown is triggered.
    pub fn child_token(&self) -> CancellationToken {
        self.root.child_token()
    }

    pub fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }

    /// Fire the root cancellation. Idempotent.
    pub fn trigger(&self) {
        if !self.root.is_cancelled() {
            tracing::info!("shutdown signal propagated to all stages");
            self.root.cancel();
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.root.is_cancelled()
    }

    /// Block until the process interrupt arrives.
    pub async fn wait_for_interrupt(&self) {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("received interruption signal"),
            Err(e) => tracing::error!(error = %e, "failed to listen for interrupt, shutting down"),
        }
    }

    /// Cancel everything and wait for all tracked tasks, bounded by
    /// `timeout`. Returns true when every task finished in time.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.trigger();
        self.tracker.close();

        tracing::info!("waiting for all stages to finish...");
        match tokio::time::timeout(timeout, self.tracker.wait()).await {
            Ok(()) => {
                tracing::info!("all stages finished");
                true
            }
            Err(_) => {
                tracing::warn!(?timeout, "drain grace period elapsed with tasks still running");
                false
            }
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
