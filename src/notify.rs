use reqwest::Method;
use std::time::Duration;
use uuid::Uuid;

/// Best-effort notifier for the ingest control surface.
///
/// When a symbol gains its first follower or loses its last one on the
/// fan-out side, the ingest service is told to start or stop the upstream
/// exchange stream. The call is fire-and-forget with its own timeout: the
/// local state change never waits on it, and failures are logged, not
/// retried.
pub struct IngestNotifier {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl IngestNotifier {
    /// An empty `base_url` disables the notifier entirely (single-process
    /// deployments and tests).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            timeout,
        }
    }

    /// First follower appeared for `symbol`.
    pub fn notify_follow(&self, user_id: Uuid, symbol: &str) {
        self.dispatch(Method::GET, user_id, symbol);
    }

    /// Last follower left `symbol`.
    pub fn notify_unfollow(&self, user_id: Uuid, symbol: &str) {
        self.dispatch(Method::DELETE, user_id, symbol);
    }

    fn dispatch(&self, method: Method, user_id: Uuid, symbol: &str) {
        if self.base_url.is_empty() {
            return;
        }

        let request = self
            .http
            .request(method.clone(), format!("{}/coin", self.base_url))
            .query(&[("symbol", symbol), ("id", &user_id.to_string())])
            .timeout(self.timeout);
        let symbol = symbol.to_string();

        tokio::spawn(async move {
            match request.send().await {
                Ok(resp) if resp.status().is_success() => {
                    tracing::info!(%method, symbol = %symbol, "notified ingest service");
                }
                Ok(resp) => {
                    tracing::warn!(
                        %method,
                        symbol = %symbol,
                        status = %resp.status(),
                        "ingest service returned non-success status"
                    );
                }
                Err(e) => {
                    tracing::error!(%method, symbol = %symbol, error = %e, "failed to notify ingest service");
                }
            }
        });
    }
}
