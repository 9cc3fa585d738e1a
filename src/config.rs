use std::time::Duration;

/// Process configuration, loaded from the environment with typed defaults.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Listen address for the HTTP/WebSocket server
    pub server_addr: String,
    /// Base URL of the ingest control surface for follow/unfollow
    /// notifications; empty disables the notifier
    pub ingest_notify_url: String,
    /// Exchange raw-stream base URL
    pub feed_ws_url: String,
    /// Sampling window for the aggregation pipeline
    pub sample_window: Duration,
    /// Queue capacities per pipeline stage
    pub raw_queue_size: usize,
    pub trade_queue_size: usize,
    pub ticker_queue_size: usize,
    pub snapshot_queue_size: usize,
    pub stat_queue_size: usize,
    pub update_queue_size: usize,
    /// Per-client outbound queue capacity
    pub outbound_queue_size: usize,
    /// Per-symbol pub/sub channel capacity (in-process bus)
    pub bus_channel_capacity: usize,
    /// Liveness probe interval on client connections
    pub ping_interval: Duration,
    /// Timeout for one fire-and-forget ingest notification
    pub notify_timeout: Duration,
    /// Grace period for the request listener on shutdown
    pub server_grace: Duration,
    /// How long to wait for all stages to acknowledge shutdown
    pub drain_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            server_addr: env_string("SERVER_ADDR", "127.0.0.1:8088"),
            ingest_notify_url: env_string("INGEST_NOTIFY_URL", "http://127.0.0.1:8088"),
            feed_ws_url: env_string("FEED_WS_URL", "wss://stream.binance.com:9443/ws"),
            sample_window: Duration::from_millis(env_u64("SAMPLE_WINDOW_MS", 1_000)),
            raw_queue_size: env_usize("RAW_QUEUE_SIZE", 300),
            trade_queue_size: env_usize("TRADE_QUEUE_SIZE", 100),
            ticker_queue_size: env_usize("TICKER_QUEUE_SIZE", 100),
            snapshot_queue_size: env_usize("SNAPSHOT_QUEUE_SIZE", 100),
            stat_queue_size: env_usize("STAT_QUEUE_SIZE", 500),
            update_queue_size: env_usize("UPDATE_QUEUE_SIZE", 1_000),
            outbound_queue_size: env_usize("OUTBOUND_QUEUE_SIZE", 256),
            bus_channel_capacity: env_usize("BUS_CHANNEL_CAPACITY", 1_000),
            ping_interval: Duration::from_secs(env_u64("PING_INTERVAL_SECS", 30)),
            notify_timeout: Duration::from_secs(env_u64("NOTIFY_TIMEOUT_SECS", 10)),
            server_grace: Duration::from_secs(env_u64("SERVER_GRACE_SECS", 3)),
            drain_timeout: Duration::from_secs(env_u64("DRAIN_TIMEOUT_SECS", 10)),
        }
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let config = AppConfig::from_env();
        assert!(!config.server_addr.is_empty());
        assert!(config.sample_window >= Duration::from_millis(1));
        assert!(config.snapshot_queue_size > 0);
        assert!(config.outbound_queue_size > 0);
    }
}
