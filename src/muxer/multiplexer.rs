use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use utoipa::ToSchema;

/// The per-symbol resource a multiplexer manages on behalf of its followers.
///
/// `run` owns one live stream for one symbol: it should block until the
/// cancellation token fires or the upstream ends naturally. The worker runs
/// unlocked; it communicates only through its output channel and the token.
#[async_trait]
pub trait SymbolStream: Send + Sync + 'static {
    async fn run(&self, symbol: String, cancel: CancellationToken);
}

/// Result of adding a subscriber to a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    /// First follower: a new stream was started for the key.
    Started,
    /// New follower on a key whose stream was already running.
    Added,
    /// The subscriber was already following the key; no state changed.
    AlreadySubscribed,
}

/// Result of removing a subscriber from a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsubscribeOutcome {
    /// Last follower left: the key's stream was cancelled and removed.
    Stopped,
    /// The subscriber was removed; other followers remain.
    Removed,
    /// The key or the subscriber was not present; no state changed.
    NotFound,
}

/// Statistics snapshot for a multiplexer instance.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MultiplexerStats {
    /// Number of keys with a live stream
    pub active_streams: usize,
    /// Total follower entries across all keys
    pub total_followers: usize,
}

struct StreamHandle {
    cancel: CancellationToken,
    /// Generation id guarding against a stale worker removing a successor's
    /// handle after the key was torn down and re-created.
    id: u64,
}

struct MuxState {
    followers: HashMap<String, HashSet<String>>,
    streams: HashMap<String, StreamHandle>,
    next_stream_id: u64,
}

/// Demand-driven stream multiplexer.
///
/// Maps a symbol to a lazily-created, reference-counted stream resource: the
/// first subscriber for a symbol starts its stream, the last one leaving
/// cancels it. Instantiated twice — on the ingest side (one exchange feed
/// connection per symbol) and on the fan-out side (one pub/sub channel
/// subscription per symbol).
///
/// All follower-set and handle mutations are serialized by one per-instance
/// lock; the stream workers themselves run unlocked.
pub struct StreamMultiplexer<S: SymbolStream> {
    name: &'static str,
    state: Arc<Mutex<MuxState>>,
    worker: Arc<S>,
    root: CancellationToken,
    tracker: TaskTracker,
}

impl<S: SymbolStream> StreamMultiplexer<S> {
    /// Create a multiplexer.
    ///
    /// `root` is the shutdown token every stream token is derived from, and
    /// `tracker` counts the spawned stream tasks for drain-on-shutdown.
    pub fn new(name: &'static str, worker: S, root: CancellationToken, tracker: TaskTracker) -> Self {
        Self {
            name,
            state: Arc::new(Mutex::new(MuxState {
                followers: HashMap::new(),
                streams: HashMap::new(),
                next_stream_id: 0,
            })),
            worker: Arc::new(worker),
            root,
            tracker,
        }
    }

    /// Add `subscriber` to `symbol`'s follower set, starting the symbol's
    /// stream when it is the first follower. Idempotent for repeat
    /// subscribers.
    pub fn add_subscriber(&self, symbol: &str, subscriber: &str) -> SubscribeOutcome {
        let symbol = symbol.to_lowercase();
        let mut state = self.state.lock();

        if !state
            .followers
            .entry(symbol.clone())
            .or_default()
            .insert(subscriber.to_string())
        {
            tracing::info!(
                muxer = self.name,
                symbol = %symbol,
                subscriber = %subscriber,
                "already subscribed, re-subscription is not required"
            );
            return SubscribeOutcome::AlreadySubscribed;
        }

        if state.streams.contains_key(&symbol) {
            let total = state.followers.get(&symbol).map(|s| s.len()).unwrap_or(0);
            tracing::info!(
                muxer = self.name,
                symbol = %symbol,
                subscriber = %subscriber,
                total_followers = total,
                "adding subscriber to existing stream"
            );
            return SubscribeOutcome::Added;
        }

        tracing::info!(
            muxer = self.name,
            symbol = %symbol,
            subscriber = %subscriber,
            "first subscriber, starting new stream"
        );
        self.start_stream(&mut state, symbol);
        SubscribeOutcome::Started
    }

    /// Remove `subscriber` from `symbol`'s follower set; when the set
    /// empties, cancel the stream and remove its handle. No-op if the key or
    /// subscriber is absent.
    pub fn remove_subscriber(&self, symbol: &str, subscriber: &str) -> UnsubscribeOutcome {
        let symbol = symbol.to_lowercase();
        let mut state = self.state.lock();

        let Some(set) = state.followers.get_mut(&symbol) else {
            return UnsubscribeOutcome::NotFound;
        };
        if !set.remove(subscriber) {
            return UnsubscribeOutcome::NotFound;
        }

        tracing::info!(
            muxer = self.name,
            symbol = %symbol,
            subscriber = %subscriber,
            "subscriber removed"
        );

        if !set.is_empty() {
            return UnsubscribeOutcome::Removed;
        }

        state.followers.remove(&symbol);
        if let Some(handle) = state.streams.remove(&symbol) {
            handle.cancel.cancel();
            tracing::info!(
                muxer = self.name,
                symbol = %symbol,
                "last subscriber left, stream cancellation signal sent"
            );
        }
        UnsubscribeOutcome::Stopped
    }

    /// Current followers of `symbol`, in no particular order.
    pub fn followers(&self, symbol: &str) -> Vec<String> {
        let symbol = symbol.to_lowercase();
        self.state
            .lock()
            .followers
            .get(&symbol)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether `symbol` currently has a live stream handle.
    pub fn is_active(&self, symbol: &str) -> bool {
        let symbol = symbol.to_lowercase();
        self.state.lock().streams.contains_key(&symbol)
    }

    /// Get multiplexer statistics.
    pub fn stats(&self) -> MultiplexerStats {
        let state = self.state.lock();
        MultiplexerStats {
            active_streams: state.streams.len(),
            total_followers: state.followers.values().map(|s| s.len()).sum(),
        }
    }

    /// Spawn the stream task for `symbol` and record its handle. Caller holds
    /// the state lock.
    fn start_stream(&self, state: &mut MuxState, symbol: String) {
        let id = state.next_stream_id;
        state.next_stream_id += 1;

        let cancel = self.root.child_token();
        state.streams.insert(
            symbol.clone(),
            StreamHandle {
                cancel: cancel.clone(),
                id,
            },
        );

        let worker = Arc::clone(&self.worker);
        let shared = Arc::clone(&self.state);
        let name = self.name;
        self.tracker.spawn(async move {
            worker.run(symbol.clone(), cancel).await;

            // Self-cleanup: the worker ended, cancelled or naturally. The
            // handle may already be gone (last-unsubscribe removes it), or may
            // belong to a newer stream for the same symbol; only remove our
            // own generation.
            let mut state = shared.lock();
            if state.streams.get(&symbol).map(|h| h.id) == Some(id) {
                state.streams.remove(&symbol);
            }
            tracing::info!(muxer = name, symbol = %symbol, "stream stopped and cleaned up");
        });
    }
}

impl<S: SymbolStream> Clone for StreamMultiplexer<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            state: Arc::clone(&self.state),
            worker: Arc::clone(&self.worker),
            root: self.root.clone(),
            tracker: self.tracker.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tokio::time::{sleep, Duration};

    /// Worker that blocks until cancelled, counting starts and stops.
    struct CountingWorker {
        started: Arc<AtomicU64>,
        stopped: Arc<AtomicU64>,
    }

    #[async_trait]
    impl SymbolStream for CountingWorker {
        async fn run(&self, _symbol: String, cancel: CancellationToken) {
            self.started.fetch_add(1, Ordering::SeqCst);
            cancel.cancelled().await;
            self.stopped.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Worker that terminates on its own immediately.
    struct ShortLivedWorker {
        started: Arc<AtomicU64>,
    }

    #[async_trait]
    impl SymbolStream for ShortLivedWorker {
        async fn run(&self, _symbol: String, _cancel: CancellationToken) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counting_muxer() -> (StreamMultiplexer<CountingWorker>, Arc<AtomicU64>, Arc<AtomicU64>) {
        let started = Arc::new(AtomicU64::new(0));
        let stopped = Arc::new(AtomicU64::new(0));
        let muxer = StreamMultiplexer::new(
            "test",
            CountingWorker {
                started: Arc::clone(&started),
                stopped: Arc::clone(&stopped),
            },
            CancellationToken::new(),
            TaskTracker::new(),
        );
        (muxer, started, stopped)
    }

    #[tokio::test]
    async fn test_double_subscribe_is_idempotent() {
        let (muxer, started, _) = counting_muxer();

        assert_eq!(muxer.add_subscriber("BTCUSDT", "u1"), SubscribeOutcome::Started);
        assert_eq!(
            muxer.add_subscriber("btcusdt", "u1"),
            SubscribeOutcome::AlreadySubscribed
        );

        sleep(Duration::from_millis(20)).await;
        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert!(muxer.is_active("btcusdt"));
    }

    #[tokio::test]
    async fn test_refcount_teardown_happens_exactly_once() {
        let (muxer, started, stopped) = counting_muxer();

        assert_eq!(muxer.add_subscriber("btcusdt", "u1"), SubscribeOutcome::Started);
        assert_eq!(muxer.add_subscriber("btcusdt", "u2"), SubscribeOutcome::Added);

        assert_eq!(muxer.remove_subscriber("btcusdt", "u1"), UnsubscribeOutcome::Removed);
        assert!(muxer.is_active("btcusdt"));

        assert_eq!(muxer.remove_subscriber("btcusdt", "u2"), UnsubscribeOutcome::Stopped);
        sleep(Duration::from_millis(20)).await;

        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert_eq!(stopped.load(Ordering::SeqCst), 1);
        assert!(!muxer.is_active("btcusdt"));
        assert_eq!(
            muxer.remove_subscriber("btcusdt", "u2"),
            UnsubscribeOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn test_unknown_key_and_subscriber_are_no_ops() {
        let (muxer, _, _) = counting_muxer();

        assert_eq!(
            muxer.remove_subscriber("nosuch", "u1"),
            UnsubscribeOutcome::NotFound
        );

        muxer.add_subscriber("btcusdt", "u1");
        assert_eq!(
            muxer.remove_subscriber("btcusdt", "stranger"),
            UnsubscribeOutcome::NotFound
        );
        assert!(muxer.is_active("btcusdt"));
    }

    #[tokio::test]
    async fn test_natural_exit_cleans_up_handle() {
        let started = Arc::new(AtomicU64::new(0));
        let muxer = StreamMultiplexer::new(
            "test",
            ShortLivedWorker {
                started: Arc::clone(&started),
            },
            CancellationToken::new(),
            TaskTracker::new(),
        );

        assert_eq!(muxer.add_subscriber("btcusdt", "u1"), SubscribeOutcome::Started);
        sleep(Duration::from_millis(20)).await;

        // The worker ended on its own and removed its handle, while u1 still
        // follows the symbol. A new subscriber restarts the stream.
        assert!(!muxer.is_active("btcusdt"));
        assert_eq!(muxer.add_subscriber("btcusdt", "u2"), SubscribeOutcome::Started);
        sleep(Duration::from_millis(20)).await;
        assert_eq!(started.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_symbol_is_case_normalized() {
        let (muxer, _, _) = counting_muxer();

        assert_eq!(muxer.add_subscriber("BtcUsdt", "u1"), SubscribeOutcome::Started);
        assert_eq!(muxer.followers("BTCUSDT"), vec!["u1".to_string()]);
        assert_eq!(
            muxer.remove_subscriber("BTCUSDT", "u1"),
            UnsubscribeOutcome::Stopped
        );
    }

    #[tokio::test]
    async fn test_stats_track_streams_and_followers() {
        let (muxer, _, _) = counting_muxer();

        muxer.add_subscriber("btcusdt", "u1");
        muxer.add_subscriber("btcusdt", "u2");
        muxer.add_subscriber("ethusdt", "u1");

        let stats = muxer.stats();
        assert_eq!(stats.active_streams, 2);
        assert_eq!(stats.total_followers, 3);
    }
}
