use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::models::{AggTrade, PriceSnapshot, RawFrame};

/// Converts the high-rate trade stream into one sampled snapshot per symbol
/// per window.
///
/// Between ticks, every inbound trade overwrites the symbol's entry in the
/// latest-value table (last write wins). On each tick, one snapshot per
/// table entry goes to the bounded output queue with a non-blocking send; a
/// full queue drops that sample with a warning. Freshness is favored over
/// completeness: the next window supplies a newer value either way.
///
/// A symbol keeps emitting one snapshot per window while its table entry
/// exists, even if the price did not change.
pub struct WindowAggregator {
    trade_rx: mpsc::Receiver<RawFrame>,
    snapshot_tx: mpsc::Sender<PriceSnapshot>,
    window: Duration,
    cancel: CancellationToken,
    dropped: Arc<AtomicU64>,
}

impl WindowAggregator {
    pub fn new(
        trade_rx: mpsc::Receiver<RawFrame>,
        snapshot_tx: mpsc::Sender<PriceSnapshot>,
        window: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            trade_rx,
            snapshot_tx,
            window,
            cancel,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Counter of snapshots dropped on a full output queue.
    pub fn dropped_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.dropped)
    }

    pub async fn run(mut self) {
        let mut latest: HashMap<String, f64> = HashMap::new();
        let start = time::Instant::now() + self.window;
        let mut ticker = time::interval_at(start, self.window);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("window aggregator stopping");
                    return;
                }
                frame = self.trade_rx.recv() => {
                    let Some(frame) = frame else {
                        tracing::warn!("trade channel closed, window aggregator stopping");
                        return;
                    };
                    self.ingest(&mut latest, frame);
                }
                _ = ticker.tick() => {
                    self.emit_window(&latest);
                }
            }
        }
    }

    fn ingest(&self, latest: &mut HashMap<String, f64>, frame: RawFrame) {
        let trade: AggTrade = match serde_json::from_slice(&frame.payload) {
            Ok(trade) => trade,
            Err(e) => {
                tracing::error!(error = %e, "could not decode trade frame, skipping");
                return;
            }
        };

        match trade.price_value() {
            Ok(price) => {
                latest.insert(trade.symbol.to_lowercase(), price);
            }
            Err(e) => {
                tracing::error!(symbol = %trade.symbol, error = %e, "could not parse trade price, skipping");
            }
        }
    }

    fn emit_window(&self, latest: &HashMap<String, f64>) {
        for (symbol, price) in latest {
            let snapshot = PriceSnapshot {
                symbol: symbol.clone(),
                price: *price,
            };
            match self.snapshot_tx.try_send(snapshot) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(symbol = %symbol, "snapshot channel full, dropping sample");
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::warn!("snapshot channel closed, samples are going nowhere");
                    return;
                }
            }
        }
    }
}
