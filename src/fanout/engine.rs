use bytes::Bytes;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::{ConnectionRegistry, PushResult};
use crate::models::PriceSnapshot;
use crate::muxer::FanoutMultiplexer;

/// Pushes recomputed portfolio views to interested clients on every price
/// update.
///
/// Consumes the channel fed by the per-symbol pub/sub workers. For each
/// update it asks the fan-out multiplexer who follows the symbol and pushes
/// a freshly computed view to each follower's private queue; a full queue
/// drops the update for that client only.
pub struct PushEngine {
    update_rx: mpsc::Receiver<Bytes>,
    muxer: FanoutMultiplexer,
    registry: Arc<ConnectionRegistry>,
    cancel: CancellationToken,
    dropped: Arc<AtomicU64>,
}

impl PushEngine {
    pub fn new(
        update_rx: mpsc::Receiver<Bytes>,
        muxer: FanoutMultiplexer,
        registry: Arc<ConnectionRegistry>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            update_rx,
            muxer,
            registry,
            cancel,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Counter of per-client pushes dropped on a full outbound queue.
    pub fn dropped_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.dropped)
    }

    pub async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("push engine stopping");
                    return;
                }
                payload = self.update_rx.recv() => {
                    let Some(payload) = payload else {
                        tracing::warn!("update channel closed, push engine stopping");
                        return;
                    };
                    self.handle_update(&payload);
                }
            }
        }
    }

    fn handle_update(&self, payload: &[u8]) {
        let update: PriceSnapshot = match serde_json::from_slice(payload) {
            Ok(update) => update,
            Err(e) => {
                tracing::error!(error = %e, "failed to parse price update, skipping");
                return;
            }
        };

        let Some(price) = Decimal::from_f64(update.price) else {
            tracing::warn!(symbol = %update.symbol, price = update.price, "price is not representable, skipping");
            return;
        };
        let symbol = update.symbol.to_lowercase();

        for follower in self.muxer.followers(&symbol) {
            let Ok(user_id) = Uuid::parse_str(&follower) else {
                tracing::warn!(subscriber = %follower, "follower id is not a user id, skipping");
                continue;
            };
            let Some(client) = self.registry.get(&user_id) else {
                continue;
            };

            match client.push_price_update(&symbol, price) {
                PushResult::Delivered => {}
                PushResult::Dropped => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(user_id = %user_id, symbol = %symbol, "client queue full, dropping update");
                }
                PushResult::Gone => {
                    tracing::debug!(user_id = %user_id, "client outbound closed, update not delivered");
                }
            }
        }
    }
}
