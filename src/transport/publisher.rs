use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::PriceBus;
use crate::models::PriceSnapshot;

/// Drains sampled snapshots from the aggregation pipeline onto the pub/sub
/// bus, one channel per symbol.
///
/// Publish failures are logged and the snapshot abandoned; the next window
/// supplies a fresher value regardless.
pub struct SnapshotPublisher {
    snapshot_rx: mpsc::Receiver<PriceSnapshot>,
    bus: Arc<dyn PriceBus>,
    cancel: CancellationToken,
}

impl SnapshotPublisher {
    pub fn new(
        snapshot_rx: mpsc::Receiver<PriceSnapshot>,
        bus: Arc<dyn PriceBus>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            snapshot_rx,
            bus,
            cancel,
        }
    }

    pub async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("snapshot publisher stopping");
                    return;
                }
                snapshot = self.snapshot_rx.recv() => {
                    let Some(snapshot) = snapshot else {
                        tracing::warn!("snapshot channel closed, publisher stopping");
                        return;
                    };
                    self.publish(snapshot).await;
                }
            }
        }
    }

    async fn publish(&self, snapshot: PriceSnapshot) {
        let payload = match serde_json::to_vec(&snapshot) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(symbol = %snapshot.symbol, error = %e, "failed to encode snapshot");
                return;
            }
        };

        if let Err(e) = self.bus.publish(&snapshot.symbol, payload.into()).await {
            tracing::error!(symbol = %snapshot.symbol, error = %e, "failed to publish snapshot");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::InMemoryPriceBus;

    #[tokio::test]
    async fn test_snapshots_are_published_per_symbol_channel() {
        let bus = Arc::new(InMemoryPriceBus::new(16));
        let mut rx = bus.subscribe("btcusdt").await.unwrap();

        let (tx, snapshot_rx) = mpsc::channel(8);
        let publisher = SnapshotPublisher::new(snapshot_rx, bus.clone(), CancellationToken::new());
        tokio::spawn(publisher.run());

        tx.send(PriceSnapshot {
            symbol: "btcusdt".to_string(),
            price: 102.0,
        })
        .await
        .unwrap();

        let payload = tokio::time::timeout(std::time::Duration::from_millis(200), rx.recv())
            .await
            .unwrap()
            .unwrap();
        let decoded: PriceSnapshot = serde_json::from_slice(&payload).unwrap();
        assert_eq!(decoded.symbol, "btcusdt");
        assert_eq!(decoded.price, 102.0);
    }
}
