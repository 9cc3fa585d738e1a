use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

use super::SymbolStream;
use crate::models::RawFrame;
use crate::sources::TickSource;
use crate::transport::PriceBus;

/// Ingest-side stream worker: one exchange feed connection per symbol,
/// forwarding undecoded frames into the shared pipeline input channel.
pub struct TradeStreamWorker {
    source: Arc<dyn TickSource>,
    raw_tx: mpsc::Sender<RawFrame>,
}

impl TradeStreamWorker {
    pub fn new(source: Arc<dyn TickSource>, raw_tx: mpsc::Sender<RawFrame>) -> Self {
        Self { source, raw_tx }
    }
}

#[async_trait]
impl SymbolStream for TradeStreamWorker {
    async fn run(&self, symbol: String, cancel: CancellationToken) {
        if let Err(e) = self
            .source
            .stream_trades(&symbol, cancel, self.raw_tx.clone())
            .await
        {
            tracing::error!(symbol = %symbol, error = %e, "trade stream ended with error");
        }
    }
}

/// Fan-out-side stream worker: one pub/sub channel subscription per symbol,
/// forwarding price-update payloads into the push engine's channel.
///
/// The handoff is non-blocking: a full engine channel drops the update (the
/// next window supplies a fresher price) rather than stalling the bus reader.
pub struct PriceChannelWorker {
    bus: Arc<dyn PriceBus>,
    update_tx: mpsc::Sender<Bytes>,
}

impl PriceChannelWorker {
    pub fn new(bus: Arc<dyn PriceBus>, update_tx: mpsc::Sender<Bytes>) -> Self {
        Self { bus, update_tx }
    }
}

#[async_trait]
impl SymbolStream for PriceChannelWorker {
    async fn run(&self, symbol: String, cancel: CancellationToken) {
        let mut rx = match self.bus.subscribe(&symbol).await {
            Ok(rx) => rx,
            Err(e) => {
                tracing::error!(symbol = %symbol, error = %e, "could not subscribe to price channel");
                return;
            }
        };
        tracing::info!(symbol = %symbol, "subscribed to price channel");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(symbol = %symbol, "price channel listener stopping");
                    return;
                }
                msg = rx.recv() => {
                    match msg {
                        Ok(payload) => match self.update_tx.try_send(payload) {
                            Ok(()) => {}
                            Err(TrySendError::Full(_)) => {
                                tracing::warn!(symbol = %symbol, "update channel full, dropping message");
                            }
                            Err(TrySendError::Closed(_)) => {
                                tracing::warn!(symbol = %symbol, "update channel closed, listener stopping");
                                return;
                            }
                        },
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(symbol = %symbol, skipped, "price channel lagged, messages skipped");
                        }
                        Err(RecvError::Closed) => {
                            tracing::warn!(symbol = %symbol, "price channel closed");
                            return;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::InMemoryPriceBus;
    use tokio::time::{sleep, timeout, Duration};

    #[tokio::test]
    async fn test_price_channel_worker_forwards_payloads() {
        let bus: Arc<dyn PriceBus> = Arc::new(InMemoryPriceBus::new(16));
        let (update_tx, mut update_rx) = mpsc::channel(8);
        let worker = PriceChannelWorker::new(Arc::clone(&bus), update_tx);

        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        tokio::spawn(async move { worker.run("btcusdt".to_string(), task_cancel).await });
        sleep(Duration::from_millis(20)).await;

        bus.publish("btcusdt", Bytes::from_static(b"{\"s\":\"btcusdt\",\"p\":1.0}"))
            .await
            .unwrap();

        let payload = timeout(Duration::from_millis(200), update_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(payload.starts_with(b"{\"s\""));

        cancel.cancel();
    }

    #[tokio::test]
    async fn test_full_update_channel_drops_instead_of_blocking() {
        let bus: Arc<dyn PriceBus> = Arc::new(InMemoryPriceBus::new(16));
        let (update_tx, mut update_rx) = mpsc::channel(1);
        let worker = PriceChannelWorker::new(Arc::clone(&bus), update_tx);

        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        tokio::spawn(async move { worker.run("btcusdt".to_string(), task_cancel).await });
        sleep(Duration::from_millis(20)).await;

        for i in 0..5u32 {
            bus.publish("btcusdt", Bytes::from(format!("payload-{i}")))
                .await
                .unwrap();
        }
        sleep(Duration::from_millis(50)).await;

        // Capacity one: the first payload is delivered, the overflow dropped,
        // and the worker is still alive for newer input.
        assert_eq!(update_rx.recv().await.unwrap(), Bytes::from_static(b"payload-0"));
        assert!(update_rx.try_recv().is_err());

        bus.publish("btcusdt", Bytes::from_static(b"fresh")).await.unwrap();
        let payload = timeout(Duration::from_millis(200), update_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payload, Bytes::from_static(b"fresh"));

        cancel.cancel();
    }
}
