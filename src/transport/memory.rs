use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

use super::{PriceBus, TransportError};

/// In-process pub/sub bus with one broadcast channel per symbol.
///
/// Channels are created on first use and survive with no subscribers (a
/// publish then simply reaches nobody). `cleanup_empty_channels` reclaims
/// channels whose receivers are all gone.
#[derive(Clone)]
pub struct InMemoryPriceBus {
    channels: Arc<DashMap<String, broadcast::Sender<Bytes>>>,
    capacity: usize,
}

impl InMemoryPriceBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(DashMap::new()),
            capacity,
        }
    }

    fn get_or_create_channel(&self, symbol: &str) -> broadcast::Sender<Bytes> {
        self.channels
            .entry(symbol.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Get subscriber count for a symbol's channel.
    pub fn subscriber_count(&self, symbol: &str) -> usize {
        self.channels
            .get(symbol)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    /// Remove channels that no longer have any subscriber.
    pub fn cleanup_empty_channels(&self) {
        self.channels.retain(|_, sender| sender.receiver_count() > 0);
    }
}

#[async_trait]
impl PriceBus for InMemoryPriceBus {
    async fn publish(&self, symbol: &str, payload: Bytes) -> Result<(), TransportError> {
        if let Some(sender) = self.channels.get(symbol) {
            // A send error only means no subscribers are listening.
            let _ = sender.send(payload);
        }
        Ok(())
    }

    async fn subscribe(&self, symbol: &str) -> Result<broadcast::Receiver<Bytes>, TransportError> {
        Ok(self.get_or_create_channel(symbol).subscribe())
    }
}
