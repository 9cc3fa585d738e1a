pub mod memory;
pub mod publisher;

pub use memory::InMemoryPriceBus;
pub use publisher::SnapshotPublisher;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::sync::broadcast;

/// Errors from the pub/sub transport boundary.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to subscribe to channel '{0}': {1}")]
    Subscribe(String, String),

    #[error("failed to publish to channel '{0}': {1}")]
    Publish(String, String),
}

/// Pub/sub transport contract: textual messages, one channel per symbol.
///
/// The broker itself is an external collaborator; the crate ships an
/// in-process implementation for tests and single-binary wiring. Receivers
/// that fall behind observe `Lagged` rather than blocking the publisher, and
/// unsubscribing is dropping the receiver.
#[async_trait]
pub trait PriceBus: Send + Sync + 'static {
    /// Publish `payload` on `symbol`'s channel. Publishing to a channel with
    /// no subscribers is not an error.
    async fn publish(&self, symbol: &str, payload: Bytes) -> Result<(), TransportError>;

    /// Subscribe to `symbol`'s channel.
    async fn subscribe(&self, symbol: &str) -> Result<broadcast::Receiver<Bytes>, TransportError>;
}
