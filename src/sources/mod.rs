pub mod binance;

pub use binance::BinanceTickSource;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::models::RawFrame;

/// Errors from the exchange feed boundary.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("feed ended: {0}")]
    FeedClosed(String),
}

/// Exchange feed boundary: opens raw feed connections and forwards undecoded
/// frames.
///
/// Both methods block until cancelled; frames are handed off with a
/// cancellation-aware blocking send so a slow pipeline applies backpressure
/// to the feed reader instead of buffering unboundedly.
#[async_trait]
pub trait TickSource: Send + Sync + 'static {
    /// One connection for one symbol's aggregated-trade stream.
    async fn stream_trades(
        &self,
        symbol: &str,
        cancel: CancellationToken,
        out: mpsc::Sender<RawFrame>,
    ) -> Result<(), SourceError>;

    /// One connection for the all-market mini-ticker overview stream.
    async fn stream_mini_tickers(
        &self,
        cancel: CancellationToken,
        out: mpsc::Sender<RawFrame>,
    ) -> Result<(), SourceError>;
}
