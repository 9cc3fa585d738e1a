use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;

use super::{SourceError, TickSource};
use crate::models::RawFrame;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Binance WebSocket feed adapter.
///
/// Opens one connection per stream and reconnects with a fixed delay until
/// cancelled. Frames are forwarded undecoded; decoding belongs to the
/// pipeline.
pub struct BinanceTickSource {
    ws_base: String,
}

impl BinanceTickSource {
    /// `ws_base` is the raw-stream base URL, e.g.
    /// `wss://stream.binance.com:9443/ws`.
    pub fn new(ws_base: impl Into<String>) -> Self {
        Self {
            ws_base: ws_base.into(),
        }
    }

    async fn run_stream(
        &self,
        stream_name: &str,
        cancel: CancellationToken,
        out: mpsc::Sender<RawFrame>,
    ) -> Result<(), SourceError> {
        let url = format!("{}/{}", self.ws_base, stream_name);

        while !cancel.is_cancelled() {
            match self.read_connection(&url, &cancel, &out).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(stream = stream_name, error = %e, "feed connection lost, reconnecting");
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = sleep(RECONNECT_DELAY) => {}
            }
        }
        Ok(())
    }

    /// Read one connection until cancelled (Ok) or it fails (Err).
    async fn read_connection(
        &self,
        url: &str,
        cancel: &CancellationToken,
        out: &mpsc::Sender<RawFrame>,
    ) -> Result<(), SourceError> {
        let (mut ws, _) = connect_async(url).await?;
        tracing::info!(url, "feed connection established");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = ws.send(Message::Close(None)).await;
                    tracing::info!(url, "feed connection closed on cancellation");
                    return Ok(());
                }
                msg = ws.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            let frame = RawFrame::new(text.into_bytes());
                            tokio::select! {
                                _ = cancel.cancelled() => return Ok(()),
                                res = out.send(frame) => {
                                    if res.is_err() {
                                        // Nobody downstream anymore; stop for
                                        // good rather than reconnecting.
                                        tracing::warn!(url, "pipeline input closed, stopping feed");
                                        return Ok(());
                                    }
                                }
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            ws.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            return Err(SourceError::FeedClosed("server closed the stream".to_string()));
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(SourceError::WebSocket(e)),
                    }
                }
            }
        }
    }
}

#[async_trait]
impl TickSource for BinanceTickSource {
    async fn stream_trades(
        &self,
        symbol: &str,
        cancel: CancellationToken,
        out: mpsc::Sender<RawFrame>,
    ) -> Result<(), SourceError> {
        let stream_name = format!("{}@aggTrade", symbol.to_lowercase());
        self.run_stream(&stream_name, cancel, out).await
    }

    async fn stream_mini_tickers(
        &self,
        cancel: CancellationToken,
        out: mpsc::Sender<RawFrame>,
    ) -> Result<(), SourceError> {
        self.run_stream("!miniTicker@arr", cancel, out).await
    }
}
