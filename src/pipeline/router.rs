use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::models::RawFrame;

/// Minimal envelope for classifying single-event frames.
#[derive(Deserialize)]
struct EventEnvelope {
    #[serde(rename = "e")]
    event_type: String,
}

/// Routes undecoded feed frames to their pipeline stage.
///
/// Per-symbol trade streams and the all-market overview stream share one
/// input channel; trade events go to the window aggregator, mini-ticker
/// arrays (the overview stream delivers JSON arrays) to the daily-stat
/// stage. Unclassifiable frames are logged and skipped.
pub struct FrameRouter {
    raw_rx: mpsc::Receiver<RawFrame>,
    trade_tx: mpsc::Sender<RawFrame>,
    ticker_tx: mpsc::Sender<RawFrame>,
    cancel: CancellationToken,
}

impl FrameRouter {
    pub fn new(
        raw_rx: mpsc::Receiver<RawFrame>,
        trade_tx: mpsc::Sender<RawFrame>,
        ticker_tx: mpsc::Sender<RawFrame>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            raw_rx,
            trade_tx,
            ticker_tx,
            cancel,
        }
    }

    pub async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("frame router stopping");
                    return;
                }
                frame = self.raw_rx.recv() => {
                    let Some(frame) = frame else {
                        tracing::warn!("raw frame channel closed, router stopping");
                        return;
                    };
                    if !self.route(frame).await {
                        return;
                    }
                }
            }
        }
    }

    /// Forward one frame; returns false when the router should stop.
    async fn route(&self, frame: RawFrame) -> bool {
        // The overview stream delivers arrays of tickers; everything else is
        // a single event with an "e" discriminator.
        let target = if frame.payload.first() == Some(&b'[') {
            &self.ticker_tx
        } else {
            match serde_json::from_slice::<EventEnvelope>(&frame.payload) {
                Ok(envelope) if envelope.event_type == "aggTrade" => &self.trade_tx,
                Ok(envelope) => {
                    tracing::debug!(event_type = %envelope.event_type, "skipping unhandled event frame");
                    return true;
                }
                Err(e) => {
                    tracing::error!(error = %e, "could not classify frame, skipping");
                    return true;
                }
            }
        };

        tokio::select! {
            _ = self.cancel.cancelled() => false,
            res = target.send(frame) => {
                if res.is_err() {
                    tracing::warn!("stage channel closed, router stopping");
                    false
                } else {
                    true
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    fn frame(payload: &str) -> RawFrame {
        RawFrame::new(payload.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn test_routes_trades_and_ticker_arrays() {
        let (raw_tx, raw_rx) = mpsc::channel(8);
        let (trade_tx, mut trade_rx) = mpsc::channel(8);
        let (ticker_tx, mut ticker_rx) = mpsc::channel(8);

        let router = FrameRouter::new(raw_rx, trade_tx, ticker_tx, CancellationToken::new());
        tokio::spawn(router.run());

        raw_tx.send(frame(r#"{"e":"aggTrade","E":1,"s":"BTCUSDT","a":1,"p":"1","q":"1","f":1,"l":1,"T":1,"m":true,"M":true}"#)).await.unwrap();
        raw_tx.send(frame(r#"[{"e":"24hrMiniTicker","E":1,"s":"BTCUSDT","c":"1","o":"1","h":"1","l":"1","v":"1","q":"1"}]"#)).await.unwrap();

        let trade = timeout(Duration::from_millis(200), trade_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(trade.payload.first(), Some(&b'{'));

        let ticker = timeout(Duration::from_millis(200), ticker_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ticker.payload.first(), Some(&b'['));
    }

    #[tokio::test]
    async fn test_malformed_and_unknown_frames_are_skipped() {
        let (raw_tx, raw_rx) = mpsc::channel(8);
        let (trade_tx, mut trade_rx) = mpsc::channel(8);
        let (ticker_tx, _ticker_rx) = mpsc::channel(8);

        let router = FrameRouter::new(raw_rx, trade_tx, ticker_tx, CancellationToken::new());
        tokio::spawn(router.run());

        raw_tx.send(frame("not json at all")).await.unwrap();
        raw_tx.send(frame(r#"{"e":"kline"}"#)).await.unwrap();
        raw_tx.send(frame(r#"{"e":"aggTrade","E":1,"s":"BTCUSDT","a":1,"p":"1","q":"1","f":1,"l":1,"T":1,"m":true,"M":true}"#)).await.unwrap();

        // The stream survives the bad frames and delivers the good one.
        let trade = timeout(Duration::from_millis(200), trade_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(trade.payload.first(), Some(&b'{'));
    }
}
