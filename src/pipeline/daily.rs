use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::models::{MiniTicker, RawFrame, StatRecord};

/// Builds daily-statistics records from mini-ticker overview frames for the
/// persisted queue.
///
/// Unlike the sampling path this stage favors completeness: records are
/// handed to the queue with a blocking, cancellation-aware send. All price
/// arithmetic is decimal so nothing drifts on the way to storage.
pub struct DailyStatBuilder {
    ticker_rx: mpsc::Receiver<RawFrame>,
    stat_tx: mpsc::Sender<StatRecord>,
    cancel: CancellationToken,
}

impl DailyStatBuilder {
    pub fn new(
        ticker_rx: mpsc::Receiver<RawFrame>,
        stat_tx: mpsc::Sender<StatRecord>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            ticker_rx,
            stat_tx,
            cancel,
        }
    }

    pub async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("daily stat builder stopping");
                    return;
                }
                frame = self.ticker_rx.recv() => {
                    let Some(frame) = frame else {
                        tracing::warn!("ticker channel closed, daily stat builder stopping");
                        return;
                    };
                    if !self.process(frame).await {
                        return;
                    }
                }
            }
        }
    }

    /// Decode one overview frame and forward its records; returns false when
    /// the builder should stop.
    async fn process(&self, frame: RawFrame) -> bool {
        let tickers: Vec<MiniTicker> = match serde_json::from_slice(&frame.payload) {
            Ok(tickers) => tickers,
            Err(e) => {
                tracing::error!(error = %e, "could not decode mini-ticker frame, skipping");
                return true;
            }
        };

        let receive_time = frame.received_at.timestamp_millis();
        for ticker in tickers {
            let Some(record) = build_record(&ticker, receive_time) else {
                continue;
            };
            tokio::select! {
                _ = self.cancel.cancelled() => return false,
                res = self.stat_tx.send(record) => {
                    if res.is_err() {
                        tracing::warn!("stat channel closed, daily stat builder stopping");
                        return false;
                    }
                }
            }
        }
        true
    }
}

/// Build one record, or None when a price field fails decimal parsing.
fn build_record(ticker: &MiniTicker, receive_time: i64) -> Option<StatRecord> {
    let parse = |field: &str, value: &str| -> Option<Decimal> {
        match value.parse::<Decimal>() {
            Ok(d) => Some(d),
            Err(e) => {
                tracing::error!(
                    symbol = %ticker.symbol,
                    field,
                    error = %e,
                    "could not parse ticker price, skipping record"
                );
                None
            }
        }
    };

    let close_price = parse("close", &ticker.close_price)?;
    let open_price = parse("open", &ticker.open_price)?;
    let high_price = parse("high", &ticker.high_price)?;
    let low_price = parse("low", &ticker.low_price)?;

    let change_price = close_price - open_price;
    let change_percent = if open_price.is_zero() {
        Decimal::ZERO
    } else {
        change_price / open_price * Decimal::ONE_HUNDRED
    };

    Some(StatRecord {
        message_id: Uuid::new_v4().to_string(),
        event_type: ticker.event_type.clone(),
        event_time: ticker.event_time,
        ingest_time: chrono::Utc::now().timestamp_millis(),
        receive_time,
        symbol: ticker.symbol.to_lowercase(),
        close_price,
        open_price,
        high_price,
        low_price,
        change_price,
        change_percent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tokio::time::{timeout, Duration};

    fn ticker_array_frame() -> RawFrame {
        RawFrame::new(
            r#"[
                {"e":"24hrMiniTicker","E":42,"s":"BTCUSDT",
                 "c":"101.50","o":"100.00","h":"103.00","l":"99.00",
                 "v":"10","q":"1000"},
                {"e":"24hrMiniTicker","E":42,"s":"ETHUSDT",
                 "c":"9.00","o":"0","h":"9.50","l":"8.00",
                 "v":"5","q":"45"}
            ]"#
            .as_bytes()
            .to_vec(),
        )
    }

    #[tokio::test]
    async fn test_records_carry_decimal_change_arithmetic() {
        let (ticker_tx, ticker_rx) = mpsc::channel(8);
        let (stat_tx, mut stat_rx) = mpsc::channel(8);

        let builder = DailyStatBuilder::new(ticker_rx, stat_tx, CancellationToken::new());
        tokio::spawn(builder.run());

        ticker_tx.send(ticker_array_frame()).await.unwrap();

        let btc = timeout(Duration::from_millis(200), stat_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(btc.symbol, "btcusdt");
        assert_eq!(btc.change_price, dec!(1.50));
        assert_eq!(btc.change_percent, dec!(1.5));
        assert!(btc.receive_time > 0);

        // Zero open price must not divide.
        let eth = timeout(Duration::from_millis(200), stat_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(eth.symbol, "ethusdt");
        assert_eq!(eth.change_percent, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_bad_frames_and_bad_prices_are_skipped() {
        let (ticker_tx, ticker_rx) = mpsc::channel(8);
        let (stat_tx, mut stat_rx) = mpsc::channel(8);

        let builder = DailyStatBuilder::new(ticker_rx, stat_tx, CancellationToken::new());
        tokio::spawn(builder.run());

        ticker_tx.send(RawFrame::new(&b"[broken"[..])).await.unwrap();
        ticker_tx
            .send(RawFrame::new(
                r#"[{"e":"24hrMiniTicker","E":1,"s":"XRPUSDT",
                     "c":"oops","o":"1","h":"1","l":"1","v":"1","q":"1"}]"#
                    .as_bytes()
                    .to_vec(),
            ))
            .await
            .unwrap();
        ticker_tx.send(ticker_array_frame()).await.unwrap();

        let record = timeout(Duration::from_millis(200), stat_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.symbol, "btcusdt");
    }

    #[test]
    fn test_change_percent_math() {
        let ticker = MiniTicker {
            event_type: "24hrMiniTicker".to_string(),
            event_time: 1,
            symbol: "BTCUSDT".to_string(),
            close_price: "95.00".to_string(),
            open_price: "100.00".to_string(),
            high_price: "101.00".to_string(),
            low_price: "94.00".to_string(),
            base_volume: "1".to_string(),
            quote_volume: "1".to_string(),
        };

        let record = build_record(&ticker, 0).unwrap();
        assert_eq!(record.change_price, dec!(-5.00));
        assert_eq!(record.change_percent, dec!(-5));
    }
}
