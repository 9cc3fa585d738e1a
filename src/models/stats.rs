use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One sampled price for one symbol, emitted once per sampling window.
///
/// This is also the pub/sub wire payload: a textual JSON object
/// `{"s": <symbol>, "p": <price>}` published on the symbol's channel and
/// decoded again on the fan-out side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "p")]
    pub price: f64,
}

/// One daily-statistics record bound for the persisted queue.
///
/// Every monetary field is a `Decimal` so the wire representation stays a
/// decimal string rather than a binary float; monetary values must not drift
/// through the storage path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatRecord {
    pub message_id: String,
    #[serde(rename = "e")]
    pub event_type: String,
    #[serde(rename = "E")]
    pub event_time: i64,
    /// When this record was built by the pipeline, epoch milliseconds
    pub ingest_time: i64,
    /// When the raw frame was read off the feed, epoch milliseconds
    pub receive_time: i64,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "c")]
    pub close_price: Decimal,
    #[serde(rename = "o")]
    pub open_price: Decimal,
    #[serde(rename = "h")]
    pub high_price: Decimal,
    #[serde(rename = "l")]
    pub low_price: Decimal,
    pub change_price: Decimal,
    pub change_percent: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_snapshot_wire_format() {
        let snapshot = PriceSnapshot {
            symbol: "btcusdt".to_string(),
            price: 102.5,
        };

        let json = serde_json::to_string(&snapshot).unwrap();
        assert_eq!(json, r#"{"s":"btcusdt","p":102.5}"#);

        let decoded: PriceSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn test_stat_record_prices_serialize_as_decimal_strings() {
        let record = StatRecord {
            message_id: "m-1".to_string(),
            event_type: "24hrMiniTicker".to_string(),
            event_time: 1,
            ingest_time: 2,
            receive_time: 3,
            symbol: "btcusdt".to_string(),
            close_price: dec!(101.50),
            open_price: dec!(100.00),
            high_price: dec!(103.00),
            low_price: dec!(99.00),
            change_price: dec!(1.50),
            change_percent: dec!(1.5),
        };

        let json = serde_json::to_string(&record).unwrap();
        // Decimal fields must not degrade to binary floats on the wire.
        assert!(json.contains(r#""c":"101.50""#));
        assert!(json.contains(r#""change_price":"1.50""#));
    }
}
