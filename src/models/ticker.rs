use serde::Deserialize;

/// 24-hour rolling mini ticker event from the all-market overview stream.
///
/// The overview stream delivers these in JSON arrays, one element per symbol
/// that changed in the last second. All prices are decimal strings.
#[derive(Debug, Clone, Deserialize)]
pub struct MiniTicker {
    /// Event type, always "24hrMiniTicker"
    #[serde(rename = "e")]
    pub event_type: String,
    /// Event time in epoch milliseconds
    #[serde(rename = "E")]
    pub event_time: i64,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "c")]
    pub close_price: String,
    #[serde(rename = "o")]
    pub open_price: String,
    #[serde(rename = "h")]
    pub high_price: String,
    #[serde(rename = "l")]
    pub low_price: String,
    /// Total traded base asset volume
    #[serde(rename = "v")]
    pub base_volume: String,
    /// Total traded quote asset volume
    #[serde(rename = "q")]
    pub quote_volume: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_mini_ticker_array() {
        let payload = r#"[
            {"e":"24hrMiniTicker","E":1672515782136,"s":"BTCUSDT",
             "c":"101.5","o":"100.0","h":"103.0","l":"99.0",
             "v":"1234.5","q":"125000.0"},
            {"e":"24hrMiniTicker","E":1672515782136,"s":"ETHUSDT",
             "c":"12.0","o":"10.0","h":"12.5","l":"9.8",
             "v":"5000.0","q":"60000.0"}
        ]"#;

        let tickers: Vec<MiniTicker> = serde_json::from_str(payload).unwrap();
        assert_eq!(tickers.len(), 2);
        assert_eq!(tickers[0].symbol, "BTCUSDT");
        assert_eq!(tickers[1].close_price, "12.0");
    }
}
