use serde::Deserialize;

/// Aggregated trade event as it arrives on the per-symbol exchange stream.
///
/// Field names mirror the exchange's single-letter JSON keys. Price and
/// quantity are decimal strings on the wire; they are parsed lazily so a
/// malformed number in one field does not reject the whole frame.
#[derive(Debug, Clone, Deserialize)]
pub struct AggTrade {
    /// Event type, always "aggTrade"
    #[serde(rename = "e")]
    pub event_type: String,
    /// Event time in epoch milliseconds
    #[serde(rename = "E")]
    pub event_time: i64,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "a")]
    pub aggregate_trade_id: i64,
    /// Trade price as a decimal string
    #[serde(rename = "p")]
    pub price: String,
    /// Trade quantity as a decimal string
    #[serde(rename = "q")]
    pub quantity: String,
    #[serde(rename = "f")]
    pub first_trade_id: i64,
    #[serde(rename = "l")]
    pub last_trade_id: i64,
    /// Trade time in epoch milliseconds
    #[serde(rename = "T")]
    pub trade_time: i64,
    /// True when the buyer is the market maker
    #[serde(rename = "m")]
    pub is_buyer_maker: bool,
    #[serde(rename = "M", default)]
    pub ignore: bool,
}

impl AggTrade {
    /// Parse the wire price into an f64 for the live sampling path.
    pub fn price_value(&self) -> Result<f64, std::num::ParseFloatError> {
        self.price.parse::<f64>()
    }
}
