use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One position in a user's portfolio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holding {
    pub symbol: String,
    pub quantity: Decimal,
}

/// A user's profile as resolved by the profile boundary at connect time.
///
/// The portfolio is fixed for the lifetime of the connection; a client that
/// changes holdings reconnects and is superseded.
#[derive(Debug, Clone)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub name: String,
    pub holdings: Vec<Holding>,
}

/// One valued position inside a pushed portfolio view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoinView {
    pub symbol: String,
    pub quantity: Decimal,
    pub price: Decimal,
    pub total: Decimal,
}

/// The full derived view pushed to a client on every relevant price update.
///
/// Always recomputed from the whole portfolio, never patched incrementally,
/// so the totals are internally consistent even when only one symbol moved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioView {
    #[serde(rename = "userID")]
    pub user_id: String,
    #[serde(rename = "userName")]
    pub user_name: String,
    #[serde(rename = "totalValue")]
    pub total_value: Decimal,
    pub coins: Vec<CoinView>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_portfolio_view_field_names() {
        let view = PortfolioView {
            user_id: "u-1".to_string(),
            user_name: "alice".to_string(),
            total_value: dec!(200),
            coins: vec![CoinView {
                symbol: "btcusdt".to_string(),
                quantity: dec!(2),
                price: dec!(100),
                total: dec!(200),
            }],
        };

        let json = serde_json::to_string(&view).unwrap();
        assert!(json.contains(r#""userID":"u-1""#));
        assert!(json.contains(r#""userName":"alice""#));
        assert!(json.contains(r#""totalValue":"200""#));
    }
}
