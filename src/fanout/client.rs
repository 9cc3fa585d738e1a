use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::models::{CoinView, Holding, PortfolioView, UserProfile};

/// Result of a non-blocking push to a client's outbound queue. The drop path
/// is a first-class return value so backpressure is testable, not a hidden
/// timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushResult {
    Delivered,
    /// The outbound queue was full; this update was discarded for this
    /// client only.
    Dropped,
    /// The outbound queue is closed; the client is being torn down.
    Gone,
}

/// One connected client.
///
/// The price cache is private to the client and guarded by the client's own
/// lock, so recomputing one client's view never blocks the registry or other
/// clients. The portfolio is fixed for the connection's lifetime.
pub struct ClientHandle {
    pub user_id: Uuid,
    pub user_name: String,
    pub holdings: Vec<Holding>,
    prices: Mutex<HashMap<String, Decimal>>,
    outbound: mpsc::Sender<String>,
    cancel: CancellationToken,
}

impl ClientHandle {
    pub fn new(
        profile: UserProfile,
        outbound: mpsc::Sender<String>,
        cancel: CancellationToken,
    ) -> Self {
        // Holdings are keyed the same way the price cache is, so a profile
        // stored with mixed-case symbols still values correctly.
        let holdings = profile
            .holdings
            .into_iter()
            .map(|mut holding| {
                holding.symbol = holding.symbol.to_lowercase();
                holding
            })
            .collect();

        Self {
            user_id: profile.user_id,
            user_name: profile.name,
            holdings,
            prices: Mutex::new(HashMap::new()),
            outbound,
            cancel,
        }
    }

    /// Cache the new price for `symbol`, recompute the full portfolio view,
    /// and push it onto the outbound queue without blocking.
    pub fn push_price_update(&self, symbol: &str, price: Decimal) -> PushResult {
        let mut prices = self.prices.lock();
        prices.insert(symbol.to_string(), price);
        let view = self.build_view(&prices);

        let payload = match serde_json::to_string(&view) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(user_id = %self.user_id, error = %e, "failed to encode portfolio view");
                return PushResult::Dropped;
            }
        };

        match self.outbound.try_send(payload) {
            Ok(()) => PushResult::Delivered,
            Err(TrySendError::Full(_)) => PushResult::Dropped,
            Err(TrySendError::Closed(_)) => PushResult::Gone,
        }
    }

    /// Sum the whole portfolio against the current cache; symbols with no
    /// observed price value at zero.
    fn build_view(&self, prices: &HashMap<String, Decimal>) -> PortfolioView {
        let mut total_value = Decimal::ZERO;
        let coins = self
            .holdings
            .iter()
            .map(|holding| {
                let price = prices
                    .get(&holding.symbol)
                    .copied()
                    .unwrap_or(Decimal::ZERO);
                let total = holding.quantity * price;
                total_value += total;
                CoinView {
                    symbol: holding.symbol.clone(),
                    quantity: holding.quantity,
                    price,
                    total,
                }
            })
            .collect();

        PortfolioView {
            user_id: self.user_id.to_string(),
            user_name: self.user_name.clone(),
            total_value,
            coins,
        }
    }

    /// Tear down the connection: fires the token that ends both socket loops.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn profile() -> UserProfile {
        UserProfile {
            user_id: Uuid::new_v4(),
            name: "alice".to_string(),
            holdings: vec![
                Holding {
                    symbol: "btcusdt".to_string(),
                    quantity: dec!(2),
                },
                Holding {
                    symbol: "ethusdt".to_string(),
                    quantity: dec!(5),
                },
            ],
        }
    }

    #[tokio::test]
    async fn test_view_values_unobserved_symbols_at_zero() {
        let (tx, mut rx) = mpsc::channel(4);
        let client = ClientHandle::new(profile(), tx, CancellationToken::new());

        assert_eq!(
            client.push_price_update("btcusdt", dec!(100)),
            PushResult::Delivered
        );

        let view: PortfolioView = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(view.user_name, "alice");
        assert_eq!(view.total_value, dec!(200));
        assert_eq!(view.coins.len(), 2);

        let btc = view.coins.iter().find(|c| c.symbol == "btcusdt").unwrap();
        assert_eq!(btc.total, dec!(200));
        let eth = view.coins.iter().find(|c| c.symbol == "ethusdt").unwrap();
        assert_eq!(eth.price, Decimal::ZERO);
        assert_eq!(eth.total, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_view_is_recomputed_whole_on_each_update() {
        let (tx, mut rx) = mpsc::channel(4);
        let client = ClientHandle::new(profile(), tx, CancellationToken::new());

        client.push_price_update("btcusdt", dec!(100));
        client.push_price_update("ethusdt", dec!(10));

        let _first = rx.try_recv().unwrap();
        let view: PortfolioView = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();

        // The second view still carries the cached btc price.
        assert_eq!(view.total_value, dec!(250));
    }

    #[tokio::test]
    async fn test_full_outbound_queue_drops_for_this_client_only() {
        let (tx, mut rx) = mpsc::channel(1);
        let client = ClientHandle::new(profile(), tx, CancellationToken::new());

        assert_eq!(
            client.push_price_update("btcusdt", dec!(1)),
            PushResult::Delivered
        );
        assert_eq!(
            client.push_price_update("btcusdt", dec!(2)),
            PushResult::Dropped
        );

        // The delivered view is the first one; the drop left no residue.
        let view: PortfolioView = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(view.total_value, dec!(2));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_queue_reports_gone() {
        let (tx, rx) = mpsc::channel(1);
        let client = ClientHandle::new(profile(), tx, CancellationToken::new());

        drop(rx);
        assert_eq!(client.push_price_update("btcusdt", dec!(1)), PushResult::Gone);
    }
}
