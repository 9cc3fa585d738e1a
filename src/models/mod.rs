pub mod frame;
pub mod portfolio;
pub mod stats;
pub mod ticker;
pub mod trade;

pub use frame::RawFrame;
pub use portfolio::{CoinView, Holding, PortfolioView, UserProfile};
pub use stats::{PriceSnapshot, StatRecord};
pub use ticker::MiniTicker;
pub use trade::AggTrade;
