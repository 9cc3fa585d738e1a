pub mod multiplexer;
pub mod workers;

pub use multiplexer::{
    StreamMultiplexer, SubscribeOutcome, SymbolStream, UnsubscribeOutcome,
};
pub use workers::{PriceChannelWorker, TradeStreamWorker};

/// Ingest-side multiplexer: one exchange feed connection per symbol.
pub type IngestMultiplexer = StreamMultiplexer<TradeStreamWorker>;

/// Fan-out-side multiplexer: one pub/sub channel subscription per symbol.
pub type FanoutMultiplexer = StreamMultiplexer<PriceChannelWorker>;
