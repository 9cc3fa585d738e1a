// Library Crate Root
// lib.rs

// pub mod xxx declares xxx module exists in the same crate
// main.rs wires these together like an external caller would
pub mod api;
pub mod config;
pub mod fanout;
pub mod models;
pub mod muxer;
pub mod notify;
pub mod pipeline;
pub mod profiles;
pub mod shutdown;
pub mod sink;
pub mod sources;
pub mod transport;

// pub use = re-export at crate root
pub use api::{create_router, AppState};
pub use config::AppConfig;
pub use muxer::{StreamMultiplexer, SubscribeOutcome, UnsubscribeOutcome};
pub use shutdown::ShutdownCoordinator;
