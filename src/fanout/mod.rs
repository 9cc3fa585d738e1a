pub mod client;
pub mod engine;
pub mod registry;

pub use client::{ClientHandle, PushResult};
pub use engine::PushEngine;
pub use registry::ConnectionRegistry;
