use bytes::Bytes;
use chrono::{DateTime, Utc};

/// An undecoded frame as it arrived from the exchange feed.
///
/// The receive timestamp is stamped by the feed adapter the moment the frame
/// is read off the wire, so downstream stages can record wire-to-queue
/// latency without re-reading the clock.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub payload: Bytes,
    pub received_at: DateTime<Utc>,
}

impl RawFrame {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
            received_at: Utc::now(),
        }
    }
}
