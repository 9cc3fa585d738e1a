use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::models::StatRecord;

/// Errors from the persisted-queue boundary.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink unavailable: {0}")]
    Unavailable(String),

    #[error("publish failed: {0}")]
    PublishFailed(String),
}

/// Persisted-queue boundary: receives ordered daily-stat records bound for
/// the batching storage sink. Batching, retries and the actual store live on
/// the other side of this trait.
#[async_trait]
pub trait StatSink: Send + Sync + 'static {
    async fn publish(&self, record: StatRecord) -> Result<(), SinkError>;
}

/// Demo sink that logs each record instead of shipping it anywhere.
pub struct LoggingStatSink;

#[async_trait]
impl StatSink for LoggingStatSink {
    async fn publish(&self, record: StatRecord) -> Result<(), SinkError> {
        tracing::debug!(
            symbol = %record.symbol,
            close = %record.close_price,
            change_percent = %record.change_percent,
            "stat record ready for persistence"
        );
        Ok(())
    }
}

/// Drains the stat channel into the sink until cancelled.
pub struct StatForwarder {
    stat_rx: mpsc::Receiver<StatRecord>,
    sink: Arc<dyn StatSink>,
    cancel: CancellationToken,
}

impl StatForwarder {
    pub fn new(
        stat_rx: mpsc::Receiver<StatRecord>,
        sink: Arc<dyn StatSink>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            stat_rx,
            sink,
            cancel,
        }
    }

    pub async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("stat forwarder stopping");
                    return;
                }
                record = self.stat_rx.recv() => {
                    let Some(record) = record else {
                        tracing::warn!("stat channel closed, forwarder stopping");
                        return;
                    };
                    if let Err(e) = self.sink.publish(record).await {
                        tracing::error!(error = %e, "failed to hand record to sink");
                    }
                }
            }
        }
    }
}
