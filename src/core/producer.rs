// src/core/producer.rs

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::debug;

use crate::core::models::AttributedRecord;

#[derive(Debug, thiserror::Error)]
pub enum ProduceError {
    #[error("failed to encode attributed record: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to write attributed record: {0}")]
    Io(#[from] std::io::Error),
}

/// Hands attributed records to whatever sits downstream.
#[async_trait]
pub trait Producer: Send + Sync {
    async fn produce(&self, record: &AttributedRecord) -> Result<(), ProduceError>;
}

/// Writes each record as one JSON document per line, flushing after each.
pub struct JsonLinesProducer<W> {
    writer: Mutex<W>,
}

impl<W: AsyncWrite + Unpin + Send> JsonLinesProducer<W> {
    pub fn new(writer: W) -> Self {
        Self { writer: Mutex::new(writer) }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> Producer for JsonLinesProducer<W> {
    async fn produce(&self, record: &AttributedRecord) -> Result<(), ProduceError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        debug!(asset_id = record.asset_id(), bytes = line.len(), "Produced attributed record.");
        Ok(())
    }
}

/// Discards every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProducer;

#[async_trait]
impl Producer for NoopProducer {
    async fn produce(&self, _record: &AttributedRecord) -> Result<(), ProduceError> {
        Ok(())
    }
}
