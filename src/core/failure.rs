// src/core/failure.rs

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::debug;

use crate::core::error::{AttributionError, ValidationError};
use crate::core::models::AttributedRecord;

/// Why a record did not make it to the producer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineFailure {
    #[error(transparent)]
    Attribution(#[from] AttributionError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl PipelineFailure {
    /// The log reason for this failure, e.g. `asset-not-found` or `validation-error`.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Attribution(e) => e.kind().into(),
            Self::Validation(e) => e.kind().into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FailureHandlerError {
    #[error("failed to encode failed record: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to write failed record: {0}")]
    Io(#[from] std::io::Error),
}

/// Receives every record that failed attribution or validation, before the
/// failure is returned to the caller. An error here is fatal for the record.
#[async_trait]
pub trait AttributionFailureHandler: Send + Sync {
    async fn handle_failure(&self, record: &AttributedRecord, failure: &PipelineFailure) -> Result<(), FailureHandlerError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopFailureHandler;

#[async_trait]
impl AttributionFailureHandler for NoopFailureHandler {
    async fn handle_failure(&self, _record: &AttributedRecord, _failure: &PipelineFailure) -> Result<(), FailureHandlerError> {
        Ok(())
    }
}

#[derive(Serialize)]
struct DeadLetter<'a> {
    reason: &'static str,
    error: String,
    record: &'a AttributedRecord,
}

/// Appends failed records, with the reason they failed, as JSON lines so they
/// can be inspected or replayed later.
pub struct DeadLetterWriter<W> {
    writer: Mutex<W>,
}

impl<W: AsyncWrite + Unpin + Send> DeadLetterWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer: Mutex::new(writer) }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> AttributionFailureHandler for DeadLetterWriter<W> {
    async fn handle_failure(&self, record: &AttributedRecord, failure: &PipelineFailure) -> Result<(), FailureHandlerError> {
        let letter = DeadLetter { reason: failure.reason(), error: failure.to_string(), record };
        let mut line = serde_json::to_string(&letter)?;
        line.push('\n');
        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        debug!(asset_id = record.asset_id(), reason = letter.reason, "Wrote dead letter.");
        Ok(())
    }
}
