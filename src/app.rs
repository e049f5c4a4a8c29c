// src/app.rs

use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{error, info, warn};

use crate::core::attributor::AssetAttributor;
use crate::core::error::{AttributionError, ValidationError};
use crate::core::failure::{AttributionFailureHandler, FailureHandlerError, PipelineFailure};
use crate::core::models::{AttributedRecord, ScanRecord};
use crate::core::producer::{ProduceError, Producer};
use crate::core::validator::MultiValidator;

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error(transparent)]
    Attribution(AttributionError),
    #[error(transparent)]
    Validation(ValidationError),
    #[error(transparent)]
    Produce(#[from] ProduceError),
    #[error("attribution failure handler failed ({handler}) while handling: {failure}")]
    FailureHandler {
        failure: PipelineFailure,
        handler: FailureHandlerError,
    },
}

impl HandlerError {
    /// Whether the run should stop: the record was neither delivered nor
    /// handed to the failure handler.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Produce(_) | Self::FailureHandler { .. })
    }
}

impl From<PipelineFailure> for HandlerError {
    fn from(failure: PipelineFailure) -> Self {
        match failure {
            PipelineFailure::Attribution(e) => Self::Attribution(e),
            PipelineFailure::Validation(e) => Self::Validation(e),
        }
    }
}

/// Why [`App::pump`] stopped before its input ended.
#[derive(Debug, thiserror::Error)]
pub enum PumpError {
    #[error("failed to read scan records: {0}")]
    Read(#[from] std::io::Error),
    #[error("stopping after fatal error: {0}")]
    Fatal(#[source] HandlerError),
}

/// Sequences one record through attribution, validation and production.
pub struct App {
    attributor: Arc<dyn AssetAttributor>,
    validator: MultiValidator,
    producer: Arc<dyn Producer>,
    failure_handler: Arc<dyn AttributionFailureHandler>,
}

impl App {
    pub fn new(
        attributor: Arc<dyn AssetAttributor>,
        validator: MultiValidator,
        producer: Arc<dyn Producer>,
        failure_handler: Arc<dyn AttributionFailureHandler>,
    ) -> Self {
        Self { attributor, validator, producer, failure_handler }
    }

    /// Attributes, validates and produces `record`.
    ///
    /// On attribution or validation failure the failure handler sees the
    /// record first, then the typed error is returned. Returns the record as
    /// it was produced on success.
    pub async fn handle(&self, record: ScanRecord) -> Result<AttributedRecord, HandlerError> {
        let asset_id = record.id;

        let attributed = match self.attributor.attribute(record.clone()).await {
            Ok(attributed) => attributed,
            Err(e) => {
                error!(event = "attribution-failure", reason = %e.kind(), asset_id, error = %e, "Attribution failed.");
                return Err(self.fail(AttributedRecord::unattributed(record), e.into()).await);
            }
        };

        if let Err(e) = self.validator.validate(&attributed).await {
            warn!(event = %e.kind(), asset_id, error = %e, "Attributed asset did not pass validation.");
            return Err(self.fail(attributed, e.into()).await);
        }

        self.producer.produce(&attributed).await?;
        info!(asset_id, arn = %attributed.business_context.arn, "Attributed asset produced.");
        Ok(attributed)
    }

    /// Handles every JSON line of `input` in order. Blank lines are skipped and
    /// malformed ones are counted and logged.
    ///
    /// `summary` is updated as records are handled, so it stays accurate when
    /// the pump stops early on a read or fatal error.
    pub async fn pump<R>(&self, input: R, summary: &mut RunSummary) -> Result<(), PumpError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let record: ScanRecord = match serde_json::from_str(&line) {
                Ok(record) => record,
                Err(e) => {
                    warn!(error = %e, "Skipping malformed scan record.");
                    summary.record_malformed();
                    continue;
                }
            };

            let result = self.handle(record).await;
            summary.record(&result);
            if let Err(e) = result {
                if e.is_fatal() {
                    return Err(PumpError::Fatal(e));
                }
            }
        }
        Ok(())
    }

    async fn fail(&self, record: AttributedRecord, failure: PipelineFailure) -> HandlerError {
        match self.failure_handler.handle_failure(&record, &failure).await {
            Ok(()) => failure.into(),
            Err(handler) => {
                error!(asset_id = record.asset_id(), reason = failure.reason(), error = %handler, "Attribution failure handler failed.");
                HandlerError::FailureHandler { failure, handler }
            }
        }
    }
}

/// Running tally of processed records, by outcome.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub produced: usize,
    pub malformed: usize,
    pub attribution_failures: usize,
    pub validation_failures: usize,
    pub validation_errors: usize,
    pub fatal: usize,
}

impl RunSummary {
    pub fn record(&mut self, result: &Result<AttributedRecord, HandlerError>) {
        self.processed += 1;
        match result {
            Ok(_) => self.produced += 1,
            Err(HandlerError::Attribution(_)) => self.attribution_failures += 1,
            Err(HandlerError::Validation(ValidationError::Failure { .. })) => self.validation_failures += 1,
            Err(HandlerError::Validation(ValidationError::Error { .. })) => self.validation_errors += 1,
            Err(HandlerError::Produce(_) | HandlerError::FailureHandler { .. }) => self.fatal += 1,
        }
    }

    pub fn record_malformed(&mut self) {
        self.processed += 1;
        self.malformed += 1;
    }

    pub fn log(&self) {
        info!(
            processed = self.processed,
            produced = self.produced,
            malformed = self.malformed,
            attribution_failures = self.attribution_failures,
            validation_failures = self.validation_failures,
            validation_errors = self.validation_errors,
            fatal = self.fatal,
            "Run summary."
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::attributor::NoopAttributor;
    use crate::core::failure::{DeadLetterWriter, NoopFailureHandler};
    use crate::core::producer::{JsonLinesProducer, NoopProducer};
    use crate::core::validator::{AlwaysErrorValidator, AlwaysFailValidator, AssetValidator, NoopValidator};
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn record(id: i64) -> ScanRecord {
        ScanRecord { id, ..Default::default() }
    }

    /// Remembers every failure it is handed.
    #[derive(Default)]
    struct RecordingHandler {
        seen: Mutex<Vec<(i64, &'static str)>>,
    }

    #[async_trait]
    impl AttributionFailureHandler for RecordingHandler {
        async fn handle_failure(&self, record: &AttributedRecord, failure: &PipelineFailure) -> Result<(), FailureHandlerError> {
            self.seen.lock().unwrap().push((record.asset_id(), failure.reason()));
            Ok(())
        }
    }

    struct BrokenHandler;

    #[async_trait]
    impl AttributionFailureHandler for BrokenHandler {
        async fn handle_failure(&self, _record: &AttributedRecord, _failure: &PipelineFailure) -> Result<(), FailureHandlerError> {
            Err(std::io::Error::other("disk full").into())
        }
    }

    struct FailingAttributor;

    #[async_trait]
    impl AssetAttributor for FailingAttributor {
        async fn attribute(&self, record: ScanRecord) -> Result<AttributedRecord, AttributionError> {
            Err(AttributionError::NoIdentifier { asset_id: record.id })
        }
    }

    fn app(
        attributor: Arc<dyn AssetAttributor>,
        validators: Vec<Arc<dyn AssetValidator>>,
        handler: Arc<dyn AttributionFailureHandler>,
    ) -> App {
        App::new(attributor, MultiValidator::new(validators), Arc::new(NoopProducer), handler)
    }

    #[tokio::test]
    async fn successful_record_is_produced() {
        let producer = Arc::new(JsonLinesProducer::new(Vec::new()));
        let app = App::new(
            Arc::new(NoopAttributor),
            MultiValidator::new(vec![Arc::new(NoopValidator)]),
            producer.clone(),
            Arc::new(NoopFailureHandler),
        );

        let produced = app.handle(record(123)).await.unwrap();
        assert_eq!(produced.asset_id(), 123);

        drop(app);
        let out = Arc::try_unwrap(producer).ok().unwrap().into_inner();
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 1);
    }

    #[tokio::test]
    async fn attribution_failure_reaches_handler_then_caller() {
        let handler = Arc::new(RecordingHandler::default());
        let app = app(Arc::new(FailingAttributor), vec![Arc::new(NoopValidator)], handler.clone());

        let err = app.handle(record(7)).await.unwrap_err();
        assert!(matches!(err, HandlerError::Attribution(AttributionError::NoIdentifier { asset_id: 7 })));
        assert!(!err.is_fatal());
        assert_eq!(*handler.seen.lock().unwrap(), vec![(7, "no-identifier")]);
    }

    #[tokio::test]
    async fn validation_failure_reaches_handler_then_caller() {
        let handler = Arc::new(RecordingHandler::default());
        let app = app(
            Arc::new(NoopAttributor),
            vec![Arc::new(AlwaysErrorValidator), Arc::new(AlwaysFailValidator)],
            handler.clone(),
        );

        let err = app.handle(record(8)).await.unwrap_err();
        assert!(matches!(err, HandlerError::Validation(ValidationError::Failure { .. })));
        assert_eq!(*handler.seen.lock().unwrap(), vec![(8, "validation-failure")]);
    }

    #[tokio::test]
    async fn failure_handler_error_is_fatal() {
        let app = app(Arc::new(FailingAttributor), Vec::new(), Arc::new(BrokenHandler));

        let err = app.handle(record(9)).await.unwrap_err();
        assert!(err.is_fatal());
        let HandlerError::FailureHandler { failure, .. } = err else {
            panic!("expected FailureHandler error");
        };
        assert_eq!(failure.reason(), "no-identifier");
    }

    #[tokio::test]
    async fn dead_letters_capture_failed_records() {
        let dead_letters = Arc::new(DeadLetterWriter::new(Vec::new()));
        let app = app(Arc::new(FailingAttributor), Vec::new(), dead_letters.clone());

        let _ = app.handle(record(10)).await;
        drop(app);

        let out = String::from_utf8(Arc::try_unwrap(dead_letters).ok().unwrap().into_inner()).unwrap();
        assert!(out.contains("\"reason\":\"no-identifier\""));
    }

    #[tokio::test]
    async fn pump_skips_blank_and_malformed_lines() {
        let app = app(Arc::new(NoopAttributor), Vec::new(), Arc::new(NoopFailureHandler));
        let input: &[u8] = b"{\"id\": 1}\n\nnot json\n{\"id\": 2}\n";
        let mut summary = RunSummary::default();

        app.pump(input, &mut summary).await.unwrap();
        assert_eq!(summary.processed, 3);
        assert_eq!(summary.produced, 2);
        assert_eq!(summary.malformed, 1);
    }

    #[tokio::test]
    async fn pump_keeps_summary_when_stopping_on_fatal_error() {
        let app = app(Arc::new(FailingAttributor), Vec::new(), Arc::new(BrokenHandler));
        let input: &[u8] = b"oops\n{\"id\": 1}\n{\"id\": 2}\n";
        let mut summary = RunSummary::default();

        let err = app.pump(input, &mut summary).await.unwrap_err();
        assert!(matches!(err, PumpError::Fatal(HandlerError::FailureHandler { .. })));
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.malformed, 1);
        assert_eq!(summary.fatal, 1);
    }

    #[tokio::test]
    async fn summary_counts_by_outcome() {
        let mut summary = RunSummary::default();
        let ok_app = app(Arc::new(NoopAttributor), Vec::new(), Arc::new(NoopFailureHandler));
        let failing_app = app(Arc::new(FailingAttributor), Vec::new(), Arc::new(NoopFailureHandler));
        let error_app = app(Arc::new(NoopAttributor), vec![Arc::new(AlwaysErrorValidator)], Arc::new(NoopFailureHandler));

        summary.record(&ok_app.handle(record(1)).await);
        summary.record(&failing_app.handle(record(2)).await);
        summary.record(&error_app.handle(record(3)).await);
        summary.record_malformed();

        assert_eq!(
            summary,
            RunSummary {
                processed: 4,
                produced: 1,
                malformed: 1,
                attribution_failures: 1,
                validation_failures: 0,
                validation_errors: 1,
                fatal: 0,
            }
        );
    }
}
