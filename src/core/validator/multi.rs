// src/core/validator/multi.rs

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::{AssetValidator, ValidationOutcome};
use crate::core::error::{ValidationEntry, ValidationError, ValidationKind};
use crate::core::models::AttributedRecord;

/// Runs every configured validator against a record concurrently and reduces
/// their outcomes to a single result.
#[derive(Clone, Default)]
pub struct MultiValidator {
    validators: Vec<Arc<dyn AssetValidator>>,
    timeout: Option<Duration>,
}

impl MultiValidator {
    pub fn new(validators: Vec<Arc<dyn AssetValidator>>) -> Self {
        Self { validators, timeout: None }
    }

    /// Bounds each validator; one that overruns counts as an error.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Validates `record` with every validator and waits for all of them;
    /// nothing short-circuits, so every failure reason is observed.
    ///
    /// # Returns
    /// `Ok(())` when all validators pass, `ValidationError::Failure` when at least
    /// one failed (errors seen alongside are kept in its entries), otherwise
    /// `ValidationError::Error`.
    pub async fn validate(&self, record: &AttributedRecord) -> Result<(), ValidationError> {
        let asset_id = record.asset_id();
        debug!(asset_id, validators = self.validators.len(), "Starting validation.");

        let outcomes = self.fan_out(Arc::new(record.clone())).await;
        let result = aggregate(asset_id, outcomes);

        match &result {
            Ok(()) => info!(asset_id, "Validation passed."),
            Err(e) => info!(asset_id, kind = %e.kind(), entries = e.entries().len(), "Validation did not pass."),
        }
        result
    }

    async fn fan_out(&self, record: Arc<AttributedRecord>) -> Vec<(usize, String, ValidationOutcome)> {
        let mut tasks = JoinSet::new();
        let mut pending = HashMap::with_capacity(self.validators.len());

        for (idx, validator) in self.validators.iter().enumerate() {
            let validator = Arc::clone(validator);
            let record = Arc::clone(&record);
            let timeout = self.timeout;
            let name = validator.name().to_string();
            let handle = tasks.spawn(async move {
                let outcome = match timeout {
                    Some(limit) => tokio::time::timeout(limit, validator.validate(&record))
                        .await
                        .unwrap_or_else(|_| {
                            ValidationOutcome::Error(format!("timed out after {}", humantime::format_duration(limit)))
                        }),
                    None => validator.validate(&record).await,
                };
                (idx, outcome)
            });
            pending.insert(handle.id(), (idx, name));
        }

        let mut outcomes = Vec::with_capacity(pending.len());
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((id, (idx, outcome))) => {
                    if let Some((_, name)) = pending.remove(&id) {
                        debug!(validator = %name, ?outcome, "Validator completed.");
                        outcomes.push((idx, name, outcome));
                    }
                }
                Err(e) => {
                    if let Some((idx, name)) = pending.remove(&e.id()) {
                        warn!(validator = %name, error = %e, "Validator task did not complete.");
                        outcomes.push((idx, name, ValidationOutcome::Error(format!("validator task failed: {e}"))));
                    }
                }
            }
        }
        outcomes
    }
}

/// Folds per-validator outcomes into the aggregate result. Failures dominate
/// errors: once any validator reports the asset invalid, the whole result is a
/// failure.
pub fn aggregate(asset_id: i64, mut outcomes: Vec<(usize, String, ValidationOutcome)>) -> Result<(), ValidationError> {
    outcomes.sort_by_key(|(idx, _, _)| *idx);

    let entries: Vec<ValidationEntry> = outcomes
        .into_iter()
        .filter_map(|(_, validator, outcome)| match outcome {
            ValidationOutcome::Pass => None,
            ValidationOutcome::Fail(message) => Some(ValidationEntry { validator, kind: ValidationKind::Failure, message }),
            ValidationOutcome::Error(message) => Some(ValidationEntry { validator, kind: ValidationKind::Error, message }),
        })
        .collect();

    if entries.is_empty() {
        Ok(())
    } else if entries.iter().any(|e| e.kind == ValidationKind::Failure) {
        Err(ValidationError::Failure { asset_id, entries })
    } else {
        Err(ValidationError::Error { asset_id, entries })
    }
}
