// src/core/attributor.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::core::error::{AttributionContext, AttributionError, LookupFailure, LookupFailureKind};
use crate::core::inventory::{AssetLookup, LookupOutcome};
use crate::core::models::{AttributedRecord, BusinessContext, IdentifierType, ScanRecord};

/// Enriches a scan record with the business context of the asset at scan time.
#[async_trait]
pub trait AssetAttributor: Send + Sync {
    async fn attribute(&self, record: ScanRecord) -> Result<AttributedRecord, AttributionError>;
}

/// One finished lookup, tagged with the identifier it was issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupResult {
    pub identifier: IdentifierType,
    pub value: String,
    pub outcome: LookupOutcome,
}

/// Attributes records by looking them up in the asset inventory by IP and by
/// hostname at the same time, then reducing both answers to one.
#[derive(Clone)]
pub struct AttributionEngine {
    lookup: Arc<dyn AssetLookup>,
}

impl AttributionEngine {
    pub fn new(lookup: Arc<dyn AssetLookup>) -> Self {
        Self { lookup }
    }

    /// Runs one lookup per identifier as its own task and waits for all of them.
    ///
    /// Dropping the returned future drops the `JoinSet`, which aborts any
    /// lookups still in flight.
    async fn fan_out(&self, identifiers: Vec<(IdentifierType, String)>, scan_time: DateTime<Utc>) -> Vec<LookupResult> {
        let mut tasks = JoinSet::new();
        let mut pending = HashMap::with_capacity(identifiers.len());

        for (identifier, value) in identifiers {
            let lookup = Arc::clone(&self.lookup);
            let task_value = value.clone();
            let handle = tasks.spawn(async move {
                let outcome = lookup.lookup(identifier, &task_value, scan_time).await;
                LookupResult { identifier, value: task_value, outcome }
            });
            pending.insert(handle.id(), (identifier, value));
        }

        let mut results = Vec::with_capacity(pending.len());
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((id, result)) => {
                    pending.remove(&id);
                    debug!(identifier = %result.identifier, value = %result.value, outcome = ?result.outcome, "Lookup completed.");
                    results.push(result);
                }
                Err(e) => {
                    // A lookup task that panicked or was cancelled still has to be accounted for.
                    if let Some((identifier, value)) = pending.remove(&e.id()) {
                        warn!(%identifier, %value, error = %e, "Lookup task did not complete.");
                        results.push(LookupResult {
                            identifier,
                            value,
                            outcome: LookupOutcome::TransportError(format!("lookup task failed: {e}")),
                        });
                    }
                }
            }
        }
        results
    }
}

#[async_trait]
impl AssetAttributor for AttributionEngine {
    async fn attribute(&self, record: ScanRecord) -> Result<AttributedRecord, AttributionError> {
        let identifiers = record.identifiers();
        if identifiers.is_empty() {
            return Err(AttributionError::NoIdentifier { asset_id: record.id });
        }
        let Some(scan_time) = record.valid_scan_time() else {
            return Err(AttributionError::InvalidTimestamp { asset_id: record.id });
        };

        info!(asset_id = record.id, lookups = identifiers.len(), "Starting attribution.");
        let results = self.fan_out(identifiers, scan_time).await;
        let context = AttributionContext::new(record.id, scan_time);
        let business_context = resolve(context, results)?;

        info!(asset_id = record.id, arn = %business_context.arn, "Attribution finished.");
        Ok(AttributedRecord::new(record, business_context))
    }
}

/// Reduces the collected lookup results to a single business context or error.
///
/// Precedence, highest first:
/// 1. any `MultipleFound` is fatal, even next to a `Found`;
/// 2. any `BadRequest` is fatal;
/// 3. a `Found` wins, the IP lookup's when both succeeded;
/// 4. otherwise every non-fatal failure is folded into `AssetNotFound`.
pub fn resolve(context: AttributionContext, mut results: Vec<LookupResult>) -> Result<BusinessContext, AttributionError> {
    // IP sorts before hostname, so the first match of each kind prefers the IP lookup.
    results.sort_by_key(|r| r.identifier);

    let mut multiple = None;
    let mut bad_request = None;
    let mut found = None;
    let mut causes = Vec::with_capacity(results.len());

    for LookupResult { identifier, value, outcome } in results {
        let kind = match outcome {
            LookupOutcome::MultipleFound(arns) => {
                multiple.get_or_insert((identifier, value, arns));
                continue;
            }
            LookupOutcome::BadRequest(reason) => {
                bad_request.get_or_insert((identifier, value, reason));
                continue;
            }
            LookupOutcome::Found(business_context) => {
                found.get_or_insert(business_context);
                continue;
            }
            LookupOutcome::NotFound => LookupFailureKind::NotFound,
            LookupOutcome::ServerError { status, reason } => LookupFailureKind::ServerError { status, reason },
            LookupOutcome::TransportError(cause) => LookupFailureKind::Transport(cause),
        };
        causes.push(LookupFailure { identifier, value, kind });
    }

    if let Some((identifier, value, found)) = multiple {
        return Err(AttributionError::MultipleAssetsFound { context, identifier, value, found });
    }
    if let Some((identifier, value, reason)) = bad_request {
        return Err(AttributionError::Request { context, identifier, value, reason });
    }
    match found {
        Some(business_context) => Ok(business_context),
        None => Err(AttributionError::AssetNotFound { context, causes }),
    }
}

/// Attributes every record with an empty business context without querying
/// anything. Useful for dry runs of the rest of the pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAttributor;

#[async_trait]
impl AssetAttributor for NoopAttributor {
    async fn attribute(&self, record: ScanRecord) -> Result<AttributedRecord, AttributionError> {
        debug!(asset_id = record.id, "Noop attribution.");
        Ok(AttributedRecord::unattributed(record))
    }
}
