// src/core/validator/noop.rs

// Stand-in validators. The real checks vary between operators; these keep the
// pipeline wired end to end and exercise each aggregate path.

use async_trait::async_trait;

use super::{AssetValidator, ValidationOutcome};
use crate::core::models::AttributedRecord;

/// Always passes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopValidator;

#[async_trait]
impl AssetValidator for NoopValidator {
    fn name(&self) -> &str {
        "noop"
    }

    async fn validate(&self, _record: &AttributedRecord) -> ValidationOutcome {
        ValidationOutcome::Pass
    }
}

/// Always reports that it could not validate.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysErrorValidator;

#[async_trait]
impl AssetValidator for AlwaysErrorValidator {
    fn name(&self) -> &str {
        "always-error"
    }

    async fn validate(&self, _record: &AttributedRecord) -> ValidationOutcome {
        ValidationOutcome::Error("this will always throw an error".to_string())
    }
}

/// Always rejects the asset.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysFailValidator;

#[async_trait]
impl AssetValidator for AlwaysFailValidator {
    fn name(&self) -> &str {
        "always-fail"
    }

    async fn validate(&self, record: &AttributedRecord) -> ValidationOutcome {
        ValidationOutcome::Fail(format!("asset {} rejected", record.asset_id()))
    }
}
