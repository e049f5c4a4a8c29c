// src/core/validator/mod.rs

// Validation of attributed records. Which checks apply differs between
// operators, so each check is its own `AssetValidator` and `MultiValidator`
// runs them side by side.

use async_trait::async_trait;

use crate::core::models::AttributedRecord;

pub mod builtin;
pub mod multi;
pub mod noop;

pub use builtin::{AccountAllowListValidator, RequiredFieldsValidator};
pub use multi::MultiValidator;
pub use noop::{AlwaysErrorValidator, AlwaysFailValidator, NoopValidator};

/// Result of a single validator.
///
/// `Fail` means the asset itself is invalid. `Error` means the validator could
/// not reach a verdict, e.g. a dependency it calls was unavailable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Pass,
    Fail(String),
    Error(String),
}

/// One independent check on an attributed record.
#[async_trait]
pub trait AssetValidator: Send + Sync {
    /// Stable name used in aggregated results and logs.
    fn name(&self) -> &str;

    async fn validate(&self, record: &AttributedRecord) -> ValidationOutcome;
}
