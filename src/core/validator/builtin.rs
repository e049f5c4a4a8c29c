// src/core/validator/builtin.rs

use async_trait::async_trait;
use std::collections::BTreeSet;
use tracing::debug;

use super::{AssetValidator, ValidationOutcome};
use crate::core::models::AttributedRecord;

/// Rejects assets whose business context lacks the fields downstream
/// consumers route on: the resource ARN and the owning account.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequiredFieldsValidator;

#[async_trait]
impl AssetValidator for RequiredFieldsValidator {
    fn name(&self) -> &str {
        "required-fields"
    }

    async fn validate(&self, record: &AttributedRecord) -> ValidationOutcome {
        let ctx = &record.business_context;
        let mut missing = Vec::new();
        if ctx.arn.trim().is_empty() {
            missing.push("arn");
        }
        if ctx.account_id.trim().is_empty() {
            missing.push("accountId");
        }

        if missing.is_empty() {
            ValidationOutcome::Pass
        } else {
            debug!(asset_id = record.asset_id(), ?missing, "Business context is missing required fields.");
            ValidationOutcome::Fail(format!("business context is missing {}", missing.join(", ")))
        }
    }
}

/// Rejects assets owned by any cloud account outside the allow-list.
#[derive(Debug, Clone, Default)]
pub struct AccountAllowListValidator {
    allowed: BTreeSet<String>,
}

impl AccountAllowListValidator {
    pub fn new<I, S>(accounts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { allowed: accounts.into_iter().map(Into::into).collect() }
    }
}

#[async_trait]
impl AssetValidator for AccountAllowListValidator {
    fn name(&self) -> &str {
        "account-allow-list"
    }

    async fn validate(&self, record: &AttributedRecord) -> ValidationOutcome {
        if self.allowed.is_empty() {
            return ValidationOutcome::Error("account allow-list is empty".to_string());
        }
        let account = &record.business_context.account_id;
        if self.allowed.contains(account) {
            ValidationOutcome::Pass
        } else {
            ValidationOutcome::Fail(format!("account {account:?} is not allowed"))
        }
    }
}
