// src/core/error.rs

use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;
use strum::{Display, IntoStaticStr};

use crate::core::models::IdentifierType;

/// Identifier of the inventory system reported in every attribution error.
pub const ASSET_INVENTORY_API: &str = "asset-inventory-api";

// --- Attribution Errors ---

/// The asset, scan time and inventory system an attribution error refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributionContext {
    pub asset_id: i64,
    pub scan_time: DateTime<Utc>,
    pub inventory: String,
}

impl AttributionContext {
    pub fn new(asset_id: i64, scan_time: DateTime<Utc>) -> Self {
        Self { asset_id, scan_time, inventory: ASSET_INVENTORY_API.to_string() }
    }
}

impl fmt::Display for AttributionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "asset {} as of scan time {} in asset inventory {}",
            self.asset_id,
            self.scan_time.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            self.inventory
        )
    }
}

/// Why a single, non-fatal lookup came back empty-handed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupFailureKind {
    NotFound,
    ServerError { status: u16, reason: String },
    Transport(String),
}

impl fmt::Display for LookupFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::ServerError { status, reason } => write!(f, "inventory returned {status}: {reason}"),
            Self::Transport(cause) => write!(f, "transport error: {cause}"),
        }
    }
}

/// A non-fatal lookup result folded into [`AttributionError::AssetNotFound`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupFailure {
    pub identifier: IdentifierType,
    pub value: String,
    pub kind: LookupFailureKind,
}

impl fmt::Display for LookupFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.identifier, self.value, self.kind)
    }
}

/// Every way attribution of a single scan record can fail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttributionError {
    #[error("asset {asset_id} has no IP or hostname")]
    NoIdentifier { asset_id: i64 },

    #[error("asset {asset_id} has no valid scan timestamp")]
    InvalidTimestamp { asset_id: i64 },

    #[error(
        "request to asset inventory returned multiple values for {identifier} {value} of {context}: [{}]",
        .found.join(", ")
    )]
    MultipleAssetsFound {
        context: AttributionContext,
        identifier: IdentifierType,
        value: String,
        found: Vec<String>,
    },

    #[error("request to asset inventory failed for {identifier} {value} of {context}: {reason}")]
    Request {
        context: AttributionContext,
        identifier: IdentifierType,
        value: String,
        reason: String,
    },

    #[error("result not found for {context}: [{}]", join_causes(.causes))]
    AssetNotFound {
        context: AttributionContext,
        causes: Vec<LookupFailure>,
    },
}

/// Fieldless tag of an [`AttributionError`], used for log reasons and routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum AttributionErrorKind {
    NoIdentifier,
    InvalidTimestamp,
    MultipleAssetsFound,
    #[strum(serialize = "asset-inventory-request-failed")]
    Request,
    AssetNotFound,
}

impl AttributionError {
    pub fn kind(&self) -> AttributionErrorKind {
        match self {
            Self::NoIdentifier { .. } => AttributionErrorKind::NoIdentifier,
            Self::InvalidTimestamp { .. } => AttributionErrorKind::InvalidTimestamp,
            Self::MultipleAssetsFound { .. } => AttributionErrorKind::MultipleAssetsFound,
            Self::Request { .. } => AttributionErrorKind::Request,
            Self::AssetNotFound { .. } => AttributionErrorKind::AssetNotFound,
        }
    }

    pub fn asset_id(&self) -> i64 {
        match self {
            Self::NoIdentifier { asset_id } | Self::InvalidTimestamp { asset_id } => *asset_id,
            Self::MultipleAssetsFound { context, .. }
            | Self::Request { context, .. }
            | Self::AssetNotFound { context, .. } => context.asset_id,
        }
    }
}

fn join_causes(causes: &[LookupFailure]) -> String {
    causes.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

// --- Validation Errors ---

/// Distinguishes an invalid asset from a validator that could not do its job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum ValidationKind {
    #[strum(serialize = "validation-failure")]
    Failure,
    #[strum(serialize = "validation-error")]
    Error,
}

/// The non-passing result of one validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationEntry {
    pub validator: String,
    pub kind: ValidationKind,
    pub message: String,
}

impl fmt::Display for ValidationEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.validator, self.kind, self.message)
    }
}

/// Aggregate result of running every validator against an attributed record.
///
/// `Failure` is reported whenever at least one entry is a failure; its entry list
/// still carries any validator errors observed alongside.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("validation failed for asset {asset_id}: [{}]", join_entries(.entries))]
    Failure { asset_id: i64, entries: Vec<ValidationEntry> },

    #[error("error occurred during validation for asset {asset_id}: [{}]", join_entries(.entries))]
    Error { asset_id: i64, entries: Vec<ValidationEntry> },
}

impl ValidationError {
    pub fn kind(&self) -> ValidationKind {
        match self {
            Self::Failure { .. } => ValidationKind::Failure,
            Self::Error { .. } => ValidationKind::Error,
        }
    }

    pub fn asset_id(&self) -> i64 {
        match self {
            Self::Failure { asset_id, .. } | Self::Error { asset_id, .. } => *asset_id,
        }
    }

    pub fn entries(&self) -> &[ValidationEntry] {
        match self {
            Self::Failure { entries, .. } | Self::Error { entries, .. } => entries,
        }
    }

    /// Entries of the given kind only.
    pub fn entries_of(&self, kind: ValidationKind) -> impl Iterator<Item = &ValidationEntry> {
        self.entries().iter().filter(move |e| e.kind == kind)
    }
}

fn join_entries(entries: &[ValidationEntry]) -> String {
    entries.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}
