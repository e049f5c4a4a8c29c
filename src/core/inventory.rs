// src/core/inventory.rs

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::core::models::{BusinessContext, IdentifierType, null_as_default};

const TIME_QUERY_PARAM: &str = "time";
const USER_AGENT: &str = concat!("nexpose-asset-attributor/", env!("CARGO_PKG_VERSION"));

/// Typed result of a single inventory lookup. Consumed straight away by the
/// attribution engine and never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Found(BusinessContext),
    NotFound,
    /// The inventory matched more than one asset; carries every returned ARN.
    MultipleFound(Vec<String>),
    BadRequest(String),
    ServerError { status: u16, reason: String },
    TransportError(String),
}

/// Looks up the business context of one asset by a single identifier.
#[async_trait]
pub trait AssetLookup: Send + Sync {
    async fn lookup(&self, identifier: IdentifierType, value: &str, scan_time: DateTime<Utc>) -> LookupOutcome;
}

#[derive(Debug, thiserror::Error)]
pub enum InventoryClientError {
    #[error("inventory endpoint {0} cannot be used as a base URL")]
    InvalidEndpoint(Url),
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Debug, Deserialize)]
struct InventoryResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    response: Vec<BusinessContext>,
}

/// HTTP client for the asset inventory's cloud asset API.
#[derive(Debug, Clone)]
pub struct InventoryClient {
    client: reqwest::Client,
    endpoint: Url,
}

impl InventoryClient {
    /// Builds a client rooted at `endpoint`.
    ///
    /// # Arguments
    /// * `endpoint` - Base URL of the cloud asset API, e.g. `https://inventory/v1/cloud`.
    /// * `timeout` - Upper bound on each lookup, connect and body read included.
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, InventoryClientError> {
        if endpoint.cannot_be_a_base() {
            return Err(InventoryClientError::InvalidEndpoint(endpoint));
        }
        let client = reqwest::Client::builder().user_agent(USER_AGENT).timeout(timeout).build()?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// `{endpoint}/{ip|hostname}/{value}?time={scan time}`, with the value
    /// percent-encoded as a single path segment.
    pub fn lookup_url(&self, identifier: IdentifierType, value: &str, scan_time: DateTime<Utc>) -> Url {
        let segment: &'static str = identifier.into();
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(segment).push(value);
        }
        url.query_pairs_mut()
            .append_pair(TIME_QUERY_PARAM, &scan_time.to_rfc3339_opts(SecondsFormat::AutoSi, true));
        url
    }
}

#[async_trait]
impl AssetLookup for InventoryClient {
    async fn lookup(&self, identifier: IdentifierType, value: &str, scan_time: DateTime<Utc>) -> LookupOutcome {
        let url = self.lookup_url(identifier, value, scan_time);
        debug!(%identifier, value, url = %url, "Querying asset inventory.");

        let response = match self.client.get(url).send().await {
            Ok(res) => res,
            Err(e) => {
                warn!(%identifier, value, error = %e, "Asset inventory request failed.");
                return LookupOutcome::TransportError(e.to_string());
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                warn!(%identifier, value, %status, error = %e, "Failed to read asset inventory response body.");
                return LookupOutcome::TransportError(format!("reading response body: {e}"));
            }
        };

        let outcome = classify(status, &body);
        info!(%identifier, value, %status, outcome = outcome_label(&outcome), "Asset inventory lookup finished.");
        outcome
    }
}

/// Maps an inventory HTTP response onto a [`LookupOutcome`].
///
/// 404 is `NotFound`, 400 is `BadRequest`, any other non-200 is `ServerError`.
/// A 200 with no results is indistinguishable from absence and is `NotFound`;
/// more than one result is always `MultipleFound`, there is no tie-break.
pub fn classify(status: StatusCode, body: &str) -> LookupOutcome {
    match status {
        StatusCode::NOT_FOUND => return LookupOutcome::NotFound,
        StatusCode::BAD_REQUEST => return LookupOutcome::BadRequest(body.to_string()),
        StatusCode::OK => {}
        other => {
            return LookupOutcome::ServerError { status: other.as_u16(), reason: body.to_string() };
        }
    }

    let parsed: InventoryResponse = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(e) => {
            return LookupOutcome::ServerError {
                status: status.as_u16(),
                reason: format!("undecodable inventory response: {e}"),
            };
        }
    };

    let mut assets = parsed.response;
    match assets.len() {
        0 => LookupOutcome::NotFound,
        1 => LookupOutcome::Found(assets.remove(0)),
        _ => LookupOutcome::MultipleFound(assets.into_iter().map(|a| a.arn).collect()),
    }
}

fn outcome_label(outcome: &LookupOutcome) -> &'static str {
    match outcome {
        LookupOutcome::Found(_) => "found",
        LookupOutcome::NotFound => "not-found",
        LookupOutcome::MultipleFound(_) => "multiple-found",
        LookupOutcome::BadRequest(_) => "bad-request",
        LookupOutcome::ServerError { .. } => "server-error",
        LookupOutcome::TransportError(_) => "transport-error",
    }
}
