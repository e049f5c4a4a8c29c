// src/core/models.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use strum::{Display, IntoStaticStr};

/// Deserializes an explicit JSON `null` as the type's default. Upstream
/// services emit `null` for empty collections; `#[serde(default)]` alone only
/// covers absent keys.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

// --- Scan Input Models ---

/// The key used to query the asset inventory for an asset.
///
/// The string form doubles as the inventory URL path segment (`ip` / `hostname`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[derive(Display, IntoStaticStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum IdentifierType {
    Ip,
    Hostname,
}

// A single port/protocol observation backing a vulnerability finding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssessmentResult {
    pub port: u16,
    pub protocol: String,
    pub proof: String,
}

// One vulnerability finding reported by the scanner for an asset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Vulnerability {
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub results: Vec<AssessmentResult>,
    pub status: String,
    #[serde(rename = "cvssV2Score")]
    pub cvss_v2_score: f64,
    #[serde(rename = "cvssV2Severity")]
    pub cvss_v2_severity: String,
    pub description: String,
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub solutions: Vec<String>,
}

/// One asset as seen by the vulnerability scanner at scan time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScanRecord {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    pub scan_time: Option<DateTime<Utc>>,
    #[serde(rename = "assetVulnerabilityDetails", deserialize_with = "null_as_default")]
    pub vulnerabilities: Vec<Vulnerability>,
}

impl ScanRecord {
    /// Returns the identifiers usable for an inventory lookup, IP first.
    /// Blank values count as absent.
    pub fn identifiers(&self) -> Vec<(IdentifierType, String)> {
        let mut ids = Vec::with_capacity(2);
        if let Some(ip) = non_blank(&self.ip) {
            ids.push((IdentifierType::Ip, ip.to_string()));
        }
        if let Some(hostname) = non_blank(&self.hostname) {
            ids.push((IdentifierType::Hostname, hostname.to_string()));
        }
        ids
    }

    /// The scan timestamp, or `None` when it is missing or a zero value.
    ///
    /// Exactly the Unix epoch, and anything at or before `0001-01-01T00:00:00Z`
    /// (the zero time emitted by some upstream producers), are treated as unset.
    pub fn valid_scan_time(&self) -> Option<DateTime<Utc>> {
        let zero_time = DateTime::from_timestamp(ZERO_TIME_SECS, 0)?;
        self.scan_time
            .filter(|ts| *ts != DateTime::<Utc>::UNIX_EPOCH && *ts > zero_time)
    }
}

// Seconds between the Unix epoch and 0001-01-01T00:00:00Z.
const ZERO_TIME_SECS: i64 = -62_135_596_800;

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

// --- Business Context Models ---

/// Cloud metadata describing an asset at a point in time, as reported by the
/// asset inventory. Always taken whole from a single lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BusinessContext {
    #[serde(alias = "privateIPAddresses", alias = "PrivateIPAddresses", deserialize_with = "null_as_default")]
    pub private_ip_addresses: BTreeSet<String>,
    #[serde(alias = "publicIPAddresses", alias = "PublicIPAddresses", deserialize_with = "null_as_default")]
    pub public_ip_addresses: BTreeSet<String>,
    #[serde(alias = "Hostnames", deserialize_with = "null_as_default")]
    pub hostnames: BTreeSet<String>,
    #[serde(alias = "ResourceType")]
    pub resource_type: String,
    #[serde(alias = "accountID", alias = "AccountID")]
    pub account_id: String,
    #[serde(alias = "Region")]
    pub region: String,
    #[serde(alias = "ARN", alias = "resourceID", alias = "ResourceID")]
    pub arn: String,
    #[serde(alias = "Tags", deserialize_with = "null_as_default")]
    pub tags: BTreeMap<String, String>,
}

/// A scan record enriched with the business context of the asset at scan time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributedRecord {
    #[serde(flatten)]
    pub record: ScanRecord,
    pub business_context: BusinessContext,
}

impl AttributedRecord {
    pub fn new(record: ScanRecord, business_context: BusinessContext) -> Self {
        Self { record, business_context }
    }

    /// Wraps a record that could not be attributed, so failure handlers receive
    /// the same shape either way.
    pub fn unattributed(record: ScanRecord) -> Self {
        Self::new(record, BusinessContext::default())
    }

    pub fn asset_id(&self) -> i64 {
        self.record.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn scan_record_deserializes_full_payload() {
        let json = r#"{
            "id": 1,
            "ip": "9.8.7.6",
            "hostname": "bowser",
            "scanTime": "2019-09-24T23:10:25.19942Z",
            "assetVulnerabilityDetails": [{
                "id": "a",
                "results": [{"port": 3, "protocol": "udp", "proof": "I said it"}],
                "status": "done",
                "cvssV2Score": 4.2,
                "cvssV2Severity": "low",
                "description": "it's bad",
                "title": "title here",
                "solutions": ["solution"]
            }]
        }"#;

        let record: ScanRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, 1);
        assert_eq!(record.ip.as_deref(), Some("9.8.7.6"));
        assert_eq!(record.hostname.as_deref(), Some("bowser"));
        assert_eq!(record.vulnerabilities.len(), 1);
        assert_eq!(record.vulnerabilities[0].results[0].port, 3);
        assert_eq!(record.vulnerabilities[0].cvss_v2_severity, "low");
        assert!(record.valid_scan_time().is_some());
    }

    #[test]
    fn empty_payload_serializes_without_nulls_in_collections() {
        let record: ScanRecord = serde_json::from_str(r#"{"id": 1, "hostname": "bowser"}"#).unwrap();
        let attributed = AttributedRecord::unattributed(record);
        let out = serde_json::to_value(&attributed).unwrap();

        assert_eq!(out["assetVulnerabilityDetails"], serde_json::json!([]));
        assert_eq!(out["businessContext"]["privateIpAddresses"], serde_json::json!([]));
        assert_eq!(out["businessContext"]["tags"], serde_json::json!({}));
        assert_eq!(out["id"], 1);
    }

    #[test]
    fn business_context_accepts_legacy_field_casing() {
        let json = r#"{
            "privateIPAddresses": ["10.0.0.1"],
            "publicIPAddresses": ["1.2.3.4"],
            "hostnames": ["host"],
            "resourceType": "ec2",
            "accountID": "1234567890",
            "region": "us-west-2",
            "ARN": "arn:1",
            "tags": {"key": "value"}
        }"#;

        let ctx: BusinessContext = serde_json::from_str(json).unwrap();
        assert_eq!(ctx.arn, "arn:1");
        assert_eq!(ctx.account_id, "1234567890");
        assert!(ctx.private_ip_addresses.contains("10.0.0.1"));
        assert_eq!(ctx.tags.get("key").map(String::as_str), Some("value"));
    }

    #[test]
    fn identifiers_skip_blank_values_and_keep_ip_first() {
        let record = ScanRecord {
            ip: Some("1.2.3.4".into()),
            hostname: Some("host".into()),
            ..Default::default()
        };
        assert_eq!(
            record.identifiers(),
            vec![(IdentifierType::Ip, "1.2.3.4".to_string()), (IdentifierType::Hostname, "host".to_string())]
        );

        let blank = ScanRecord { ip: Some("  ".into()), hostname: None, ..Default::default() };
        assert!(blank.identifiers().is_empty());
    }

    #[test]
    fn zero_timestamps_are_not_valid() {
        let epoch = ScanRecord { scan_time: Some(Utc.timestamp_opt(0, 0).unwrap()), ..Default::default() };
        let go_zero = ScanRecord {
            scan_time: Some(Utc.with_ymd_and_hms(1, 1, 1, 0, 0, 0).unwrap()),
            ..Default::default()
        };
        let unset = ScanRecord::default();
        let real = ScanRecord {
            scan_time: Some(Utc.with_ymd_and_hms(2019, 4, 22, 15, 2, 44).unwrap()),
            ..Default::default()
        };

        assert!(epoch.valid_scan_time().is_none());
        assert!(go_zero.valid_scan_time().is_none());
        assert!(unset.valid_scan_time().is_none());
        assert!(real.valid_scan_time().is_some());
    }

    #[test]
    fn instants_just_after_zero_values_are_valid() {
        let after_epoch = ScanRecord { scan_time: Some(Utc.timestamp_opt(0, 500_000_000).unwrap()), ..Default::default() };
        let after_go_zero = ScanRecord {
            scan_time: Some(Utc.timestamp_opt(ZERO_TIME_SECS, 1).unwrap()),
            ..Default::default()
        };

        assert!(after_epoch.valid_scan_time().is_some());
        assert!(after_go_zero.valid_scan_time().is_some());
    }

    #[test]
    fn null_collections_deserialize_as_empty() {
        let json = r#"{
            "id": 4,
            "ip": "10.0.0.1",
            "assetVulnerabilityDetails": null
        }"#;
        let record: ScanRecord = serde_json::from_str(json).unwrap();
        assert!(record.vulnerabilities.is_empty());

        let vuln: Vulnerability = serde_json::from_str(r#"{"id": "a", "results": null, "solutions": null}"#).unwrap();
        assert!(vuln.results.is_empty());
        assert!(vuln.solutions.is_empty());

        let ctx: BusinessContext = serde_json::from_str(
            r#"{"privateIpAddresses": ["10.0.0.1"], "publicIpAddresses": null, "hostnames": null, "arn": "arn:1", "tags": null}"#,
        )
        .unwrap();
        assert_eq!(ctx.arn, "arn:1");
        assert!(ctx.public_ip_addresses.is_empty());
        assert!(ctx.hostnames.is_empty());
        assert!(ctx.tags.is_empty());
    }

    #[test]
    fn attributed_record_accepts_null_collections() {
        let json = r#"{"id": 9, "assetVulnerabilityDetails": null, "businessContext": {"tags": null}}"#;
        let record: AttributedRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.asset_id(), 9);
        assert!(record.business_context.tags.is_empty());
    }

    #[test]
    fn identifier_type_renders_as_path_segment() {
        assert_eq!(IdentifierType::Ip.to_string(), "ip");
        assert_eq!(IdentifierType::Hostname.to_string(), "hostname");
    }
}
