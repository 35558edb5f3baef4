//! Data models for the formula enrichment pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---

/// Anomaly kind labels recorded in the durable sink.
pub const KIND_RESOLUTION_NOT_FOUND: &str = "resolution-not-found";
pub const KIND_RESOLUTION_TRANSIENT: &str = "resolution-transient";
pub const KIND_FETCH_UNAVAILABLE: &str = "fetch-unavailable";
pub const KIND_FETCH_TRANSIENT: &str = "fetch-transient";
pub const KIND_MISSING_FIELD: &str = "missing-field";
pub const KIND_UNPARSABLE: &str = "unparsable-or-nonpositive";
pub const KIND_EMPTY_FORMULA: &str = "empty-formula";
pub const KIND_COMPONENT_TIMEOUT: &str = "component-timeout";

// ---

/// Raw formula component as received from the caller.
///
/// `conc` is untrusted: it may be a number, a numeric string, a malformed
/// string, null, or missing entirely. A missing `cas` field is a request-level
/// deserialization failure, not a data-quality anomaly.
#[derive(Debug, Clone, Deserialize)]
pub struct RawComponent {
    // ---
    pub cas: String,
    #[serde(default)]
    pub conc: Option<serde_json::Value>,
}

/// Component with its concentration parsed and validated.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedComponent {
    // ---
    pub cas: String,
    pub conc_value: f64,
    pub conc_valid: bool,
}

impl ParsedComponent {
    /// A component whose concentration could not be interpreted.
    pub fn dropped(cas: impl Into<String>) -> Self {
        // ---
        ParsedComponent {
            cas: cas.into(),
            conc_value: 0.0,
            conc_valid: false,
        }
    }
}

/// PubChem compound identifier (CID).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cid(pub u64);

impl std::fmt::Display for Cid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// The six descriptors retained per compound.
///
/// Every field is independently optional: the external source reports an
/// unpredictable subset per compound, and absence of one field never blocks
/// the others. Absent fields are omitted from the JSON response.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptorRecord {
    // ---
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smiles: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub polar_surface_area: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub molecular_weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hydrogen_bond_acceptor: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compound_complexity: Option<f64>,
}

/// Enriched output component: normalized concentration plus descriptors.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichedComponent {
    // ---
    pub cas: String,
    pub conc: f64,
    #[serde(flatten)]
    pub descriptors: DescriptorRecord,
}

impl EnrichedComponent {
    /// A component that survived normalization but has no chemical data.
    pub fn bare(cas: impl Into<String>, conc: f64) -> Self {
        // ---
        EnrichedComponent {
            cas: cas.into(),
            conc,
            descriptors: DescriptorRecord::default(),
        }
    }
}

// ---

/// Pipeline stage an anomaly was observed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalyStage {
    Resolution,
    Fetch,
    Descriptor,
    Concentration,
}

/// One data-quality observation.
///
/// Anomalies are returned alongside the enriched formula for merge decisions
/// and appended to the durable line-oriented sink; they are never part of the
/// response payload.
#[derive(Debug, Clone, Serialize)]
pub struct AnomalyRecord {
    // ---
    pub cas: String,
    pub stage: AnomalyStage,
    pub kind: &'static str,
    pub detail: String,
    pub at: DateTime<Utc>,
}

impl AnomalyRecord {
    /// Anomaly attributed to a single component.
    pub fn component(
        cas: impl Into<String>,
        stage: AnomalyStage,
        kind: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        // ---
        AnomalyRecord {
            cas: cas.into(),
            stage,
            kind,
            detail: detail.into(),
            at: Utc::now(),
        }
    }

    /// Anomaly attributed to the formula as a whole (`cas` is `"*"`).
    pub fn formula(kind: &'static str, detail: impl Into<String>) -> Self {
        // ---
        AnomalyRecord {
            cas: "*".to_string(),
            stage: AnomalyStage::Concentration,
            kind,
            detail: detail.into(),
            at: Utc::now(),
        }
    }
}

// ---

/// Outcome of the most recent lookup for a CAS number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LookupOutcome {
    /// Resolved against the external database on this request.
    Hit,
    /// Definitively absent from the external database, or lookup failed.
    Miss,
    /// Served from the in-process cache.
    Cached,
}

/// Per-CAS lookup counter, mutated by every enrichment that touches the CAS.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UsageCounter {
    // ---
    pub lookup_count: u64,
    pub last_outcome: LookupOutcome,
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_enriched_component_omits_absent_descriptors() {
        // ---
        let component = EnrichedComponent::bare("58-08-2", 42.5);
        let json = serde_json::to_value(&component).unwrap();

        assert_eq!(json["cas"], "58-08-2");
        assert_eq!(json["conc"], 42.5);
        assert!(json.get("smiles").is_none());
        assert!(json.get("logP").is_none());
        assert!(json.get("molecularWeight").is_none());
    }

    #[test]
    fn test_enriched_component_camel_case_wire_names() {
        // ---
        let component = EnrichedComponent {
            cas: "58-08-2".to_string(),
            conc: 100.0,
            descriptors: DescriptorRecord {
                smiles: Some("CN1C=NC2=C1C(=O)N(C(=O)N2C)C".to_string()),
                polar_surface_area: Some(58.4),
                molecular_weight: Some(194.19),
                log_p: Some(-0.1),
                hydrogen_bond_acceptor: Some(6),
                compound_complexity: Some(293.0),
            },
        };
        let json = serde_json::to_value(&component).unwrap();

        assert_eq!(json["polarSurfaceArea"], 58.4);
        assert_eq!(json["molecularWeight"], 194.19);
        assert_eq!(json["logP"], -0.1);
        assert_eq!(json["hydrogenBondAcceptor"], 6);
        assert_eq!(json["compoundComplexity"], 293.0);
    }

    #[test]
    fn test_raw_component_accepts_any_conc_shape() {
        // ---
        let with_number: RawComponent =
            serde_json::from_str(r#"{"cas":"A","conc":24.12}"#).unwrap();
        assert_eq!(with_number.conc, Some(serde_json::json!(24.12)));

        let with_string: RawComponent = serde_json::from_str(r#"{"cas":"A","conc":"50"}"#).unwrap();
        assert_eq!(with_string.conc, Some(serde_json::json!("50")));

        let with_null: RawComponent = serde_json::from_str(r#"{"cas":"A","conc":null}"#).unwrap();
        assert_eq!(with_null.conc, Some(serde_json::Value::Null));

        let missing: RawComponent = serde_json::from_str(r#"{"cas":"A"}"#).unwrap();
        assert!(missing.conc.is_none());
    }

    #[test]
    fn test_raw_component_requires_cas() {
        // ---
        let result = serde_json::from_str::<RawComponent>(r#"{"conc":24.12}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_anomaly_record_wire_shape() {
        // ---
        let record = AnomalyRecord::component(
            "50-00-0",
            AnomalyStage::Resolution,
            KIND_RESOLUTION_NOT_FOUND,
            "no CID for CAS",
        );
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["cas"], "50-00-0");
        assert_eq!(json["stage"], "resolution");
        assert_eq!(json["kind"], "resolution-not-found");
        assert!(json["at"].is_string());
    }
}
