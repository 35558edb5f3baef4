//! PubChem PUG REST client.
//!
//! Two read-only lookups against the external compound database:
//! - CAS number → CID list: `GET {base}/compound/name/{cas}/cids/JSON`
//! - CID → property payload: `GET {base}/compound/cid/{cid}/property/{fields}/JSON`
//!
//! The database is a black box whose failure modes are limited to "not
//! found" (`Ok(None)`), "malformed/incomplete payload", and
//! "unreachable/timeout". Transport failures are retried with bounded
//! exponential backoff; [`RetryPolicy`] is a pure function from attempt count
//! to wait duration, so it is unit-testable without network calls.
//!
//! The [`CompoundDatabase`] trait is the seam the orchestrator depends on;
//! tests substitute counting stubs for the real client.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Deserializer};

use crate::error::LookupError;
use crate::models::Cid;

// ---

/// Public PUG REST endpoint; override with `PUBCHEM_API_URL`.
pub const DEFAULT_BASE_URL: &str = "https://pubchem.ncbi.nlm.nih.gov/rest/pug";

const USER_AGENT: &str = concat!("codemetal-chemflow/", env!("CARGO_PKG_VERSION"));

/// Property columns requested per compound. Older PUG servers report
/// `CanonicalSMILES`/`IsomericSMILES`; newer ones answer the same request
/// with `ConnectivitySMILES`/`SMILES` columns, so the payload type accepts
/// all four spellings.
const PROPERTY_FIELDS: &str =
    "CanonicalSMILES,IsomericSMILES,TPSA,MolecularWeight,XLogP,HBondAcceptorCount,Complexity";

// ---

/// Read-only view of the external compound database.
///
/// Implementations report a definitive miss as `Ok(None)` — a cacheable
/// answer — and transport problems as `Err`.
#[async_trait]
pub trait CompoundDatabase: Send + Sync {
    /// Convert a CAS number to the database-native compound ID.
    async fn cas_to_cid(&self, cas: &str) -> Result<Option<Cid>, LookupError>;

    /// Retrieve the raw property payload for a compound.
    async fn properties(&self, cid: Cid) -> Result<Option<PropertyRow>, LookupError>;
}

// ---

/// One row of the PUG property table, fields independently optional.
///
/// `MolecularWeight` (and occasionally other numeric columns) arrives as a
/// JSON string on current PubChem servers, so every float field goes through
/// a lenient deserializer that accepts either shape.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct PropertyRow {
    // ---
    #[serde(rename = "CID", default)]
    pub cid: u64,
    #[serde(rename = "CanonicalSMILES")]
    pub canonical_smiles: Option<String>,
    #[serde(rename = "IsomericSMILES")]
    pub isomeric_smiles: Option<String>,
    #[serde(rename = "SMILES")]
    pub smiles: Option<String>,
    #[serde(rename = "ConnectivitySMILES")]
    pub connectivity_smiles: Option<String>,
    #[serde(rename = "TPSA", default, deserialize_with = "lenient_f64")]
    pub tpsa: Option<f64>,
    #[serde(rename = "MolecularWeight", default, deserialize_with = "lenient_f64")]
    pub molecular_weight: Option<f64>,
    #[serde(rename = "XLogP", default, deserialize_with = "lenient_f64")]
    pub x_log_p: Option<f64>,
    #[serde(rename = "HBondAcceptorCount")]
    pub h_bond_acceptor_count: Option<i64>,
    #[serde(rename = "Complexity", default, deserialize_with = "lenient_f64")]
    pub complexity: Option<f64>,
}

/// Accept a float given as a JSON number or as a numeric string.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    // ---
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}

#[derive(Debug, Deserialize)]
struct CidList {
    #[serde(rename = "CID", default)]
    cid: Vec<u64>,
}

#[derive(Debug, Deserialize)]
struct CidResponse {
    #[serde(rename = "IdentifierList")]
    identifier_list: Option<CidList>,
}

#[derive(Debug, Deserialize)]
struct PropertyTable {
    #[serde(rename = "Properties", default)]
    properties: Vec<PropertyRow>,
}

#[derive(Debug, Deserialize)]
struct PropertyResponse {
    #[serde(rename = "PropertyTable")]
    property_table: Option<PropertyTable>,
}

// ---

/// Bounded exponential backoff: `base * 2^(attempt-1)`, capped, for a fixed
/// number of attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    // ---
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    /// Decide what follows `completed_attempts` failed attempts:
    /// `Some(delay)` to back off and retry, `None` to give up.
    pub fn delay_for(&self, completed_attempts: u32) -> Option<Duration> {
        // ---
        if completed_attempts >= self.max_attempts {
            return None;
        }
        let shift = completed_attempts.saturating_sub(1).min(10);
        let delay_ms = self
            .base_delay_ms
            .saturating_mul(1u64 << shift)
            .min(self.max_delay_ms);
        Some(Duration::from_millis(delay_ms))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2_000,
        }
    }
}

// ---

/// PubChem PUG REST client with per-call timeout and bounded retry.
pub struct PubChemClient {
    // ---
    http: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl PubChemClient {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, LookupError> {
        // ---
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| LookupError::Transient(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry,
        })
    }

    /// Run `op` under the retry policy, sleeping between failed attempts.
    async fn with_retry<T, F, Fut>(
        &self,
        what: &str,
        key: &str,
        mut op: F,
    ) -> Result<T, LookupError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LookupError>>,
    {
        // ---
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::debug!(what, key, attempt, "lookup succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => match self.retry.delay_for(attempt) {
                    Some(delay) => {
                        tracing::warn!(
                            what,
                            key,
                            attempt,
                            error = %err,
                            "transient lookup failure, backing off {:?}",
                            delay
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        tracing::error!(what, key, attempt, error = %err, "retries exhausted");
                        return Err(err);
                    }
                },
            }
        }
    }

    async fn try_cas_to_cid(&self, cas: &str) -> Result<Option<Cid>, LookupError> {
        // ---
        let url = format!("{}/compound/name/{}/cids/JSON", self.base_url, cas);
        tracing::debug!(cas, url = %url, "querying PubChem for CID");

        let response = self.http.get(&url).send().await.map_err(classify)?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(LookupError::Transient(format!(
                "CID lookup for {cas} returned status {status}"
            )));
        }

        let body: CidResponse = response.json().await.map_err(classify)?;
        Ok(body
            .identifier_list
            .and_then(|list| list.cid.into_iter().next())
            .map(Cid))
    }

    async fn try_properties(&self, cid: Cid) -> Result<Option<PropertyRow>, LookupError> {
        // ---
        let url = format!(
            "{}/compound/cid/{}/property/{}/JSON",
            self.base_url, cid, PROPERTY_FIELDS
        );
        tracing::debug!(%cid, url = %url, "querying PubChem for properties");

        let response = self.http.get(&url).send().await.map_err(classify)?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(LookupError::Transient(format!(
                "property lookup for CID {cid} returned status {status}"
            )));
        }

        let body: PropertyResponse = response.json().await.map_err(classify)?;
        Ok(body
            .property_table
            .and_then(|table| table.properties.into_iter().next()))
    }
}

#[async_trait]
impl CompoundDatabase for PubChemClient {
    async fn cas_to_cid(&self, cas: &str) -> Result<Option<Cid>, LookupError> {
        // ---
        self.with_retry("cas_to_cid", cas, || self.try_cas_to_cid(cas))
            .await
    }

    async fn properties(&self, cid: Cid) -> Result<Option<PropertyRow>, LookupError> {
        // ---
        let key = cid.to_string();
        self.with_retry("properties", &key, || self.try_properties(cid))
            .await
    }
}

/// Map a reqwest error onto the lookup taxonomy: body-decode problems are
/// malformed payloads, everything else (connect, timeout, redirect) is
/// transient.
fn classify(err: reqwest::Error) -> LookupError {
    // ---
    if err.is_decode() {
        LookupError::Malformed(err.to_string())
    } else {
        LookupError::Transient(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_retry_policy_backs_off_exponentially() {
        // ---
        let policy = RetryPolicy::default();

        assert_eq!(policy.delay_for(1), Some(Duration::from_millis(100)));
        assert_eq!(policy.delay_for(2), Some(Duration::from_millis(200)));
        assert_eq!(policy.delay_for(3), None, "three attempts, then give up");
    }

    #[test]
    fn test_retry_policy_respects_delay_cap() {
        // ---
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay_ms: 100,
            max_delay_ms: 500,
        };

        assert_eq!(policy.delay_for(1), Some(Duration::from_millis(100)));
        assert_eq!(policy.delay_for(2), Some(Duration::from_millis(200)));
        assert_eq!(policy.delay_for(3), Some(Duration::from_millis(400)));
        assert_eq!(policy.delay_for(4), Some(Duration::from_millis(500)));
        assert_eq!(policy.delay_for(9), Some(Duration::from_millis(500)));
        assert_eq!(policy.delay_for(10), None);
    }

    #[test]
    fn test_cid_response_takes_first_cid() {
        // ---
        let body: CidResponse =
            serde_json::from_str(r#"{"IdentifierList":{"CID":[2519,702]}}"#).unwrap();
        let cid = body
            .identifier_list
            .and_then(|list| list.cid.into_iter().next())
            .map(Cid);
        assert_eq!(cid, Some(Cid(2519)));
    }

    #[test]
    fn test_cid_response_without_matches_is_none() {
        // ---
        let body: CidResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert!(body.identifier_list.is_none());

        let body: CidResponse =
            serde_json::from_str(r#"{"IdentifierList":{"CID":[]}}"#).unwrap();
        let cid = body
            .identifier_list
            .and_then(|list| list.cid.into_iter().next());
        assert!(cid.is_none());
    }

    #[test]
    fn test_property_row_accepts_string_molecular_weight() {
        // ---
        // Current PubChem servers report MolecularWeight as a string.
        let row: PropertyRow = serde_json::from_str(
            r#"{
                "CID": 2519,
                "CanonicalSMILES": "CN1C=NC2=C1C(=O)N(C(=O)N2C)C",
                "TPSA": 58.4,
                "MolecularWeight": "194.19",
                "XLogP": -0.1,
                "HBondAcceptorCount": 6,
                "Complexity": 293
            }"#,
        )
        .unwrap();

        assert_eq!(row.cid, 2519);
        assert_eq!(row.molecular_weight, Some(194.19));
        assert_eq!(row.tpsa, Some(58.4));
        assert_eq!(row.x_log_p, Some(-0.1));
        assert!(row.isomeric_smiles.is_none());
    }

    #[test]
    fn test_property_row_tolerates_missing_fields() {
        // ---
        let row: PropertyRow = serde_json::from_str(r#"{"CID": 712}"#).unwrap();

        assert_eq!(row.cid, 712);
        assert!(row.canonical_smiles.is_none());
        assert!(row.molecular_weight.is_none());
        assert!(row.h_bond_acceptor_count.is_none());
    }

    #[test]
    fn test_client_creation() {
        // ---
        let client = PubChemClient::new(
            DEFAULT_BASE_URL,
            Duration::from_secs(10),
            RetryPolicy::default(),
        );
        assert!(client.is_ok());
    }
}
