//! Enrichment orchestrator.
//!
//! Per incoming formula the orchestrator runs the pipeline:
//! 1. Normalize concentrations once for the whole formula — final
//!    concentrations must be in the response regardless of descriptor
//!    success, so this strictly precedes the merge.
//! 2. Fan out one concurrent lookup chain per surviving component
//!    (resolve → fetch → select), joined with `join_all`. Failures are
//!    isolated per component; one slow or broken compound never aborts its
//!    siblings.
//! 3. Merge descriptors with normalized concentrations, aggregate every
//!    anomaly from the stages above, and update the usage tracker once per
//!    CAS encountered.
//!
//! A component whose CAS cannot be resolved, or whose compound has no
//! payload, still appears in the output with its normalized concentration
//! and all descriptor fields absent. Only an unusable concentration drops a
//! component.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use crate::cache::LookupCache;
use crate::descriptor;
use crate::models::{
    AnomalyRecord, AnomalyStage, Cid, DescriptorRecord, EnrichedComponent, LookupOutcome,
    ParsedComponent, RawComponent, KIND_COMPONENT_TIMEOUT, KIND_FETCH_TRANSIENT,
    KIND_FETCH_UNAVAILABLE, KIND_RESOLUTION_NOT_FOUND, KIND_RESOLUTION_TRANSIENT,
};
use crate::normalize::{self, NormalizedFormula};
use crate::pubchem::{CompoundDatabase, PropertyRow};
use crate::usage::UsageTracker;

// ---

/// Result of enriching one formula.
#[derive(Debug)]
pub struct EnrichmentOutcome {
    // ---
    pub components: Vec<EnrichedComponent>,
    pub anomalies: Vec<AnomalyRecord>,
}

/// Process-wide enrichment service: external database seam, lookup caches,
/// and usage tracking. Created once at startup and injected into the routes.
pub struct Enricher {
    // ---
    db: Arc<dyn CompoundDatabase>,
    cid_cache: LookupCache<Option<Cid>>,
    property_cache: LookupCache<Option<PropertyRow>>,
    usage: Arc<UsageTracker>,
    component_deadline: Duration,
}

impl Enricher {
    pub fn new(
        db: Arc<dyn CompoundDatabase>,
        usage: Arc<UsageTracker>,
        component_deadline: Duration,
    ) -> Self {
        // ---
        Self {
            db,
            cid_cache: LookupCache::new(),
            property_cache: LookupCache::new(),
            usage,
            component_deadline,
        }
    }

    /// The usage counters backing `GET /stats`.
    pub fn usage(&self) -> &UsageTracker {
        &self.usage
    }

    /// Enrich one formula: normalized concentrations plus descriptors per
    /// component, and the full set of data-quality anomalies observed.
    pub async fn enrich(&self, formula: &[RawComponent]) -> EnrichmentOutcome {
        // ---
        // Step 1: establish final concentrations and the dropped list.
        let NormalizedFormula {
            accepted,
            dropped,
            mut anomalies,
        } = normalize::normalize(formula);

        if !dropped.is_empty() {
            tracing::debug!(
                "Dropped {} of {} component(s) during normalization",
                dropped.len(),
                formula.len()
            );
        }

        // Step 2: fan out descriptor lookups, one task per component.
        let results = join_all(
            accepted
                .iter()
                .map(|component| self.enrich_component(component)),
        )
        .await;

        // Step 3: merge, order-independent (components identified by CAS).
        let mut components = Vec::with_capacity(results.len());
        for (component, mut component_anomalies) in results {
            components.push(component);
            anomalies.append(&mut component_anomalies);
        }

        EnrichmentOutcome {
            components,
            anomalies,
        }
    }

    /// Look up one component under the per-component deadline. On expiry the
    /// component returns unresolved rather than blocking the response.
    async fn enrich_component(
        &self,
        parsed: &ParsedComponent,
    ) -> (EnrichedComponent, Vec<AnomalyRecord>) {
        // ---
        let cas = parsed.cas.as_str();

        match tokio::time::timeout(self.component_deadline, self.lookup_descriptors(cas)).await {
            Ok((descriptors, outcome, anomalies)) => {
                self.usage.record(cas, outcome);
                (
                    EnrichedComponent {
                        cas: cas.to_string(),
                        conc: parsed.conc_value,
                        descriptors,
                    },
                    anomalies,
                )
            }
            Err(_) => {
                self.usage.record(cas, LookupOutcome::Miss);
                let anomaly = AnomalyRecord::component(
                    cas,
                    AnomalyStage::Resolution,
                    KIND_COMPONENT_TIMEOUT,
                    format!(
                        "descriptor lookup exceeded {:?}, component returned unresolved",
                        self.component_deadline
                    ),
                );
                (EnrichedComponent::bare(cas, parsed.conc_value), vec![anomaly])
            }
        }
    }

    /// Resolve → fetch → select for one CAS, consulting the caches. Returns
    /// the descriptors, the resolution outcome for usage tracking, and all
    /// anomalies observed on the way.
    async fn lookup_descriptors(
        &self,
        cas: &str,
    ) -> (DescriptorRecord, LookupOutcome, Vec<AnomalyRecord>) {
        // ---
        let mut anomalies = Vec::new();

        // Resolution: CAS → CID. Definitive misses are cached; transient
        // failures are not, so the next request may retry.
        let (cid, outcome) = match self
            .cid_cache
            .get_or_try_compute(cas, || self.db.cas_to_cid(cas))
            .await
        {
            Ok((Some(cid), cached)) => (
                Some(cid),
                if cached {
                    LookupOutcome::Cached
                } else {
                    LookupOutcome::Hit
                },
            ),
            Ok((None, cached)) => {
                anomalies.push(AnomalyRecord::component(
                    cas,
                    AnomalyStage::Resolution,
                    KIND_RESOLUTION_NOT_FOUND,
                    "compound database has no entry for this CAS",
                ));
                (
                    None,
                    if cached {
                        LookupOutcome::Cached
                    } else {
                        LookupOutcome::Miss
                    },
                )
            }
            Err(err) => {
                anomalies.push(AnomalyRecord::component(
                    cas,
                    AnomalyStage::Resolution,
                    KIND_RESOLUTION_TRANSIENT,
                    err.to_string(),
                ));
                (None, LookupOutcome::Miss)
            }
        };

        let Some(cid) = cid else {
            return (DescriptorRecord::default(), outcome, anomalies);
        };

        // Fetch: CID → raw payload → descriptor selection.
        let descriptors = match self
            .property_cache
            .get_or_try_compute(&cid.to_string(), || self.db.properties(cid))
            .await
        {
            Ok((Some(row), _)) => {
                let (record, mut missing) = descriptor::build_record(cas, &row);
                anomalies.append(&mut missing);
                record
            }
            Ok((None, _)) => {
                anomalies.push(AnomalyRecord::component(
                    cas,
                    AnomalyStage::Fetch,
                    KIND_FETCH_UNAVAILABLE,
                    format!("no property payload for CID {cid}"),
                ));
                DescriptorRecord::default()
            }
            Err(err) => {
                anomalies.push(AnomalyRecord::component(
                    cas,
                    AnomalyStage::Fetch,
                    KIND_FETCH_TRANSIENT,
                    err.to_string(),
                ));
                DescriptorRecord::default()
            }
        };

        (descriptors, outcome, anomalies)
    }
}
