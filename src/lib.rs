//! `codemetal-chemflow` library interface.
//!
//! Exposes the enrichment pipeline to the binary in `main.rs` and to the
//! integration tests. The pipeline turns raw chemical-formula records
//! (CAS number + unnormalized concentration) into an augmented,
//! concentration-normalized formula where each component carries chemical
//! descriptors looked up from the PubChem compound database.
//!
//! Module map (EMBP: each module owns one boundary, `routes` is the HTTP
//! gateway):
//! - [`normalize`] — concentration parsing/validation and rescaling to 100
//! - [`pubchem`] — external database client, retry policy, payload types
//! - [`cache`] — process-wide lookup cache with single-flight coordination
//! - [`descriptor`] — SMILES selection and descriptor extraction
//! - [`enrich`] — per-formula orchestration and fan-out
//! - [`usage`] — per-compound lookup counters for `GET /stats`
//! - [`anomaly`] — durable line-oriented anomaly sink
//! - [`routes`] — axum subrouters (`/enrich`, `/stats`, `/health`)

use std::sync::Arc;

pub mod anomaly;
pub mod cache;
pub mod config;
pub mod descriptor;
pub mod enrich;
pub mod error;
pub mod models;
pub mod normalize;
pub mod pubchem;
pub mod routes;
pub mod usage;

pub use config::Config;
pub use enrich::{Enricher, EnrichmentOutcome};
pub use error::LookupError;
pub use models::{
    AnomalyRecord, AnomalyStage, Cid, DescriptorRecord, EnrichedComponent, LookupOutcome,
    RawComponent,
};

use anomaly::AnomalySink;
use usage::UsageTracker;

// ---

/// Application state shared across route handlers.
///
/// All fields are process-wide services created once at startup in `main.rs`
/// and injected here; there are no module-level singletons.
#[derive(Clone)]
pub struct AppState {
    // ---
    pub enricher: Arc<Enricher>,
    pub anomaly_sink: Arc<AnomalySink>,
    pub usage: Arc<UsageTracker>,
}
