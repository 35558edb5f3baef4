// src/routes/enrich.rs
//! Formula enrichment endpoint.
//!
//! `POST /enrich` accepts a JSON array of `{cas, conc}` objects and returns
//! the concentration-normalized, descriptor-enriched formula. Data-quality
//! problems (unresolvable CAS, missing descriptors, unusable concentrations)
//! never fail the request; they surface as anomaly records appended to the
//! durable sink. Only malformed top-level input — not a JSON array, or an
//! element missing its `cas` field — is rejected, by the `Json` extractor,
//! before the pipeline runs.

use axum::{
    extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router,
};
use tracing::{debug, info, warn};

use crate::models::RawComponent;
use crate::AppState;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/enrich", post(handler))
}

async fn handler(
    State(state): State<AppState>,
    Json(formula): Json<Vec<RawComponent>>,
) -> impl IntoResponse {
    // ---
    info!("POST /enrich - Starting pipeline for {} component(s)", formula.len());

    let outcome = state.enricher.enrich(&formula).await;

    if !outcome.anomalies.is_empty() {
        warn!(
            "POST /enrich - {} anomaly(ies) recorded for this formula",
            outcome.anomalies.len()
        );
        state.anomaly_sink.append(&outcome.anomalies);
    }

    debug!(
        "POST /enrich - Returning {} enriched component(s)",
        outcome.components.len()
    );
    (StatusCode::OK, Json(outcome.components)).into_response()
}
