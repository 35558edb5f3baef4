// src/routes/stats.rs
//! Compound usage statistics endpoint.
//!
//! `GET /stats` is a read-only view into the usage tracker: one entry per
//! CAS number ever looked up by this process, with its lookup count and the
//! outcome of the most recent lookup. Counters reset on process restart.

use axum::{extract::State, routing::get, Json, Router};

use crate::usage::UsageStat;
use crate::AppState;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/stats", get(handler))
}

async fn handler(State(state): State<AppState>) -> Json<Vec<UsageStat>> {
    // ---
    Json(state.usage.snapshot())
}
