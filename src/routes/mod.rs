use axum::Router;

use crate::AppState;

mod enrich;
mod health;
mod stats;

// ---

pub fn router(state: AppState) -> Router {
    // ---
    Router::new()
        .merge(enrich::router())
        .merge(stats::router())
        .merge(health::router())
        .with_state(state)
}
