//! Application entry point for the `codemetal-chemflow` backend service.
//!
//! This binary orchestrates the full startup sequence for the formula
//! enrichment API, including:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Building the PubChem client with its per-call timeout and retry policy
//! - Creating the process-wide enrichment services (lookup caches, usage
//!   tracker, anomaly sink)
//! - Mounting all API routes via the `routes` gateway (EMBP pattern)
//! - Binding the Axum HTTP server and serving requests
//!
//! # Environment Variables
//! - `PUBCHEM_API_URL` (optional) – compound database base URL
//! - `LOOKUP_TIMEOUT_MS` (optional) – per-call lookup timeout
//! - `LOOKUP_MAX_ATTEMPTS` (optional) – attempts before giving up
//! - `LOOKUP_BACKOFF_BASE_MS` (optional) – initial retry backoff
//! - `COMPONENT_DEADLINE_MS` (optional) – per-component lookup deadline
//! - `ANOMALY_LOG_PATH` (optional) – anomaly sink file (unset: disabled)
//! - `CHEMFLOW_LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `CHEMFLOW_SPAN_EVENTS` (optional) – span event mode for tracing
//!
//! This module follows the Explicit Module Boundary Pattern (EMBP) by
//! delegating configuration parsing to `config`, pipeline construction to
//! the library crate, and route registration to `routes`.
use std::{env, io::IsTerminal, net::SocketAddr, path::Path, sync::Arc};

use axum::Router;
use dotenvy::dotenv;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use anyhow::Result;

use codemetal_chemflow::anomaly::AnomalySink;
use codemetal_chemflow::pubchem::PubChemClient;
use codemetal_chemflow::usage::UsageTracker;
use codemetal_chemflow::{config, routes, AppState, Enricher};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    init_tracing();
    dotenv().ok();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let client = PubChemClient::new(
        &cfg.pubchem_api_url,
        cfg.lookup_timeout(),
        cfg.retry_policy(),
    )
    .map_err(|e| anyhow::anyhow!("Failed to build PubChem client: {}", e))?;

    let usage = Arc::new(UsageTracker::new());
    let enricher = Arc::new(Enricher::new(
        Arc::new(client),
        Arc::clone(&usage),
        cfg.component_deadline(),
    ));

    let anomaly_sink = Arc::new(match cfg.anomaly_log_path.as_deref() {
        Some(path) => {
            tracing::info!("Appending anomaly records to {}", path);
            AnomalySink::open(Path::new(path))?
        }
        None => AnomalySink::disabled(),
    });

    // Build app from routes gateway (EMBP)
    let app: Router = routes::router(AppState {
        enricher,
        anomaly_sink,
        usage,
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], 8080));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ---

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by the `CHEMFLOW_SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level controlled by the `CHEMFLOW_LOG_LEVEL` env var
///
/// This should be called once at application startup before any logging
/// or tracing macros are invoked. It installs the subscriber globally
/// for the lifetime of the process.
fn init_tracing() {
    // ---
    let span_events = match env::var("CHEMFLOW_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    // Determine if we should use colors
    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    // Use RUST_LOG if available, otherwise fall back to CHEMFLOW_LOG_LEVEL
    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("CHEMFLOW_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "debug",
        };
        EnvFilter::new(format!("{level},hyper_util=warn"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
