//! Configuration loader for the `codemetal-chemflow` backend service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). By consolidating configuration logic here, we
//! avoid scattering `env::var` calls throughout the codebase.

use std::env;
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::pubchem::{self, RetryPolicy};

/// Backoff delays never exceed this cap, regardless of attempt count.
const BACKOFF_CAP_MS: u64 = 2_000;

/// Parse an optional integer environment variable with a default value.
macro_rules! parse_env_int {
    ($var_name:expr, $ty:ty, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// PubChem PUG REST base URL.
    pub pubchem_api_url: String,

    /// Per-call timeout for outbound lookups, in milliseconds.
    pub lookup_timeout_ms: u64,

    /// Attempts per outbound lookup before a transient failure is surfaced.
    pub lookup_max_attempts: u32,

    /// Initial backoff delay between lookup attempts, in milliseconds.
    pub lookup_backoff_base_ms: u64,

    /// Deadline for one component's full resolve→fetch chain, in milliseconds.
    pub component_deadline_ms: u64,

    /// Anomaly sink file (JSON lines, append mode). Unset disables the sink.
    pub anomaly_log_path: Option<String>,
}

/// Load configuration from environment variables with defaults.
///
/// Optional:
/// - `PUBCHEM_API_URL` – compound database base URL (default: public PubChem)
/// - `LOOKUP_TIMEOUT_MS` – per-call lookup timeout (default: 10000)
/// - `LOOKUP_MAX_ATTEMPTS` – attempts before giving up (default: 3)
/// - `LOOKUP_BACKOFF_BASE_MS` – initial retry backoff (default: 100)
/// - `COMPONENT_DEADLINE_MS` – per-component lookup deadline (default: 30000)
/// - `ANOMALY_LOG_PATH` – anomaly sink file (default: sink disabled)
///
/// Returns an error if any variable is present but invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let pubchem_api_url =
        env::var("PUBCHEM_API_URL").unwrap_or_else(|_| pubchem::DEFAULT_BASE_URL.to_string());
    let lookup_timeout_ms = parse_env_int!("LOOKUP_TIMEOUT_MS", u64, 10_000);
    let lookup_max_attempts = parse_env_int!("LOOKUP_MAX_ATTEMPTS", u32, 3);
    let lookup_backoff_base_ms = parse_env_int!("LOOKUP_BACKOFF_BASE_MS", u64, 100);
    let component_deadline_ms = parse_env_int!("COMPONENT_DEADLINE_MS", u64, 30_000);
    let anomaly_log_path = env::var("ANOMALY_LOG_PATH").ok();

    Ok(Config {
        pubchem_api_url,
        lookup_timeout_ms,
        lookup_max_attempts,
        lookup_backoff_base_ms,
        component_deadline_ms,
        anomaly_log_path,
    })
}

impl Config {
    /// Per-call timeout as a [`Duration`].
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    /// Per-component deadline as a [`Duration`].
    pub fn component_deadline(&self) -> Duration {
        Duration::from_millis(self.component_deadline_ms)
    }

    /// Retry policy for the PubChem client, derived from the lookup settings.
    pub fn retry_policy(&self) -> RetryPolicy {
        // ---
        RetryPolicy {
            max_attempts: self.lookup_max_attempts,
            base_delay_ms: self.lookup_backoff_base_ms,
            max_delay_ms: BACKOFF_CAP_MS,
        }
    }

    /// Log the loaded configuration for debugging purposes.
    pub fn log_config(&self) {
        // ---
        tracing::info!("Configuration loaded:");
        tracing::info!("  PUBCHEM_API_URL        : {}", self.pubchem_api_url);
        tracing::info!("  LOOKUP_TIMEOUT_MS      : {}", self.lookup_timeout_ms);
        tracing::info!("  LOOKUP_MAX_ATTEMPTS    : {}", self.lookup_max_attempts);
        tracing::info!("  LOOKUP_BACKOFF_BASE_MS : {}", self.lookup_backoff_base_ms);
        tracing::info!("  COMPONENT_DEADLINE_MS  : {}", self.component_deadline_ms);
        tracing::info!(
            "  ANOMALY_LOG_PATH       : {}",
            self.anomaly_log_path.as_deref().unwrap_or("(disabled)")
        );
    }
}
