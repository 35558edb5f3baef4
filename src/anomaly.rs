//! Durable anomaly sink.
//!
//! Every [`AnomalyRecord`] is appended as one JSON line to a dedicated file,
//! separate from operational tracing output, so post-hoc analysis of
//! data-quality issues does not require scraping free-text logs. Sink
//! failures are logged and never propagate into the response path.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};

use crate::models::AnomalyRecord;

// ---

/// Line-oriented, machine-parseable anomaly log.
pub struct AnomalySink {
    // ---
    file: Option<Mutex<File>>,
}

impl AnomalySink {
    /// Open (or create) the sink file in append mode.
    pub fn open(path: &Path) -> Result<Self> {
        // ---
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open anomaly log '{}'", path.display()))?;

        Ok(Self {
            file: Some(Mutex::new(file)),
        })
    }

    /// A sink without a backing file; records are mirrored to operational
    /// logging instead so none are silently swallowed.
    pub fn disabled() -> Self {
        // ---
        Self { file: None }
    }

    /// Append each record as one JSON line.
    pub fn append(&self, records: &[AnomalyRecord]) {
        // ---
        let Some(file) = &self.file else {
            for record in records {
                tracing::warn!(
                    cas = %record.cas,
                    stage = ?record.stage,
                    kind = record.kind,
                    detail = %record.detail,
                    "enrichment anomaly (sink disabled)"
                );
            }
            return;
        };

        let mut file = file.lock().unwrap_or_else(PoisonError::into_inner);
        for record in records {
            match serde_json::to_string(record) {
                Ok(line) => {
                    if let Err(e) = writeln!(file, "{line}") {
                        tracing::error!("Failed to append anomaly record: {}", e);
                        return;
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to serialize anomaly record: {}", e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::{AnomalyStage, KIND_RESOLUTION_NOT_FOUND, KIND_UNPARSABLE};

    fn sample_records() -> Vec<AnomalyRecord> {
        // ---
        vec![
            AnomalyRecord::component(
                "50-00-0",
                AnomalyStage::Resolution,
                KIND_RESOLUTION_NOT_FOUND,
                "no CID for CAS",
            ),
            AnomalyRecord::component(
                "58-08-2",
                AnomalyStage::Concentration,
                KIND_UNPARSABLE,
                "raw concentration \"abc\" is not a positive finite number",
            ),
        ]
    }

    #[test]
    fn test_append_writes_one_json_line_per_record() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anomalies.jsonl");

        let sink = AnomalySink::open(&path).unwrap();
        sink.append(&sample_records());

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["cas"], "50-00-0");
        assert_eq!(first["stage"], "resolution");
        assert_eq!(first["kind"], "resolution-not-found");
    }

    #[test]
    fn test_append_is_cumulative_across_calls() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anomalies.jsonl");

        let sink = AnomalySink::open(&path).unwrap();
        sink.append(&sample_records());
        sink.append(&sample_records());

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 4);
    }

    #[test]
    fn test_disabled_sink_accepts_records() {
        // ---
        let sink = AnomalySink::disabled();
        sink.append(&sample_records());
    }
}
