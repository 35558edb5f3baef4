//! Per-compound usage tracking for the stats surface.
//!
//! Process-wide counters, reset only on restart. Every enrichment that
//! touches a CAS records exactly one outcome for it; concurrent `record`
//! calls are atomic per key with no lost updates, and no ordering is
//! guaranteed beyond that.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

use crate::models::{LookupOutcome, UsageCounter};

// ---

/// Wire shape for one `GET /stats` entry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStat {
    // ---
    pub cas: String,
    pub lookup_count: u64,
    pub last_outcome: LookupOutcome,
}

/// Thread-safe per-CAS lookup counters.
pub struct UsageTracker {
    // ---
    counters: Mutex<HashMap<String, UsageCounter>>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self {
            counters: Mutex::new(HashMap::new()),
        }
    }

    /// Increment the counter for `cas` and overwrite its last outcome.
    pub fn record(&self, cas: &str, outcome: LookupOutcome) {
        // ---
        let mut counters = self
            .counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let counter = counters.entry(cas.to_string()).or_insert(UsageCounter {
            lookup_count: 0,
            last_outcome: outcome,
        });
        counter.lookup_count += 1;
        counter.last_outcome = outcome;
    }

    /// Point-in-time view of all counters, sorted by CAS for stable output.
    pub fn snapshot(&self) -> Vec<UsageStat> {
        // ---
        let counters = self
            .counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut stats: Vec<UsageStat> = counters
            .iter()
            .map(|(cas, counter)| UsageStat {
                cas: cas.clone(),
                lookup_count: counter.lookup_count,
                last_outcome: counter.last_outcome,
            })
            .collect();
        stats.sort_by(|a, b| a.cas.cmp(&b.cas));
        stats
    }
}

impl Default for UsageTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use std::sync::Arc;
    use tokio::task::JoinSet;

    #[test]
    fn test_record_increments_and_tracks_last_outcome() {
        // ---
        let tracker = UsageTracker::new();

        tracker.record("58-08-2", LookupOutcome::Hit);
        tracker.record("58-08-2", LookupOutcome::Cached);
        tracker.record("50-00-0", LookupOutcome::Miss);

        let stats = tracker.snapshot();
        assert_eq!(stats.len(), 2);

        // Snapshot is sorted by CAS.
        assert_eq!(stats[0].cas, "50-00-0");
        assert_eq!(stats[0].lookup_count, 1);
        assert_eq!(stats[0].last_outcome, LookupOutcome::Miss);

        assert_eq!(stats[1].cas, "58-08-2");
        assert_eq!(stats[1].lookup_count, 2);
        assert_eq!(stats[1].last_outcome, LookupOutcome::Cached);
    }

    #[test]
    fn test_stat_wire_shape() {
        // ---
        let tracker = UsageTracker::new();
        tracker.record("58-08-2", LookupOutcome::Hit);

        let json = serde_json::to_value(tracker.snapshot()).unwrap();
        assert_eq!(json[0]["cas"], "58-08-2");
        assert_eq!(json[0]["lookupCount"], 1);
        assert_eq!(json[0]["lastOutcome"], "hit");
    }

    #[tokio::test]
    async fn test_concurrent_records_lose_no_updates() {
        // ---
        let tracker = Arc::new(UsageTracker::new());
        let mut join_set = JoinSet::new();

        for _ in 0..10 {
            let tracker = Arc::clone(&tracker);
            join_set.spawn(async move {
                for _ in 0..100 {
                    tracker.record("58-08-2", LookupOutcome::Cached);
                }
            });
        }
        while let Some(result) = join_set.join_next().await {
            result.unwrap();
        }

        let stats = tracker.snapshot();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].lookup_count, 1000);
    }
}
