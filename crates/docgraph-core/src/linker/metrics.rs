use crate::builder::NodeStats;
use crate::error::Result;
use crate::storage::GraphStore;
use crate::types::{ApplicationId, EdgeKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const METRICS_KEY_PREFIX: &str = "linker_metrics:";

/// Counters for one application's builds.
///
/// Per-run counters are reset by [`LinkerMetrics::begin_run`]; `runs` keeps
/// counting across builds and doubles as the fact generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkerMetrics {
    /// Builds completed for this application.
    pub runs: u64,

    pub declarations: u64,
    pub nodes: NodeStats,

    pub facts: u64,
    pub source_failures: u64,
    pub detector_failures: u64,

    /// Raw proposals out of the detectors.
    pub proposals: u64,
    /// Dropped by normalization (unresolved, self-loop, no evidence).
    pub normalized_out: u64,
    /// Proposals folded into another with the same key.
    pub merged: u64,
    pub arbitrated_out: u64,
    pub rejected: u64,
    pub accepted: u64,
    pub warnings: u64,

    /// Edges written by this run / already present.
    pub inserted: u64,
    pub existing: u64,

    pub integration_nodes: u64,
    #[serde(default)]
    pub table_nodes: u64,
    pub library_edges: u64,
    pub library_edge_errors: u64,

    /// Accepted edges per kind.
    pub edges_by_kind: BTreeMap<String, u64>,

    /// Phase name -> wall time in milliseconds.
    pub phase_ms: BTreeMap<String, u64>,

    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl LinkerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset per-run counters and stamp the start time.
    pub fn begin_run(&mut self) {
        let runs = self.runs;
        *self = Self {
            runs,
            started_at: Some(Utc::now()),
            ..Default::default()
        };
    }

    /// Close the run: bump the run counter and stamp the finish time.
    pub fn finish_run(&mut self) {
        self.runs += 1;
        self.finished_at = Some(Utc::now());
    }

    /// Count `count` accepted edges of `kind`.
    pub fn record(&mut self, kind: EdgeKind, count: u64) {
        *self.edges_by_kind.entry(kind.as_str().to_string()).or_insert(0) += count;
    }

    pub fn record_phase(&mut self, phase: &str, duration_ms: u64) {
        *self.phase_ms.entry(phase.to_string()).or_insert(0) += duration_ms;
    }

    pub fn edges_of(&self, kind: EdgeKind) -> u64 {
        self.edges_by_kind.get(kind.as_str()).copied().unwrap_or(0)
    }

    pub fn total_ms(&self) -> u64 {
        self.phase_ms.values().sum()
    }

    /// Get a summary string for logging
    pub fn summary(&self) -> String {
        format!(
            "Run #{}: {} declarations -> nodes {} created, {} updated, {} skipped, {} failed | \
             {} facts, {} proposals, {} normalized out, {} merged, {} arbitrated out, \
             {} rejected, {} accepted ({} new) | {} integration nodes, {} table nodes, {} library edges | \
             {} source / {} detector failures in {}ms",
            self.runs,
            self.declarations,
            self.nodes.created,
            self.nodes.updated,
            self.nodes.skipped,
            self.nodes.failed,
            self.facts,
            self.proposals,
            self.normalized_out,
            self.merged,
            self.arbitrated_out,
            self.rejected,
            self.accepted,
            self.inserted,
            self.integration_nodes,
            self.table_nodes,
            self.library_edges,
            self.source_failures,
            self.detector_failures,
            self.total_ms()
        )
    }

    pub fn metadata_key(app: ApplicationId) -> String {
        format!("{}{}", METRICS_KEY_PREFIX, app)
    }

    /// Last persisted metrics for `app`.
    pub fn load(store: &dyn GraphStore, app: ApplicationId) -> Result<Option<Self>> {
        match store.get_metadata(&Self::metadata_key(app))? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn save(&self, store: &dyn GraphStore, app: ApplicationId) -> Result<()> {
        let bytes = bincode::serialize(self)?;
        store.put_metadata(&Self::metadata_key(app), &bytes)
    }

    pub fn delete(store: &dyn GraphStore, app: ApplicationId) -> Result<()> {
        store.delete_metadata(&Self::metadata_key(app))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use uuid::Uuid;

    #[test]
    fn test_record_accumulates() {
        let mut m = LinkerMetrics::new();
        m.record(EdgeKind::CallsCode, 2);
        m.record(EdgeKind::CallsCode, 3);
        m.record_phase("detect", 4);
        m.record_phase("sink", 6);
        assert_eq!(m.edges_of(EdgeKind::CallsCode), 5);
        assert_eq!(m.edges_of(EdgeKind::Reads), 0);
        assert_eq!(m.total_ms(), 10);
        assert!(m.summary().contains("Run #0"));
    }

    #[test]
    fn test_begin_run_keeps_run_counter() {
        let mut m = LinkerMetrics::new();
        m.accepted = 9;
        m.finish_run();
        m.begin_run();
        assert_eq!(m.runs, 1);
        assert_eq!(m.accepted, 0);
        assert!(m.started_at.is_some());
        assert!(m.finished_at.is_none());
    }

    #[test]
    fn test_persistence_roundtrip_and_delete() {
        let store = MemoryStorage::new();
        let app = Uuid::now_v7();
        assert!(LinkerMetrics::load(&store, app).unwrap().is_none());

        let mut m = LinkerMetrics::new();
        m.begin_run();
        m.record(EdgeKind::Contains, 1);
        m.finish_run();
        m.save(&store, app).unwrap();

        let loaded = LinkerMetrics::load(&store, app).unwrap().unwrap();
        assert_eq!(loaded, m);

        LinkerMetrics::delete(&store, app).unwrap();
        assert!(LinkerMetrics::load(&store, app).unwrap().is_none());
    }
}
