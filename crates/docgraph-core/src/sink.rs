use crate::error::{GraphError, Result};
use crate::linker::EdgeProposal;
use crate::storage::{EdgeUpsertOutcome, GraphStore};
use crate::types::AcceptedEdge;
use chrono::Utc;
use std::sync::Arc;

/// Persists accepted proposals as graph edges.
///
/// Writes are insert-or-ignore on (source, target, kind), so concurrent or
/// repeated sinks of the same edges leave one row each.
pub struct GraphSink {
    store: Arc<dyn GraphStore>,
}

impl GraphSink {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Store every proposal in one batch. Proposals must be resolved.
    pub fn upsert_edges(&self, proposals: &[EdgeProposal]) -> Result<EdgeUpsertOutcome> {
        let now = Utc::now();
        let edges = proposals
            .iter()
            .map(|p| {
                let (source, target, kind) = p.key().ok_or_else(|| GraphError::InvalidEdge {
                    reason: format!("{} proposal from {} has no resolved target", p.kind, p.source),
                })?;
                Ok(AcceptedEdge {
                    source,
                    target,
                    kind,
                    confidence: p.confidence,
                    evidence_count: p.evidence.len() as u32,
                    created_at: now,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if edges.is_empty() {
            return Ok(EdgeUpsertOutcome::default());
        }
        let outcome = self.store.upsert_edges(&edges)?;
        log::debug!(
            "Sank {} edges: {} inserted, {} existing",
            edges.len(),
            outcome.inserted,
            outcome.existing
        );
        Ok(outcome)
    }
}
