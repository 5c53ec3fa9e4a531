use crate::storage::GraphStore;
use crate::types::LibraryEdge;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Counts from one library-edge write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryEdgeOutcome {
    pub written: u64,
    /// Already present.
    pub skipped: u64,
    pub errors: u64,
}

/// Writes application-to-library edges. Failures are counted, not raised.
pub struct LibraryEdgeSink {
    store: Arc<dyn GraphStore>,
}

impl LibraryEdgeSink {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    pub fn write(&self, edges: &[LibraryEdge]) -> LibraryEdgeOutcome {
        if edges.is_empty() {
            return LibraryEdgeOutcome::default();
        }
        match self.store.upsert_library_edges(edges) {
            Ok(outcome) => LibraryEdgeOutcome {
                written: outcome.inserted,
                skipped: outcome.existing,
                errors: 0,
            },
            Err(e) => {
                log::warn!("Failed to write {} library edges: {}", edges.len(), e);
                LibraryEdgeOutcome {
                    written: 0,
                    skipped: 0,
                    errors: edges.len() as u64,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::types::{EdgeKind, Node, NodeKind};
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn test_written_then_skipped() {
        let store = Arc::new(MemoryStorage::new());
        let node = Node::new(Uuid::now_v7(), "com.a.A.run()", "run", NodeKind::Method, "kotlin");
        store.upsert_node(&node).unwrap();

        let edge = LibraryEdge {
            node_id: node.id,
            library_fqn: "com.lib.Client.get()".into(),
            kind: EdgeKind::CallsCode,
            created_at: Utc::now(),
        };
        let sink = LibraryEdgeSink::new(store);
        assert_eq!(
            sink.write(&[edge.clone()]),
            LibraryEdgeOutcome {
                written: 1,
                skipped: 0,
                errors: 0
            }
        );
        assert_eq!(sink.write(&[edge]).skipped, 1);
        assert_eq!(sink.write(&[]), LibraryEdgeOutcome::default());
    }

    #[test]
    fn test_unknown_node_counts_as_error() {
        let sink = LibraryEdgeSink::new(Arc::new(MemoryStorage::new()));
        let edge = LibraryEdge {
            node_id: Uuid::now_v7(),
            library_fqn: "com.lib.Client.get()".into(),
            kind: EdgeKind::CallsHttp,
            created_at: Utc::now(),
        };
        assert_eq!(sink.write(&[edge]).errors, 1);
    }
}
