use crate::types::{ApplicationId, EdgeKind, Node, NodeKind};
use std::collections::HashMap;

/// Filter criteria for querying nodes
#[derive(Debug, Clone, Default)]
pub struct NodeFilter {
    pub application_id: Option<ApplicationId>,
    pub kinds: Option<Vec<NodeKind>>,
    pub file_path: Option<String>,
    pub limit: Option<usize>,
}

impl NodeFilter {
    /// Create a new empty filter
    pub fn new() -> Self {
        Self::default()
    }

    /// Only nodes owned by this application
    pub fn for_application(mut self, app: ApplicationId) -> Self {
        self.application_id = Some(app);
        self
    }

    /// Filter by node kinds
    pub fn with_kinds(mut self, kinds: Vec<NodeKind>) -> Self {
        self.kinds = Some(kinds);
        self
    }

    /// Filter by declaring file
    pub fn with_file_path(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    /// Limit number of results
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub(crate) fn matches(&self, node: &Node) -> bool {
        if let Some(app) = self.application_id {
            if node.application_id != app {
                return false;
            }
        }
        if let Some(kinds) = &self.kinds {
            if !kinds.contains(&node.kind) {
                return false;
            }
        }
        if let Some(path) = &self.file_path {
            if node.file_path.as_deref() != Some(path.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Result of an insert-or-ignore batch write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EdgeUpsertOutcome {
    /// Rows that did not exist before this call.
    pub inserted: u64,
    /// Rows already present under the same key and left untouched.
    pub existing: u64,
}

impl EdgeUpsertOutcome {
    pub fn total(&self) -> u64 {
        self.inserted + self.existing
    }
}

/// Storage statistics
#[derive(Debug, Clone, Default)]
pub struct StorageStats {
    pub node_count: u64,
    pub edge_count: u64,
    pub library_edge_count: u64,
    pub application_count: u64,
    pub node_counts_by_kind: HashMap<NodeKind, u64>,
    pub edge_counts_by_kind: HashMap<EdgeKind, u64>,
}
