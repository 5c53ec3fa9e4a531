use crate::builder::config::BuilderConfig;
use crate::builder::normalize::{content_hash, truncate_source};
use crate::builder::state::{BuildState, CacheSlot};
use crate::builder::validator::NodeValidator;
use crate::error::{GraphError, Result};
use crate::storage::GraphStore;
use crate::types::{LineSpan, Node, NodeId, NodeKind, NodeMeta};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Everything the builder needs to materialize one node.
#[derive(Debug, Clone)]
pub struct NodeDraft {
    pub fqn: String,
    pub name: String,
    pub kind: NodeKind,
    pub lang: String,
    pub file_path: Option<String>,
    pub span: Option<LineSpan>,
    pub source: Option<String>,
    pub doc: Option<String>,
    pub signature: Option<String>,
    pub meta: NodeMeta,
}

impl NodeDraft {
    pub fn new(fqn: impl Into<String>, name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            fqn: fqn.into(),
            name: name.into(),
            kind,
            lang: String::new(),
            file_path: None,
            span: None,
            source: None,
            doc: None,
            signature: None,
            meta: NodeMeta::default(),
        }
    }
}

/// What happened to a node on upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
    /// Source unchanged; only structural fields may have been refreshed.
    Skipped,
}

/// Per-build node counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStats {
    pub created: u64,
    pub updated: u64,
    pub skipped: u64,
    pub failed: u64,
}

impl NodeStats {
    pub fn total(&self) -> u64 {
        self.created + self.updated + self.skipped
    }

    fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Created => self.created += 1,
            UpsertOutcome::Updated => self.updated += 1,
            UpsertOutcome::Skipped => self.skipped += 1,
        }
    }
}

/// Validates, normalizes, hashes and persists nodes.
///
/// Single writer per build: all calls go through one `&mut self` and one
/// [`BuildState`].
pub struct NodeBuilder {
    store: Arc<dyn GraphStore>,
    config: BuilderConfig,
    validator: NodeValidator,
    stats: NodeStats,
}

impl NodeBuilder {
    pub fn new(store: Arc<dyn GraphStore>, config: BuilderConfig) -> Self {
        let validator = NodeValidator::new(config.max_fqn_length);
        Self {
            store,
            config,
            validator,
            stats: NodeStats::default(),
        }
    }

    pub fn stats(&self) -> NodeStats {
        self.stats
    }

    pub(crate) fn record_failure(&mut self) {
        self.stats.failed += 1;
    }

    /// Create or update the node described by `draft`.
    ///
    /// Returns `InvalidDeclaration` for validation failures (nothing is
    /// written) and storage errors as-is.
    pub fn upsert(
        &mut self,
        state: &mut BuildState,
        slot: CacheSlot,
        draft: NodeDraft,
        parent: Option<&Node>,
    ) -> Result<(Node, UpsertOutcome)> {
        let app = state.application_id();

        self.validator.validate_fqn(&draft.fqn)?;
        self.validator.validate_span(&draft.fqn, draft.span.as_ref())?;
        self.validator.validate_parent(&draft.fqn, app, parent)?;

        let existing = match state.get(slot, &draft.fqn) {
            Some(node) => Some(node.clone()),
            None => self.store.find_node_by_fqn(app, &draft.fqn)?,
        };

        if let (Some(existing), Some(parent)) = (existing.as_ref(), parent) {
            self.check_not_ancestor(state, &draft.fqn, existing.id, parent)?;
        }

        let hash = content_hash(draft.source.as_deref());
        let source = draft
            .source
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|s| truncate_source(s, self.config.max_source_bytes));
        let parent_id = parent.map(|p| p.id);

        let (node, outcome) = match existing {
            None => {
                let mut node = Node::new(app, draft.fqn, draft.name, draft.kind, draft.lang);
                node.parent_id = parent_id;
                node.file_path = draft.file_path;
                node.span = draft.span;
                node.source = source;
                node.doc = draft.doc;
                node.signature = draft.signature;
                node.code_hash = hash.clone();
                node.meta = draft.meta;
                node.meta.source_hash = hash;
                self.store.upsert_node(&node)?;
                (node, UpsertOutcome::Created)
            }
            Some(existing) if existing.code_hash == hash => {
                let refreshed = relink(&existing, draft, parent_id);
                if refreshed != existing {
                    self.store.upsert_node(&refreshed)?;
                    log::debug!("Relinked unchanged node {}", refreshed.fqn);
                }
                (refreshed, UpsertOutcome::Skipped)
            }
            Some(existing) => {
                let mut node = relink(&existing, draft.clone(), parent_id);
                node.source = source;
                node.doc = draft.doc.or(existing.doc);
                node.code_hash = hash.clone();
                node.meta.source_hash = hash;
                self.store.upsert_node(&node)?;
                (node, UpsertOutcome::Updated)
            }
        };

        self.stats.record(outcome);
        state.put(slot, node.clone());
        Ok((node, outcome))
    }

    /// Fail if `node_id` is `parent` or one of its ancestors.
    fn check_not_ancestor(
        &self,
        state: &BuildState,
        fqn: &str,
        node_id: NodeId,
        parent: &Node,
    ) -> Result<()> {
        let mut current = Some(parent.clone());
        let mut depth = 0;
        while let Some(node) = current {
            if node.id == node_id {
                return Err(GraphError::invalid_declaration(
                    fqn,
                    format!("parent {} would form a cycle", parent.fqn),
                ));
            }
            depth += 1;
            if depth > self.config.max_parent_depth {
                return Err(GraphError::invalid_declaration(
                    fqn,
                    "parent chain exceeds maximum depth",
                ));
            }
            current = match node.parent_id {
                Some(pid) => match state.by_id(pid) {
                    Some(cached) => Some(cached.clone()),
                    None => self.store.get_node(pid)?,
                },
                None => None,
            };
        }
        Ok(())
    }
}

/// Apply the draft's structural fields to `existing`, leaving source and
/// doc untouched.
fn relink(existing: &Node, draft: NodeDraft, parent_id: Option<NodeId>) -> Node {
    let mut node = existing.clone();
    node.name = draft.name;
    node.kind = draft.kind;
    if !draft.lang.is_empty() {
        node.lang = draft.lang;
    }
    node.parent_id = parent_id.or(existing.parent_id);
    if draft.file_path.is_some() {
        node.file_path = draft.file_path;
    }
    if draft.span.is_some() {
        node.span = draft.span;
    }
    if draft.signature.is_some() {
        node.signature = draft.signature;
    }
    node.meta.merge(draft.meta);
    if node != *existing {
        node.updated_at = Utc::now();
    }
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use uuid::Uuid;

    fn setup() -> (NodeBuilder, BuildState, Arc<MemoryStorage>) {
        let store = Arc::new(MemoryStorage::new());
        let builder = NodeBuilder::new(store.clone(), BuilderConfig::default());
        (builder, BuildState::new(Uuid::now_v7()), store)
    }

    fn method_draft(source: &str) -> NodeDraft {
        let mut d = NodeDraft::new("com.example.Foo.bar()", "bar", NodeKind::Method);
        d.source = Some(source.to_string());
        d
    }

    #[test]
    fn test_create_then_skip_identical_source() {
        let (mut builder, mut state, _store) = setup();
        let (first, o1) = builder
            .upsert(&mut state, CacheSlot::Function, method_draft("fun bar() = 1"), None)
            .unwrap();
        assert_eq!(o1, UpsertOutcome::Created);

        // Fresh state: the existing node comes from the store, not the cache
        let mut state2 = BuildState::new(state.application_id());
        let (second, o2) = builder
            .upsert(&mut state2, CacheSlot::Function, method_draft("fun bar() = 1"), None)
            .unwrap();
        assert_eq!(o2, UpsertOutcome::Skipped);
        assert_eq!(second.id, first.id);
        assert_eq!(builder.stats(), NodeStats { created: 1, updated: 0, skipped: 1, failed: 0 });
    }

    #[test]
    fn test_changed_source_updates_same_id() {
        let (mut builder, mut state, store) = setup();
        let (first, _) = builder
            .upsert(&mut state, CacheSlot::Function, method_draft("fun bar() = 1"), None)
            .unwrap();
        let (second, outcome) = builder
            .upsert(&mut state, CacheSlot::Function, method_draft("fun bar() = 2"), None)
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated);
        assert_eq!(second.id, first.id);
        assert_ne!(second.code_hash, first.code_hash);
        let stored = store.get_node(first.id).unwrap().unwrap();
        assert_eq!(stored.source.as_deref(), Some("fun bar() = 2"));
    }

    #[test]
    fn test_skip_still_relinks_metadata() {
        let (mut builder, mut state, store) = setup();
        let (first, _) = builder
            .upsert(&mut state, CacheSlot::Function, method_draft("same"), None)
            .unwrap();
        let mut draft = method_draft("same");
        draft.meta.annotations = vec!["@Scheduled".into()];
        draft.kind = NodeKind::Job;
        let (second, outcome) = builder
            .upsert(&mut state, CacheSlot::Function, draft, None)
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Skipped);
        let stored = store.get_node(first.id).unwrap().unwrap();
        assert_eq!(stored.kind, NodeKind::Job);
        assert_eq!(stored.meta.annotations, second.meta.annotations);
    }

    #[test]
    fn test_invalid_fqn_writes_nothing() {
        let (mut builder, mut state, store) = setup();
        let draft = NodeDraft::new("123Invalid", "x", NodeKind::Class);
        let err = builder
            .upsert(&mut state, CacheSlot::Type, draft, None)
            .unwrap_err();
        assert!(err.is_declaration_scoped());
        assert_eq!(store.stats().unwrap().node_count, 0);
    }

    #[test]
    fn test_truncates_but_hashes_original() {
        let store = Arc::new(MemoryStorage::new());
        let mut builder = NodeBuilder::new(
            store.clone(),
            BuilderConfig::default().with_max_source_bytes(4),
        );
        let mut state = BuildState::new(Uuid::now_v7());
        let (node, _) = builder
            .upsert(&mut state, CacheSlot::Function, method_draft("abcdefgh"), None)
            .unwrap();
        assert!(node.source.as_deref().unwrap().starts_with("abcd\n... [truncated]"));
        assert_eq!(node.code_hash, content_hash(Some("abcdefgh")));
    }

    #[test]
    fn test_descendant_cannot_become_parent() {
        let (mut builder, mut state, _store) = setup();
        let (pkg, _) = builder
            .upsert(&mut state, CacheSlot::Package, NodeDraft::new("com.example", "example", NodeKind::Package), None)
            .unwrap();
        let (ty, _) = builder
            .upsert(&mut state, CacheSlot::Type, NodeDraft::new("com.example.Foo", "Foo", NodeKind::Class), Some(&pkg))
            .unwrap();

        // Re-parenting the package under its own child must fail
        let err = builder
            .upsert(
                &mut state,
                CacheSlot::Package,
                NodeDraft::new("com.example", "example", NodeKind::Package),
                Some(&ty),
            )
            .unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn test_self_parent_rejected() {
        let (mut builder, mut state, _store) = setup();
        let (pkg, _) = builder
            .upsert(&mut state, CacheSlot::Package, NodeDraft::new("com.example", "example", NodeKind::Package), None)
            .unwrap();
        let err = builder
            .upsert(
                &mut state,
                CacheSlot::Package,
                NodeDraft::new("com.example", "example", NodeKind::Package),
                Some(&pkg),
            )
            .unwrap_err();
        assert!(err.is_declaration_scoped());
    }
}
