use crate::error::{GraphError, Result};
use crate::storage::filters::{EdgeUpsertOutcome, NodeFilter, StorageStats};
use crate::storage::traits::GraphStore;
use crate::types::{AcceptedEdge, ApplicationId, EdgeKind, LibraryEdge, Node, NodeId};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;

#[derive(Default)]
struct Inner {
    nodes: HashMap<NodeId, Node>,
    by_fqn: HashMap<(ApplicationId, String), NodeId>,
    edges: BTreeMap<(NodeId, NodeId, EdgeKind), AcceptedEdge>,
    library_edges: BTreeMap<(NodeId, EdgeKind, String), LibraryEdge>,
    meta: HashMap<String, Vec<u8>>,
}

/// In-process store for tests and throwaway builds. Same contract as
/// [`RedbStorage`](super::RedbStorage), nothing is persisted.
#[derive(Default)]
pub struct MemoryStorage {
    inner: RwLock<Inner>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| GraphError::Validation("memory storage lock poisoned".into()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| GraphError::Validation("memory storage lock poisoned".into()))
    }
}

fn app_of(inner: &Inner, id: NodeId) -> Result<ApplicationId> {
    inner
        .nodes
        .get(&id)
        .map(|n| n.application_id)
        .ok_or_else(|| GraphError::InvalidEdge {
            reason: format!("Node {} does not exist", id),
        })
}

impl GraphStore for MemoryStorage {
    fn upsert_node(&self, node: &Node) -> Result<()> {
        let mut inner = self.write()?;
        let key = (node.application_id, node.fqn.clone());
        if let Some(existing) = inner.by_fqn.get(&key) {
            if *existing != node.id {
                return Err(GraphError::DuplicateNode {
                    fqn: node.fqn.clone(),
                    existing: *existing,
                });
            }
        }
        let renamed = inner
            .nodes
            .get(&node.id)
            .filter(|old| old.fqn != node.fqn)
            .map(|old| (old.application_id, old.fqn.clone()));
        if let Some(old_key) = renamed {
            inner.by_fqn.remove(&old_key);
        }
        inner.by_fqn.insert(key, node.id);
        inner.nodes.insert(node.id, node.clone());
        Ok(())
    }

    fn get_node(&self, id: NodeId) -> Result<Option<Node>> {
        Ok(self.read()?.nodes.get(&id).cloned())
    }

    fn find_node_by_fqn(&self, app: ApplicationId, fqn: &str) -> Result<Option<Node>> {
        let inner = self.read()?;
        Ok(inner
            .by_fqn
            .get(&(app, fqn.to_string()))
            .and_then(|id| inner.nodes.get(id))
            .cloned())
    }

    fn list_nodes(&self, filter: NodeFilter) -> Result<Vec<Node>> {
        let inner = self.read()?;
        let mut nodes: Vec<Node> = inner
            .nodes
            .values()
            .filter(|n| filter.matches(n))
            .cloned()
            .collect();
        nodes.sort_by(|a, b| a.fqn.cmp(&b.fqn).then(a.id.cmp(&b.id)));
        if let Some(limit) = filter.limit {
            nodes.truncate(limit);
        }
        Ok(nodes)
    }

    fn upsert_edges(&self, edges: &[AcceptedEdge]) -> Result<EdgeUpsertOutcome> {
        let mut inner = self.write()?;
        // Check the whole batch before touching anything
        for edge in edges {
            app_of(&inner, edge.source)?;
            app_of(&inner, edge.target)?;
            if !(0.0..=1.0).contains(&edge.confidence) {
                return Err(GraphError::InvalidEdge {
                    reason: format!("confidence {} outside [0,1]", edge.confidence),
                });
            }
        }

        let mut outcome = EdgeUpsertOutcome::default();
        for edge in edges {
            if inner.edges.contains_key(&edge.key()) {
                outcome.existing += 1;
            } else {
                inner.edges.insert(edge.key(), edge.clone());
                outcome.inserted += 1;
            }
        }
        Ok(outcome)
    }

    fn edges_from(&self, node_id: NodeId) -> Result<Vec<AcceptedEdge>> {
        let inner = self.read()?;
        Ok(inner
            .edges
            .values()
            .filter(|e| e.source == node_id)
            .cloned()
            .collect())
    }

    fn list_edges(&self, app: ApplicationId) -> Result<Vec<AcceptedEdge>> {
        let inner = self.read()?;
        Ok(inner
            .edges
            .values()
            .filter(|e| app_of(&inner, e.source).map(|a| a == app).unwrap_or(false))
            .cloned()
            .collect())
    }

    fn upsert_library_edges(&self, edges: &[LibraryEdge]) -> Result<EdgeUpsertOutcome> {
        let mut inner = self.write()?;
        for edge in edges {
            app_of(&inner, edge.node_id)?;
        }
        let mut outcome = EdgeUpsertOutcome::default();
        for edge in edges {
            let key = (edge.node_id, edge.kind, edge.library_fqn.clone());
            if inner.library_edges.contains_key(&key) {
                outcome.existing += 1;
            } else {
                inner.library_edges.insert(key, edge.clone());
                outcome.inserted += 1;
            }
        }
        Ok(outcome)
    }

    fn list_library_edges(&self, app: ApplicationId) -> Result<Vec<LibraryEdge>> {
        let inner = self.read()?;
        Ok(inner
            .library_edges
            .values()
            .filter(|e| app_of(&inner, e.node_id).map(|a| a == app).unwrap_or(false))
            .cloned()
            .collect())
    }

    fn delete_application(&self, app: ApplicationId) -> Result<u64> {
        let mut inner = self.write()?;
        let ids: HashSet<NodeId> = inner
            .nodes
            .values()
            .filter(|n| n.application_id == app)
            .map(|n| n.id)
            .collect();
        inner.nodes.retain(|id, _| !ids.contains(id));
        inner.by_fqn.retain(|(a, _), _| *a != app);
        inner.edges.retain(|(s, _, _), _| !ids.contains(s));
        inner.library_edges.retain(|(n, _, _), _| !ids.contains(n));
        Ok(ids.len() as u64)
    }

    fn put_metadata(&self, key: &str, value: &[u8]) -> Result<()> {
        self.write()?.meta.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get_metadata(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.read()?.meta.get(key).cloned())
    }

    fn delete_metadata(&self, key: &str) -> Result<()> {
        self.write()?.meta.remove(key);
        Ok(())
    }

    fn stats(&self) -> Result<StorageStats> {
        let inner = self.read()?;
        let mut stats = StorageStats {
            node_count: inner.nodes.len() as u64,
            edge_count: inner.edges.len() as u64,
            library_edge_count: inner.library_edges.len() as u64,
            ..Default::default()
        };
        let mut apps = HashSet::new();
        for node in inner.nodes.values() {
            apps.insert(node.application_id);
            *stats.node_counts_by_kind.entry(node.kind).or_insert(0) += 1;
        }
        for edge in inner.edges.values() {
            *stats.edge_counts_by_kind.entry(edge.kind).or_insert(0) += 1;
        }
        stats.application_count = apps.len() as u64;
        Ok(stats)
    }
}
