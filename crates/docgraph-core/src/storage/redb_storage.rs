use crate::error::{GraphError, Result};
use crate::storage::filters::{EdgeUpsertOutcome, NodeFilter, StorageStats};
use crate::storage::traits::GraphStore;
use crate::types::{AcceptedEdge, ApplicationId, EdgeKind, LibraryEdge, Node, NodeId};
use redb::{Database, MultimapTableDefinition, ReadableMultimapTable, ReadableTable, TableDefinition};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// Table definitions
const NODES: TableDefinition<&[u8; 16], &[u8]> = TableDefinition::new("nodes");
const EDGES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("edges");
const LIBRARY_EDGES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("library_edges");

// Secondary indexes
const NODES_BY_FQN: TableDefinition<&str, &[u8; 16]> = TableDefinition::new("nodes_by_fqn");
const NODES_BY_APP: MultimapTableDefinition<&[u8; 16], &[u8; 16]> =
    MultimapTableDefinition::new("nodes_by_app");
const EDGES_BY_APP: MultimapTableDefinition<&[u8; 16], &[u8]> =
    MultimapTableDefinition::new("edges_by_app");
const LIBRARY_EDGES_BY_APP: MultimapTableDefinition<&[u8; 16], &[u8]> =
    MultimapTableDefinition::new("library_edges_by_app");

// Metadata table
const META: TableDefinition<&str, &[u8]> = TableDefinition::new("meta");

/// Current schema version.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;
const SCHEMA_VERSION_KEY: &str = "schema_version";

/// Redb-based storage implementation
pub struct RedbStorage {
    db: Arc<Database>,
    path: PathBuf,
}

impl RedbStorage {
    /// Open or create a database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                GraphError::Validation(format!("Failed to create directory: {}", e))
            })?;
        }

        let is_new = !path.exists();
        let db = Database::create(&path)?;

        if !is_new {
            Self::check_schema_version(&db)?;
        }

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(NODES)?;
            let _ = write_txn.open_table(EDGES)?;
            let _ = write_txn.open_table(LIBRARY_EDGES)?;
            let _ = write_txn.open_table(NODES_BY_FQN)?;
            let _ = write_txn.open_multimap_table(NODES_BY_APP)?;
            let _ = write_txn.open_multimap_table(EDGES_BY_APP)?;
            let _ = write_txn.open_multimap_table(LIBRARY_EDGES_BY_APP)?;
            let mut meta = write_txn.open_table(META)?;
            if is_new {
                meta.insert(SCHEMA_VERSION_KEY, CURRENT_SCHEMA_VERSION.to_string().as_bytes())?;
            }
        }
        write_txn.commit()?;

        Ok(Self {
            db: Arc::new(db),
            path,
        })
    }

    /// Check schema version. Returns error if the file was written by a
    /// different layout.
    fn check_schema_version(db: &Database) -> Result<()> {
        let read_txn = db.begin_read()?;
        let version = {
            let table = read_txn.open_table(META).ok();
            table
                .and_then(|t| {
                    t.get(SCHEMA_VERSION_KEY).ok().flatten().and_then(|v| {
                        std::str::from_utf8(v.value())
                            .ok()
                            .and_then(|s| s.parse::<u32>().ok())
                    })
                })
                .unwrap_or(CURRENT_SCHEMA_VERSION)
        };

        match version.cmp(&CURRENT_SCHEMA_VERSION) {
            std::cmp::Ordering::Equal => Ok(()),
            std::cmp::Ordering::Less => Err(GraphError::Validation(format!(
                "Database schema v{} is older than current v{}. Rebuild the graph.",
                version, CURRENT_SCHEMA_VERSION
            ))),
            std::cmp::Ordering::Greater => Err(GraphError::Validation(format!(
                "Database schema v{} is newer than this binary v{}. Upgrade docgraph.",
                version, CURRENT_SCHEMA_VERSION
            ))),
        }
    }

    /// Get the database file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn uuid_to_bytes(id: &uuid::Uuid) -> [u8; 16] {
        *id.as_bytes()
    }

    fn fqn_key(app: ApplicationId, fqn: &str) -> String {
        format!("{}:{}", app, fqn)
    }

    /// src(16) ++ dst(16) ++ kind
    fn edge_key(source: NodeId, target: NodeId, kind: EdgeKind) -> Vec<u8> {
        let mut key = Vec::with_capacity(32 + 24);
        key.extend_from_slice(source.as_bytes());
        key.extend_from_slice(target.as_bytes());
        key.extend_from_slice(kind.as_str().as_bytes());
        key
    }

    /// node(16) ++ kind ++ 0x00 ++ library fqn
    fn library_edge_key(edge: &LibraryEdge) -> Vec<u8> {
        let mut key = Vec::with_capacity(16 + 24 + edge.library_fqn.len());
        key.extend_from_slice(edge.node_id.as_bytes());
        key.extend_from_slice(edge.kind.as_str().as_bytes());
        key.push(0);
        key.extend_from_slice(edge.library_fqn.as_bytes());
        key
    }

    fn serialize_node(node: &Node) -> Result<Vec<u8>> {
        bincode::serialize(node).map_err(GraphError::from)
    }

    fn deserialize_node(bytes: &[u8]) -> Result<Node> {
        bincode::deserialize(bytes).map_err(GraphError::from)
    }

    /// Application of an existing node, read inside the caller's transaction.
    fn owning_app(txn: &redb::WriteTransaction, node_id: NodeId) -> Result<ApplicationId> {
        let nodes = txn.open_table(NODES)?;
        let bytes = nodes
            .get(&Self::uuid_to_bytes(&node_id))?
            .ok_or_else(|| GraphError::InvalidEdge {
                reason: format!("Node {} does not exist", node_id),
            })?;
        let node = Self::deserialize_node(bytes.value())?;
        Ok(node.application_id)
    }

    /// Raw keys stored under `app` in a multimap index.
    fn app_keys(
        txn: &redb::WriteTransaction,
        def: MultimapTableDefinition<&[u8; 16], &[u8]>,
        app: &[u8; 16],
    ) -> Result<Vec<Vec<u8>>> {
        let index = txn.open_multimap_table(def)?;
        let keys = index
            .get(app)?
            .map(|r| r.map(|g| g.value().to_vec()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(keys)
    }
}

impl GraphStore for RedbStorage {
    fn upsert_node(&self, node: &Node) -> Result<()> {
        let id_bytes = Self::uuid_to_bytes(&node.id);
        let app_bytes = Self::uuid_to_bytes(&node.application_id);
        let fqn_key = Self::fqn_key(node.application_id, &node.fqn);
        let node_bytes = Self::serialize_node(node)?;

        let write_txn = self.db.begin_write()?;

        // 1. FQN must stay unique within the application
        {
            let fqn_index = write_txn.open_table(NODES_BY_FQN)?;
            if let Some(owner) = fqn_index.get(fqn_key.as_str())? {
                let existing = uuid::Uuid::from_bytes(*owner.value());
                if existing != node.id {
                    return Err(GraphError::DuplicateNode {
                        fqn: node.fqn.clone(),
                        existing,
                    });
                }
            };
        }

        // 2. Drop the old FQN key if the node was renamed
        let old_fqn = {
            let nodes = write_txn.open_table(NODES)?;
            let old = nodes.get(&id_bytes)?;
            match old {
                Some(bytes) => {
                    let old = Self::deserialize_node(bytes.value())?;
                    (old.fqn != node.fqn).then(|| Self::fqn_key(old.application_id, &old.fqn))
                }
                None => None,
            }
        };

        {
            let mut fqn_index = write_txn.open_table(NODES_BY_FQN)?;
            if let Some(old_key) = old_fqn {
                fqn_index.remove(old_key.as_str())?;
            }
            fqn_index.insert(fqn_key.as_str(), &id_bytes)?;
        }
        {
            let mut nodes = write_txn.open_table(NODES)?;
            nodes.insert(&id_bytes, node_bytes.as_slice())?;
        }
        {
            let mut by_app = write_txn.open_multimap_table(NODES_BY_APP)?;
            by_app.insert(&app_bytes, &id_bytes)?;
        }

        write_txn.commit()?;
        Ok(())
    }

    fn get_node(&self, id: NodeId) -> Result<Option<Node>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(NODES)?;

        match table.get(&Self::uuid_to_bytes(&id))? {
            Some(bytes) => Ok(Some(Self::deserialize_node(bytes.value())?)),
            None => Ok(None),
        }
    }

    fn find_node_by_fqn(&self, app: ApplicationId, fqn: &str) -> Result<Option<Node>> {
        let read_txn = self.db.begin_read()?;
        let fqn_index = read_txn.open_table(NODES_BY_FQN)?;
        let id = match fqn_index.get(Self::fqn_key(app, fqn).as_str())? {
            Some(guard) => *guard.value(),
            None => return Ok(None),
        };
        let nodes = read_txn.open_table(NODES)?;
        match nodes.get(&id)? {
            Some(bytes) => Ok(Some(Self::deserialize_node(bytes.value())?)),
            None => Ok(None),
        }
    }

    fn list_nodes(&self, filter: NodeFilter) -> Result<Vec<Node>> {
        let read_txn = self.db.begin_read()?;
        let nodes_table = read_txn.open_table(NODES)?;

        let mut results = Vec::new();
        match filter.application_id {
            Some(app) => {
                let by_app = read_txn.open_multimap_table(NODES_BY_APP)?;
                for id in by_app.get(&Self::uuid_to_bytes(&app))? {
                    let id = *id?.value();
                    if let Some(bytes) = nodes_table.get(&id)? {
                        let node = Self::deserialize_node(bytes.value())?;
                        if filter.matches(&node) {
                            results.push(node);
                        }
                    }
                }
            }
            None => {
                for entry in nodes_table.iter()? {
                    let (_, bytes) = entry?;
                    let node = Self::deserialize_node(bytes.value())?;
                    if filter.matches(&node) {
                        results.push(node);
                    }
                }
            }
        }

        results.sort_by(|a, b| a.fqn.cmp(&b.fqn).then(a.id.cmp(&b.id)));
        if let Some(limit) = filter.limit {
            results.truncate(limit);
        }
        Ok(results)
    }

    fn upsert_edges(&self, edges: &[AcceptedEdge]) -> Result<EdgeUpsertOutcome> {
        let mut outcome = EdgeUpsertOutcome::default();
        if edges.is_empty() {
            return Ok(outcome);
        }

        // Single write transaction: either the whole batch lands or nothing does
        let write_txn = self.db.begin_write()?;
        for edge in edges {
            if !(0.0..=1.0).contains(&edge.confidence) {
                return Err(GraphError::InvalidEdge {
                    reason: format!(
                        "confidence {} outside [0,1] for {} -> {}",
                        edge.confidence, edge.source, edge.target
                    ),
                });
            }
            let app = Self::owning_app(&write_txn, edge.source)?;
            Self::owning_app(&write_txn, edge.target)?;

            let key = Self::edge_key(edge.source, edge.target, edge.kind);
            let exists = {
                let table = write_txn.open_table(EDGES)?;
                let found = table.get(key.as_slice())?.is_some();
                found
            };
            if exists {
                outcome.existing += 1;
                continue;
            }

            let bytes = bincode::serialize(edge)?;
            {
                let mut table = write_txn.open_table(EDGES)?;
                table.insert(key.as_slice(), bytes.as_slice())?;
            }
            {
                let mut by_app = write_txn.open_multimap_table(EDGES_BY_APP)?;
                by_app.insert(&Self::uuid_to_bytes(&app), key.as_slice())?;
            }
            outcome.inserted += 1;
        }
        write_txn.commit()?;

        Ok(outcome)
    }

    fn edges_from(&self, node_id: NodeId) -> Result<Vec<AcceptedEdge>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(EDGES)?;

        // Keys are prefixed by the source id; kind names are ASCII so an
        // all-0xFF tail bounds every key with this prefix.
        let lo = node_id.as_bytes().to_vec();
        let mut hi = lo.clone();
        hi.extend_from_slice(&[0xFF; 17]);

        let mut edges = Vec::new();
        for entry in table.range(lo.as_slice()..hi.as_slice())? {
            let (_, bytes) = entry?;
            edges.push(bincode::deserialize::<AcceptedEdge>(bytes.value())?);
        }
        Ok(edges)
    }

    fn list_edges(&self, app: ApplicationId) -> Result<Vec<AcceptedEdge>> {
        let read_txn = self.db.begin_read()?;
        let by_app = read_txn.open_multimap_table(EDGES_BY_APP)?;
        let table = read_txn.open_table(EDGES)?;

        let mut edges = Vec::new();
        for key in by_app.get(&Self::uuid_to_bytes(&app))? {
            let key = key?;
            if let Some(bytes) = table.get(key.value())? {
                edges.push(bincode::deserialize::<AcceptedEdge>(bytes.value())?);
            }
        }
        edges.sort_by(|a, b| a.key().cmp(&b.key()));
        Ok(edges)
    }

    fn upsert_library_edges(&self, edges: &[LibraryEdge]) -> Result<EdgeUpsertOutcome> {
        let mut outcome = EdgeUpsertOutcome::default();
        if edges.is_empty() {
            return Ok(outcome);
        }

        let write_txn = self.db.begin_write()?;
        for edge in edges {
            let app = Self::owning_app(&write_txn, edge.node_id)?;
            let key = Self::library_edge_key(edge);
            let exists = {
                let table = write_txn.open_table(LIBRARY_EDGES)?;
                let found = table.get(key.as_slice())?.is_some();
                found
            };
            if exists {
                outcome.existing += 1;
                continue;
            }
            let bytes = bincode::serialize(edge)?;
            {
                let mut table = write_txn.open_table(LIBRARY_EDGES)?;
                table.insert(key.as_slice(), bytes.as_slice())?;
            }
            {
                let mut by_app = write_txn.open_multimap_table(LIBRARY_EDGES_BY_APP)?;
                by_app.insert(&Self::uuid_to_bytes(&app), key.as_slice())?;
            }
            outcome.inserted += 1;
        }
        write_txn.commit()?;

        Ok(outcome)
    }

    fn list_library_edges(&self, app: ApplicationId) -> Result<Vec<LibraryEdge>> {
        let read_txn = self.db.begin_read()?;
        let by_app = read_txn.open_multimap_table(LIBRARY_EDGES_BY_APP)?;
        let table = read_txn.open_table(LIBRARY_EDGES)?;

        let mut edges = Vec::new();
        for key in by_app.get(&Self::uuid_to_bytes(&app))? {
            let key = key?;
            if let Some(bytes) = table.get(key.value())? {
                edges.push(bincode::deserialize::<LibraryEdge>(bytes.value())?);
            }
        }
        Ok(edges)
    }

    fn delete_application(&self, app: ApplicationId) -> Result<u64> {
        let app_bytes = Self::uuid_to_bytes(&app);
        let write_txn = self.db.begin_write()?;

        let node_ids: Vec<[u8; 16]> = {
            let by_app = write_txn.open_multimap_table(NODES_BY_APP)?;
            let ids = by_app
                .get(&app_bytes)?
                .map(|r| r.map(|g| *g.value()))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            ids
        };

        let mut removed = 0u64;
        {
            let mut nodes = write_txn.open_table(NODES)?;
            let mut fqn_index = write_txn.open_table(NODES_BY_FQN)?;
            for id in &node_ids {
                let old = nodes.remove(id)?.map(|g| g.value().to_vec());
                if let Some(bytes) = old {
                    let node = Self::deserialize_node(&bytes)?;
                    fqn_index.remove(Self::fqn_key(app, &node.fqn).as_str())?;
                    removed += 1;
                }
            }
        }

        let edge_keys = Self::app_keys(&write_txn, EDGES_BY_APP, &app_bytes)?;
        {
            let mut edges = write_txn.open_table(EDGES)?;
            for key in &edge_keys {
                edges.remove(key.as_slice())?;
            }
        }
        let library_keys = Self::app_keys(&write_txn, LIBRARY_EDGES_BY_APP, &app_bytes)?;
        {
            let mut edges = write_txn.open_table(LIBRARY_EDGES)?;
            for key in &library_keys {
                edges.remove(key.as_slice())?;
            }
        }

        {
            let mut by_app = write_txn.open_multimap_table(NODES_BY_APP)?;
            by_app.remove_all(&app_bytes)?;
        }
        {
            let mut by_app = write_txn.open_multimap_table(EDGES_BY_APP)?;
            by_app.remove_all(&app_bytes)?;
        }
        {
            let mut by_app = write_txn.open_multimap_table(LIBRARY_EDGES_BY_APP)?;
            by_app.remove_all(&app_bytes)?;
        }

        write_txn.commit()?;
        Ok(removed)
    }

    fn put_metadata(&self, key: &str, value: &[u8]) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut meta_table = write_txn.open_table(META)?;
            meta_table.insert(key, value)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn get_metadata(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let read_txn = self.db.begin_read()?;
        let meta_table = read_txn.open_table(META)?;

        match meta_table.get(key)? {
            Some(value) => Ok(Some(value.value().to_vec())),
            None => Ok(None),
        }
    }

    fn delete_metadata(&self, key: &str) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut meta_table = write_txn.open_table(META)?;
            meta_table.remove(key)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn stats(&self) -> Result<StorageStats> {
        let read_txn = self.db.begin_read()?;
        let mut stats = StorageStats::default();
        let mut apps = HashSet::new();

        let nodes = read_txn.open_table(NODES)?;
        for entry in nodes.iter()? {
            let (_, bytes) = entry?;
            let node = Self::deserialize_node(bytes.value())?;
            stats.node_count += 1;
            apps.insert(node.application_id);
            *stats.node_counts_by_kind.entry(node.kind).or_insert(0) += 1;
        }

        let edges = read_txn.open_table(EDGES)?;
        for entry in edges.iter()? {
            let (_, bytes) = entry?;
            let edge: AcceptedEdge = bincode::deserialize(bytes.value())?;
            stats.edge_count += 1;
            *stats.edge_counts_by_kind.entry(edge.kind).or_insert(0) += 1;
        }

        let library = read_txn.open_table(LIBRARY_EDGES)?;
        stats.library_edge_count = library.iter()?.count() as u64;
        stats.application_count = apps.len() as u64;

        Ok(stats)
    }
}
