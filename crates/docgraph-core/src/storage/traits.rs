use crate::error::Result;
use crate::storage::filters::{EdgeUpsertOutcome, NodeFilter, StorageStats};
use crate::types::{AcceptedEdge, ApplicationId, LibraryEdge, Node, NodeId};

/// Persistence contract for the code graph.
///
/// Every write is idempotent: nodes are keyed by id (and must keep their
/// FQN unique within the application), edges by (source, target, kind),
/// library edges by (node, library FQN, kind).
pub trait GraphStore: Send + Sync {
    // === Node Operations ===

    /// Insert or replace a node. Fails with `DuplicateNode` when another
    /// node of the same application already owns the FQN.
    fn upsert_node(&self, node: &Node) -> Result<()>;

    /// Retrieve a node by ID
    fn get_node(&self, id: NodeId) -> Result<Option<Node>>;

    /// Retrieve a node by its FQN within an application
    fn find_node_by_fqn(&self, app: ApplicationId, fqn: &str) -> Result<Option<Node>>;

    /// List nodes matching the filter, ordered by FQN
    fn list_nodes(&self, filter: NodeFilter) -> Result<Vec<Node>>;

    /// Count nodes matching the filter
    fn count_nodes(&self, filter: NodeFilter) -> Result<u64> {
        Ok(self.list_nodes(filter)?.len() as u64)
    }

    // === Edge Operations ===

    /// Insert-or-ignore a batch of accepted edges in one transaction.
    fn upsert_edges(&self, edges: &[AcceptedEdge]) -> Result<EdgeUpsertOutcome>;

    /// All edges whose source is `node_id`
    fn edges_from(&self, node_id: NodeId) -> Result<Vec<AcceptedEdge>>;

    /// All edges whose source belongs to `app`, ordered by key
    fn list_edges(&self, app: ApplicationId) -> Result<Vec<AcceptedEdge>>;

    fn count_edges(&self, app: ApplicationId) -> Result<u64> {
        Ok(self.list_edges(app)?.len() as u64)
    }

    /// Insert-or-ignore a batch of application-to-library edges.
    fn upsert_library_edges(&self, edges: &[LibraryEdge]) -> Result<EdgeUpsertOutcome>;

    /// Library edges leaving nodes of `app`
    fn list_library_edges(&self, app: ApplicationId) -> Result<Vec<LibraryEdge>>;

    // === Application Operations ===

    /// Remove every node, edge and library edge owned by the application.
    /// Returns the number of removed nodes.
    fn delete_application(&self, app: ApplicationId) -> Result<u64>;

    // === Metadata ===

    /// Store arbitrary metadata (for metrics, application keys, etc.)
    fn put_metadata(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Retrieve metadata
    fn get_metadata(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Remove metadata. Missing keys are not an error.
    fn delete_metadata(&self, key: &str) -> Result<()>;

    // === Maintenance ===

    /// Get storage statistics
    fn stats(&self) -> Result<StorageStats>;
}
