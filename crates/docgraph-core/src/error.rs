use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Storage error: {0}")]
    Storage(#[from] redb::Error),

    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Storage operation error: {0}")]
    StorageOperation(#[from] redb::StorageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Node not found: {0}")]
    NodeNotFound(Uuid),

    #[error("Invalid declaration {fqn}: {reason}")]
    InvalidDeclaration { fqn: String, reason: String },

    #[error("Invalid edge: {reason}")]
    InvalidEdge { reason: String },

    #[error("Duplicate node: fqn={fqn} already bound to {existing}")]
    DuplicateNode { fqn: String, existing: Uuid },

    /// A merge or arbitration input broke a pipeline invariant. Never
    /// produced for well-formed proposals.
    #[error("Invariant violated: {0}")]
    Invariant(String),

    #[error("Build cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl GraphError {
    pub(crate) fn invalid_declaration(fqn: impl Into<String>, reason: impl Into<String>) -> Self {
        GraphError::InvalidDeclaration {
            fqn: fqn.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error only invalidates one declaration rather than the
    /// whole build.
    pub fn is_declaration_scoped(&self) -> bool {
        matches!(self, GraphError::InvalidDeclaration { .. })
    }
}

/// Text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
