use crate::error::{GraphError, Result};
use serde::{Deserialize, Serialize};

/// Configuration for node materialization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Source text above this size is truncated. Default: 10 MiB.
    pub max_source_bytes: usize,

    /// Longest accepted FQN. Default: 1000.
    pub max_fqn_length: usize,

    /// Longest parent chain walked by the cycle check. Default: 512.
    pub max_parent_depth: usize,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            max_source_bytes: 10 * 1024 * 1024,
            max_fqn_length: 1000,
            max_parent_depth: 512,
        }
    }
}

impl BuilderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_source_bytes(mut self, max: usize) -> Self {
        self.max_source_bytes = max;
        self
    }

    pub fn with_max_fqn_length(mut self, max: usize) -> Self {
        self.max_fqn_length = max;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_source_bytes == 0 {
            return Err(GraphError::Config("max_source_bytes must be > 0".into()));
        }
        if self.max_fqn_length == 0 {
            return Err(GraphError::Config("max_fqn_length must be > 0".into()));
        }
        if self.max_parent_depth == 0 {
            return Err(GraphError::Config("max_parent_depth must be > 0".into()));
        }
        Ok(())
    }
}
