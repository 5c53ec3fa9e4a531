use anyhow::{Context, Result};
use docgraph_core::{BuilderConfig, LinkerConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Contents of `docgraph.toml`.
///
/// ```toml
/// [builder]
/// max_source_bytes = 1048576
///
/// [linker]
/// default_threshold = 0.4
/// merge_rule = "noisy_or"
///
/// [linker.detectors]
/// sql = false
///
/// [linker.kind_thresholds]
/// CALLS_CODE = 0.5
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DocgraphConfig {
    pub builder: BuilderConfig,
    pub linker: LinkerConfig,
}

impl DocgraphConfig {
    pub fn parse(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    /// Defaults when `path` does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.builder.validate()?;
        self.linker.validate()?;
        Ok(())
    }
}
