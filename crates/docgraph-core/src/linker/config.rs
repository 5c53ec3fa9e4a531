use crate::error::{GraphError, Result};
use crate::types::EdgeKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How confidences of duplicate proposals combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeRule {
    /// Strongest single piece of evidence.
    #[default]
    Max,
    /// `1 - Π(1 - cᵢ)`: independent evidence accumulates.
    NoisyOr,
}

impl MergeRule {
    pub fn combine(&self, confidences: &[f32]) -> f32 {
        match self {
            MergeRule::Max => confidences.iter().copied().fold(0.0, f32::max),
            MergeRule::NoisyOr => {
                let miss: f32 = confidences.iter().map(|c| 1.0 - c).product();
                (1.0 - miss).clamp(0.0, 1.0)
            }
        }
    }
}

/// Configuration for the linking pass.
///
/// Map keys are edge-kind wire names (`CALLS_CODE`) or detector names, so
/// the whole struct reads naturally from TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkerConfig {
    /// Detector name -> enabled. Detectors not listed are enabled.
    pub detectors: BTreeMap<String, bool>,

    /// Edge kind -> arbitration priority (higher wins ties). Default: 0.
    pub kind_priorities: BTreeMap<String, i32>,

    /// Edge kind -> minimum confidence. Falls back to `default_threshold`.
    pub kind_thresholds: BTreeMap<String, f32>,

    /// Minimum confidence for kinds without their own threshold. Default: 0.3.
    pub default_threshold: f32,

    /// Default: max.
    pub merge_rule: MergeRule,

    /// Run fact sources and detectors on the rayon pool. Default: true.
    pub parallel: bool,
}

impl Default for LinkerConfig {
    fn default() -> Self {
        let kind_priorities = [
            (EdgeKind::Contains, 100),
            (EdgeKind::Implements, 90),
            (EdgeKind::Inherits, 90),
            (EdgeKind::CallsCode, 80),
            (EdgeKind::CallsHttp, 70),
            (EdgeKind::Writes, 60),
            (EdgeKind::Reads, 55),
            (EdgeKind::DependsOn, 10),
        ]
        .into_iter()
        .map(|(k, p)| (k.as_str().to_string(), p))
        .collect();

        Self {
            detectors: BTreeMap::new(),
            kind_priorities,
            kind_thresholds: BTreeMap::new(),
            default_threshold: 0.3,
            merge_rule: MergeRule::Max,
            parallel: true,
        }
    }
}

impl LinkerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_detector(mut self, name: &str, enabled: bool) -> Self {
        self.detectors.insert(name.to_string(), enabled);
        self
    }

    pub fn with_priority(mut self, kind: EdgeKind, priority: i32) -> Self {
        self.kind_priorities.insert(kind.as_str().to_string(), priority);
        self
    }

    pub fn with_threshold(mut self, kind: EdgeKind, threshold: f32) -> Self {
        self.kind_thresholds.insert(kind.as_str().to_string(), threshold);
        self
    }

    pub fn with_default_threshold(mut self, threshold: f32) -> Self {
        self.default_threshold = threshold;
        self
    }

    pub fn with_merge_rule(mut self, rule: MergeRule) -> Self {
        self.merge_rule = rule;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn detector_enabled(&self, name: &str) -> bool {
        self.detectors.get(name).copied().unwrap_or(true)
    }

    pub fn priority(&self, kind: EdgeKind) -> i32 {
        self.kind_priorities.get(kind.as_str()).copied().unwrap_or(0)
    }

    pub fn threshold(&self, kind: EdgeKind) -> f32 {
        self.kind_thresholds
            .get(kind.as_str())
            .copied()
            .unwrap_or(self.default_threshold)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.default_threshold) {
            return Err(GraphError::Config(
                "default_threshold must be between 0.0 and 1.0".into(),
            ));
        }

        for (kind, threshold) in &self.kind_thresholds {
            if EdgeKind::parse(kind).is_none() {
                return Err(GraphError::Config(format!("unknown edge kind in kind_thresholds: {}", kind)));
            }
            if !(0.0..=1.0).contains(threshold) {
                return Err(GraphError::Config(format!(
                    "threshold for {} must be between 0.0 and 1.0",
                    kind
                )));
            }
        }

        for kind in self.kind_priorities.keys() {
            if EdgeKind::parse(kind).is_none() {
                return Err(GraphError::Config(format!("unknown edge kind in kind_priorities: {}", kind)));
            }
        }

        Ok(())
    }
}
