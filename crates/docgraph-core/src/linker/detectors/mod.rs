//! Edge detectors: independent strategies turning facts into proposals.

mod calls;
mod code;
mod config;
mod integration;
mod sql;

pub use calls::CallDetector;
pub use code::{AnnotationDetector, InheritanceDetector, SignatureDetector, StructuralDetector, ThrowsDetector};
pub use config::ConfigDetector;
pub use integration::IntegrationDetector;
pub use sql::SqlDetector;

use crate::catalog::DataCatalog;
use crate::error::{panic_message, Result};
use crate::facts::{Fact, FactStore};
use crate::linker::config::LinkerConfig;
use crate::linker::index::{NodeIndex, Resolution};
use crate::linker::proposal::{EdgeProposal, Evidence};
use crate::types::{EdgeKind, Node};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Reads facts, proposes edges.
pub trait Detector: Send + Sync {
    fn name(&self) -> &'static str;

    /// Edge kinds this detector may propose.
    fn produces(&self) -> &[EdgeKind];

    fn detect(&self, facts: &FactStore, index: &NodeIndex) -> Result<Vec<EdgeProposal>>;
}

/// A detector that returned an error or panicked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorFailure {
    pub detector: String,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct Detection {
    pub proposals: Vec<EdgeProposal>,
    pub failures: Vec<DetectorFailure>,
}

/// Ordered detector registry.
pub struct DetectorRegistry {
    detectors: Vec<Box<dyn Detector>>,
}

impl DetectorRegistry {
    pub fn empty() -> Self {
        Self { detectors: Vec::new() }
    }

    pub fn default_detectors(catalog: Arc<dyn DataCatalog>) -> Self {
        Self::empty()
            .with_detector(Box::new(StructuralDetector))
            .with_detector(Box::new(InheritanceDetector))
            .with_detector(Box::new(AnnotationDetector))
            .with_detector(Box::new(SignatureDetector))
            .with_detector(Box::new(CallDetector))
            .with_detector(Box::new(ThrowsDetector))
            .with_detector(Box::new(IntegrationDetector))
            .with_detector(Box::new(SqlDetector::new(catalog)))
            .with_detector(Box::new(ConfigDetector))
    }

    pub fn with_detector(mut self, detector: Box<dyn Detector>) -> Self {
        self.detectors.push(detector);
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.detectors.iter().map(|d| d.name()).collect()
    }

    /// Run every enabled detector. Outputs keep registry order.
    pub fn run(&self, facts: &FactStore, index: &NodeIndex, config: &LinkerConfig) -> Detection {
        let enabled: Vec<&Box<dyn Detector>> = self
            .detectors
            .iter()
            .filter(|d| config.detector_enabled(d.name()))
            .collect();

        let run = |detector: &&Box<dyn Detector>| {
            let name = detector.name();
            let outcome = match catch_unwind(AssertUnwindSafe(|| detector.detect(facts, index))) {
                Ok(Ok(proposals)) => Ok(proposals),
                Ok(Err(e)) => Err(e.to_string()),
                Err(payload) => Err(format!("panicked: {}", panic_message(payload.as_ref()))),
            };
            (name, outcome)
        };

        let outcomes: Vec<_> = if config.parallel {
            enabled.par_iter().map(run).collect()
        } else {
            enabled.iter().map(run).collect()
        };

        let mut detection = Detection::default();
        for (name, outcome) in outcomes {
            match outcome {
                Ok(proposals) => {
                    log::debug!("Detector {} proposed {} edges", name, proposals.len());
                    detection.proposals.extend(proposals.into_iter().map(|p| {
                        if p.detector.is_empty() {
                            p.with_detector(name)
                        } else {
                            p
                        }
                    }));
                }
                Err(error) => {
                    log::warn!("Detector {} failed: {}", name, error);
                    detection.failures.push(DetectorFailure {
                        detector: name.to_string(),
                        error,
                    });
                }
            }
        }
        detection
    }
}

/// Import and package scope of a node: its own, else its owner's.
pub(crate) fn scope<'a>(node: &'a Node, index: &'a NodeIndex) -> (&'a [String], Option<&'a str>) {
    let owner = node.meta.owner_fqn.as_deref().and_then(|o| index.by_fqn(o));
    let imports = if node.meta.imports.is_empty() {
        owner.map(|o| o.meta.imports.as_slice()).unwrap_or(&[])
    } else {
        node.meta.imports.as_slice()
    };
    let pkg = node
        .meta
        .pkg_fqn
        .as_deref()
        .or_else(|| owner.and_then(|o| o.meta.pkg_fqn.as_deref()));
    (imports, pkg)
}

/// Resolve a type name written inside `origin`.
pub(crate) fn resolve_from<'a>(index: &'a NodeIndex, origin: &'a Node, name: &str) -> Option<(&'a Node, Resolution)> {
    let (imports, pkg) = scope(origin, index);
    index.resolve_type(name, imports, pkg)
}

/// Evidence for `fact` seen at `origin`, tagged with how the target resolved.
pub(crate) fn evidence(fact: &Fact, origin: &Node, resolution: Resolution) -> Evidence {
    Evidence::from_fact(fact, Some(origin), resolution.confidence()).with_meta("resolution", resolution.as_str())
}

#[cfg(test)]
mod tests;
