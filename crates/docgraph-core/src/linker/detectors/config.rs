use crate::error::Result;
use crate::facts::{FactKind, FactStore};
use crate::linker::detectors::Detector;
use crate::linker::proposal::{EdgeProposal, Evidence};
use crate::linker::NodeIndex;
use crate::types::{EdgeKind, NodeId};

const CONFIG_CONFIDENCE: f32 = 0.8;

/// CONFIGURES from a properties binding to the nodes reading its keys.
pub struct ConfigDetector;

fn covers(prefix: &str, key: &str) -> bool {
    key == prefix || key.strip_prefix(prefix).is_some_and(|rest| rest.starts_with('.'))
}

impl Detector for ConfigDetector {
    fn name(&self) -> &'static str {
        "config"
    }

    fn produces(&self) -> &[EdgeKind] {
        &[EdgeKind::Configures]
    }

    fn detect(&self, facts: &FactStore, index: &NodeIndex) -> Result<Vec<EdgeProposal>> {
        let bindings: Vec<(&str, NodeId)> = facts
            .by_kind(FactKind::ConfigReference)
            .filter(|f| f.meta("role") == Some("binding"))
            .map(|f| (f.target.as_str(), f.origin))
            .collect();
        if bindings.is_empty() {
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        for fact in facts.by_kind(FactKind::ConfigReference) {
            if fact.meta("role") != Some("placeholder") {
                continue;
            }
            let best = bindings
                .iter()
                .filter(|(prefix, _)| covers(prefix, &fact.target))
                .max_by_key(|(prefix, _)| prefix.len());
            let Some(&(prefix, binding)) = best else {
                continue;
            };
            if binding == fact.origin {
                continue;
            }
            let mut ev = Evidence::from_fact(fact, index.by_id(fact.origin), CONFIG_CONFIDENCE)
                .with_meta("prefix", prefix);
            if let Some(value) = fact.meta("value") {
                ev = ev.with_meta("value", value);
            }
            out.push(EdgeProposal::to_node(EdgeKind::Configures, binding, fact.origin, ev));
        }
        Ok(out)
    }
}
