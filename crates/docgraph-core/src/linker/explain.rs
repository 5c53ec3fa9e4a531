use crate::linker::index::NodeIndex;
use crate::linker::proposal::{EdgeProposal, EdgeTarget, ValidationResult};
use crate::types::NodeId;
use std::fmt::Write;

/// Human-readable accounts of proposals, for logs and the CLI.
pub struct Explainer<'a> {
    index: &'a NodeIndex,
}

impl<'a> Explainer<'a> {
    pub fn new(index: &'a NodeIndex) -> Self {
        Self { index }
    }

    fn label(&self, id: NodeId) -> String {
        self.index
            .by_id(id)
            .map(|n| n.fqn.clone())
            .unwrap_or_else(|| id.to_string())
    }

    fn target_label(&self, target: &EdgeTarget) -> String {
        match target {
            EdgeTarget::Node(id) => self.label(*id),
            EdgeTarget::Unresolved(name) => format!("{} (unresolved)", name),
        }
    }

    pub fn explain(&self, proposal: &EdgeProposal) -> String {
        let mut out = format!(
            "{} {} -> {} confidence={:.2}",
            proposal.kind,
            self.label(proposal.source),
            self.target_label(&proposal.target),
            proposal.confidence
        );
        if !proposal.detector.is_empty() {
            let _ = write!(out, " detector={}", proposal.detector);
        }
        if let Some(slot) = &proposal.slot {
            let _ = write!(out, " slot={}", slot);
        }
        for ev in &proposal.evidence {
            let _ = write!(out, "\n  - {} ({:.2})", ev.fact_kind, ev.confidence);
            match (&ev.source_file, ev.line) {
                (Some(file), Some(line)) => {
                    let _ = write!(out, " at {}:{}", file, line);
                }
                (Some(file), None) => {
                    let _ = write!(out, " in {}", file);
                }
                _ => {}
            }
            if let Some(snippet) = &ev.snippet {
                let _ = write!(out, ": {}", snippet);
            }
            if let Some(res) = ev.metadata.get("resolution") {
                let _ = write!(out, " [{}]", res);
            }
        }
        out
    }

    pub fn explain_rejection(&self, proposal: &EdgeProposal, result: &ValidationResult) -> String {
        let mut out = self.explain(proposal);
        let _ = write!(
            out,
            "\n  rejected: {}",
            result.message.as_deref().unwrap_or("no reason given")
        );
        for warning in &result.warnings {
            let _ = write!(out, "\n  warning: {}", warning);
        }
        out
    }
}
