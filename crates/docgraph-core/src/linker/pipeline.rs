//! Edge postprocessing: normalize, merge, arbitrate, validate.

use crate::error::{GraphError, Result};
use crate::linker::config::{LinkerConfig, MergeRule};
use crate::linker::index::NodeIndex;
use crate::linker::proposal::{EdgeProposal, EdgeTarget, ValidationResult};
use crate::types::{EdgeKind, NodeId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Resolve targets and drop proposals that cannot become edges.
///
/// Returns the survivors in input order and the number dropped.
pub fn normalize(proposals: Vec<EdgeProposal>, index: &NodeIndex) -> (Vec<EdgeProposal>, usize) {
    let input = proposals.len();
    let mut out = Vec::with_capacity(input);

    for mut p in proposals {
        if let EdgeTarget::Unresolved(name) = &p.target {
            match index.resolve_target(name) {
                Some(node) => p.target = EdgeTarget::Node(node.id),
                None => {
                    log::debug!("Dropping {} from {}: unresolved target {}", p.kind, p.source, name.trim());
                    continue;
                }
            }
        }
        if p.kind.forbids_self_loop() && p.target_id() == Some(p.source) {
            log::debug!("Dropping {} self-loop on {}", p.kind, p.source);
            continue;
        }
        if p.evidence.is_empty() {
            log::debug!("Dropping {} from {}: no evidence", p.kind, p.source);
            continue;
        }
        out.push(p);
    }

    let dropped = input - out.len();
    (out, dropped)
}

fn check_confidence(c: f32, what: &str) -> Result<()> {
    if c.is_finite() && (0.0..=1.0).contains(&c) {
        Ok(())
    } else {
        Err(GraphError::Invariant(format!("{} confidence {} outside [0, 1]", what, c)))
    }
}

/// Fold proposals with the same (source, target, kind) into one.
///
/// Evidence lists are concatenated and confidences combined with `rule`.
/// The merged confidence is never below the strongest input. Output is in
/// key order.
///
/// An unslotted input makes the merged proposal unslotted: the edge was
/// found without ambiguity and is not subject to arbitration. Otherwise the
/// lexically smallest slot is kept, so the result does not depend on input
/// order.
pub fn merge(proposals: Vec<EdgeProposal>, rule: MergeRule) -> Result<Vec<EdgeProposal>> {
    let mut groups: BTreeMap<(NodeId, NodeId, EdgeKind), (EdgeProposal, Vec<f32>)> = BTreeMap::new();

    for p in proposals {
        let key = p
            .key()
            .ok_or_else(|| GraphError::Invariant(format!("{} proposal from {} reached merge unresolved", p.kind, p.source)))?;
        check_confidence(p.confidence, "proposal")?;
        if p.evidence.is_empty() {
            return Err(GraphError::Invariant(format!(
                "{} proposal {} -> {} has no evidence",
                p.kind, key.0, key.1
            )));
        }
        for ev in &p.evidence {
            check_confidence(ev.confidence, "evidence")?;
        }

        match groups.get_mut(&key) {
            Some((acc, confidences)) => {
                confidences.push(p.confidence);
                acc.evidence.extend(p.evidence);
                acc.cross_repository |= p.cross_repository;
                acc.slot = match (acc.slot.take(), p.slot) {
                    (Some(a), Some(b)) => Some(a.min(b)),
                    _ => None,
                };
            }
            None => {
                let c = p.confidence;
                groups.insert(key, (p, vec![c]));
            }
        }
    }

    let mut merged = Vec::with_capacity(groups.len());
    for (_, (mut p, confidences)) in groups {
        let strongest = confidences.iter().copied().fold(0.0, f32::max);
        let combined = rule.combine(&confidences).max(strongest);
        check_confidence(combined, "merged")?;
        p.confidence = combined;
        merged.push(p);
    }
    Ok(merged)
}

/// Survivors and losers of slot arbitration.
#[derive(Debug, Clone, Default)]
pub struct Arbitration {
    pub kept: Vec<EdgeProposal>,
    pub arbitrated_out: Vec<EdgeProposal>,
}

/// Ordering where the preferred proposal sorts first.
fn preference(a: &EdgeProposal, b: &EdgeProposal, config: &LinkerConfig) -> Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then_with(|| config.priority(b.kind).cmp(&config.priority(a.kind)))
        .then_with(|| a.target_id().cmp(&b.target_id()))
        .then_with(|| a.kind.as_str().cmp(b.kind.as_str()))
}

fn sort_by_key(proposals: &mut [EdgeProposal]) {
    proposals.sort_by(|a, b| {
        a.source
            .cmp(&b.source)
            .then_with(|| a.target_id().cmp(&b.target_id()))
            .then_with(|| a.kind.cmp(&b.kind))
    });
}

/// Keep one proposal per (source, slot); unslotted proposals pass through.
pub fn arbitrate(proposals: Vec<EdgeProposal>, config: &LinkerConfig) -> Arbitration {
    let mut result = Arbitration::default();
    let mut slots: BTreeMap<(NodeId, String), Vec<EdgeProposal>> = BTreeMap::new();

    for p in proposals {
        match p.slot.clone() {
            Some(slot) => slots.entry((p.source, slot)).or_default().push(p),
            None => result.kept.push(p),
        }
    }

    for ((source, slot), mut candidates) in slots {
        candidates.sort_by(|a, b| preference(a, b, config));
        let mut candidates = candidates.into_iter();
        if let Some(winner) = candidates.next() {
            for loser in candidates {
                log::debug!(
                    "Slot {} on {}: {} ({:.2}) loses to {} ({:.2})",
                    slot,
                    source,
                    loser.kind,
                    loser.confidence,
                    winner.kind,
                    winner.confidence
                );
                result.arbitrated_out.push(loser);
            }
            result.kept.push(winner);
        }
    }

    sort_by_key(&mut result.kept);
    sort_by_key(&mut result.arbitrated_out);
    result
}

/// Check one proposal against the index and the configured thresholds.
pub fn validate(proposal: &EdgeProposal, index: &NodeIndex, config: &LinkerConfig) -> ValidationResult {
    let Some(target_id) = proposal.target_id() else {
        return ValidationResult::rejected("target is unresolved");
    };
    let Some(source) = index.by_id(proposal.source) else {
        return ValidationResult::rejected(format!("source node {} not found", proposal.source));
    };
    let Some(target) = index.by_id(target_id) else {
        return ValidationResult::rejected(format!("target node {} not found", target_id));
    };

    if source.application_id != target.application_id && !proposal.cross_repository {
        return ValidationResult::rejected(format!(
            "{} -> {} crosses applications without cross_repository",
            source.fqn, target.fqn
        ));
    }

    let threshold = config.threshold(proposal.kind);
    if proposal.confidence < threshold {
        let message = format!(
            "confidence {:.2} below {} threshold {:.2}",
            proposal.confidence, proposal.kind, threshold
        );
        return ValidationResult::rejected(message.clone()).with_warning(message);
    }

    ValidationResult::ok()
}

/// A proposal that failed validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    pub proposal: EdgeProposal,
    pub result: ValidationResult,
}

/// What happened to the proposals of one link pass.
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub input: usize,
    pub normalized_out: usize,
    /// Proposals folded into another with the same key.
    pub merged: usize,
    pub arbitrated_out: Vec<EdgeProposal>,
    pub rejected: Vec<Rejection>,
    pub accepted: Vec<EdgeProposal>,
    pub warnings: Vec<String>,
}

/// The four postprocessing stages in order.
pub struct EdgePipeline<'a> {
    config: &'a LinkerConfig,
}

impl<'a> EdgePipeline<'a> {
    pub fn new(config: &'a LinkerConfig) -> Self {
        Self { config }
    }

    pub fn run(&self, proposals: Vec<EdgeProposal>, index: &NodeIndex) -> Result<PipelineReport> {
        let mut report = PipelineReport {
            input: proposals.len(),
            ..Default::default()
        };

        let (normalized, dropped) = normalize(proposals, index);
        report.normalized_out = dropped;

        let before_merge = normalized.len();
        let merged = merge(normalized, self.config.merge_rule)?;
        report.merged = before_merge - merged.len();

        let arbitration = arbitrate(merged, self.config);
        report.arbitrated_out = arbitration.arbitrated_out;

        for proposal in arbitration.kept {
            let result = validate(&proposal, index, self.config);
            report.warnings.extend(result.warnings.iter().cloned());
            if result.valid {
                log::debug!(
                    "Accepted {} {} -> {:?} ({:.2})",
                    proposal.kind,
                    proposal.source,
                    proposal.target,
                    proposal.confidence
                );
                report.accepted.push(proposal);
            } else {
                log::warn!(
                    "Rejected {} from {}: {}",
                    proposal.kind,
                    proposal.source,
                    result.message.as_deref().unwrap_or("invalid")
                );
                report.rejected.push(Rejection { proposal, result });
            }
        }

        Ok(report)
    }
}
