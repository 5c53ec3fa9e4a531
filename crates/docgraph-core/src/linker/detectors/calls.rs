use crate::error::Result;
use crate::facts::{Fact, FactKind, FactStore};
use crate::linker::detectors::{evidence, resolve_from, Detector};
use crate::linker::index::{NodeIndex, Resolution};
use crate::linker::proposal::EdgeProposal;
use crate::types::{EdgeKind, Node};

/// CALLS_CODE from a function to the callables its usages name.
///
/// Every overload matching one usage is proposed in the same exclusivity
/// slot, so at most one of them survives arbitration.
pub struct CallDetector;

impl Detector for CallDetector {
    fn name(&self) -> &'static str {
        "calls"
    }

    fn produces(&self) -> &[EdgeKind] {
        &[EdgeKind::CallsCode]
    }

    fn detect(&self, facts: &FactStore, index: &NodeIndex) -> Result<Vec<EdgeProposal>> {
        let mut out = Vec::new();
        for fact in facts.by_kind(FactKind::CallSite) {
            let Some(origin) = index.by_id(fact.origin) else {
                continue;
            };
            let member = fact.meta("member").unwrap_or(fact.target.as_str());
            match fact.meta("usage") {
                Some("dot") => {
                    let receiver = fact.meta("receiver").unwrap_or_default();
                    if let Some((recv_fqn, resolution)) = receiver_type(index, origin, receiver) {
                        propose(&mut out, fact, origin, index.by_base_fqn(&format!("{}.{}", recv_fqn, member)), resolution);
                    }
                }
                _ => simple_usage(&mut out, fact, origin, index, member),
            }
        }
        Ok(out)
    }
}

fn simple_usage(out: &mut Vec<EdgeProposal>, fact: &Fact, origin: &Node, index: &NodeIndex, name: &str) {
    if let Some(owner) = origin.meta.owner_fqn.as_deref() {
        let candidates = index.by_base_fqn(&format!("{}.{}", owner, name));
        if !candidates.is_empty() {
            propose(out, fact, origin, candidates, Resolution::Exact);
            return;
        }
    }
    if let Some(pkg) = origin.meta.pkg_fqn.as_deref() {
        let candidates = index.by_base_fqn(&format!("{}.{}", pkg, name));
        if !candidates.is_empty() {
            propose(out, fact, origin, candidates, Resolution::Package);
            return;
        }
    }
    // `Order(...)`: a constructor call.
    if fact.flag("is_call") {
        if let Some((target, resolution)) = resolve_from(index, origin, name) {
            if target.id != origin.id && !target.fqn.contains('(') {
                let ev = evidence(fact, origin, resolution).with_meta("call", "constructor");
                out.push(EdgeProposal::to_node(EdgeKind::CallsCode, origin.id, target.id, ev));
            }
        }
    }
}

/// FQN of the type a dot usage's receiver denotes.
fn receiver_type<'a>(index: &'a NodeIndex, origin: &'a Node, receiver: &str) -> Option<(String, Resolution)> {
    let receiver = receiver.trim();
    let owner = origin.meta.owner_fqn.as_deref();
    if receiver.is_empty() || receiver == "this" || receiver == "super" {
        return owner.map(|o| (o.to_string(), Resolution::Exact));
    }

    if receiver.chars().next().is_some_and(char::is_uppercase) {
        return resolve_from(index, origin, receiver).map(|(n, r)| (n.fqn.clone(), r));
    }

    // A field of the owner: follow its declared type.
    if let Some(owner) = owner {
        let declared = index
            .by_fqn(&format!("{}.{}", owner, receiver))
            .and_then(|field| field.meta.return_type.as_deref().map(|t| (field, t)));
        if let Some((field, ty)) = declared {
            if let Some((node, r)) = resolve_from(index, field, ty) {
                return Some((node.fqn.clone(), r));
            }
        }
        return Some((owner.to_string(), Resolution::SimpleName));
    }
    None
}

fn propose(out: &mut Vec<EdgeProposal>, fact: &Fact, origin: &Node, candidates: Vec<&Node>, resolution: Resolution) {
    let candidates: Vec<&Node> = candidates.into_iter().filter(|c| c.id != origin.id).collect();
    let Some(first) = candidates.first() else {
        return;
    };
    let slot = (candidates.len() > 1).then(|| format!("call:{}", first.base_fqn()));
    for target in &candidates {
        let mut p = EdgeProposal::to_node(EdgeKind::CallsCode, origin.id, target.id, evidence(fact, origin, resolution));
        if let Some(slot) = &slot {
            p = p.with_slot(slot.clone());
        }
        out.push(p);
    }
}
