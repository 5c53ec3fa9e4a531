use crate::error::Result;
use crate::facts::{FactKind, FactStore};
use crate::linker::detectors::{evidence, resolve_from, Detector};
use crate::linker::index::{type_tokens, NodeIndex, Resolution};
use crate::linker::proposal::{EdgeProposal, Evidence};
use crate::types::{EdgeKind, NodeKind};

/// CONTAINS from a package to its types and from a type to its members.
pub struct StructuralDetector;

impl Detector for StructuralDetector {
    fn name(&self) -> &'static str {
        "structural"
    }

    fn produces(&self) -> &[EdgeKind] {
        &[EdgeKind::Contains]
    }

    fn detect(&self, facts: &FactStore, index: &NodeIndex) -> Result<Vec<EdgeProposal>> {
        let mut out = Vec::new();
        for fact in facts.by_kind(FactKind::Member) {
            let (Some(member), Some(container)) = (index.by_id(fact.origin), index.by_fqn(&fact.target)) else {
                continue;
            };
            let ev = Evidence::from_fact(fact, Some(member), 1.0)
                .with_meta("role", fact.meta("role").unwrap_or("owner"));
            out.push(EdgeProposal::to_node(EdgeKind::Contains, container.id, member.id, ev));
        }
        Ok(out)
    }
}

/// IMPLEMENTS or INHERITS for each resolved supertype, plus DEPENDS_ON.
pub struct InheritanceDetector;

impl Detector for InheritanceDetector {
    fn name(&self) -> &'static str {
        "inheritance"
    }

    fn produces(&self) -> &[EdgeKind] {
        &[EdgeKind::Implements, EdgeKind::Inherits, EdgeKind::DependsOn]
    }

    fn detect(&self, facts: &FactStore, index: &NodeIndex) -> Result<Vec<EdgeProposal>> {
        let mut out = Vec::new();
        for fact in facts.by_kind(FactKind::Supertype) {
            let Some(origin) = index.by_id(fact.origin) else {
                continue;
            };
            let Some((target, resolution)) = resolve_from(index, origin, &fact.target) else {
                continue;
            };
            let kind = if target.kind == NodeKind::Interface {
                EdgeKind::Implements
            } else {
                EdgeKind::Inherits
            };
            let ev = evidence(fact, origin, resolution);
            out.push(EdgeProposal::to_node(kind, origin.id, target.id, ev.clone()));
            out.push(EdgeProposal::to_node(EdgeKind::DependsOn, origin.id, target.id, ev));
        }
        Ok(out)
    }
}

/// ANNOTATED_WITH to annotation types present in the graph, plus DEPENDS_ON.
pub struct AnnotationDetector;

impl Detector for AnnotationDetector {
    fn name(&self) -> &'static str {
        "annotation"
    }

    fn produces(&self) -> &[EdgeKind] {
        &[EdgeKind::AnnotatedWith, EdgeKind::DependsOn]
    }

    fn detect(&self, facts: &FactStore, index: &NodeIndex) -> Result<Vec<EdgeProposal>> {
        let mut out = Vec::new();
        for fact in facts.by_kind(FactKind::Annotation) {
            let Some(origin) = index.by_id(fact.origin) else {
                continue;
            };
            let Some((target, resolution)) = resolve_from(index, origin, &fact.target) else {
                continue;
            };
            if target.id == origin.id {
                continue;
            }
            let mut ev = evidence(fact, origin, resolution);
            if let Some(raw) = fact.meta("raw") {
                ev = ev.with_snippet(raw);
            }
            out.push(EdgeProposal::to_node(EdgeKind::AnnotatedWith, origin.id, target.id, ev.clone()));
            out.push(EdgeProposal::to_node(EdgeKind::DependsOn, origin.id, target.id, ev));
        }
        Ok(out)
    }
}

/// DEPENDS_ON from the owning type (or a free function itself) to every type
/// named in a parameter, return or field type.
pub struct SignatureDetector;

impl Detector for SignatureDetector {
    fn name(&self) -> &'static str {
        "signature"
    }

    fn produces(&self) -> &[EdgeKind] {
        &[EdgeKind::DependsOn]
    }

    fn detect(&self, facts: &FactStore, index: &NodeIndex) -> Result<Vec<EdgeProposal>> {
        let mut out = Vec::new();
        for fact in facts.by_kind(FactKind::TypeReference) {
            let Some(origin) = index.by_id(fact.origin) else {
                continue;
            };
            let source = origin
                .meta
                .owner_fqn
                .as_deref()
                .and_then(|o| index.by_fqn(o))
                .unwrap_or(origin);

            for token in type_tokens(&fact.target) {
                let Some((target, resolution)) = resolve_from(index, origin, token) else {
                    continue;
                };
                if target.id == source.id || target.id == origin.id {
                    continue;
                }
                let ev = evidence(fact, origin, resolution)
                    .with_snippet(token)
                    .with_meta("role", fact.meta("role").unwrap_or("param"));
                out.push(EdgeProposal::to_node(EdgeKind::DependsOn, source.id, target.id, ev));
            }
        }
        Ok(out)
    }
}

/// THROWS to exception types present in the graph.
pub struct ThrowsDetector;

impl Detector for ThrowsDetector {
    fn name(&self) -> &'static str {
        "throws"
    }

    fn produces(&self) -> &[EdgeKind] {
        &[EdgeKind::Throws]
    }

    fn detect(&self, facts: &FactStore, index: &NodeIndex) -> Result<Vec<EdgeProposal>> {
        let mut out = Vec::new();
        for fact in facts.by_kind(FactKind::Throws) {
            let Some(origin) = index.by_id(fact.origin) else {
                continue;
            };
            if let Some((target, resolution)) = resolve_from(index, origin, &fact.target) {
                // A simple-name match only counts when it lands on an EXCEPTION node.
                if resolution == Resolution::SimpleName && target.kind != NodeKind::Exception {
                    continue;
                }
                let ev = evidence(fact, origin, resolution);
                out.push(EdgeProposal::to_node(EdgeKind::Throws, origin.id, target.id, ev));
            }
        }
        Ok(out)
    }
}
