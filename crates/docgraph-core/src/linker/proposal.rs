use crate::facts::{Fact, FactKind};
use crate::types::{EdgeKind, Node, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One piece of support for a proposed edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub source_file: Option<String>,
    pub line: Option<i64>,
    pub snippet: Option<String>,
    pub fact_kind: FactKind,
    pub confidence: f32,
    pub metadata: BTreeMap<String, String>,
}

impl Evidence {
    pub fn new(fact_kind: FactKind, confidence: f32) -> Self {
        Self {
            source_file: None,
            line: None,
            snippet: None,
            fact_kind,
            confidence,
            metadata: BTreeMap::new(),
        }
    }

    /// Evidence for `fact`, located at its origin node.
    pub fn from_fact(fact: &Fact, origin: Option<&Node>, confidence: f32) -> Self {
        let mut ev = Self::new(fact.kind, confidence);
        if let Some(node) = origin {
            ev.source_file = node.file_path.clone();
            ev.line = node.span.map(|s| s.start);
        }
        ev.snippet = Some(fact.target.clone());
        ev
    }

    pub fn with_location(mut self, file: impl Into<String>, line: i64) -> Self {
        self.source_file = Some(file.into());
        self.line = Some(line);
        self
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// Where a proposal points: a known node, or a name still to be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeTarget {
    Node(NodeId),
    Unresolved(String),
}

/// A candidate edge with its supporting evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeProposal {
    pub kind: EdgeKind,
    pub source: NodeId,
    pub target: EdgeTarget,
    pub evidence: Vec<Evidence>,
    pub confidence: f32,

    /// Proposals sharing (source, slot) are mutually exclusive; only the
    /// strongest survives arbitration.
    pub slot: Option<String>,

    /// Allows the target to live in another application.
    pub cross_repository: bool,

    /// Detector that produced the proposal.
    pub detector: String,
}

impl EdgeProposal {
    pub fn new(kind: EdgeKind, source: NodeId, target: EdgeTarget, evidence: Evidence) -> Self {
        Self {
            kind,
            source,
            target,
            confidence: evidence.confidence,
            evidence: vec![evidence],
            slot: None,
            cross_repository: false,
            detector: String::new(),
        }
    }

    pub fn to_node(kind: EdgeKind, source: NodeId, target: NodeId, evidence: Evidence) -> Self {
        Self::new(kind, source, EdgeTarget::Node(target), evidence)
    }

    pub fn unresolved(kind: EdgeKind, source: NodeId, target: impl Into<String>, evidence: Evidence) -> Self {
        Self::new(kind, source, EdgeTarget::Unresolved(target.into()), evidence)
    }

    pub fn with_slot(mut self, slot: impl Into<String>) -> Self {
        self.slot = Some(slot.into());
        self
    }

    pub fn with_detector(mut self, detector: &str) -> Self {
        self.detector = detector.to_string();
        self
    }

    pub fn cross_repository(mut self) -> Self {
        self.cross_repository = true;
        self
    }

    pub fn target_id(&self) -> Option<NodeId> {
        match self.target {
            EdgeTarget::Node(id) => Some(id),
            EdgeTarget::Unresolved(_) => None,
        }
    }

    /// (source, target, kind) once the target is resolved.
    pub fn key(&self) -> Option<(NodeId, NodeId, EdgeKind)> {
        self.target_id().map(|t| (self.source, t, self.kind))
    }
}

/// Outcome of validating one proposal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub message: Option<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            message: None,
            warnings: Vec::new(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: Some(message.into()),
            warnings: Vec::new(),
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}
