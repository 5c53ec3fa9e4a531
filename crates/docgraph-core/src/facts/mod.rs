//! Fact extraction: typed evidence units pulled from materialized nodes.
//!
//! A [`FactSource`] reads the node index and application config and emits
//! [`Fact`]s. Sources are independent; the [`FactExtractor`] runs them (in
//! parallel when enabled), isolates failures, and appends their output to a
//! [`FactStore`] in registry order.

mod api;
mod code;
mod config;

pub use api::ApiMetadataSource;
pub use code::{sql_tables, CodeUsageSource, SqlTables};
pub use config::{placeholders, resolve_placeholders, ConfigSource, Placeholder};

use crate::error::{panic_message, Result};
use crate::linker::NodeIndex;
use crate::types::{Application, NodeId};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// What a fact says about its origin node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FactKind {
    /// Origin is declared inside `target` (package or owning type).
    Member,
    Supertype,
    Annotation,
    TypeReference,
    CallSite,
    Throws,
    HttpCall,
    TopicProduce,
    TopicConsume,
    SqlRead,
    SqlWrite,
    ConfigReference,
}

impl FactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FactKind::Member => "member",
            FactKind::Supertype => "supertype",
            FactKind::Annotation => "annotation",
            FactKind::TypeReference => "type-reference",
            FactKind::CallSite => "call-site",
            FactKind::Throws => "throws",
            FactKind::HttpCall => "http-call",
            FactKind::TopicProduce => "topic-produce",
            FactKind::TopicConsume => "topic-consume",
            FactKind::SqlRead => "sql-read",
            FactKind::SqlWrite => "sql-write",
            FactKind::ConfigReference => "config-reference",
        }
    }
}

impl fmt::Display for FactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of evidence: `origin` relates to the (unresolved) `target`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub kind: FactKind,
    pub origin: NodeId,
    pub target: String,
    pub metadata: BTreeMap<String, String>,
}

impl Fact {
    pub fn new(kind: FactKind, origin: NodeId, target: impl Into<String>) -> Self {
        Self {
            kind,
            origin,
            target: target.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    pub fn flag(&self, key: &str) -> bool {
        self.meta(key) == Some("true")
    }
}

/// Append-only fact collection for one build generation.
#[derive(Debug, Clone, Default)]
pub struct FactStore {
    generation: u64,
    facts: Vec<Fact>,
    by_kind: HashMap<FactKind, Vec<usize>>,
}

impl FactStore {
    pub fn new(generation: u64) -> Self {
        Self {
            generation,
            ..Default::default()
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn append(&mut self, fact: Fact) {
        self.by_kind.entry(fact.kind).or_default().push(self.facts.len());
        self.facts.push(fact);
    }

    pub fn extend(&mut self, facts: impl IntoIterator<Item = Fact>) {
        for fact in facts {
            self.append(fact);
        }
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    pub fn all(&self) -> &[Fact] {
        &self.facts
    }

    /// Facts of `kind`, in insertion order.
    pub fn by_kind(&self, kind: FactKind) -> impl Iterator<Item = &Fact> + '_ {
        self.by_kind
            .get(&kind)
            .into_iter()
            .flat_map(move |ids| ids.iter().map(move |&i| &self.facts[i]))
    }

    pub fn count(&self, kind: FactKind) -> usize {
        self.by_kind.get(&kind).map(Vec::len).unwrap_or(0)
    }
}

/// Inputs shared by all sources.
pub struct FactContext<'a> {
    pub application: &'a Application,
    pub index: &'a NodeIndex,
}

/// Independent producer of facts.
pub trait FactSource: Send + Sync {
    fn name(&self) -> &'static str;

    fn supports(&self, _application: &Application) -> bool {
        true
    }

    fn extract_facts(&self, ctx: &FactContext<'_>) -> Result<Vec<Fact>>;
}

/// A source that returned an error or panicked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFailure {
    pub source: String,
    pub error: String,
}

/// Result of one extraction pass.
#[derive(Debug, Default)]
pub struct FactExtraction {
    pub store: FactStore,
    pub failures: Vec<SourceFailure>,
}

/// Ordered registry of fact sources.
pub struct FactExtractor {
    sources: Vec<Box<dyn FactSource>>,
    parallel: bool,
}

impl Default for FactExtractor {
    fn default() -> Self {
        Self::default_sources()
    }
}

impl FactExtractor {
    pub fn empty() -> Self {
        Self {
            sources: Vec::new(),
            parallel: true,
        }
    }

    pub fn default_sources() -> Self {
        Self::empty()
            .with_source(Box::new(CodeUsageSource))
            .with_source(Box::new(ApiMetadataSource))
            .with_source(Box::new(ConfigSource))
    }

    pub fn with_source(mut self, source: Box<dyn FactSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Run every supporting source and collect its facts into a fresh store.
    pub fn extract(&self, ctx: &FactContext<'_>, generation: u64) -> FactExtraction {
        let run = |source: &Box<dyn FactSource>| -> (&'static str, std::result::Result<Vec<Fact>, String>) {
            let name = source.name();
            if !source.supports(ctx.application) {
                return (name, Ok(Vec::new()));
            }
            let outcome = match catch_unwind(AssertUnwindSafe(|| source.extract_facts(ctx))) {
                Ok(Ok(facts)) => Ok(facts),
                Ok(Err(e)) => Err(e.to_string()),
                Err(payload) => Err(format!("panicked: {}", panic_message(payload.as_ref()))),
            };
            (name, outcome)
        };

        let outcomes: Vec<_> = if self.parallel {
            self.sources.par_iter().map(run).collect()
        } else {
            self.sources.iter().map(run).collect()
        };

        let mut extraction = FactExtraction {
            store: FactStore::new(generation),
            failures: Vec::new(),
        };
        for (name, outcome) in outcomes {
            match outcome {
                Ok(facts) => {
                    log::debug!("Fact source {} produced {} facts", name, facts.len());
                    extraction.store.extend(facts);
                }
                Err(error) => {
                    log::warn!("Fact source {} failed: {}", name, error);
                    extraction.failures.push(SourceFailure {
                        source: name.to_string(),
                        error,
                    });
                }
            }
        }
        extraction
    }
}

#[cfg(test)]
mod tests;
