//! docgraph-core: builds a typed code graph from parser declarations and
//! links it with evidence-backed edges.

pub mod build;
pub mod builder;
pub mod catalog;
pub mod declarations;
pub mod error;
pub mod facts;
pub mod ingest;
pub mod library;
pub mod linker;
pub mod sink;
pub mod storage;
pub mod types;

pub use build::{BuildEngine, BuildResult};
pub use builder::{BuilderConfig, DeclarationError, GraphBuilder, MaterializeReport, NodeStats};
pub use catalog::{DataCatalog, InMemoryCatalog, TableRef};
pub use declarations::{RawDeclaration, RawField, RawFileUnit, RawFunction, RawPackage, RawType};
pub use error::{GraphError, Result};
pub use ingest::{collect_declarations, DeclarationSource, VecSource};
pub use library::{EnrichmentReport, Enricher, InMemoryLibraryIndex, LibraryNode, LibraryNodeIndex};
pub use linker::{
    EdgeProposal, EdgeTarget, Evidence, Explainer, LinkPass, LinkerConfig, LinkerMetrics, MergeRule, NodeIndex,
    ValidationResult,
};
pub use sink::GraphSink;
pub use storage::{GraphStore, MemoryStorage, NodeFilter, RedbStorage, StorageStats, CURRENT_SCHEMA_VERSION};
pub use types::*;
