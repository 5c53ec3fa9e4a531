//! Declaration planning and node materialization.
//!
//! Each [`RawDeclaration`] is planned into idempotent [`MutationCommand`]s,
//! which the executor applies through the [`NodeBuilder`] against one
//! build's [`BuildState`]. Validation failures abort a single declaration;
//! storage failures abort the build.

mod api_metadata;
mod config;
mod executor;
mod kinds;
mod node_builder;
mod normalize;
mod planner;
mod state;
mod validator;

pub use api_metadata::{
    attribute, first_quoted, ApiContext, ApiLevel, ApiMetadataCollector, ApiMetadataExtractor,
    GrpcEndpointExtractor, HttpEndpointExtractor, MessageBrokerExtractor,
};
pub use config::BuilderConfig;
pub use executor::{parse_doc_tags, CommandExecutor};
pub use kinds::{BuiltinKindRule, KindContext, KindRefiner, KindRule};
pub use node_builder::{NodeBuilder, NodeDraft, NodeStats, UpsertOutcome};
pub use normalize::{content_hash, count_lines, derive_span, truncate_source, TRUNCATION_MARKER};
pub use planner::{base_kind, field_fqn, function_fqn, plan, type_fqn, MutationCommand};
pub use state::{BuildState, CacheSlot, FileContext};
pub use validator::NodeValidator;

use crate::declarations::RawDeclaration;
use crate::error::{GraphError, Result};
use crate::storage::GraphStore;
use crate::types::ApplicationId;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A declaration that was skipped, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclarationError {
    pub declaration: String,
    pub command: String,
    pub reason: String,
}

/// Outcome of materializing one application's declarations.
#[derive(Debug, Clone, Default)]
pub struct MaterializeReport {
    pub stats: NodeStats,
    pub errors: Vec<DeclarationError>,
    pub declarations: u64,
}

/// Turns declarations into persisted nodes.
pub struct GraphBuilder {
    store: Arc<dyn GraphStore>,
    config: BuilderConfig,
    refiner: KindRefiner,
    api: ApiMetadataCollector,
}

impl GraphBuilder {
    pub fn new(store: Arc<dyn GraphStore>, config: BuilderConfig) -> Self {
        Self {
            store,
            config,
            refiner: KindRefiner::default_rules(),
            api: ApiMetadataCollector::default_extractors(),
        }
    }

    pub fn with_refiner(mut self, refiner: KindRefiner) -> Self {
        self.refiner = refiner;
        self
    }

    pub fn with_api_collector(mut self, api: ApiMetadataCollector) -> Self {
        self.api = api;
        self
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// Plan and apply every declaration for `app`, in order.
    ///
    /// `cancel` is polled between declarations.
    pub fn materialize<I>(&self, app: ApplicationId, decls: I, cancel: &AtomicBool) -> Result<MaterializeReport>
    where
        I: IntoIterator<Item = RawDeclaration>,
    {
        self.config.validate()?;

        let mut state = BuildState::new(app);
        let mut builder = NodeBuilder::new(self.store.clone(), self.config.clone());
        let mut errors = Vec::new();
        let mut declarations = 0u64;

        {
            let mut exec = CommandExecutor::new(&mut builder, &self.refiner, &self.api, self.store.as_ref());
            for decl in decls {
                if cancel.load(Ordering::Relaxed) {
                    return Err(GraphError::Cancelled);
                }
                declarations += 1;
                let label = decl.label();
                for cmd in plan(&decl) {
                    let name = cmd.name();
                    match exec.execute(&mut state, cmd) {
                        Ok(_) => {}
                        Err(e) if e.is_declaration_scoped() => {
                            log::warn!("Skipping declaration {} ({}): {}", label, name, e);
                            errors.push(DeclarationError {
                                declaration: label.clone(),
                                command: name.to_string(),
                                reason: e.to_string(),
                            });
                            exec.record_failure();
                            break;
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
        }

        let stats = builder.stats();
        log::info!(
            "Materialized {} declarations: {} created, {} updated, {} skipped, {} failed ({} cached nodes)",
            declarations,
            stats.created,
            stats.updated,
            stats.skipped,
            stats.failed,
            state.cached_nodes()
        );

        Ok(MaterializeReport {
            stats,
            errors,
            declarations,
        })
    }
}

#[cfg(test)]
mod tests;
