//! One application build: materialize, enrich, link, sink.

use crate::builder::{BuilderConfig, DeclarationError, GraphBuilder};
use crate::catalog::DataCatalog;
use crate::declarations::RawDeclaration;
use crate::error::{GraphError, Result};
use crate::ingest::{collect_declarations, DeclarationSource};
use crate::library::{Enricher, InMemoryLibraryIndex, LibraryNodeIndex};
use crate::linker::{LinkPass, LinkerConfig, LinkerMetrics};
use crate::sink::GraphSink;
use crate::storage::{GraphStore, NodeFilter};
use crate::types::{Application, ApplicationId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Summary of one build, as handed back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildResult {
    pub application_id: ApplicationId,
    /// Nodes the application owns after the build.
    pub node_count: u64,
    /// Edges the application owns after the build.
    pub edge_count: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    pub nodes_created: u64,
    pub nodes_updated: u64,
    pub nodes_skipped: u64,
    pub nodes_failed: u64,

    pub edges_accepted: u64,
    /// Accepted edges that were not stored before this build.
    pub edges_inserted: u64,
    pub edges_rejected: u64,

    pub integration_nodes: u64,
    pub table_nodes: u64,
    pub library_edges: u64,

    /// Declarations skipped by validation.
    pub errors: Vec<DeclarationError>,
    pub warnings: Vec<String>,
}

/// Builds applications into the graph.
pub struct BuildEngine {
    store: Arc<dyn GraphStore>,
    builder: GraphBuilder,
    linker: LinkPass,
    catalog: Arc<dyn DataCatalog>,
    library: Arc<dyn LibraryNodeIndex>,
}

impl BuildEngine {
    pub fn new(
        store: Arc<dyn GraphStore>,
        builder_config: BuilderConfig,
        linker_config: LinkerConfig,
        catalog: Arc<dyn DataCatalog>,
    ) -> Self {
        Self {
            builder: GraphBuilder::new(store.clone(), builder_config),
            linker: LinkPass::new(linker_config, catalog.clone()),
            catalog,
            store,
            library: Arc::new(InMemoryLibraryIndex::default()),
        }
    }

    /// Enrich with library integration data before linking. Without one,
    /// enrichment still creates topic and table nodes.
    pub fn with_library(mut self, library: Arc<dyn LibraryNodeIndex>) -> Self {
        self.library = library;
        self
    }

    pub fn with_builder(mut self, builder: GraphBuilder) -> Self {
        self.builder = builder;
        self
    }

    pub fn with_link_pass(mut self, linker: LinkPass) -> Self {
        self.linker = linker;
        self
    }

    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }

    /// Run a full build of `app` from `decls`.
    ///
    /// `cancel` is checked between phases. A cancelled build returns
    /// `Cancelled` before any edge is written.
    pub fn build<I>(&self, app: &Application, decls: I, cancel: &AtomicBool) -> Result<BuildResult>
    where
        I: IntoIterator<Item = RawDeclaration>,
    {
        let mut metrics = LinkerMetrics::load(self.store.as_ref(), app.id)?.unwrap_or_default();
        metrics.begin_run();
        let started_at = Utc::now();
        log::info!("Building application {} ({})", app.key, app.id);

        let start = Instant::now();
        let materialized = self.builder.materialize(app.id, decls, cancel)?;
        metrics.declarations = materialized.declarations;
        metrics.nodes = materialized.stats;
        metrics.record_phase("materialize", start.elapsed().as_millis() as u64);
        check_cancel(cancel)?;

        let start = Instant::now();
        let enrichment = Enricher::new(self.store.clone(), self.library.clone())
            .with_catalog(self.catalog.clone())
            .enrich(app)?;
        metrics.integration_nodes = enrichment.virtual_nodes;
        metrics.table_nodes = enrichment.table_nodes;
        metrics.library_edges = enrichment.library_edges.written;
        metrics.library_edge_errors = enrichment.library_edges.errors;
        metrics.record_phase("enrich", start.elapsed().as_millis() as u64);
        check_cancel(cancel)?;

        let nodes = self.store.list_nodes(NodeFilter::new().for_application(app.id))?;
        let outcome = self.linker.run(app, nodes, &mut metrics)?;
        check_cancel(cancel)?;

        let start = Instant::now();
        let sunk = GraphSink::new(self.store.clone()).upsert_edges(&outcome.report.accepted)?;
        metrics.inserted = sunk.inserted;
        metrics.existing = sunk.existing;
        for proposal in &outcome.report.accepted {
            metrics.record(proposal.kind, 1);
        }
        metrics.record_phase("sink", start.elapsed().as_millis() as u64);

        metrics.finish_run();
        metrics.save(self.store.as_ref(), app.id)?;
        log::info!("{}", metrics.summary());

        Ok(BuildResult {
            application_id: app.id,
            node_count: self.store.count_nodes(NodeFilter::new().for_application(app.id))?,
            edge_count: self.store.count_edges(app.id)?,
            started_at,
            finished_at: metrics.finished_at.unwrap_or_else(Utc::now),
            nodes_created: materialized.stats.created,
            nodes_updated: materialized.stats.updated,
            nodes_skipped: materialized.stats.skipped,
            nodes_failed: materialized.stats.failed,
            edges_accepted: outcome.report.accepted.len() as u64,
            edges_inserted: sunk.inserted,
            edges_rejected: outcome.report.rejected.len() as u64,
            integration_nodes: metrics.integration_nodes,
            table_nodes: metrics.table_nodes,
            library_edges: metrics.library_edges,
            errors: materialized.errors,
            warnings: outcome.report.warnings,
        })
    }

    /// Drain `source`, then build.
    pub async fn build_from(
        &self,
        app: &Application,
        source: &dyn DeclarationSource,
        cancel: &AtomicBool,
    ) -> Result<BuildResult> {
        let decls = collect_declarations(source).await?;
        self.build(app, decls, cancel)
    }

    /// Metrics of the last completed build of `app`.
    pub fn metrics(&self, app: ApplicationId) -> Result<Option<LinkerMetrics>> {
        LinkerMetrics::load(self.store.as_ref(), app)
    }

    /// Remove the application's nodes, edges, library edges and metrics.
    /// Returns the number of removed nodes.
    pub fn delete_application(&self, app: ApplicationId) -> Result<u64> {
        let removed = self.store.delete_application(app)?;
        LinkerMetrics::delete(self.store.as_ref(), app)?;
        log::info!("Deleted application {}: {} nodes removed", app, removed);
        Ok(removed)
    }
}

fn check_cancel(cancel: &AtomicBool) -> Result<()> {
    if cancel.load(Ordering::Relaxed) {
        log::warn!("Build cancelled");
        return Err(GraphError::Cancelled);
    }
    Ok(())
}
