use crate::catalog::DataCatalog;
use crate::error::Result;
use crate::facts::{FactContext, FactExtractor};
use crate::linker::config::LinkerConfig;
use crate::linker::detectors::DetectorRegistry;
use crate::linker::index::NodeIndex;
use crate::linker::metrics::LinkerMetrics;
use crate::linker::pipeline::{EdgePipeline, PipelineReport};
use crate::types::{Application, Node};
use std::sync::Arc;
use std::time::Instant;

/// Everything one link pass produced.
#[derive(Debug)]
pub struct LinkOutcome {
    pub index: NodeIndex,
    pub report: PipelineReport,
}

/// Facts, detection and postprocessing over one application's nodes.
pub struct LinkPass {
    config: LinkerConfig,
    extractor: FactExtractor,
    detectors: DetectorRegistry,
}

impl LinkPass {
    pub fn new(config: LinkerConfig, catalog: Arc<dyn DataCatalog>) -> Self {
        let extractor = FactExtractor::default_sources().with_parallel(config.parallel);
        Self {
            config,
            extractor,
            detectors: DetectorRegistry::default_detectors(catalog),
        }
    }

    pub fn with_extractor(mut self, extractor: FactExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_detectors(mut self, detectors: DetectorRegistry) -> Self {
        self.detectors = detectors;
        self
    }

    pub fn config(&self) -> &LinkerConfig {
        &self.config
    }

    /// Link `nodes`. Counters and phase timings go into `metrics`.
    pub fn run(&self, app: &Application, nodes: Vec<Node>, metrics: &mut LinkerMetrics) -> Result<LinkOutcome> {
        self.config.validate()?;

        let index = NodeIndex::new(nodes);

        let start = Instant::now();
        let extraction = self.extractor.extract(
            &FactContext {
                application: app,
                index: &index,
            },
            metrics.runs + 1,
        );
        metrics.facts += extraction.store.len() as u64;
        metrics.source_failures += extraction.failures.len() as u64;
        metrics.record_phase("facts", start.elapsed().as_millis() as u64);

        let start = Instant::now();
        let detection = self.detectors.run(&extraction.store, &index, &self.config);
        metrics.proposals += detection.proposals.len() as u64;
        metrics.detector_failures += detection.failures.len() as u64;
        metrics.record_phase("detect", start.elapsed().as_millis() as u64);

        let start = Instant::now();
        let report = EdgePipeline::new(&self.config).run(detection.proposals, &index)?;
        metrics.normalized_out += report.normalized_out as u64;
        metrics.merged += report.merged as u64;
        metrics.arbitrated_out += report.arbitrated_out.len() as u64;
        metrics.rejected += report.rejected.len() as u64;
        metrics.accepted += report.accepted.len() as u64;
        metrics.warnings += report.warnings.len() as u64;
        metrics.record_phase("pipeline", start.elapsed().as_millis() as u64);

        log::info!(
            "Linked {} nodes of {}: {} facts, {} proposals, {} accepted, {} rejected, {} arbitrated out",
            index.len(),
            app.key,
            extraction.store.len(),
            report.input,
            report.accepted.len(),
            report.rejected.len(),
            report.arbitrated_out.len()
        );

        Ok(LinkOutcome { index, report })
    }
}
