//! Linker: evidence-backed edge discovery over materialized nodes.
//!
//! One pass:
//! - Indexes the application's nodes
//! - Extracts facts from their metadata and the application config
//! - Runs the detector registry to propose edges
//! - Normalizes, merges, arbitrates and validates the proposals

mod config;
mod detectors;
mod explain;
mod index;
mod metrics;
mod pass;
mod pipeline;
mod proposal;


pub use config::{LinkerConfig, MergeRule};
pub use detectors::{
    AnnotationDetector, CallDetector, ConfigDetector, Detection, Detector, DetectorFailure, DetectorRegistry,
    InheritanceDetector, IntegrationDetector, SignatureDetector, SqlDetector, StructuralDetector, ThrowsDetector,
};
pub use explain::Explainer;
pub use index::{clean_type_name, is_virtual, type_tokens, NodeIndex, Resolution};
pub use metrics::LinkerMetrics;
pub use pass::{LinkOutcome, LinkPass};
pub use pipeline::{arbitrate, merge, normalize, validate, Arbitration, EdgePipeline, PipelineReport, Rejection};
pub use proposal::{EdgeProposal, EdgeTarget, Evidence, ValidationResult};
