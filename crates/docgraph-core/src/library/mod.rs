//! Library enrichment: links application methods to the third-party
//! library methods they call and copies the integration points those
//! library methods carry.

mod enricher;
mod index;
mod sink;

pub use enricher::{virtual_node_ids, EnrichmentReport, Enricher};
pub use index::{extract_integration_points, InMemoryLibraryIndex, LibraryNode, LibraryNodeIndex};
pub use sink::{LibraryEdgeOutcome, LibraryEdgeSink};
