use crate::catalog::DataCatalog;
use crate::error::Result;
use crate::facts::{FactKind, FactStore};
use crate::linker::detectors::Detector;
use crate::linker::index::NodeIndex;
use crate::linker::proposal::{EdgeProposal, Evidence};
use crate::types::EdgeKind;
use std::sync::Arc;

const SQL_CONFIDENCE: f32 = 0.8;

/// READS and WRITES from query methods to catalogued tables.
pub struct SqlDetector {
    catalog: Arc<dyn DataCatalog>,
}

impl SqlDetector {
    pub fn new(catalog: Arc<dyn DataCatalog>) -> Self {
        Self { catalog }
    }
}

impl Detector for SqlDetector {
    fn name(&self) -> &'static str {
        "sql"
    }

    fn produces(&self) -> &[EdgeKind] {
        &[EdgeKind::Reads, EdgeKind::Writes]
    }

    fn detect(&self, facts: &FactStore, index: &NodeIndex) -> Result<Vec<EdgeProposal>> {
        let mut out = Vec::new();
        for (fact_kind, edge_kind) in [(FactKind::SqlRead, EdgeKind::Reads), (FactKind::SqlWrite, EdgeKind::Writes)] {
            for fact in facts.by_kind(fact_kind) {
                let Some(table) = self.catalog.resolve_table(&fact.target) else {
                    log::debug!("Table {} not in catalog", fact.target);
                    continue;
                };
                let Some(node) = index.by_fqn(&table.node_fqn) else {
                    continue;
                };
                let mut ev = Evidence::from_fact(fact, index.by_id(fact.origin), SQL_CONFIDENCE)
                    .with_meta("table", table.qualified_name());
                if let Some(sql) = fact.meta("sql") {
                    ev = ev.with_snippet(sql);
                }
                out.push(EdgeProposal::to_node(edge_kind, fact.origin, node.id, ev));
            }
        }
        Ok(out)
    }
}
