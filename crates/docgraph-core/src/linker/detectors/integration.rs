use crate::error::Result;
use crate::facts::{FactKind, FactStore};
use crate::linker::detectors::Detector;
use crate::linker::index::NodeIndex;
use crate::linker::proposal::{EdgeProposal, Evidence};
use crate::types::EdgeKind;

const HTTP_CONFIDENCE: f32 = 0.85;
const TOPIC_CONFIDENCE: f32 = 0.9;

/// CALLS_HTTP, PRODUCES and CONSUMES to virtual endpoint and topic nodes,
/// with resilience edges for flagged HTTP calls.
pub struct IntegrationDetector;

impl Detector for IntegrationDetector {
    fn name(&self) -> &'static str {
        "integration"
    }

    fn produces(&self) -> &[EdgeKind] {
        &[
            EdgeKind::CallsHttp,
            EdgeKind::RetriesTo,
            EdgeKind::TimeoutsTo,
            EdgeKind::CircuitBreakerTo,
            EdgeKind::Produces,
            EdgeKind::Consumes,
        ]
    }

    fn detect(&self, facts: &FactStore, index: &NodeIndex) -> Result<Vec<EdgeProposal>> {
        let mut out = Vec::new();

        for fact in facts.by_kind(FactKind::HttpCall) {
            let origin = index.by_id(fact.origin);
            let mut ev = Evidence::from_fact(fact, origin, HTTP_CONFIDENCE);
            for key in ["client_type", "http_method", "url"] {
                if let Some(v) = fact.meta(key) {
                    ev = ev.with_meta(key, v);
                }
            }
            out.push(EdgeProposal::unresolved(EdgeKind::CallsHttp, fact.origin, fact.target.clone(), ev.clone()));

            let flagged = [
                ("has_retry", EdgeKind::RetriesTo),
                ("has_timeout", EdgeKind::TimeoutsTo),
                ("has_circuit_breaker", EdgeKind::CircuitBreakerTo),
            ];
            for (flag, kind) in flagged {
                if fact.flag(flag) {
                    out.push(EdgeProposal::unresolved(kind, fact.origin, fact.target.clone(), ev.clone()));
                }
            }
        }

        for (fact_kind, edge_kind) in [
            (FactKind::TopicProduce, EdgeKind::Produces),
            (FactKind::TopicConsume, EdgeKind::Consumes),
        ] {
            for fact in facts.by_kind(fact_kind) {
                let mut ev = Evidence::from_fact(fact, index.by_id(fact.origin), TOPIC_CONFIDENCE);
                if let Some(broker) = fact.meta("broker") {
                    ev = ev.with_meta("broker", broker);
                }
                out.push(EdgeProposal::unresolved(edge_kind, fact.origin, fact.target.clone(), ev));
            }
        }

        Ok(out)
    }
}
