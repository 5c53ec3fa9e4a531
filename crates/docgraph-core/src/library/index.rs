use crate::error::Result;
use crate::types::{base_fqn, IntegrationPoint, TopicOperation};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A class or method of a third-party library, as reported by bytecode
/// analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryNode {
    pub fqn: String,

    /// `METHOD`, `CLASS`, ...
    pub kind: String,

    /// Free-form analysis output. Integration data lives under
    /// `integrationAnalysis`.
    #[serde(default)]
    pub meta: Value,
}

impl LibraryNode {
    pub fn method(fqn: impl Into<String>, meta: Value) -> Self {
        Self {
            fqn: fqn.into(),
            kind: "METHOD".into(),
            meta,
        }
    }

    pub fn is_method(&self) -> bool {
        self.kind.eq_ignore_ascii_case("method")
    }

    fn integration_analysis(&self) -> Option<&Value> {
        self.meta.get("integrationAnalysis").filter(|v| v.is_object())
    }
}

/// Read-only lookup over library methods.
pub trait LibraryNodeIndex: Send + Sync {
    fn find_by_method_fqn(&self, method_fqn: &str) -> Option<&LibraryNode>;

    fn find_by_class_and_method(&self, class_fqn: &str, method: &str) -> Option<&LibraryNode>;

    /// Whether the method is a parent HTTP client that other clients delegate to.
    fn is_parent_client(&self, method_fqn: &str) -> bool {
        self.find_by_method_fqn(method_fqn)
            .and_then(|n| n.integration_analysis())
            .and_then(|a| a.get("isParentClient"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

fn strings(analysis: &Value, key: &str) -> Vec<String> {
    analysis
        .get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

fn flag(analysis: &Value, key: &str) -> bool {
    analysis.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// First object in `analysis[key]` whose `field` equals `value`.
fn call_for<'a>(analysis: &'a Value, key: &str, field: &str, value: &str) -> Option<&'a Value> {
    analysis
        .get(key)
        .and_then(Value::as_array)?
        .iter()
        .find(|c| c.get(field).and_then(Value::as_str) == Some(value))
}

fn str_field(call: Option<&Value>, field: &str) -> Option<String> {
    call.and_then(|c| c.get(field)).and_then(Value::as_str).map(str::to_string)
}

/// Integration points recorded in a library node's `integrationAnalysis`.
///
/// Every URL is paired with every HTTP method (or none); Kafka topics take
/// their operation from the matching `kafkaCalls` entry, Camel URIs their
/// endpoint type and direction from `camelCalls`.
pub fn extract_integration_points(node: &LibraryNode) -> Vec<IntegrationPoint> {
    let Some(analysis) = node.integration_analysis() else {
        return Vec::new();
    };
    let mut points = Vec::new();

    let methods = strings(analysis, "httpMethods");
    let (has_retry, has_timeout, has_circuit_breaker) = (
        flag(analysis, "hasRetry"),
        flag(analysis, "hasTimeout"),
        flag(analysis, "hasCircuitBreaker"),
    );
    let client_type = analysis.get("clientType").and_then(Value::as_str).map(str::to_string);
    for url in strings(analysis, "urls") {
        let per_method: Vec<Option<String>> = if methods.is_empty() {
            vec![None]
        } else {
            methods.iter().cloned().map(Some).collect()
        };
        for http_method in per_method {
            points.push(IntegrationPoint::HttpEndpoint {
                url: Some(url.clone()),
                http_method,
                client_type: client_type.clone(),
                has_retry,
                has_timeout,
                has_circuit_breaker,
            });
        }
    }

    for topic in strings(analysis, "kafkaTopics") {
        let call = call_for(analysis, "kafkaCalls", "topic", &topic);
        let operation = match str_field(call, "operation").as_deref() {
            Some(op) if op.eq_ignore_ascii_case("produce") => TopicOperation::Produce,
            _ => TopicOperation::Consume,
        };
        points.push(IntegrationPoint::KafkaTopic {
            topic: Some(topic),
            operation,
        });
    }

    for uri in strings(analysis, "camelUris") {
        let call = call_for(analysis, "camelCalls", "uri", &uri);
        points.push(IntegrationPoint::CamelRoute {
            endpoint_type: str_field(call, "endpointType"),
            direction: str_field(call, "direction"),
            uri: Some(uri),
        });
    }

    points
}

/// Library index held in memory, keyed by method FQN and by
/// `Class.method`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLibraryIndex {
    by_method_fqn: HashMap<String, LibraryNode>,
    by_class_and_method: HashMap<String, String>,
}

impl InMemoryLibraryIndex {
    pub fn new(nodes: Vec<LibraryNode>) -> Self {
        let mut index = Self::default();
        for node in nodes.into_iter().filter(LibraryNode::is_method) {
            let key = base_fqn(&node.fqn).to_string();
            if key.rfind('.').is_some_and(|i| i > 0) {
                index.by_class_and_method.entry(key).or_insert_with(|| node.fqn.clone());
            }
            index.by_method_fqn.insert(node.fqn.clone(), node);
        }
        log::info!("Library index built: {} methods indexed", index.by_method_fqn.len());
        index
    }

    /// Parse a JSON array of [`LibraryNode`]s.
    pub fn from_json(json: &str) -> Result<Self> {
        let nodes: Vec<LibraryNode> = serde_json::from_str(json)?;
        Ok(Self::new(nodes))
    }

    pub fn len(&self) -> usize {
        self.by_method_fqn.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_method_fqn.is_empty()
    }
}

impl LibraryNodeIndex for InMemoryLibraryIndex {
    fn find_by_method_fqn(&self, method_fqn: &str) -> Option<&LibraryNode> {
        self.by_method_fqn.get(method_fqn)
    }

    fn find_by_class_and_method(&self, class_fqn: &str, method: &str) -> Option<&LibraryNode> {
        self.by_class_and_method
            .get(&format!("{}.{}", class_fqn, method))
            .and_then(|fqn| self.by_method_fqn.get(fqn))
    }
}
