use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Type alias for node identifiers
pub type NodeId = Uuid;

/// Type alias for application identifiers
pub type ApplicationId = Uuid;

/// The application a build runs for. Every node belongs to exactly one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Application {
    pub id: ApplicationId,

    /// Stable human key, e.g. the repository slug.
    pub key: String,

    /// Flattened configuration properties (`spring.kafka.topic = orders`).
    /// Used to resolve `${...}` placeholders found in annotations.
    #[serde(default)]
    pub config: BTreeMap<String, String>,
}

impl Application {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            key: key.into(),
            config: BTreeMap::new(),
        }
    }

    pub fn with_id(mut self, id: ApplicationId) -> Self {
        self.id = id;
        self
    }

    pub fn with_config(mut self, config: BTreeMap<String, String>) -> Self {
        self.config = config;
        self
    }
}

/// Taxonomy of graph vertices.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeKind {
    Repo,
    Module,
    Package,
    Class,
    Interface,
    Enum,
    Record,
    Method,
    Field,
    Exception,
    Test,
    Mapper,
    Service,
    Endpoint,
    Client,
    Topic,
    Job,
    DbTable,
    DbView,
    DbQuery,
    Schema,
    Config,
    Migration,
    Annotation,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Repo => "REPO",
            NodeKind::Module => "MODULE",
            NodeKind::Package => "PACKAGE",
            NodeKind::Class => "CLASS",
            NodeKind::Interface => "INTERFACE",
            NodeKind::Enum => "ENUM",
            NodeKind::Record => "RECORD",
            NodeKind::Method => "METHOD",
            NodeKind::Field => "FIELD",
            NodeKind::Exception => "EXCEPTION",
            NodeKind::Test => "TEST",
            NodeKind::Mapper => "MAPPER",
            NodeKind::Service => "SERVICE",
            NodeKind::Endpoint => "ENDPOINT",
            NodeKind::Client => "CLIENT",
            NodeKind::Topic => "TOPIC",
            NodeKind::Job => "JOB",
            NodeKind::DbTable => "DB_TABLE",
            NodeKind::DbView => "DB_VIEW",
            NodeKind::DbQuery => "DB_QUERY",
            NodeKind::Schema => "SCHEMA",
            NodeKind::Config => "CONFIG",
            NodeKind::Migration => "MIGRATION",
            NodeKind::Annotation => "ANNOTATION",
        }
    }

    /// Kinds a package directly contains.
    pub fn is_type_level(&self) -> bool {
        matches!(
            self,
            NodeKind::Interface
                | NodeKind::Service
                | NodeKind::Record
                | NodeKind::Mapper
                | NodeKind::Endpoint
                | NodeKind::Class
                | NodeKind::Enum
                | NodeKind::Config
        )
    }

    /// Kinds a type directly contains.
    pub fn is_member_level(&self) -> bool {
        matches!(
            self,
            NodeKind::Method | NodeKind::Field | NodeKind::Endpoint | NodeKind::Job | NodeKind::Topic
        )
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed relationship between two nodes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeKind {
    Contains,
    DependsOn,
    Implements,
    Inherits,
    Extends,
    Overrides,
    AnnotatedWith,
    Calls,
    CallsCode,
    Throws,
    Locks,
    CallsHttp,
    CallsGrpc,
    Produces,
    Consumes,
    Queries,
    Reads,
    Writes,
    ContractsWith,
    Configures,
    CircuitBreakerTo,
    RetriesTo,
    TimeoutsTo,
}

impl EdgeKind {
    pub const ALL: [EdgeKind; 23] = [
        EdgeKind::Contains,
        EdgeKind::DependsOn,
        EdgeKind::Implements,
        EdgeKind::Inherits,
        EdgeKind::Extends,
        EdgeKind::Overrides,
        EdgeKind::AnnotatedWith,
        EdgeKind::Calls,
        EdgeKind::CallsCode,
        EdgeKind::Throws,
        EdgeKind::Locks,
        EdgeKind::CallsHttp,
        EdgeKind::CallsGrpc,
        EdgeKind::Produces,
        EdgeKind::Consumes,
        EdgeKind::Queries,
        EdgeKind::Reads,
        EdgeKind::Writes,
        EdgeKind::ContractsWith,
        EdgeKind::Configures,
        EdgeKind::CircuitBreakerTo,
        EdgeKind::RetriesTo,
        EdgeKind::TimeoutsTo,
    ];

    /// Case-insensitive lookup by wire name (`calls_code`, `CALLS_CODE`).
    pub fn parse(name: &str) -> Option<EdgeKind> {
        let name = name.trim();
        EdgeKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str().eq_ignore_ascii_case(name))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Contains => "CONTAINS",
            EdgeKind::DependsOn => "DEPENDS_ON",
            EdgeKind::Implements => "IMPLEMENTS",
            EdgeKind::Inherits => "INHERITS",
            EdgeKind::Extends => "EXTENDS",
            EdgeKind::Overrides => "OVERRIDES",
            EdgeKind::AnnotatedWith => "ANNOTATED_WITH",
            EdgeKind::Calls => "CALLS",
            EdgeKind::CallsCode => "CALLS_CODE",
            EdgeKind::Throws => "THROWS",
            EdgeKind::Locks => "LOCKS",
            EdgeKind::CallsHttp => "CALLS_HTTP",
            EdgeKind::CallsGrpc => "CALLS_GRPC",
            EdgeKind::Produces => "PRODUCES",
            EdgeKind::Consumes => "CONSUMES",
            EdgeKind::Queries => "QUERIES",
            EdgeKind::Reads => "READS",
            EdgeKind::Writes => "WRITES",
            EdgeKind::ContractsWith => "CONTRACTS_WITH",
            EdgeKind::Configures => "CONFIGURES",
            EdgeKind::CircuitBreakerTo => "CIRCUIT_BREAKER_TO",
            EdgeKind::RetriesTo => "RETRIES_TO",
            EdgeKind::TimeoutsTo => "TIMEOUTS_TO",
        }
    }

    /// Kinds where an edge from a node to itself carries no meaning.
    pub fn forbids_self_loop(&self) -> bool {
        matches!(
            self,
            EdgeKind::Contains
                | EdgeKind::Inherits
                | EdgeKind::Implements
                | EdgeKind::Extends
                | EdgeKind::Overrides
        )
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive 1-based line range.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineSpan {
    pub start: i64,
    pub end: i64,
}

impl LineSpan {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }
}

/// A call-site or member access as seen by the front end.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RawUsage {
    /// `receiver.member(...)` or `receiver.member`
    Dot {
        receiver: String,
        member: String,
        #[serde(default = "default_true")]
        is_call: bool,
    },
    /// `name(...)` or a bare identifier
    Simple {
        name: String,
        #[serde(default)]
        is_call: bool,
    },
}

fn default_true() -> bool {
    true
}

/// Message broker flavour for broker endpoints.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BrokerType {
    Kafka,
    RabbitMq,
    Nats,
    Sqs,
}

/// Integration surface a declaration exposes, extracted from its annotations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ApiMetadata {
    HttpEndpoint {
        method: String,
        path: String,
        base_path: Option<String>,
        consumes: Vec<String>,
        produces: Vec<String>,
        headers: BTreeMap<String, String>,
    },
    GrpcEndpoint {
        service: String,
        method: String,
        package: Option<String>,
    },
    MessageBroker {
        broker: BrokerType,
        topic: Option<String>,
        queue: Option<String>,
        consumer_group: Option<String>,
        exchange: Option<String>,
        routing_key: Option<String>,
    },
    GraphQl {
        operation_type: String,
        operation_name: String,
    },
}

impl ApiMetadata {
    /// Full request path for HTTP endpoints (`base_path` + `path`).
    pub fn http_full_path(&self) -> Option<String> {
        match self {
            ApiMetadata::HttpEndpoint { path, base_path, .. } => {
                let base = base_path.as_deref().unwrap_or("").trim_end_matches('/');
                let tail = if path.starts_with('/') || path.is_empty() {
                    path.clone()
                } else {
                    format!("/{}", path)
                };
                let full = format!("{}{}", base, tail);
                Some(if full.is_empty() { "/".to_string() } else { full })
            }
            _ => None,
        }
    }
}

/// Direction of a Kafka topic interaction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TopicOperation {
    Produce,
    Consume,
}

/// Outbound integration a library method performs, as discovered by
/// library (bytecode) analysis. Copied onto app nodes by the enricher.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationPoint {
    HttpEndpoint {
        url: Option<String>,
        http_method: Option<String>,
        client_type: Option<String>,
        #[serde(default)]
        has_retry: bool,
        #[serde(default)]
        has_timeout: bool,
        #[serde(default)]
        has_circuit_breaker: bool,
    },
    KafkaTopic {
        topic: Option<String>,
        operation: TopicOperation,
    },
    CamelRoute {
        uri: Option<String>,
        endpoint_type: Option<String>,
        direction: Option<String>,
    },
}

impl IntegrationPoint {
    /// FQN of the virtual node standing for this integration target.
    pub fn virtual_fqn(&self) -> Option<String> {
        match self {
            IntegrationPoint::HttpEndpoint { url, http_method, .. } => url.as_ref().map(|u| {
                format!(
                    "endpoint://{} {}",
                    http_method.as_deref().unwrap_or("GET").to_uppercase(),
                    u
                )
            }),
            IntegrationPoint::KafkaTopic { topic, .. } => topic.as_ref().map(|t| topic_fqn(t)),
            IntegrationPoint::CamelRoute { uri, endpoint_type, .. } => uri.as_ref().map(|u| {
                if endpoint_type.as_deref() == Some("http") {
                    format!("endpoint://GET {}", u)
                } else {
                    format!("endpoint://{}", u)
                }
            }),
        }
    }
}

/// FQN of the virtual topic node for `topic`.
pub fn topic_fqn(topic: &str) -> String {
    format!("topic://{}", topic)
}

/// Structured metadata carried by every node.
///
/// Collections are empty and options are `None` when the front end did not
/// report the value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NodeMeta {
    pub pkg_fqn: Option<String>,
    pub owner_fqn: Option<String>,
    pub imports: Vec<String>,
    pub annotations: Vec<String>,
    /// Supertypes as written in source.
    pub supertypes_simple: Vec<String>,
    /// Supertypes the linker managed to resolve to FQNs.
    pub supertypes_resolved: Vec<String>,
    pub params: Vec<String>,
    pub param_types: Vec<String>,
    /// Return type for functions, declared type for fields.
    pub return_type: Option<String>,
    pub locals: Vec<String>,
    pub modifiers: Vec<String>,
    /// Parsed doc tags (`@param x ...`, `@return ...`), keyed by tag.
    pub doc_tags: BTreeMap<String, String>,
    pub raw_usages: Vec<RawUsage>,
    pub throws: Vec<String>,
    pub api_metadata: Option<ApiMetadata>,
    pub integrations: Vec<IntegrationPoint>,
    pub source_hash: Option<String>,
}

impl NodeMeta {
    /// Overlay `other` onto `self`, keeping existing values wherever `other`
    /// is empty.
    pub fn merge(&mut self, other: NodeMeta) {
        fn opt<T>(dst: &mut Option<T>, src: Option<T>) {
            if src.is_some() {
                *dst = src;
            }
        }
        fn list<T>(dst: &mut Vec<T>, src: Vec<T>) {
            if !src.is_empty() {
                *dst = src;
            }
        }

        opt(&mut self.pkg_fqn, other.pkg_fqn.filter(|s| !s.is_empty()));
        opt(&mut self.owner_fqn, other.owner_fqn.filter(|s| !s.is_empty()));
        list(&mut self.imports, other.imports);
        list(&mut self.annotations, other.annotations);
        list(&mut self.supertypes_simple, other.supertypes_simple);
        list(&mut self.supertypes_resolved, other.supertypes_resolved);
        list(&mut self.params, other.params);
        list(&mut self.param_types, other.param_types);
        opt(&mut self.return_type, other.return_type.filter(|s| !s.is_empty()));
        list(&mut self.locals, other.locals);
        list(&mut self.modifiers, other.modifiers);
        if !other.doc_tags.is_empty() {
            self.doc_tags = other.doc_tags;
        }
        list(&mut self.raw_usages, other.raw_usages);
        list(&mut self.throws, other.throws);
        opt(&mut self.api_metadata, other.api_metadata);
        list(&mut self.integrations, other.integrations);
        opt(&mut self.source_hash, other.source_hash);
    }

    /// Simple name of each annotation, lowercased, arguments stripped.
    pub fn annotation_names(&self) -> Vec<String> {
        self.annotations.iter().map(|a| annotation_simple_name(a)).collect()
    }
}

/// `@org.foo.Bar(x = 1)` -> `bar`
pub fn annotation_simple_name(raw: &str) -> String {
    let head = raw.trim().trim_start_matches('@');
    let head = head.split('(').next().unwrap_or(head).trim();
    head.rsplit('.').next().unwrap_or(head).to_lowercase()
}

/// A code or system entity in the graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    /// Unique identifier. UUIDv7 for time-sortability.
    pub id: NodeId,

    /// Owning application. FQNs are unique within it.
    pub application_id: ApplicationId,

    /// Fully-qualified name.
    pub fqn: String,

    /// Display name, usually the last FQN segment.
    pub name: String,

    pub kind: NodeKind,

    /// Source language reported by the front end.
    pub lang: String,

    /// Structural parent. Parent chains form a tree.
    pub parent_id: Option<NodeId>,

    pub file_path: Option<String>,
    pub span: Option<LineSpan>,

    /// Possibly truncated source text.
    pub source: Option<String>,
    pub doc: Option<String>,
    pub signature: Option<String>,

    /// SHA-256 hex digest of the untruncated source.
    pub code_hash: Option<String>,

    pub meta: NodeMeta,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Node {
    pub fn new(
        application_id: ApplicationId,
        fqn: impl Into<String>,
        name: impl Into<String>,
        kind: NodeKind,
        lang: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            application_id,
            fqn: fqn.into(),
            name: name.into(),
            kind,
            lang: lang.into(),
            parent_id: None,
            file_path: None,
            span: None,
            source: None,
            doc: None,
            signature: None,
            code_hash: None,
            meta: NodeMeta::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// FQN with any parameter list removed: `a.B.m(int)` -> `a.B.m`.
    pub fn base_fqn(&self) -> &str {
        base_fqn(&self.fqn)
    }

    /// Last dotted segment of the base FQN.
    pub fn simple_name(&self) -> &str {
        let base = self.base_fqn();
        base.rsplit('.').next().unwrap_or(base)
    }

    pub fn has_annotation(&self, simple: &str) -> bool {
        let wanted = simple.trim_start_matches('@').to_lowercase();
        self.meta
            .annotations
            .iter()
            .any(|a| annotation_simple_name(a) == wanted)
    }
}

/// FQN with any parameter list removed.
pub fn base_fqn(fqn: &str) -> &str {
    match fqn.find('(') {
        Some(i) => &fqn[..i],
        None => fqn,
    }
}

/// A relationship that passed the linking pipeline. Unique per
/// (source, target, kind).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AcceptedEdge {
    pub source: NodeId,
    pub target: NodeId,
    pub kind: EdgeKind,

    /// Merged confidence at first acceptance.
    pub confidence: f32,

    /// Number of evidence entries behind the edge at first acceptance.
    pub evidence_count: u32,

    pub created_at: DateTime<Utc>,
}

impl AcceptedEdge {
    pub fn key(&self) -> (NodeId, NodeId, EdgeKind) {
        (self.source, self.target, self.kind)
    }
}

/// Edge from an application node to a third-party library method.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LibraryEdge {
    pub node_id: NodeId,
    pub library_fqn: String,
    pub kind: EdgeKind,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_serde_names() {
        assert_eq!(serde_json::to_string(&NodeKind::DbQuery).unwrap(), "\"DB_QUERY\"");
        assert_eq!(serde_json::to_string(&EdgeKind::CallsHttp).unwrap(), "\"CALLS_HTTP\"");
        let k: EdgeKind = serde_json::from_str("\"CIRCUIT_BREAKER_TO\"").unwrap();
        assert_eq!(k, EdgeKind::CircuitBreakerTo);
        assert_eq!(k.to_string(), "CIRCUIT_BREAKER_TO");
        assert_eq!(EdgeKind::parse("calls_code"), Some(EdgeKind::CallsCode));
        assert_eq!(EdgeKind::parse("NOPE"), None);
    }

    #[test]
    fn test_base_fqn_and_simple_name() {
        let app = Uuid::now_v7();
        let n = Node::new(app, "com.example.Foo.bar(id,name)", "bar", NodeKind::Method, "kotlin");
        assert_eq!(n.base_fqn(), "com.example.Foo.bar");
        assert_eq!(n.simple_name(), "bar");
    }

    #[test]
    fn test_annotation_simple_name() {
        assert_eq!(annotation_simple_name("@org.springframework.stereotype.Service"), "service");
        assert_eq!(annotation_simple_name("GetMapping(\"/users\")"), "getmapping");
    }

    #[test]
    fn test_meta_merge_keeps_existing_on_empty() {
        let mut meta = NodeMeta {
            imports: vec!["a.B".into()],
            return_type: Some("String".into()),
            ..Default::default()
        };
        meta.merge(NodeMeta {
            annotations: vec!["@Service".into()],
            return_type: Some(String::new()),
            ..Default::default()
        });
        assert_eq!(meta.imports, vec!["a.B".to_string()]);
        assert_eq!(meta.annotations, vec!["@Service".to_string()]);
        assert_eq!(meta.return_type.as_deref(), Some("String"));
    }

    #[test]
    fn test_http_full_path() {
        let api = ApiMetadata::HttpEndpoint {
            method: "GET".into(),
            path: "users".into(),
            base_path: Some("/api/".into()),
            consumes: vec![],
            produces: vec![],
            headers: BTreeMap::new(),
        };
        assert_eq!(api.http_full_path().as_deref(), Some("/api/users"));
    }

    #[test]
    fn test_virtual_fqn() {
        let http = IntegrationPoint::HttpEndpoint {
            url: Some("/v1/orders".into()),
            http_method: Some("post".into()),
            client_type: None,
            has_retry: false,
            has_timeout: false,
            has_circuit_breaker: false,
        };
        assert_eq!(http.virtual_fqn().as_deref(), Some("endpoint://POST /v1/orders"));
        let topic = IntegrationPoint::KafkaTopic {
            topic: Some("orders".into()),
            operation: TopicOperation::Produce,
        };
        assert_eq!(topic.virtual_fqn().as_deref(), Some("topic://orders"));
    }
}
