use crate::catalog::DataCatalog;
use crate::error::Result;
use crate::facts::resolve_placeholders;
use crate::library::index::{extract_integration_points, LibraryNode, LibraryNodeIndex};
use crate::library::sink::{LibraryEdgeOutcome, LibraryEdgeSink};
use crate::linker::{clean_type_name, NodeIndex};
use crate::storage::{GraphStore, NodeFilter};
use crate::types::{
    topic_fqn, ApiMetadata, Application, EdgeKind, IntegrationPoint, LibraryEdge, Node, NodeKind, RawUsage,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

const VIRTUAL_LANG: &str = "virtual";

/// Counts from one enrichment pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentReport {
    /// Nodes whose integration points changed.
    pub nodes_enriched: u64,
    pub integrations: u64,
    /// ENDPOINT and TOPIC nodes created.
    pub virtual_nodes: u64,
    /// DB_TABLE nodes created for catalogued tables.
    pub table_nodes: u64,
    pub library_edges: LibraryEdgeOutcome,
}

/// Copies library integration knowledge onto application nodes and
/// creates the nodes that integration and SQL edges point at.
pub struct Enricher {
    store: Arc<dyn GraphStore>,
    library: Arc<dyn LibraryNodeIndex>,
    catalog: Option<Arc<dyn DataCatalog>>,
}

impl Enricher {
    pub fn new(store: Arc<dyn GraphStore>, library: Arc<dyn LibraryNodeIndex>) -> Self {
        Self {
            store,
            library,
            catalog: None,
        }
    }

    /// Also create a DB_TABLE node for every catalogued table.
    pub fn with_catalog(mut self, catalog: Arc<dyn DataCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn enrich(&self, app: &Application) -> Result<EnrichmentReport> {
        let nodes = self.store.list_nodes(NodeFilter::new().for_application(app.id))?;
        let index = NodeIndex::new(nodes);
        let mut report = EnrichmentReport::default();
        let mut edges: BTreeSet<(uuid::Uuid, String, EdgeKind)> = BTreeSet::new();
        let mut virtual_fqns: BTreeMap<String, (NodeKind, String)> = BTreeMap::new();

        for node in index.nodes() {
            if let Some(topic) = broker_topic(node, app) {
                virtual_fqns.insert(topic_fqn(&topic), (NodeKind::Topic, topic));
            }
            if !node.fqn.contains('(') {
                continue;
            }

            let mut points: Vec<IntegrationPoint> = Vec::new();
            for usage in &node.meta.raw_usages {
                let Some(lib) = self.resolve(usage, node, &index) else {
                    continue;
                };
                let kind = if self.library.is_parent_client(&lib.fqn) {
                    EdgeKind::CallsHttp
                } else {
                    EdgeKind::CallsCode
                };
                edges.insert((node.id, lib.fqn.clone(), kind));
                for point in extract_integration_points(lib) {
                    if !points.contains(&point) {
                        points.push(point);
                    }
                }
            }

            for point in &points {
                if let Some(fqn) = point.virtual_fqn() {
                    virtual_fqns.entry(fqn).or_insert_with(|| virtual_target(point));
                }
            }

            report.integrations += points.len() as u64;
            if !points.is_empty() && points != node.meta.integrations {
                let mut updated = node.clone();
                updated.meta.integrations = points;
                updated.updated_at = Utc::now();
                self.store.upsert_node(&updated)?;
                report.nodes_enriched += 1;
            }
        }

        for (fqn, (kind, name)) in virtual_fqns {
            if index.by_fqn(&fqn).is_some() {
                continue;
            }
            let node = Node::new(app.id, fqn.clone(), name, kind, VIRTUAL_LANG);
            self.store.upsert_node(&node)?;
            log::debug!("Created {} node {}", kind, fqn);
            report.virtual_nodes += 1;
        }

        if let Some(catalog) = &self.catalog {
            let mut seen = HashSet::new();
            for table in catalog.list_tables() {
                if index.by_fqn(&table.node_fqn).is_some() || !seen.insert(table.node_fqn.clone()) {
                    continue;
                }
                let node = Node::new(app.id, table.node_fqn.clone(), table.name.clone(), NodeKind::DbTable, VIRTUAL_LANG);
                self.store.upsert_node(&node)?;
                log::debug!("Created DB_TABLE node {}", table.node_fqn);
                report.table_nodes += 1;
            }
        }

        let now = Utc::now();
        let edges: Vec<LibraryEdge> = edges
            .into_iter()
            .map(|(node_id, library_fqn, kind)| LibraryEdge {
                node_id,
                library_fqn,
                kind,
                created_at: now,
            })
            .collect();
        report.library_edges = LibraryEdgeSink::new(self.store.clone()).write(&edges);

        log::info!(
            "Enriched {}: {} nodes, {} integration points, {} virtual nodes, {} table nodes, library edges {} written / {} skipped / {} errors",
            app.key,
            report.nodes_enriched,
            report.integrations,
            report.virtual_nodes,
            report.table_nodes,
            report.library_edges.written,
            report.library_edges.skipped,
            report.library_edges.errors
        );
        Ok(report)
    }

    fn lookup(&self, class: &str, method: &str) -> Option<&LibraryNode> {
        self.library
            .find_by_method_fqn(&format!("{}.{}", class, method))
            .or_else(|| self.library.find_by_class_and_method(class, method))
    }

    /// The library method a usage inside `node` calls, if any.
    fn resolve(&self, usage: &RawUsage, node: &Node, index: &NodeIndex) -> Option<&LibraryNode> {
        let imports = &node.meta.imports;
        let owner = node.meta.owner_fqn.as_deref();
        match usage {
            RawUsage::Simple { name, .. } => {
                if let Some(hit) = owner.and_then(|o| self.lookup(o, name)) {
                    return Some(hit);
                }
                // Static import of the function itself.
                let suffix = format!(".{}", name);
                if let Some(import) = imports.iter().find(|i| i.ends_with(&suffix)) {
                    if let Some(hit) = self.library.find_by_method_fqn(import) {
                        return Some(hit);
                    }
                    if let Some((class, method)) = import.rsplit_once('.') {
                        if let Some(hit) = self.lookup(class, method) {
                            return Some(hit);
                        }
                    }
                }
                let class_import = imports
                    .iter()
                    .find(|i| i.rsplit('.').next().is_some_and(starts_upper));
                if let Some(hit) = class_import.and_then(|c| self.lookup(c, name)) {
                    return Some(hit);
                }
                if name.contains('.') {
                    let (class, method) = name.rsplit_once('.')?;
                    return self.lookup(class, method);
                }
                None
            }
            RawUsage::Dot { receiver, member, .. } => {
                let class = receiver_class(receiver, node, index)?;
                self.lookup(&class, member)
            }
        }
    }
}

fn starts_upper(s: &str) -> bool {
    s.chars().next().is_some_and(char::is_uppercase)
}

/// FQN the receiver's type most likely has, library types included.
fn receiver_class(receiver: &str, node: &Node, index: &NodeIndex) -> Option<String> {
    let receiver = receiver.trim();
    let owner = node.meta.owner_fqn.as_deref();
    if starts_upper(receiver) {
        return Some(qualify(receiver, node, index));
    }
    if receiver.is_empty() || receiver == "this" {
        return owner.map(str::to_string);
    }
    let field_type = owner
        .and_then(|o| index.by_fqn(&format!("{}.{}", o, receiver)))
        .and_then(|f| f.meta.return_type.as_deref());
    match field_type {
        Some(ty) => Some(qualify(ty, node, index)),
        None => owner.map(str::to_string),
    }
}

/// Qualify a type name through the node's imports, then the application
/// index. Unknown names come back as written.
fn qualify(name: &str, node: &Node, index: &NodeIndex) -> String {
    let clean = clean_type_name(name);
    let suffix = format!(".{}", clean);
    if let Some(import) = node.meta.imports.iter().find(|i| i.ends_with(&suffix) || *i == clean) {
        return import.clone();
    }
    index
        .resolve_type(clean, &node.meta.imports, node.meta.pkg_fqn.as_deref())
        .map(|(n, _)| n.fqn.clone())
        .unwrap_or_else(|| clean.to_string())
}

/// Topic or queue a broker listener names, with placeholders resolved.
fn broker_topic(node: &Node, app: &Application) -> Option<String> {
    match &node.meta.api_metadata {
        Some(ApiMetadata::MessageBroker { topic, queue, .. }) => topic
            .as_deref()
            .or(queue.as_deref())
            .filter(|t| !t.trim().is_empty())
            .map(|t| resolve_placeholders(t.trim(), app)),
        _ => None,
    }
}

/// Kind and display name of the virtual node for `point`.
fn virtual_target(point: &IntegrationPoint) -> (NodeKind, String) {
    match point {
        IntegrationPoint::HttpEndpoint { url, .. } => (NodeKind::Endpoint, url_name(url.as_deref().unwrap_or(""))),
        IntegrationPoint::CamelRoute { uri, .. } => (NodeKind::Endpoint, url_name(uri.as_deref().unwrap_or(""))),
        IntegrationPoint::KafkaTopic { topic, .. } => (NodeKind::Topic, topic.clone().unwrap_or_default()),
    }
}

fn url_name(url: &str) -> String {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(url)
        .to_string()
}

/// Ids of the virtual ENDPOINT, TOPIC and DB_TABLE nodes among `nodes`.
pub fn virtual_node_ids(nodes: &[Node]) -> HashSet<uuid::Uuid> {
    nodes.iter().filter(|n| n.lang == VIRTUAL_LANG).map(|n| n.id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::index::InMemoryLibraryIndex;
    use crate::storage::MemoryStorage;
    use crate::types::BrokerType;
    use serde_json::json;

    fn library() -> Arc<InMemoryLibraryIndex> {
        Arc::new(InMemoryLibraryIndex::new(vec![
            LibraryNode::method(
                "com.lib.PaymentClient.charge(java.lang.String)",
                json!({"integrationAnalysis": {
                    "isParentClient": true,
                    "urls": ["/v1/charge"],
                    "httpMethods": ["POST"],
                    "hasRetry": true
                }}),
            ),
            LibraryNode::method(
                "com.lib.Events.publish()",
                json!({"integrationAnalysis": {
                    "kafkaTopics": ["orders"],
                    "kafkaCalls": [{"topic": "orders", "operation": "PRODUCE"}]
                }}),
            ),
            LibraryNode::method("com.lib.Strings.pad()", json!({})),
        ]))
    }

    fn seed(store: &MemoryStorage, app: &Application) -> Node {
        let mut service = Node::new(app.id, "com.shop.Checkout", "Checkout", NodeKind::Service, "kotlin");
        service.meta.pkg_fqn = Some("com.shop".into());
        let mut field = Node::new(app.id, "com.shop.Checkout.client", "client", NodeKind::Field, "kotlin");
        field.meta.owner_fqn = Some(service.fqn.clone());
        field.meta.return_type = Some("PaymentClient".into());

        let mut pay = Node::new(app.id, "com.shop.Checkout.pay()", "pay", NodeKind::Method, "kotlin");
        pay.meta.owner_fqn = Some(service.fqn.clone());
        pay.meta.imports = vec!["com.lib.PaymentClient".into(), "com.lib.Events".into()];
        pay.meta.raw_usages = vec![
            RawUsage::Dot {
                receiver: "client".into(),
                member: "charge".into(),
                is_call: true,
            },
            RawUsage::Dot {
                receiver: "Events".into(),
                member: "publish".into(),
                is_call: true,
            },
            RawUsage::Dot {
                receiver: "nobody".into(),
                member: "knows".into(),
                is_call: true,
            },
        ];

        let mut listener = Node::new(app.id, "com.shop.Checkout.onRefund(msg)", "onRefund", NodeKind::Method, "kotlin");
        listener.meta.api_metadata = Some(ApiMetadata::MessageBroker {
            broker: BrokerType::Kafka,
            topic: Some("${topics.refunds:refunds}".into()),
            queue: None,
            consumer_group: None,
            exchange: None,
            routing_key: None,
        });

        for n in [&service, &field, &pay, &listener] {
            store.upsert_node(n).unwrap();
        }
        pay
    }

    #[test]
    fn test_enrich_attaches_points_and_creates_virtual_nodes() {
        let store = Arc::new(MemoryStorage::new());
        let app = Application::new("shop");
        let pay = seed(&store, &app);

        let enricher = Enricher::new(store.clone(), library());
        let report = enricher.enrich(&app).unwrap();

        assert_eq!(report.nodes_enriched, 1);
        assert_eq!(report.integrations, 2);
        assert_eq!(report.virtual_nodes, 3);
        assert_eq!(report.library_edges.written, 2);

        let enriched = store.get_node(pay.id).unwrap().unwrap();
        assert_eq!(enriched.meta.integrations.len(), 2);

        for fqn in ["endpoint://POST /v1/charge", "topic://orders", "topic://refunds"] {
            let node = store.find_node_by_fqn(app.id, fqn).unwrap();
            assert!(node.is_some(), "missing {}", fqn);
        }
        let endpoint = store
            .find_node_by_fqn(app.id, "endpoint://POST /v1/charge")
            .unwrap()
            .unwrap();
        assert_eq!(endpoint.kind, NodeKind::Endpoint);
        assert_eq!(endpoint.name, "charge");

        let edges = store.list_library_edges(app.id).unwrap();
        assert!(edges
            .iter()
            .any(|e| e.kind == EdgeKind::CallsHttp && e.library_fqn.starts_with("com.lib.PaymentClient.charge")));
        assert!(edges
            .iter()
            .any(|e| e.kind == EdgeKind::CallsCode && e.library_fqn == "com.lib.Events.publish()"));
    }

    #[test]
    fn test_enrich_is_idempotent() {
        let store = Arc::new(MemoryStorage::new());
        let app = Application::new("shop");
        seed(&store, &app);
        let enricher = Enricher::new(store.clone(), library());
        enricher.enrich(&app).unwrap();

        let again = enricher.enrich(&app).unwrap();
        assert_eq!(again.nodes_enriched, 0);
        assert_eq!(again.virtual_nodes, 0);
        assert_eq!(again.library_edges.written, 0);
        assert_eq!(again.library_edges.skipped, 2);

        let nodes = store.list_nodes(NodeFilter::new().for_application(app.id)).unwrap();
        assert_eq!(virtual_node_ids(&nodes).len(), 3);
    }

    #[test]
    fn test_url_name() {
        assert_eq!(url_name("/api/users/"), "users");
        assert_eq!(url_name("http://billing"), "billing");
        assert_eq!(url_name("/"), "/");
    }
}
