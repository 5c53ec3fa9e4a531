use super::*;
use crate::catalog::InMemoryCatalog;
use crate::error::GraphError;
use crate::facts::{FactContext, FactExtractor};
use crate::linker::proposal::EdgeTarget;
use crate::types::{ApiMetadata, Application, BrokerType, IntegrationPoint, NodeKind, RawUsage};
use std::collections::BTreeMap;

struct Fixture {
    index: NodeIndex,
    facts: FactStore,
}

impl Fixture {
    fn id(&self, fqn: &str) -> crate::types::NodeId {
        self.index.by_fqn(fqn).map(|n| n.id).unwrap_or_else(|| panic!("missing {}", fqn))
    }
}

fn node(app: &Application, fqn: &str, kind: NodeKind) -> Node {
    let name = crate::types::base_fqn(fqn).rsplit('.').next().unwrap_or(fqn).to_string();
    let mut n = Node::new(app.id, fqn, name, kind, "kotlin");
    n.meta.pkg_fqn = Some("com.shop".into());
    n
}

fn member(app: &Application, owner: &str, fqn: &str, kind: NodeKind) -> Node {
    let mut n = node(app, fqn, kind);
    n.meta.owner_fqn = Some(owner.into());
    n
}

fn fixture() -> Fixture {
    let mut config = BTreeMap::new();
    config.insert("app.topics.orders".to_string(), "orders-v1".to_string());
    let app = Application::new("shop").with_config(config);

    let mut service = node(&app, "com.shop.OrderService", NodeKind::Service);
    service.meta.supertypes_simple = vec!["BaseService".into()];

    let mut repo_field = member(&app, "com.shop.OrderService", "com.shop.OrderService.repo", NodeKind::Field);
    repo_field.meta.return_type = Some("Repository".into());

    let mut place = member(&app, "com.shop.OrderService", "com.shop.OrderService.place(order)", NodeKind::Method);
    place.meta.param_types = vec!["Order".into()];
    place.meta.return_type = Some("Receipt?".into());
    place.meta.throws = vec!["OrderException".into()];
    place.meta.raw_usages = vec![
        RawUsage::Dot {
            receiver: "repo".into(),
            member: "save".into(),
            is_call: true,
        },
        RawUsage::Simple {
            name: "validate".into(),
            is_call: true,
        },
    ];
    place.meta.integrations = vec![IntegrationPoint::HttpEndpoint {
        url: Some("/v1/pay".into()),
        http_method: Some("POST".into()),
        client_type: Some("RestTemplate".into()),
        has_retry: true,
        has_timeout: false,
        has_circuit_breaker: false,
    }];

    let mut listener = member(&app, "com.shop.OrderService", "com.shop.OrderService.onOrder(msg)", NodeKind::Method);
    listener.meta.annotations = vec![r#"@KafkaListener(topics = ["${app.topics.orders}"])"#.into()];
    listener.meta.api_metadata = Some(ApiMetadata::MessageBroker {
        broker: BrokerType::Kafka,
        topic: Some("${app.topics.orders}".into()),
        queue: None,
        consumer_group: None,
        exchange: None,
        routing_key: None,
    });

    let mut props = node(&app, "com.shop.KafkaProps", NodeKind::Config);
    props.meta.annotations = vec![r#"@ConfigurationProperties(prefix = "app.topics")"#.into()];

    let mut archive = member(&app, "com.shop.OrderRepository", "com.shop.OrderRepository.archive()", NodeKind::Method);
    archive.meta.annotations = vec![r#"@Query("INSERT INTO archive SELECT * FROM orders")"#.into()];

    let mut pkg = Node::new(app.id, "com.shop", "shop", NodeKind::Package, "kotlin");
    pkg.meta.pkg_fqn = Some("com.shop".into());

    let nodes = vec![
        pkg,
        node(&app, "com.shop.BaseService", NodeKind::Class),
        node(&app, "com.shop.Repository", NodeKind::Interface),
        member(&app, "com.shop.Repository", "com.shop.Repository.save(entity)", NodeKind::Method),
        service,
        repo_field,
        place,
        member(&app, "com.shop.OrderService", "com.shop.OrderService.validate(order)", NodeKind::Method),
        member(&app, "com.shop.OrderService", "com.shop.OrderService.validate(order,strict)", NodeKind::Method),
        listener,
        node(&app, "com.shop.Order", NodeKind::Class),
        node(&app, "com.shop.Receipt", NodeKind::Record),
        node(&app, "com.shop.OrderException", NodeKind::Exception),
        node(&app, "com.shop.OrderRepository", NodeKind::DbQuery),
        archive,
        props,
        Node::new(app.id, "db.orders", "orders", NodeKind::DbTable, "sql"),
        Node::new(app.id, "db.archive", "archive", NodeKind::DbTable, "sql"),
        Node::new(app.id, "endpoint://POST /v1/pay", "pay", NodeKind::Endpoint, "virtual"),
        Node::new(app.id, "topic://orders-v1", "orders-v1", NodeKind::Topic, "virtual"),
    ];

    let index = NodeIndex::new(nodes);
    let facts = FactExtractor::default_sources()
        .extract(
            &FactContext {
                application: &app,
                index: &index,
            },
            1,
        )
        .store;
    Fixture { index, facts }
}

fn registry(fx: &Fixture) -> DetectorRegistry {
    let catalog = Arc::new(InMemoryCatalog::from_nodes(fx.index.nodes()));
    DetectorRegistry::default_detectors(catalog)
}

fn has(proposals: &[EdgeProposal], kind: EdgeKind, source: crate::types::NodeId, target: crate::types::NodeId) -> bool {
    proposals
        .iter()
        .any(|p| p.kind == kind && p.source == source && p.target == EdgeTarget::Node(target))
}

#[test]
fn test_default_detectors_cover_every_kind_of_fact() {
    let fx = fixture();
    let detection = registry(&fx).run(&fx.facts, &fx.index, &LinkerConfig::default());
    assert!(detection.failures.is_empty());
    let p = &detection.proposals;

    let service = fx.id("com.shop.OrderService");
    let place = fx.id("com.shop.OrderService.place(order)");

    assert!(has(p, EdgeKind::Contains, fx.id("com.shop"), service));
    assert!(has(p, EdgeKind::Contains, service, place));
    assert!(has(p, EdgeKind::Inherits, service, fx.id("com.shop.BaseService")));
    assert!(has(p, EdgeKind::DependsOn, service, fx.id("com.shop.BaseService")));
    assert!(has(p, EdgeKind::DependsOn, service, fx.id("com.shop.Order")));
    assert!(has(p, EdgeKind::DependsOn, service, fx.id("com.shop.Receipt")));
    assert!(has(p, EdgeKind::DependsOn, service, fx.id("com.shop.Repository")));
    assert!(has(p, EdgeKind::Throws, place, fx.id("com.shop.OrderException")));
    assert!(has(p, EdgeKind::CallsCode, place, fx.id("com.shop.Repository.save(entity)")));

    let archive = fx.id("com.shop.OrderRepository.archive()");
    assert!(has(p, EdgeKind::Writes, archive, fx.id("db.archive")));
    assert!(has(p, EdgeKind::Reads, archive, fx.id("db.orders")));

    let listener = fx.id("com.shop.OrderService.onOrder(msg)");
    assert!(has(p, EdgeKind::Configures, fx.id("com.shop.KafkaProps"), listener));

    let unresolved = |kind: EdgeKind, target: &str| {
        p.iter()
            .any(|x| x.kind == kind && x.target == EdgeTarget::Unresolved(target.to_string()))
    };
    assert!(unresolved(EdgeKind::CallsHttp, "endpoint://POST /v1/pay"));
    assert!(unresolved(EdgeKind::RetriesTo, "endpoint://POST /v1/pay"));
    assert!(!unresolved(EdgeKind::TimeoutsTo, "endpoint://POST /v1/pay"));
    assert!(unresolved(EdgeKind::Consumes, "topic://orders-v1"));

    assert!(p.iter().all(|x| !x.detector.is_empty()));
}

#[test]
fn test_overloads_share_a_slot() {
    let fx = fixture();
    let detection = registry(&fx).run(&fx.facts, &fx.index, &LinkerConfig::default());
    let place = fx.id("com.shop.OrderService.place(order)");

    let calls: Vec<_> = detection
        .proposals
        .iter()
        .filter(|p| p.kind == EdgeKind::CallsCode && p.source == place && p.slot.is_some())
        .collect();
    assert_eq!(calls.len(), 2);
    assert!(calls
        .iter()
        .all(|p| p.slot.as_deref() == Some("call:com.shop.OrderService.validate")));
}

#[test]
fn test_resolution_drives_confidence() {
    let fx = fixture();
    let detection = registry(&fx).run(&fx.facts, &fx.index, &LinkerConfig::default());
    let service = fx.id("com.shop.OrderService");
    let inherits = detection
        .proposals
        .iter()
        .find(|p| p.kind == EdgeKind::Inherits && p.source == service)
        .unwrap();
    assert_eq!(inherits.confidence, Resolution::Package.confidence());
    assert_eq!(inherits.evidence[0].metadata.get("resolution").map(String::as_str), Some("package"));
}

#[test]
fn test_disabled_detector_is_skipped() {
    let fx = fixture();
    let config = LinkerConfig::default().with_detector("sql", false).with_parallel(false);
    let detection = registry(&fx).run(&fx.facts, &fx.index, &config);
    assert!(detection
        .proposals
        .iter()
        .all(|p| !matches!(p.kind, EdgeKind::Reads | EdgeKind::Writes)));
}

struct BrokenDetector;

impl Detector for BrokenDetector {
    fn name(&self) -> &'static str {
        "broken"
    }

    fn produces(&self) -> &[EdgeKind] {
        &[]
    }

    fn detect(&self, _facts: &FactStore, _index: &NodeIndex) -> Result<Vec<EdgeProposal>> {
        Err(GraphError::Validation("no".into()))
    }
}

struct PanickingDetector;

impl Detector for PanickingDetector {
    fn name(&self) -> &'static str {
        "panicking"
    }

    fn produces(&self) -> &[EdgeKind] {
        &[]
    }

    fn detect(&self, _facts: &FactStore, _index: &NodeIndex) -> Result<Vec<EdgeProposal>> {
        panic!("detector exploded")
    }
}

#[test]
fn test_failing_detectors_are_excluded() {
    let fx = fixture();
    let baseline = registry(&fx).run(&fx.facts, &fx.index, &LinkerConfig::default());

    let detection = registry(&fx)
        .with_detector(Box::new(BrokenDetector))
        .with_detector(Box::new(PanickingDetector))
        .run(&fx.facts, &fx.index, &LinkerConfig::default());

    assert_eq!(detection.proposals.len(), baseline.proposals.len());
    let failed: Vec<_> = detection.failures.iter().map(|f| f.detector.as_str()).collect();
    assert_eq!(failed, vec!["broken", "panicking"]);
}

#[test]
fn test_parallel_matches_sequential() {
    let fx = fixture();
    let par = registry(&fx).run(&fx.facts, &fx.index, &LinkerConfig::default());
    let seq = registry(&fx).run(&fx.facts, &fx.index, &LinkerConfig::default().with_parallel(false));
    assert_eq!(par.proposals, seq.proposals);
}
