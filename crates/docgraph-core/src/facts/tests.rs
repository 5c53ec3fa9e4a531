use super::*;
use crate::error::GraphError;
use crate::types::{BrokerType, IntegrationPoint, Node, NodeKind, RawUsage, TopicOperation};

fn fixture() -> (Application, NodeIndex) {
    let mut config = BTreeMap::new();
    config.insert("app.topics.orders".to_string(), "orders-v1".to_string());
    let app = Application::new("orders-svc").with_config(config);

    let mut ty = Node::new(app.id, "com.example.OrderService", "OrderService", NodeKind::Service, "kotlin");
    ty.meta.pkg_fqn = Some("com.example".into());
    ty.meta.supertypes_simple = vec!["BaseService".into()];
    ty.meta.annotations = vec!["@Service".into()];

    let mut func = Node::new(app.id, "com.example.OrderService.place(order)", "place", NodeKind::Method, "kotlin");
    func.meta.owner_fqn = Some("com.example.OrderService".into());
    func.meta.param_types = vec!["Order".into()];
    func.meta.return_type = Some("Receipt".into());
    func.meta.throws = vec!["IllegalStateException".into()];
    func.meta.raw_usages = vec![RawUsage::Dot {
        receiver: "repo".into(),
        member: "save".into(),
        is_call: true,
    }];
    func.meta.integrations = vec![IntegrationPoint::KafkaTopic {
        topic: Some("audit".into()),
        operation: TopicOperation::Produce,
    }];

    let mut listener = Node::new(app.id, "com.example.OrderService.onOrder(msg)", "onOrder", NodeKind::Topic, "kotlin");
    listener.meta.owner_fqn = Some("com.example.OrderService".into());
    listener.meta.annotations = vec![r#"@KafkaListener(topics = ["${app.topics.orders}"])"#.into()];
    listener.meta.api_metadata = Some(crate::types::ApiMetadata::MessageBroker {
        broker: BrokerType::Kafka,
        topic: Some("${app.topics.orders}".into()),
        queue: None,
        consumer_group: None,
        exchange: None,
        routing_key: None,
    });

    let mut repo = Node::new(app.id, "com.example.OrderRepository", "OrderRepository", NodeKind::DbQuery, "kotlin");
    repo.meta.pkg_fqn = Some("com.example".into());
    let mut query = Node::new(app.id, "com.example.OrderRepository.archive()", "archive", NodeKind::Method, "kotlin");
    query.meta.owner_fqn = Some("com.example.OrderRepository".into());
    query.meta.annotations = vec![r#"@Query("INSERT INTO archive SELECT * FROM orders")"#.into()];

    let index = NodeIndex::new(vec![ty, func, listener, repo, query]);
    (app, index)
}

#[test]
fn test_default_sources_extract_expected_kinds() {
    let (app, index) = fixture();
    let ctx = FactContext {
        application: &app,
        index: &index,
    };
    let extraction = FactExtractor::default_sources().extract(&ctx, 7);
    let store = extraction.store;

    assert!(extraction.failures.is_empty());
    assert_eq!(store.generation(), 7);
    assert_eq!(store.count(FactKind::Supertype), 1);
    assert_eq!(store.count(FactKind::Throws), 1);
    assert_eq!(store.count(FactKind::CallSite), 1);
    assert_eq!(store.count(FactKind::TypeReference), 2);
    assert_eq!(store.count(FactKind::TopicProduce), 1);
    assert_eq!(store.count(FactKind::SqlWrite), 1);
    assert_eq!(store.count(FactKind::SqlRead), 1);

    let consume: Vec<_> = store.by_kind(FactKind::TopicConsume).collect();
    assert_eq!(consume.len(), 1);
    assert_eq!(consume[0].target, "topic://orders-v1");

    let config: Vec<_> = store.by_kind(FactKind::ConfigReference).collect();
    assert_eq!(config.len(), 1);
    assert_eq!(config[0].target, "app.topics.orders");
    assert_eq!(config[0].meta("value"), Some("orders-v1"));

    let members: Vec<_> = store
        .by_kind(FactKind::Member)
        .map(|f| (f.target.as_str(), f.meta("role")))
        .collect();
    assert!(members.contains(&("com.example", Some("package"))));
    assert!(members.contains(&("com.example.OrderService", Some("owner"))));
}

struct FailingSource;

impl FactSource for FailingSource {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn extract_facts(&self, _ctx: &FactContext<'_>) -> Result<Vec<Fact>> {
        Err(GraphError::Validation("boom".into()))
    }
}

struct PanickingSource;

impl FactSource for PanickingSource {
    fn name(&self) -> &'static str {
        "panicking"
    }

    fn extract_facts(&self, _ctx: &FactContext<'_>) -> Result<Vec<Fact>> {
        panic!("source exploded");
    }
}

#[test]
fn test_failing_sources_are_isolated() {
    let (app, index) = fixture();
    let ctx = FactContext {
        application: &app,
        index: &index,
    };
    let baseline = FactExtractor::default_sources().extract(&ctx, 1).store.len();

    let extraction = FactExtractor::empty()
        .with_source(Box::new(FailingSource))
        .with_source(Box::new(CodeUsageSource))
        .with_source(Box::new(PanickingSource))
        .with_source(Box::new(ApiMetadataSource))
        .with_source(Box::new(ConfigSource))
        .extract(&ctx, 1);

    assert_eq!(extraction.store.len(), baseline);
    let failed: Vec<_> = extraction.failures.iter().map(|f| f.source.as_str()).collect();
    assert_eq!(failed, vec!["failing", "panicking"]);
    assert!(extraction.failures[1].error.contains("source exploded"));
}

#[test]
fn test_parallel_and_sequential_agree() {
    let (app, index) = fixture();
    let ctx = FactContext {
        application: &app,
        index: &index,
    };
    let par = FactExtractor::default_sources().extract(&ctx, 1).store;
    let seq = FactExtractor::default_sources().with_parallel(false).extract(&ctx, 1).store;
    assert_eq!(par.all(), seq.all());
}
