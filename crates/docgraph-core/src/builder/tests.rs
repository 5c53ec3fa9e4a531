use super::*;
use crate::declarations::{RawField, RawFileUnit, RawFunction, RawType};
use crate::storage::{MemoryStorage, NodeFilter};
use crate::types::{ApiMetadata, NodeKind};
use uuid::Uuid;

fn setup() -> (GraphBuilder, Arc<MemoryStorage>, ApplicationId) {
    let store = Arc::new(MemoryStorage::new());
    let builder = GraphBuilder::new(store.clone(), BuilderConfig::default());
    (builder, store, Uuid::now_v7())
}

fn controller_decls() -> Vec<RawDeclaration> {
    vec![
        RawDeclaration::FileUnit(RawFileUnit {
            lang: "kotlin".into(),
            file_path: "src/OrderController.kt".into(),
            pkg_fqn: Some("com.example.orders".into()),
            imports: vec!["com.example.orders.OrderService".into()],
            ..Default::default()
        }),
        RawDeclaration::Type(RawType {
            lang: "kotlin".into(),
            file_path: Some("src/OrderController.kt".into()),
            pkg_fqn: Some("com.example.orders".into()),
            simple_name: "OrderController".into(),
            kind_repr: "class".into(),
            annotations: vec!["@RestController".into(), r#"@RequestMapping("/api/orders")"#.into()],
            text: Some("class OrderController(private val service: OrderService)".into()),
            line_start: Some(3),
            ..Default::default()
        }),
        RawDeclaration::Field(RawField {
            lang: "kotlin".into(),
            file_path: Some("src/OrderController.kt".into()),
            owner_fqn: Some("com.example.orders.OrderController".into()),
            name: "service".into(),
            type_repr: Some("OrderService".into()),
            ..Default::default()
        }),
        RawDeclaration::Function(RawFunction {
            lang: "kotlin".into(),
            file_path: Some("src/OrderController.kt".into()),
            owner_fqn: Some("com.example.orders.OrderController".into()),
            name: "get".into(),
            param_names: vec!["id".into()],
            param_types: vec!["Long".into()],
            annotations: vec![r#"@GetMapping("/{id}")"#.into()],
            text: Some("fun get(id: Long) = service.find(id)".into()),
            line_start: Some(5),
            line_end: Some(5),
            ..Default::default()
        }),
    ]
}

#[test]
fn test_materialize_builds_hierarchy() {
    let (builder, store, app) = setup();
    let cancel = AtomicBool::new(false);

    let report = builder.materialize(app, controller_decls(), &cancel).unwrap();
    assert!(report.errors.is_empty());
    assert_eq!(report.declarations, 4);
    assert_eq!(report.stats.created, 4);

    let pkg = store.find_node_by_fqn(app, "com.example.orders").unwrap().unwrap();
    assert_eq!(pkg.kind, NodeKind::Package);
    assert_eq!(pkg.name, "orders");

    let ty = store
        .find_node_by_fqn(app, "com.example.orders.OrderController")
        .unwrap()
        .unwrap();
    assert_eq!(ty.kind, NodeKind::Endpoint);
    assert_eq!(ty.parent_id, Some(pkg.id));
    assert_eq!(ty.meta.imports, vec!["com.example.orders.OrderService".to_string()]);

    let field = store
        .find_node_by_fqn(app, "com.example.orders.OrderController.service")
        .unwrap()
        .unwrap();
    assert_eq!(field.parent_id, Some(ty.id));
    assert_eq!(field.meta.return_type.as_deref(), Some("OrderService"));

    let func = store
        .find_node_by_fqn(app, "com.example.orders.OrderController.get(id)")
        .unwrap()
        .unwrap();
    assert_eq!(func.kind, NodeKind::Endpoint);
    assert_eq!(func.parent_id, Some(ty.id));
    assert_eq!(func.signature.as_deref(), Some("get(id)"));
    assert_eq!(func.meta.pkg_fqn.as_deref(), Some("com.example.orders"));
    match func.meta.api_metadata {
        Some(ApiMetadata::HttpEndpoint {
            ref method,
            ref path,
            ref base_path,
            ..
        }) => {
            assert_eq!(method, "GET");
            assert_eq!(path, "/{id}");
            assert_eq!(base_path.as_deref(), Some("/api/orders"));
        }
        ref other => panic!("unexpected api metadata {:?}", other),
    }
}

#[test]
fn test_rebuild_is_skipped_and_keeps_ids() {
    let (builder, store, app) = setup();
    let cancel = AtomicBool::new(false);

    builder.materialize(app, controller_decls(), &cancel).unwrap();
    let before = store.list_nodes(NodeFilter::new().for_application(app)).unwrap();

    let report = builder.materialize(app, controller_decls(), &cancel).unwrap();
    assert_eq!(report.stats.created, 0);
    assert_eq!(report.stats.updated, 0);
    assert_eq!(report.stats.skipped, 4);

    let after = store.list_nodes(NodeFilter::new().for_application(app)).unwrap();
    let ids = |nodes: &[crate::types::Node]| nodes.iter().map(|n| (n.fqn.clone(), n.id)).collect::<Vec<_>>();
    assert_eq!(ids(&before), ids(&after));
}

#[test]
fn test_changed_source_is_updated() {
    let (builder, store, app) = setup();
    let cancel = AtomicBool::new(false);
    builder.materialize(app, controller_decls(), &cancel).unwrap();

    let mut decls = controller_decls();
    if let RawDeclaration::Function(f) = &mut decls[3] {
        f.text = Some("fun get(id: Long) = service.load(id)".into());
    }
    let report = builder.materialize(app, decls, &cancel).unwrap();
    assert_eq!(report.stats.updated, 1);
    assert_eq!(report.stats.skipped, 3);

    let func = store
        .find_node_by_fqn(app, "com.example.orders.OrderController.get(id)")
        .unwrap()
        .unwrap();
    assert!(func.source.unwrap().contains("load"));
}

#[test]
fn test_invalid_declaration_does_not_stop_build() {
    let (builder, store, app) = setup();
    let cancel = AtomicBool::new(false);

    let decls = vec![
        RawDeclaration::Type(RawType {
            simple_name: "123Invalid".into(),
            kind_repr: "class".into(),
            ..Default::default()
        }),
        RawDeclaration::Type(RawType {
            simple_name: "Valid".into(),
            kind_repr: "class".into(),
            ..Default::default()
        }),
    ];
    let report = builder.materialize(app, decls, &cancel).unwrap();

    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].declaration, "123Invalid");
    assert_eq!(report.errors[0].command, "upsert_type");
    assert_eq!(report.stats.failed, 1);
    assert_eq!(report.stats.created, 1);
    assert!(store.find_node_by_fqn(app, "123Invalid").unwrap().is_none());
    assert!(store.find_node_by_fqn(app, "Valid").unwrap().is_some());
}

#[test]
fn test_function_without_owner_hangs_off_package() {
    let (builder, store, app) = setup();
    let cancel = AtomicBool::new(false);
    let decls = vec![RawDeclaration::Function(RawFunction {
        lang: "kotlin".into(),
        pkg_fqn: Some("com.example.util".into()),
        name: "helper".into(),
        signature_repr: Some("fun helper(): Int".into()),
        ..Default::default()
    })];
    builder.materialize(app, decls, &cancel).unwrap();

    let pkg = store.find_node_by_fqn(app, "com.example.util").unwrap().unwrap();
    let func = store.find_node_by_fqn(app, "com.example.util.helper()").unwrap().unwrap();
    assert_eq!(func.parent_id, Some(pkg.id));
    assert_eq!(func.signature.as_deref(), Some("fun helper(): Int"));
}

#[test]
fn test_package_from_file_unit() {
    let (builder, store, app) = setup();
    let cancel = AtomicBool::new(false);
    let decls = vec![
        RawDeclaration::FileUnit(RawFileUnit {
            lang: "java".into(),
            file_path: "src/Repo.java".into(),
            pkg_fqn: Some("com.example.repository".into()),
            ..Default::default()
        }),
        RawDeclaration::Type(RawType {
            lang: "java".into(),
            file_path: Some("src/Repo.java".into()),
            simple_name: "OrderRepository".into(),
            kind_repr: "interface".into(),
            ..Default::default()
        }),
    ];
    builder.materialize(app, decls, &cancel).unwrap();

    let ty = store
        .find_node_by_fqn(app, "com.example.repository.OrderRepository")
        .unwrap()
        .unwrap();
    assert_eq!(ty.kind, NodeKind::DbQuery);
    assert_eq!(ty.meta.pkg_fqn.as_deref(), Some("com.example.repository"));
}

#[test]
fn test_cancelled_build() {
    let (builder, _store, app) = setup();
    let cancel = AtomicBool::new(true);
    let err = builder.materialize(app, controller_decls(), &cancel).unwrap_err();
    assert!(matches!(err, GraphError::Cancelled));
}
