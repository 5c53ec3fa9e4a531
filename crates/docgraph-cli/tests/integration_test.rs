use docgraph_core::*;
use serde_json::Value;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::tempdir;

const DECLARATIONS: &str = r#"{"kind":"file_unit","lang":"kotlin","file_path":"src/Orders.kt","pkg_fqn":"com.shop","imports":["com.lib.PaymentClient"]}
{"kind":"type","lang":"kotlin","file_path":"src/Orders.kt","pkg_fqn":"com.shop","simple_name":"OrderService","kind_repr":"class","text":"class OrderService"}
{"kind":"function","lang":"kotlin","file_path":"src/Orders.kt","pkg_fqn":"com.shop","owner_fqn":"com.shop.OrderService","name":"place","param_names":["id"],"text":"fun place(id: Long) {}"}
{"kind":"type","lang":"kotlin","file_path":"src/Orders.kt","pkg_fqn":"com.shop","simple_name":"OrderController","kind_repr":"class","text":"class OrderController"}
{"kind":"field","lang":"kotlin","file_path":"src/Orders.kt","pkg_fqn":"com.shop","owner_fqn":"com.shop.OrderController","name":"service","type_repr":"OrderService"}
{"kind":"field","lang":"kotlin","file_path":"src/Orders.kt","pkg_fqn":"com.shop","owner_fqn":"com.shop.OrderController","name":"payments","type_repr":"PaymentClient"}
{"kind":"function","lang":"kotlin","file_path":"src/Orders.kt","pkg_fqn":"com.shop","owner_fqn":"com.shop.OrderController","name":"create","param_names":["id"],"text":"fun create(id: Long) { service.place(id); payments.charge(id) }","raw_usages":[{"dot":{"receiver":"service","member":"place","is_call":true}},{"dot":{"receiver":"payments","member":"charge","is_call":true}}]}
{"kind":"type","simple_name":"123Invalid","kind_repr":"class"}
"#;

const LIBRARY: &str = r#"[{"fqn":"com.lib.PaymentClient.charge(java.lang.Long)","kind":"METHOD","meta":{"integrationAnalysis":{"isParentClient":true,"urls":["/v1/charge"],"httpMethods":["POST"],"hasRetry":true}}}]"#;

fn docgraph(data_dir: &Path, args: &[&str]) -> Output {
    let output = Command::new(env!("CARGO_BIN_EXE_docgraph"))
        .arg("--data-dir")
        .arg(data_dir)
        .arg("--config")
        .arg(data_dir.join("docgraph.toml"))
        .args(args)
        .env("RUST_LOG", "warn")
        .env_remove("DOCGRAPH_APP_KEY")
        .output()
        .expect("run docgraph");
    assert!(
        output.status.success(),
        "docgraph {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    output
}

fn json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

// ── Build ────────────────────────────────────────────────────────────────────

#[test]
fn test_build_twice_is_idempotent() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("decls.jsonl");
    let library = dir.path().join("library.json");
    std::fs::write(&input, DECLARATIONS).unwrap();
    std::fs::write(&library, LIBRARY).unwrap();
    let data = dir.path().join("data");

    let args = [
        "build",
        "--app",
        "shop",
        "--input",
        input.to_str().unwrap(),
        "--library",
        library.to_str().unwrap(),
    ];
    let first = json(&docgraph(&data, &args));
    assert_eq!(first["nodes_failed"], 1);
    assert_eq!(first["errors"][0]["declaration"], "123Invalid");
    assert_eq!(first["integration_nodes"], 1);
    assert_eq!(first["library_edges"], 1);
    assert!(first["edges_accepted"].as_u64().unwrap() > 0);

    let second = json(&docgraph(&data, &args));
    assert_eq!(second["application_id"], first["application_id"]);
    assert_eq!(second["nodes_created"], 0);
    assert_eq!(second["edges_inserted"], 0);
    assert_eq!(second["node_count"], first["node_count"]);
    assert_eq!(second["edge_count"], first["edge_count"]);
}

#[test]
fn test_build_reads_config_file() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("data");
    std::fs::create_dir_all(&data).unwrap();
    std::fs::write(
        data.join("docgraph.toml"),
        "[linker.kind_thresholds]\nCALLS_CODE = 0.99\n",
    )
    .unwrap();
    let input = dir.path().join("decls.jsonl");
    std::fs::write(&input, DECLARATIONS).unwrap();

    let result = json(&docgraph(&data, &["build", "--app", "shop", "--input", input.to_str().unwrap()]));
    assert!(result["edges_rejected"].as_u64().unwrap() >= 1);
    assert!(result["warnings"]
        .as_array()
        .unwrap()
        .iter()
        .any(|w| w.as_str().unwrap_or("").contains("below CALLS_CODE threshold")));
}

// ── Stats & deletion ─────────────────────────────────────────────────────────

#[test]
fn test_stats_and_delete_app() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("data");
    let input = dir.path().join("decls.jsonl");
    std::fs::write(&input, DECLARATIONS).unwrap();

    let built = json(&docgraph(&data, &["build", "--app", "shop", "--input", input.to_str().unwrap()]));

    let stats = json(&docgraph(&data, &["stats", "--app", "shop", "--json"]));
    assert_eq!(stats["nodes"], built["node_count"]);
    assert_eq!(stats["edges"], built["edge_count"]);
    assert_eq!(stats["metrics"]["runs"], 1);

    let overview = json(&docgraph(&data, &["stats", "--json"]));
    assert_eq!(overview["applications"], 1);

    docgraph(&data, &["delete-app", "--app", "shop"]);

    let app_id: uuid::Uuid = serde_json::from_value(built["application_id"].clone()).unwrap();
    let store = RedbStorage::open(data.join("docgraph.redb")).unwrap();
    assert_eq!(store.count_nodes(NodeFilter::new().for_application(app_id)).unwrap(), 0);
    assert_eq!(store.count_edges(app_id).unwrap(), 0);
    assert!(LinkerMetrics::load(&store, app_id).unwrap().is_none());
}

#[test]
fn test_unknown_app_fails() {
    let dir = tempdir().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_docgraph"))
        .arg("--data-dir")
        .arg(dir.path())
        .args(["delete-app", "--app", "missing"])
        .output()
        .unwrap();
    assert!(!output.status.success());
}
