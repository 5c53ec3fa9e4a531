use crate::apps;
use crate::cli::{open_store, StatsArgs};
use anyhow::{bail, Result};
use docgraph_core::{GraphStore, LinkerMetrics, NodeFilter};
use std::path::Path;

pub async fn run(args: StatsArgs, data_dir: &Path) -> Result<()> {
    let store = open_store(data_dir)?;

    match &args.app {
        Some(key) => app_stats(&store, key, args.json),
        None => overview(&store, args.json),
    }
}

fn overview(store: &dyn GraphStore, json: bool) -> Result<()> {
    let stats = store.stats()?;

    let mut kinds: Vec<_> = stats
        .node_counts_by_kind
        .iter()
        .map(|(k, c)| (k.to_string(), *c))
        .collect();
    kinds.sort();
    let mut edge_kinds: Vec<_> = stats
        .edge_counts_by_kind
        .iter()
        .map(|(k, c)| (k.to_string(), *c))
        .collect();
    edge_kinds.sort();

    if json {
        let value = serde_json::json!({
            "applications": stats.application_count,
            "nodes": stats.node_count,
            "edges": stats.edge_count,
            "library_edges": stats.library_edge_count,
            "nodes_by_kind": kinds.into_iter().collect::<std::collections::BTreeMap<_, _>>(),
            "edges_by_kind": edge_kinds.into_iter().collect::<std::collections::BTreeMap<_, _>>(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!();
    println!("Graph Overview");
    println!("{}", "─".repeat(50));
    println!("Applications: {:>8}", stats.application_count);
    println!("Nodes:        {:>8}", stats.node_count);
    for (kind, count) in &kinds {
        println!("  {:20} {:>8}", kind, count);
    }
    println!("Edges:        {:>8}", stats.edge_count);
    for (kind, count) in &edge_kinds {
        println!("  {:20} {:>8}", kind, count);
    }
    println!("Library edges: {:>7}", stats.library_edge_count);
    println!("{}", "─".repeat(50));
    println!();

    Ok(())
}

fn app_stats(store: &dyn GraphStore, key: &str, json: bool) -> Result<()> {
    let Some(app) = apps::find(store, key)? else {
        bail!("unknown application `{}`", key);
    };
    let nodes = store.count_nodes(NodeFilter::new().for_application(app.id))?;
    let edges = store.count_edges(app.id)?;
    let metrics = LinkerMetrics::load(store, app.id)?;

    if json {
        let value = serde_json::json!({
            "application": app.key,
            "application_id": app.id,
            "nodes": nodes,
            "edges": edges,
            "metrics": metrics,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!();
    println!("Application {} ({})", app.key, app.id);
    println!("{}", "─".repeat(50));
    println!("Nodes:   {:>8}", nodes);
    println!("Edges:   {:>8}", edges);
    match metrics {
        Some(m) => {
            for (kind, count) in &m.edges_by_kind {
                println!("  {:20} {:>8}", kind, count);
            }
            println!("{}", m.summary());
        }
        None => println!("No completed build yet"),
    }
    println!("{}", "─".repeat(50));
    println!();

    Ok(())
}
