use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use docgraph_core::facts::FactKind;
use docgraph_core::linker::{EdgePipeline, EdgeProposal, Evidence, LinkerConfig, MergeRule, NodeIndex};
use docgraph_core::storage::{GraphStore, RedbStorage};
use docgraph_core::sink::GraphSink;
use docgraph_core::types::*;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

fn create_nodes(count: usize) -> Vec<Node> {
    let app = Uuid::now_v7();
    (0..count)
        .map(|i| {
            Node::new(
                app,
                format!("com.bench.Type{}.run()", i),
                "run",
                NodeKind::Method,
                "kotlin",
            )
        })
        .collect()
}

/// Every node proposes CALLS_CODE to its next three neighbours, twice, with
/// different confidences, so merging has work to do.
fn create_proposals(nodes: &[Node]) -> Vec<EdgeProposal> {
    let mut out = Vec::new();
    for (i, node) in nodes.iter().enumerate() {
        for step in 1..=3 {
            let target = &nodes[(i + step) % nodes.len()];
            for confidence in [0.6, 0.9] {
                out.push(EdgeProposal::to_node(
                    EdgeKind::CallsCode,
                    node.id,
                    target.id,
                    Evidence::new(FactKind::CallSite, confidence),
                ));
            }
        }
    }
    out
}

fn bench_pipeline(c: &mut Criterion) {
    let nodes = create_nodes(1000);
    let proposals = create_proposals(&nodes);
    let index = NodeIndex::new(nodes);

    for (label, rule) in [("max", MergeRule::Max), ("noisy_or", MergeRule::NoisyOr)] {
        let config = LinkerConfig::default().with_merge_rule(rule);
        c.bench_function(&format!("pipeline 6000 proposals ({})", label), |b| {
            b.iter_batched(
                || proposals.clone(),
                |p| EdgePipeline::new(&config).run(p, &index).unwrap(),
                BatchSize::LargeInput,
            );
        });
    }
}

fn bench_sink(c: &mut Criterion) {
    let nodes = create_nodes(500);
    let proposals = create_proposals(&nodes);
    let index = NodeIndex::new(nodes.clone());
    let accepted = EdgePipeline::new(&LinkerConfig::default())
        .run(proposals, &index)
        .unwrap()
        .accepted;

    c.bench_function("sink 1500 edges into redb", |b| {
        b.iter_batched(
            || {
                let temp_dir = TempDir::new().unwrap();
                let storage = RedbStorage::open(temp_dir.path().join("bench.redb")).unwrap();
                for node in &nodes {
                    storage.upsert_node(node).unwrap();
                }
                (Arc::new(storage), temp_dir)
            },
            |(storage, _temp)| GraphSink::new(storage).upsert_edges(&accepted).unwrap(),
            BatchSize::PerIteration,
        );
    });
}

criterion_group!(benches, bench_pipeline, bench_sink);
criterion_main!(benches);
