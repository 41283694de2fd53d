//! Performance benchmarks for spotgraph core operations
//!
//! Run with: `cargo bench -p spotgraph-core`
//!
//! These benchmarks measure critical path performance:
//! - Bulk node insertion vs one-at-a-time create-or-get
//! - Re-running a bulk insert over already stored poses
//! - Bulk link updates across a lattice

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use spotgraph_core::{Direction, GraphStore, LinkEdge, SpotGraph, SpotNode, StoreConfig};
use tempfile::TempDir;
use tokio::runtime::Runtime;

/// Setup a graph backed by a fresh database
async fn setup_test_graph() -> (SpotGraph, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("bench.db");

    let graph = SpotGraph::connect(StoreConfig::from_url(db_path.display().to_string()))
        .await
        .unwrap();
    (graph, temp_dir)
}

/// Generate a cube lattice of `side^3` nodes with 0.1 spacing
fn generate_lattice(side: usize) -> Vec<SpotNode> {
    let mut nodes = Vec::with_capacity(side * side * side);
    for i in 0..side {
        for j in 0..side {
            for k in 0..side {
                let position = [i as f64 * 0.1, j as f64 * 0.1, k as f64 * 0.1];
                nodes.push(SpotNode::new(&position, &[0.0; 3], None).unwrap());
            }
        }
    }
    nodes
}

/// Benchmark bulk vs single-row insertion
///
/// Target: bulk insertion at least 10x faster than single inserts
fn bench_insertion(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("insert_nodes");
    group.sample_size(10); // Fewer samples for expensive operations

    for side in [10usize, 20] {
        let nodes = generate_lattice(side);

        group.bench_with_input(BenchmarkId::new("bulk", nodes.len()), &nodes, |b, nodes| {
            b.iter_custom(|iters| {
                rt.block_on(async {
                    let mut total = std::time::Duration::ZERO;
                    for _ in 0..iters {
                        let (graph, _temp) = setup_test_graph().await;

                        let start = std::time::Instant::now();
                        black_box(graph.add_nodes_bulk(nodes).await.unwrap());
                        total += start.elapsed();
                    }
                    total
                })
            });
        });

        group.bench_with_input(BenchmarkId::new("single", nodes.len()), &nodes, |b, nodes| {
            b.iter_custom(|iters| {
                rt.block_on(async {
                    let mut total = std::time::Duration::ZERO;
                    for _ in 0..iters {
                        let (graph, _temp) = setup_test_graph().await;

                        let start = std::time::Instant::now();
                        for node in nodes {
                            black_box(graph.add_node(node).await.unwrap());
                        }
                        total += start.elapsed();
                    }
                    total
                })
            });
        });
    }

    group.finish();
}

/// Benchmark a bulk insert where every pose is already stored
fn bench_bulk_rerun(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let nodes = generate_lattice(20);

    c.bench_function("bulk_rerun_8000", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let (graph, _temp) = setup_test_graph().await;
                graph.add_nodes_bulk(&nodes).await.unwrap();

                let start = std::time::Instant::now();
                for _ in 0..iters {
                    black_box(graph.add_nodes_bulk(&nodes).await.unwrap());
                }
                start.elapsed()
            })
        });
    });
}

/// Benchmark linking every node to its +x neighbor (both directions)
fn bench_bulk_links(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let side = 10;
    let nodes = generate_lattice(side);

    let mut group = c.benchmark_group("set_links_bulk");
    group.sample_size(10);

    group.bench_function("front_back_1000", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let mut total = std::time::Duration::ZERO;
                for _ in 0..iters {
                    let (graph, _temp) = setup_test_graph().await;
                    let ids = graph.add_nodes_bulk(&nodes).await.unwrap();

                    let step = side * side;
                    let edges: Vec<LinkEdge> = (0..ids.len() - step)
                        .flat_map(|i| LinkEdge::bidirectional(ids[i], Direction::Front, ids[i + step]))
                        .collect();

                    let start = std::time::Instant::now();
                    black_box(graph.set_links_bulk(&edges).await.unwrap());
                    total += start.elapsed();
                }
                total
            })
        });
    });

    group.finish();
}

criterion_group!(benches, bench_insertion, bench_bulk_rerun, bench_bulk_links);
criterion_main!(benches);
