//! End-to-end demo of the pose lattice store
//!
//! Adds three nodes, links them, prints the neighbors of the first one, and
//! then bulk-inserts 20 000 nodes to report ingest throughput.
//!
//! # Usage
//!
//! ```bash
//! cargo run --release --bin spotgraph-demo
//!
//! # Against another store
//! SPOTGRAPH_DATABASE_URL=libsql://spot.example.io?authToken=... \
//!     cargo run --release --bin spotgraph-demo
//! ```
//!
//! Falls back to `./data/spotgraph_demo.db` when `SPOTGRAPH_DATABASE_URL`
//! is not set. `SPOTGRAPH_CHUNK_SIZE` tunes the bulk insert.

use spotgraph_core::config::DATABASE_URL_ENV;
use spotgraph_core::{Direction, GraphStore, SpotGraph, SpotNode, StoreConfig};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

const DEFAULT_DEMO_URL: &str = "./data/spotgraph_demo.db";
const BULK_NODE_COUNT: usize = 20_000;

fn demo_config() -> anyhow::Result<StoreConfig> {
    if std::env::var_os(DATABASE_URL_ENV).is_some() {
        return StoreConfig::from_env().map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e));
    }
    Ok(StoreConfig::from_url(DEFAULT_DEMO_URL))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("spotgraph_demo=info,spotgraph_core=info")),
        )
        .init();

    let config = demo_config()?;
    println!("📡 Connecting to {}...", config.url);
    let graph = match SpotGraph::connect(config).await {
        Ok(graph) => {
            println!("✅ Connected");
            graph
        }
        Err(e) => {
            eprintln!("❌ Failed to connect: {}", e);
            return Err(e.into());
        }
    };

    let a = graph
        .add_node(&SpotNode::new(&[0.0, 0.0, 0.0], &[0.0; 3], None)?)
        .await?;
    let b = graph
        .add_node(&SpotNode::new(&[2.0, 0.0, 0.0], &[0.0; 3], None)?)
        .await?;
    let c = graph
        .add_node(&SpotNode::new(&[1.0, 3.0, 2.0], &[0.0; 3], None)?)
        .await?;
    println!("🧭 Nodes: A={} B={} C={}", a, b, c);

    graph.set_link(a, Direction::Right, b).await?;
    graph.set_link(a, Direction::Front, c).await?;

    if let Some(links) = graph.neighbors(a).await? {
        let listed = links
            .iter()
            .map(|(direction, id)| format!("{}={}", direction, id))
            .collect::<Vec<_>>()
            .join(", ");
        println!("   Neighbors of A: {}", listed);
    }

    let nodes = (0..BULK_NODE_COUNT)
        .map(|i| {
            let v = i as f64;
            SpotNode::new(&[v, v, v], &[v, v, 0.0], None)
        })
        .collect::<Result<Vec<_>, _>>()?;

    println!("\n🚀 Bulk inserting {} nodes...", nodes.len());
    let start = Instant::now();
    let ids = graph.add_nodes_bulk(&nodes).await?;
    let elapsed = start.elapsed().as_secs_f64();

    println!("✅ Resolved {} nodes in {:.2} seconds", ids.len(), elapsed);
    println!("   {:.2} nodes/s", ids.len() as f64 / elapsed.max(f64::EPSILON));
    println!("   Store now holds {} nodes", graph.node_count().await?);

    graph.close();
    Ok(())
}
