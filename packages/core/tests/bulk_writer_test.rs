//! Integration tests for chunked bulk insertion
//!
//! Tests cover:
//! - Input-order ids with in-batch duplicates
//! - Idempotent re-runs against already stored poses
//! - Per-chunk atomicity and the PartialBulkFailure report
//! - Cancellation leaving only whole chunks behind

use anyhow::Result;
use spotgraph_core::db::FaultPoint;
use spotgraph_core::{GraphError, GraphStore, JointAngles, SpotGraph, SpotNode, StoreConfig};
use std::collections::HashSet;
use tempfile::TempDir;

/// Test helper: Create a graph with the given chunk size
async fn create_test_graph(chunk_size: usize) -> Result<(SpotGraph, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let config = StoreConfig {
        chunk_size,
        ..StoreConfig::from_url(db_path.display().to_string())
    };
    let graph = SpotGraph::connect(config).await?;
    Ok((graph, temp_dir))
}

/// `count` distinct nodes stepping along x
fn line_of_nodes(count: usize) -> Result<Vec<SpotNode>> {
    (0..count)
        .map(|i| -> Result<SpotNode> {
            Ok(SpotNode::new(&[i as f64 * 0.1, 0.0, 0.2], &[0.0; 3], None)?)
        })
        .collect()
}

#[tokio::test]
async fn test_bulk_returns_ids_in_input_order_with_duplicates() -> Result<()> {
    let (graph, _temp_dir) = create_test_graph(500).await?;

    let a = SpotNode::new(&[0.0, 0.0, 0.2], &[0.0; 3], None)?;
    let b = SpotNode::new(&[0.0, 0.0, 0.3], &[0.0; 3], None)?;

    let ids = graph
        .add_nodes_bulk(&[a.clone(), a.clone(), b.clone()])
        .await?;

    assert_eq!(ids.len(), 3);
    assert_eq!(ids[0], ids[1]);
    assert_ne!(ids[0], ids[2]);
    assert_eq!(graph.node_count().await?, 2);

    assert_eq!(graph.find_node(&a.pose).await?, Some(ids[0]));
    assert_eq!(graph.find_node(&b.pose).await?, Some(ids[2]));
    Ok(())
}

#[tokio::test]
async fn test_empty_bulk_is_noop() -> Result<()> {
    let (graph, _temp_dir) = create_test_graph(500).await?;
    assert!(graph.add_nodes_bulk(&[]).await?.is_empty());
    assert_eq!(graph.node_count().await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_bulk_rerun_returns_same_ids() -> Result<()> {
    let (graph, _temp_dir) = create_test_graph(4).await?;
    let nodes = line_of_nodes(10)?;

    let first = graph.add_nodes_bulk(&nodes).await?;
    let second = graph.add_nodes_bulk(&nodes).await?;

    assert_eq!(first, second);
    assert_eq!(graph.node_count().await?, 10);
    Ok(())
}

#[tokio::test]
async fn test_bulk_agrees_with_single_inserts() -> Result<()> {
    let (graph, _temp_dir) = create_test_graph(3).await?;
    let nodes = line_of_nodes(5)?;

    let single = graph.add_node(&nodes[2]).await?;
    let ids = graph.add_nodes_bulk(&nodes).await?;

    assert_eq!(ids[2], single);
    for (node, id) in nodes.iter().zip(&ids) {
        assert_eq!(graph.find_node(&node.pose).await?, Some(*id));
    }
    Ok(())
}

#[tokio::test]
async fn test_duplicates_across_chunks_share_id() -> Result<()> {
    let (graph, _temp_dir) = create_test_graph(2).await?;

    let mut nodes = line_of_nodes(3)?;
    nodes.push(nodes[0].clone());
    nodes.push(nodes[1].clone());

    let ids = graph.add_nodes_bulk(&nodes).await?;

    assert_eq!(ids[0], ids[3]);
    assert_eq!(ids[1], ids[4]);
    assert_eq!(ids.iter().collect::<HashSet<_>>().len(), 3);
    assert_eq!(graph.node_count().await?, 3);
    Ok(())
}

#[tokio::test]
async fn test_first_occurrence_joint_angles_are_stored() -> Result<()> {
    let (graph, _temp_dir) = create_test_graph(500).await?;

    let first = JointAngles::from([("hip".to_string(), 0.5)]);
    let second = JointAngles::from([("hip".to_string(), -0.5)]);
    let nodes = [
        SpotNode::new(&[1.0, 1.0, 0.2], &[0.0; 3], Some(first.clone()))?,
        SpotNode::new(&[1.0, 1.0, 0.2], &[0.0; 3], Some(second))?,
    ];

    let ids = graph.add_nodes_bulk(&nodes).await?;
    let stored = graph.get_node(ids[0]).await?.expect("node should exist");
    assert_eq!(stored.joint_angle, first);
    Ok(())
}

#[tokio::test]
async fn test_non_finite_joint_angle_rejects_whole_batch() -> Result<()> {
    let (graph, _temp_dir) = create_test_graph(2).await?;

    let mut nodes = line_of_nodes(5)?;
    nodes[4]
        .joint_angle
        .insert("fr.kn".to_string(), f64::INFINITY);

    let err = graph.add_nodes_bulk(&nodes).await.unwrap_err();
    assert!(matches!(err, GraphError::InvalidJointAngle { ref joint, .. } if joint == "fr.kn"));
    // Validation runs before the first chunk is written
    assert_eq!(graph.node_count().await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_failed_chunk_keeps_earlier_chunks() -> Result<()> {
    let (graph, _temp_dir) = create_test_graph(4).await?;
    let nodes = line_of_nodes(10)?;

    // Chunk 0 commits, chunk 1 fails before its commit
    graph
        .fault_injector()
        .configure(FaultPoint::BulkInsertChunkBeforeCommit, 1, 1);

    let err = graph.add_nodes_bulk(&nodes).await.unwrap_err();
    let committed_ids = match err {
        GraphError::PartialBulkFailure {
            committed_count,
            first_failed_chunk,
            committed_ids,
            ..
        } => {
            assert_eq!(committed_count, 4);
            assert_eq!(first_failed_chunk, 1);
            assert_eq!(committed_ids.len(), 4);
            committed_ids
        }
        other => panic!("expected PartialBulkFailure, got {other:?}"),
    };

    assert_eq!(graph.node_count().await?, 4);
    assert!(graph.find_node(&nodes[4].pose).await?.is_none());

    // Retrying the whole input completes and reuses the committed ids
    let ids = graph.add_nodes_bulk(&nodes).await?;
    assert_eq!(&ids[..4], committed_ids.as_slice());
    assert_eq!(graph.node_count().await?, 10);
    Ok(())
}

#[tokio::test]
async fn test_failure_in_first_chunk_commits_nothing() -> Result<()> {
    let (graph, _temp_dir) = create_test_graph(4).await?;
    let nodes = line_of_nodes(10)?;

    graph
        .fault_injector()
        .configure(FaultPoint::BulkInsertChunkBeforeCommit, 0, 1);

    let err = graph.add_nodes_bulk(&nodes).await.unwrap_err();
    assert!(matches!(
        err,
        GraphError::PartialBulkFailure {
            committed_count: 0,
            first_failed_chunk: 0,
            ..
        }
    ));
    assert_eq!(graph.node_count().await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_cancelled_bulk_leaves_whole_chunks() -> Result<()> {
    let (graph, _temp_dir) = create_test_graph(4).await?;
    let nodes = line_of_nodes(10)?;

    // Chunk 0 commits; chunk 1 suspends with its rows written but not committed
    graph
        .fault_injector()
        .park(FaultPoint::BulkInsertChunkBeforeCommit, 1);

    tokio::select! {
        result = graph.add_nodes_bulk(&nodes) => {
            panic!("bulk insert completed instead of suspending: {result:?}")
        }
        _ = graph.fault_injector().wait_parked() => {}
    }
    // The bulk insert future is dropped here, mid-transaction

    assert_eq!(graph.node_count().await?, 4);
    assert!(graph.find_node(&nodes[4].pose).await?.is_none());
    assert_eq!(
        graph.available_connections(),
        graph.config().max_connections
    );

    // The abandoned transaction does not leak into the next caller
    let ids = graph.add_nodes_bulk(&nodes).await?;
    assert_eq!(ids.len(), 10);
    assert_eq!(graph.node_count().await?, 10);
    Ok(())
}
