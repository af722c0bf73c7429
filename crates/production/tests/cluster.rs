//! In-process cluster test over real TCP.
//!
//! Boots all five nodes inside one tokio runtime, each with its own
//! listener, timers, snapshot file, and event loop, and commits a transfer
//! end to end. The artificial wire delay is set to zero so the test runs
//! in milliseconds.

use paxchain_core::Event;
use paxchain_node::NodeStateMachine;
use paxchain_paxos::PaxosConfig;
use paxchain_production::{
    spawn_listener, ChainView, ClusterConfig, NodeRunner, Outbound, SharedChainView,
    SnapshotStore, TimerManager,
};
use paxchain_sync::CatchupConfig;
use paxchain_types::{LedgerSnapshot, NodeId};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

struct TestNode {
    event_tx: mpsc::Sender<Event>,
    view: SharedChainView,
    _shutdown_tx: mpsc::Sender<()>,
}

/// Bind five listeners on ephemeral ports, wire the cluster config from
/// the real addresses, and spawn five runners.
async fn boot_cluster(dir: &std::path::Path) -> Vec<TestNode> {
    let mut listeners = Vec::new();
    for id in 1..=5u64 {
        let (event_tx, event_rx) = mpsc::channel(1024);
        let failed = Arc::new(AtomicBool::new(false));
        let (addr, _handle) = spawn_listener(
            "127.0.0.1:0".parse().unwrap(),
            event_tx.clone(),
            Arc::clone(&failed),
        )
        .await
        .unwrap();
        listeners.push((NodeId(id), addr, event_tx, event_rx, failed));
    }

    let config_text = format!(
        "[peers]\n{}",
        listeners
            .iter()
            .map(|(node, addr, ..)| format!("{} = \"{}\"\n", node, addr))
            .collect::<String>()
    );
    let cluster: Arc<ClusterConfig> = Arc::new(config_text.parse().unwrap());

    let mut nodes = Vec::new();
    for (node, _, event_tx, event_rx, failed) in listeners {
        let outbound = Outbound::new(
            Arc::clone(&cluster),
            node,
            Arc::clone(&failed),
            Duration::ZERO,
        );
        let timers = TimerManager::new(event_tx.clone());
        let store = SnapshotStore::for_node(dir, node);
        let view = ChainView::shared(LedgerSnapshot::default());
        let machine = NodeStateMachine::new(
            node,
            node.0,
            PaxosConfig::default(),
            CatchupConfig::default(),
            LedgerSnapshot::default(),
        );
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let runner = NodeRunner::new(
            machine,
            event_rx,
            timers,
            outbound,
            store,
            Arc::clone(&view),
            failed,
        );
        tokio::spawn(async move {
            let _ = runner.run(shutdown_rx).await;
        });
        nodes.push(TestNode {
            event_tx,
            view,
            _shutdown_tx: shutdown_tx,
        });
    }
    nodes
}

#[tokio::test(flavor = "multi_thread")]
async fn five_nodes_commit_a_transfer_over_tcp() {
    let dir = tempfile::tempdir().unwrap();
    let nodes = boot_cluster(dir.path()).await;

    nodes[0]
        .event_tx
        .send(Event::SubmitTransfer {
            receiver: NodeId(2),
            amount: 30,
        })
        .await
        .unwrap();

    // Wait for every node to reach depth 1.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let depths: Vec<usize> = nodes.iter().map(|n| n.view.read().depth()).collect();
        if depths.iter().all(|&d| d == 1) {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "cluster did not converge, depths: {depths:?}"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    // Identical chains and the expected money movement everywhere.
    let reference = nodes[0].view.read().chain().to_vec();
    assert_eq!(reference.len(), 1);
    assert_eq!(reference[0].amount, 30);
    for node in &nodes {
        let view = node.view.read();
        assert_eq!(view.chain(), reference.as_slice());
        assert_eq!(view.balances()[&NodeId(1)], 70);
        assert_eq!(view.balances()[&NodeId(2)], 130);
    }

    // Every node persisted its snapshot.
    for id in 1..=5 {
        let store = SnapshotStore::for_node(dir.path(), NodeId(id));
        let stored = store.load().unwrap().expect("snapshot written");
        assert_eq!(stored.depth(), 1);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn rejected_transfer_touches_no_state() {
    let dir = tempfile::tempdir().unwrap();
    let nodes = boot_cluster(dir.path()).await;

    nodes[0]
        .event_tx
        .send(Event::SubmitTransfer {
            receiver: NodeId(2),
            amount: 150,
        })
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    for node in &nodes {
        assert_eq!(node.view.read().depth(), 0);
    }
    let store = SnapshotStore::for_node(dir.path(), NodeId(1));
    assert!(store.load().unwrap().is_none(), "nothing should persist");
}
