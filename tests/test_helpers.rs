//! Test helpers for running in-process node fleets
//!
//! Nodes listen on ephemeral localhost ports; "down" roster entries point at
//! a port nothing listens on.

#![allow(dead_code)]

use chunkfleet::{ChunkStorage, ClientConfig, Fleet, MemoryStore, NodeServer, NodeSpec, Roster};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// A running node and the handle to stop it
pub struct TestNode<S: ChunkStorage + 'static> {
    pub addr: SocketAddr,
    pub store: Arc<S>,
    stop: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<chunkfleet::Result<()>>>,
}

impl<S: ChunkStorage + 'static> TestNode<S> {
    /// Start a node serving `store`
    pub async fn start(store: Arc<S>) -> Self {
        let server = NodeServer::bind("127.0.0.1:0".parse().unwrap(), store.clone())
            .await
            .expect("bind node")
            .with_drain_timeout(Duration::from_millis(200));
        let addr = server.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();
        let handle = tokio::spawn(server.serve(async move {
            let _ = rx.await;
        }));

        Self {
            addr,
            store,
            stop: Some(tx),
            handle: Some(handle),
        }
    }

    /// Stop accepting connections and wait for the node to finish
    pub async fn stop(&mut self) {
        if let Some(tx) = self.stop.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.await.unwrap().unwrap();
        }
    }

    pub fn spec(&self, name: &str) -> NodeSpec {
        NodeSpec::new(name, "127.0.0.1", self.addr.port())
    }
}

/// Start `count` nodes backed by memory stores
pub async fn memory_nodes(count: usize) -> Vec<TestNode<MemoryStore>> {
    let mut nodes = Vec::with_capacity(count);
    for _ in 0..count {
        nodes.push(TestNode::start(Arc::new(MemoryStore::new())).await);
    }
    nodes
}

/// A localhost port with no listener
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Roster over `nodes`, with the positions in `down` pointing at closed ports
pub fn roster_with_down<S: ChunkStorage + 'static>(
    nodes: &[TestNode<S>],
    down: &[usize],
) -> Roster {
    let specs = nodes
        .iter()
        .enumerate()
        .map(|(i, node)| {
            let name = format!("dfs{}", i + 1);
            if down.contains(&i) {
                NodeSpec::new(name, "127.0.0.1", closed_port())
            } else {
                node.spec(&name)
            }
        })
        .collect();
    Roster::new(specs).unwrap()
}

/// Client configuration with timeouts suited to loaded CI machines
pub fn test_config() -> ClientConfig {
    let mut config = ClientConfig::new("unused.conf");
    config.connect_timeout = Duration::from_secs(2);
    config.io_timeout = Duration::from_secs(5);
    config
}

/// Connect a fleet to `nodes` with the positions in `down` unreachable
pub async fn connect_fleet<S: ChunkStorage + 'static>(nodes: &[TestNode<S>], down: &[usize]) -> Fleet {
    Fleet::connect(roster_with_down(nodes, down), &test_config()).await
}
