//! Storage node server
//!
//! The node accepts client connections and serves each one on its own task.
//! Workers live in a [`JoinSet`], so shutdown has an explicit join point:
//! the accept loop stops, idle workers are told to finish, and anything
//! still running after the drain timeout is aborted.

pub mod handler;

pub use handler::serve_connection;

use crate::config::NodeConfig;
use crate::storage::{ChunkStorage, DiskStore};
use crate::Result;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// A listening storage node
pub struct NodeServer<S: ChunkStorage + 'static> {
    listener: TcpListener,
    store: Arc<S>,
    drain_timeout: Duration,
}

impl<S: ChunkStorage + 'static> NodeServer<S> {
    /// Bind a node to `addr`, serving records from `store`
    pub async fn bind(addr: SocketAddr, store: Arc<S>) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            store,
            drain_timeout: Duration::from_secs(5),
        })
    }

    /// Set how long in-flight connections may finish after shutdown
    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    /// Address the node is listening on
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// The store behind this node
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Accept connections until `shutdown` resolves, then drain the workers
    pub async fn serve<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut workers = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!("accepted connection from {}", peer);
                        let store = Arc::clone(&self.store);
                        let stop_rx = stop_rx.clone();
                        workers.spawn(async move {
                            if let Err(e) = serve_connection(stream, store, stop_rx).await {
                                warn!("connection from {} ended with error: {}", peer, e);
                            }
                        });
                    }
                    Err(e) => warn!("error accepting connection: {}", e),
                },
                Some(joined) = workers.join_next(), if !workers.is_empty() => {
                    if let Err(e) = joined {
                        error!("connection worker failed: {}", e);
                    }
                }
            }
        }

        info!(
            "shutting down, draining {} connection(s)",
            workers.len()
        );
        let _ = stop_tx.send(true);
        drop(self.listener);

        let drained = tokio::time::timeout(self.drain_timeout, async {
            while let Some(joined) = workers.join_next().await {
                if let Err(e) = joined {
                    error!("connection worker failed: {}", e);
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!("aborting {} connection(s) after drain timeout", workers.len());
            workers.shutdown().await;
        }

        Ok(())
    }
}

/// Open the disk store and serve it until Ctrl-C / SIGTERM
pub async fn run_node(config: NodeConfig) -> Result<()> {
    config.validate()?;

    let store = Arc::new(DiskStore::open(&config.storage_dir)?);
    let server = NodeServer::bind(config.listen_addr, store)
        .await?
        .with_drain_timeout(config.drain_timeout);

    info!(
        "node started on {} in directory {:?}",
        server.local_addr()?,
        config.storage_dir
    );

    server.serve(shutdown_signal()).await?;
    info!("node shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{read_frame, write_frame};
    use crate::storage::MemoryStore;
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;

    async fn start() -> (SocketAddr, oneshot::Sender<()>, tokio::task::JoinHandle<Result<()>>) {
        let store = Arc::new(MemoryStore::new());
        let server = NodeServer::bind("127.0.0.1:0".parse().unwrap(), store)
            .await
            .unwrap()
            .with_drain_timeout(Duration::from_millis(200));
        let addr = server.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();
        let handle = tokio::spawn(server.serve(async move {
            let _ = rx.await;
        }));
        (addr, tx, handle)
    }

    #[tokio::test]
    async fn test_serves_concurrent_connections() {
        let (addr, stop, handle) = start().await;

        let mut first = TcpStream::connect(addr).await.unwrap();
        let mut second = TcpStream::connect(addr).await.unwrap();

        write_frame(&mut second, b"CHECK a").await.unwrap();
        write_frame(&mut first, b"LIST").await.unwrap();
        assert_eq!(read_frame(&mut second).await.unwrap(), b"NOT_FOUND");
        assert_eq!(read_frame(&mut first).await.unwrap(), b"");

        stop.send(()).unwrap();
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_with_idle_client_connected() {
        let (addr, stop, handle) = start().await;
        let _idle = TcpStream::connect(addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        stop.send(()).unwrap();
        let finished = tokio::time::timeout(Duration::from_secs(2), handle).await;
        assert!(finished.is_ok());
    }

    #[tokio::test]
    async fn test_worker_stuck_in_put_is_aborted_after_drain() {
        let (addr, stop, handle) = start().await;

        // announce a PUT and never send its chunks
        let mut client = TcpStream::connect(addr).await.unwrap();
        write_frame(&mut client, b"PUT stuck.bin 4 8").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let started = std::time::Instant::now();
        stop.send(()).unwrap();
        let finished = tokio::time::timeout(Duration::from_secs(2), handle).await;
        let elapsed = started.elapsed();

        assert!(finished.unwrap().unwrap().is_ok());
        assert!(elapsed >= Duration::from_millis(150), "returned after {:?}", elapsed);

        // the aborted worker closed the connection without replying
        let reply = crate::protocol::read_frame_or_eof(&mut client).await;
        assert!(!matches!(reply, Ok(Some(_))));
    }
}
