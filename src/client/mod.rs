//! Client side of the store
//!
//! A [`Fleet`] is built once per invocation: the roster plus the result of
//! one connection attempt per node. Every operation takes the fleet
//! explicitly. A node that failed to connect keeps its roster position, so
//! placement stays stable, but it is skipped by everything that follows.

pub mod download;
pub mod link;
pub mod listing;
pub mod roster;
pub mod upload;

pub use download::{check_complete, chunk_coverage, download, fetch};
pub use link::NodeLink;
pub use listing::{list, ListEntry};
pub use roster::{NodeSpec, Roster};
pub use upload::{upload, upload_bytes, NodeOutcome, UploadReport};

use crate::config::ClientConfig;
use crate::protocol::is_valid_name;
use crate::{Error, Result};
use std::path::Path;
use tracing::{debug, warn};

/// Roster plus the live connections established at startup
#[derive(Debug)]
pub struct Fleet {
    roster: Roster,
    links: Vec<Option<NodeLink>>,
    quorum: usize,
}

impl Fleet {
    /// Try every node once; unreachable nodes stay down for the fleet's lifetime
    pub async fn connect(roster: Roster, config: &ClientConfig) -> Self {
        let mut links = Vec::with_capacity(roster.len());

        for spec in roster.nodes() {
            match NodeLink::connect(spec, config.connect_timeout, config.io_timeout).await {
                Ok(link) => {
                    debug!("connected to server {}", spec);
                    links.push(Some(link));
                }
                Err(e) => {
                    debug!("{}", e);
                    links.push(None);
                }
            }
        }

        Self {
            roster,
            links,
            quorum: config.quorum,
        }
    }

    /// The configured roster
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Minimum live nodes for an upload
    pub fn quorum(&self) -> usize {
        self.quorum
    }

    /// Whether the node at `position` is live
    pub fn is_live(&self, position: usize) -> bool {
        matches!(self.links.get(position), Some(Some(_)))
    }

    /// Number of live nodes
    pub fn live_count(&self) -> usize {
        self.links.iter().filter(|link| link.is_some()).count()
    }

    /// Roster positions of live nodes, in order
    pub fn live_positions(&self) -> Vec<usize> {
        (0..self.links.len())
            .filter(|&position| self.is_live(position))
            .collect()
    }

    /// Name of the node at `position`
    pub fn node_name(&self, position: usize) -> &str {
        self.roster
            .get(position)
            .map(|spec| spec.name.as_str())
            .unwrap_or("?")
    }

    pub(crate) fn link_mut(&mut self, position: usize) -> Option<&mut NodeLink> {
        self.links.get_mut(position).and_then(Option::as_mut)
    }

    /// Note a failed exchange with the node at `position`
    ///
    /// If the stream can no longer be trusted the link is closed and the node
    /// counts as down for the rest of the run.
    pub(crate) fn node_failed(&mut self, position: usize, error: &Error) {
        warn!("server {}: {}", self.node_name(position), error);
        if error.breaks_link() {
            debug!("closing link to {}", self.node_name(position));
            if let Some(slot) = self.links.get_mut(position) {
                *slot = None;
            }
        }
    }
}

/// File identifier for a local path: its final component
pub fn file_identifier(path: &Path) -> Result<String> {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| Error::InvalidName(path.display().to_string()))?;
    ensure_valid_name(name)?;
    Ok(name.to_string())
}

pub(crate) fn ensure_valid_name(name: &str) -> Result<()> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(Error::InvalidName(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn test_file_identifier() {
        assert_eq!(
            file_identifier(&PathBuf::from("/home/me/notes.txt")).unwrap(),
            "notes.txt"
        );
        assert_eq!(file_identifier(Path::new("plain")).unwrap(), "plain");
        assert!(file_identifier(Path::new("/")).is_err());
        assert!(file_identifier(Path::new("has space.txt")).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_nodes_keep_position() {
        // bind then drop to get a port nobody listens on
        let closed = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = closed.local_addr().unwrap().port();
        drop(closed);

        let live = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let live_port = live.local_addr().unwrap().port();

        let roster = Roster::new(vec![
            NodeSpec::new("down", "127.0.0.1", port),
            NodeSpec::new("up", "127.0.0.1", live_port),
        ])
        .unwrap();
        let mut config = ClientConfig::default();
        config.connect_timeout = Duration::from_millis(500);

        let fleet = Fleet::connect(roster, &config).await;
        assert_eq!(fleet.roster().len(), 2);
        assert_eq!(fleet.live_count(), 1);
        assert!(!fleet.is_live(0));
        assert!(fleet.is_live(1));
        assert_eq!(fleet.live_positions(), vec![1]);
        assert_eq!(fleet.node_name(1), "up");
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<parking_lot::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_connect_results_stay_below_info() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let live = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let roster = Roster::new(vec![NodeSpec::new(
            "up",
            "127.0.0.1",
            live.local_addr().unwrap().port(),
        )])
        .unwrap();

        let fleet = Fleet::connect(roster, &ClientConfig::default()).await;
        assert_eq!(fleet.live_count(), 1);

        let logged = String::from_utf8(captured.0.lock().clone()).unwrap();
        assert!(!logged.contains("connected to server"), "{}", logged);
    }
}
