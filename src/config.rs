//! Client and node configuration
//!
//! Both sides carry small plain structs with sensible defaults. The client
//! roster itself lives in its own file and is parsed by [`crate::Roster`].

use crate::{Error, Result, DEFAULT_QUORUM};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Name of the roster file looked up in the user's home directory
pub const DEFAULT_ROSTER_FILE: &str = "dfc.conf";

/// Configuration for the client side
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Path of the roster file
    pub roster_path: PathBuf,
    /// Minimum number of live nodes for an upload
    pub quorum: usize,
    /// Bound on establishing each node connection
    pub connect_timeout: Duration,
    /// Bound on every read or write on an established connection
    pub io_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let home = std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            roster_path: home.join(DEFAULT_ROSTER_FILE),
            quorum: DEFAULT_QUORUM,
            connect_timeout: Duration::from_secs(1),
            io_timeout: Duration::from_secs(1),
        }
    }
}

impl ClientConfig {
    /// Create a configuration reading the roster from `roster_path`
    pub fn new(roster_path: impl Into<PathBuf>) -> Self {
        Self {
            roster_path: roster_path.into(),
            ..Self::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.quorum == 0 {
            return Err(Error::config("quorum must be greater than 0"));
        }
        if self.connect_timeout.is_zero() || self.io_timeout.is_zero() {
            return Err(Error::config("timeouts must be greater than 0"));
        }
        Ok(())
    }
}

/// Configuration for a storage node
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Directory holding the chunk records
    pub storage_dir: PathBuf,
    /// Address to accept client connections on
    pub listen_addr: SocketAddr,
    /// How long in-flight connections may run after shutdown is requested
    pub drain_timeout: Duration,
}

impl NodeConfig {
    /// Create a node configuration listening on all interfaces at `port`
    pub fn new(storage_dir: impl Into<PathBuf>, port: u16) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            listen_addr: SocketAddr::from(([0, 0, 0, 0], port)),
            drain_timeout: Duration::from_secs(5),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.storage_dir.as_os_str().is_empty() {
            return Err(Error::config("storage directory must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.quorum, 3);
        assert_eq!(config.connect_timeout, Duration::from_secs(1));
        assert!(config.roster_path.ends_with(DEFAULT_ROSTER_FILE));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_quorum_rejected() {
        let mut config = ClientConfig::new("roster.conf");
        config.quorum = 0;
        assert!(matches!(config.validate(), Err(Error::Config { .. })));
    }

    #[test]
    fn test_node_config_binds_all_interfaces() {
        let config = NodeConfig::new("/tmp/dfs1", 10001);
        assert_eq!(config.listen_addr.port(), 10001);
        assert!(config.listen_addr.ip().is_unspecified());
        assert!(config.validate().is_ok());
    }
}
