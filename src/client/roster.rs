//! Node roster
//!
//! The roster file holds one line per node:
//!
//! ```text
//! server dfs1 127.0.0.1:10001
//! server dfs2 127.0.0.1:10002
//! ```
//!
//! Order matters, since placement assigns chunk pairs by roster position.

use crate::{Error, Result};
use std::path::Path;

/// A configured storage node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSpec {
    /// Name used in status output
    pub name: String,
    /// Host name or IP address
    pub host: String,
    /// TCP port
    pub port: u16,
}

impl NodeSpec {
    /// Create a node entry
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
        }
    }

    /// Parse `<host>:<port>`
    pub fn parse_address(name: &str, address: &str) -> Result<Self> {
        let (host, port) = address
            .rsplit_once(':')
            .ok_or_else(|| Error::config(format!("{}: address {} has no port", name, address)))?;
        let port = port
            .parse()
            .map_err(|_| Error::config(format!("{}: invalid port in {}", name, address)))?;
        if host.is_empty() {
            return Err(Error::config(format!("{}: address {} has no host", name, address)));
        }
        Ok(Self::new(name, host, port))
    }

    /// `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl std::fmt::Display for NodeSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}:{})", self.name, self.host, self.port)
    }
}

/// Ordered list of configured nodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    nodes: Vec<NodeSpec>,
}

impl Roster {
    /// Build a roster from nodes in placement order
    pub fn new(nodes: Vec<NodeSpec>) -> Result<Self> {
        if nodes.is_empty() {
            return Err(Error::config("roster has no servers"));
        }
        Ok(Self { nodes })
    }

    /// Parse roster text
    ///
    /// Lines other than `server <name> <host>:<port>` are ignored, as are
    /// blank lines and `#` comments.
    pub fn parse(text: &str) -> Result<Self> {
        let mut nodes = Vec::new();

        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut parts = line.split_whitespace();
            if parts.next() != Some("server") {
                continue;
            }
            match (parts.next(), parts.next()) {
                (Some(name), Some(address)) => nodes.push(NodeSpec::parse_address(name, address)?),
                _ => {
                    return Err(Error::config(format!(
                        "line {}: expected `server <name> <host>:<port>`",
                        lineno + 1
                    )))
                }
            }
        }

        Self::new(nodes)
    }

    /// Read and parse a roster file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("cannot read {:?}: {}", path, e)))?;
        Self::parse(&text)
    }

    /// Number of roster positions
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false; an empty roster cannot be built
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node at a roster position
    pub fn get(&self, position: usize) -> Option<&NodeSpec> {
        self.nodes.get(position)
    }

    /// Nodes in roster order
    pub fn nodes(&self) -> &[NodeSpec] {
        &self.nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roster() {
        let text = "\
# fleet
server dfs1 127.0.0.1:10001
server dfs2 127.0.0.1:10002

other setting
server dfs3 localhost:10003
";
        let roster = Roster::parse(text).unwrap();
        assert_eq!(roster.len(), 3);
        assert_eq!(roster.get(0).unwrap().name, "dfs1");
        assert_eq!(roster.get(2).unwrap().address(), "localhost:10003");
    }

    #[test]
    fn test_empty_roster_is_config_error() {
        assert!(matches!(Roster::parse(""), Err(Error::Config { .. })));
        assert!(matches!(
            Roster::parse("# nothing here\n"),
            Err(Error::Config { .. })
        ));
    }

    #[test]
    fn test_bad_lines() {
        assert!(Roster::parse("server dfs1").is_err());
        assert!(Roster::parse("server dfs1 127.0.0.1").is_err());
        assert!(Roster::parse("server dfs1 127.0.0.1:port").is_err());
        assert!(Roster::parse("server dfs1 :10001").is_err());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Roster::from_file(dir.path().join("absent.conf"));
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
