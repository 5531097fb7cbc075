//! Error kinds shared by the client, the node and the wire codec.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for chunkfleet operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Roster or configuration unreadable or invalid.
    #[error("configuration error: {reason}")]
    Config { reason: String },

    /// Placement was requested for a roster with no positions.
    #[error("roster is empty, cannot place chunks")]
    EmptyRoster,

    /// A node could not be reached.
    #[error("node {node} ({address}) not available: {reason}")]
    Connect {
        node: String,
        address: String,
        reason: String,
    },

    /// Too few live nodes to accept an upload.
    #[error("not enough live nodes: {live} live, {required} required")]
    Quorum { live: usize, required: usize },

    /// Not every chunk number is held by a live node.
    #[error("{name} is incomplete")]
    IncompleteFile { name: String },

    /// Local file could not be read or written.
    #[error("chunk I/O on {path:?}: {source}")]
    ChunkIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A node replied with something unexpected.
    #[error("protocol error from {node}: {message}")]
    Protocol { node: String, message: String },

    /// File identifier unusable as a storage key.
    #[error("invalid file name: {0:?}")]
    InvalidName(String),

    /// Frame length exceeds the codec limit.
    #[error("frame of {size} bytes exceeds maximum {max}")]
    FrameTooLarge { size: usize, max: usize },

    /// A network operation did not finish within its timeout.
    #[error("operation timed out")]
    Timeout,

    /// I/O error from underlying system calls.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a protocol error for the named node.
    pub fn protocol(node: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Protocol {
            node: node.into(),
            message: message.into(),
        }
    }

    /// Build a configuration error.
    pub fn config(reason: impl Into<String>) -> Self {
        Error::Config {
            reason: reason.into(),
        }
    }

    /// Whether the error leaves the underlying stream in an unknown state.
    pub fn breaks_link(&self) -> bool {
        matches!(
            self,
            Error::Io(_) | Error::Timeout | Error::FrameTooLarge { .. }
        )
    }
}
