//! chunkfleet
//!
//! A small distributed file-chunking store. A client splits each file into
//! four chunks, places chunk pairs on a fleet of storage nodes with a
//! deterministic hash-driven rotation, and later checks completeness and
//! reassembles the file from whichever nodes are reachable.

pub mod chunking;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod node;
pub mod placement;
pub mod protocol;
pub mod storage;

pub use client::{Fleet, NodeSpec, Roster};
pub use config::{ClientConfig, NodeConfig};
pub use error::Error;
pub use node::NodeServer;
pub use placement::{placement, ChunkPair, Placement};
pub use storage::{ChunkStorage, DiskStore, MemoryStore};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Number of chunks every file is split into
pub const CHUNK_COUNT: usize = 4;

/// Minimum number of live nodes required to accept an upload
pub const DEFAULT_QUORUM: usize = 3;
