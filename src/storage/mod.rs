//! Node-side chunk storage
//!
//! A node keeps one record per (file name, chunk number) pair plus the
//! original file size. The request handler only sees the [`ChunkStorage`]
//! capability; where the bytes live is up to the backend.

pub mod disk;
pub mod memory;

pub use disk::DiskStore;
pub use memory::MemoryStore;

use crate::Result;

/// Trait for chunk storage backends
///
/// Chunk numbers are 1-based, as on the wire. Writes to the same key
/// overwrite; concurrent writers to one key are last-writer-wins.
pub trait ChunkStorage: Send + Sync {
    /// Store a chunk record, replacing any previous one
    fn store_chunk(&self, name: &str, number: u8, data: &[u8]) -> Result<()>;

    /// Remember the original length of a file
    fn record_file_size(&self, name: &str, size: u64) -> Result<()>;

    /// Retrieve a chunk record
    fn load_chunk(&self, name: &str, number: u8) -> Result<Option<Vec<u8>>>;

    /// Whether any chunk record exists for `name`
    fn has_file(&self, name: &str) -> Result<bool>;

    /// Size of one stored chunk record of `name`
    fn chunk_size(&self, name: &str) -> Result<Option<u64>>;

    /// Recorded original length of `name`
    fn file_size(&self, name: &str) -> Result<Option<u64>>;

    /// Distinct names with at least one chunk record, sorted
    fn list_files(&self) -> Result<Vec<String>>;

    /// Get storage statistics
    fn stats(&self) -> Result<StorageStats>;
}

/// Storage statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageStats {
    /// Total number of stored chunk records
    pub total_chunks: usize,
    /// Total bytes held in chunk records
    pub total_bytes: usize,
    /// Number of chunk reads served
    pub reads: usize,
    /// Number of chunk writes accepted
    pub writes: usize,
}

impl StorageStats {
    /// Create new empty statistics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a read operation
    pub fn record_read(&mut self) {
        self.reads += 1;
    }

    /// Record a write operation, `replaced` being the size of any overwritten record
    pub fn record_write(&mut self, bytes: usize, replaced: Option<usize>) {
        self.writes += 1;
        match replaced {
            Some(old) => {
                self.total_bytes = self.total_bytes.saturating_sub(old) + bytes;
            }
            None => {
                self.total_bytes += bytes;
                self.total_chunks += 1;
            }
        }
    }
}
