//! In-memory chunk storage

use crate::storage::{ChunkStorage, StorageStats};
use crate::Result;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};

/// Chunk records kept in a map, for tests and embedded nodes
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    chunks: HashMap<(String, u8), Vec<u8>>,
    file_sizes: HashMap<String, u64>,
    stats: StorageStats,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every record (simulate data loss)
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.chunks.clear();
        inner.file_sizes.clear();
        inner.stats = StorageStats::new();
    }

    /// Remove a single chunk record
    pub fn remove_chunk(&self, name: &str, number: u8) -> Option<Vec<u8>> {
        let mut inner = self.inner.write();
        let removed = inner.chunks.remove(&(name.to_string(), number));
        if let Some(ref data) = removed {
            inner.stats.total_chunks = inner.stats.total_chunks.saturating_sub(1);
            inner.stats.total_bytes = inner.stats.total_bytes.saturating_sub(data.len());
        }
        removed
    }
}

impl ChunkStorage for MemoryStore {
    fn store_chunk(&self, name: &str, number: u8, data: &[u8]) -> Result<()> {
        let mut inner = self.inner.write();
        let replaced = inner
            .chunks
            .insert((name.to_string(), number), data.to_vec())
            .map(|old| old.len());
        inner.stats.record_write(data.len(), replaced);
        Ok(())
    }

    fn record_file_size(&self, name: &str, size: u64) -> Result<()> {
        self.inner.write().file_sizes.insert(name.to_string(), size);
        Ok(())
    }

    fn load_chunk(&self, name: &str, number: u8) -> Result<Option<Vec<u8>>> {
        let mut inner = self.inner.write();
        let chunk = inner.chunks.get(&(name.to_string(), number)).cloned();
        if chunk.is_some() {
            inner.stats.record_read();
        }
        Ok(chunk)
    }

    fn has_file(&self, name: &str) -> Result<bool> {
        Ok(self.inner.read().chunks.keys().any(|(n, _)| n == name))
    }

    fn chunk_size(&self, name: &str) -> Result<Option<u64>> {
        Ok(self
            .inner
            .read()
            .chunks
            .iter()
            .find(|((n, _), _)| n == name)
            .map(|(_, data)| data.len() as u64))
    }

    fn file_size(&self, name: &str) -> Result<Option<u64>> {
        Ok(self.inner.read().file_sizes.get(name).copied())
    }

    fn list_files(&self) -> Result<Vec<String>> {
        let names: BTreeSet<String> = self
            .inner
            .read()
            .chunks
            .keys()
            .map(|(name, _)| name.clone())
            .collect();
        Ok(names.into_iter().collect())
    }

    fn stats(&self) -> Result<StorageStats> {
        Ok(self.inner.read().stats.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_operations() {
        let store = MemoryStore::new();
        let data = vec![1, 2, 3, 4, 5];

        store.store_chunk("test", 1, &data).unwrap();
        assert!(store.has_file("test").unwrap());
        assert_eq!(store.chunk_size("test").unwrap(), Some(5));
        assert_eq!(store.load_chunk("test", 1).unwrap(), Some(data));
        assert_eq!(store.load_chunk("test", 2).unwrap(), None);
        assert!(!store.has_file("other").unwrap());
    }

    #[test]
    fn test_listing_is_distinct() {
        let store = MemoryStore::new();
        store.store_chunk("b", 1, b"x").unwrap();
        store.store_chunk("b", 2, b"y").unwrap();
        store.store_chunk("a", 4, b"z").unwrap();

        assert_eq!(store.list_files().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_overwrite_replaces_record() {
        let store = MemoryStore::new();
        store.store_chunk("f", 3, b"old").unwrap();
        store.store_chunk("f", 3, b"new!").unwrap();

        assert_eq!(store.load_chunk("f", 3).unwrap(), Some(b"new!".to_vec()));
        let stats = store.stats().unwrap();
        assert_eq!(stats.total_chunks, 1);
        assert_eq!(stats.total_bytes, 4);
    }

    #[test]
    fn test_clear_and_remove() {
        let store = MemoryStore::new();
        store.store_chunk("f", 1, b"abc").unwrap();
        store.store_chunk("f", 2, b"def").unwrap();
        store.record_file_size("f", 5).unwrap();

        assert!(store.remove_chunk("f", 1).is_some());
        assert_eq!(store.stats().unwrap().total_chunks, 1);

        store.clear();
        assert!(!store.has_file("f").unwrap());
        assert_eq!(store.file_size("f").unwrap(), None);
    }
}
