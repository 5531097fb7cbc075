//! Directory-backed chunk storage
//!
//! Layout inside the storage directory:
//!
//! - `<name>.<n>`: chunk record `n` (1 to 4) of `name`
//! - `<name>.size`: decimal length of the original file
//!
//! Records are written to a `.part` file first and renamed into place, so a
//! reader never sees half a chunk.

use crate::protocol::is_valid_name;
use crate::storage::{ChunkStorage, StorageStats};
use crate::{Error, Result, CHUNK_COUNT};
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};

const SIZE_SUFFIX: &str = "size";
const PART_SUFFIX: &str = "part";

/// Chunk records stored as files in one directory
#[derive(Debug)]
pub struct DiskStore {
    root: PathBuf,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl DiskStore {
    /// Open a store rooted at `root`, creating the directory if needed
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| Error::ChunkIo {
            path: root.clone(),
            source,
        })?;
        debug!("opened chunk store at {:?}", root);

        Ok(Self {
            root,
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        })
    }

    /// Storage directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, name: &str, suffix: &str) -> Result<PathBuf> {
        if !is_valid_name(name) {
            return Err(Error::InvalidName(name.to_string()));
        }
        Ok(self.root.join(format!("{}.{}", name, suffix)))
    }

    fn chunk_path(&self, name: &str, number: u8) -> Result<PathBuf> {
        self.record_path(name, &number.to_string())
    }

    fn write_atomically(&self, path: &Path, data: &[u8]) -> Result<()> {
        let mut part = path.as_os_str().to_owned();
        part.push(".");
        part.push(PART_SUFFIX);
        let part = PathBuf::from(part);

        let io_err = |source| Error::ChunkIo {
            path: path.to_path_buf(),
            source,
        };
        fs::write(&part, data).map_err(io_err)?;
        fs::rename(&part, path).map_err(io_err)?;
        Ok(())
    }

    /// Walk the directory and yield `(name, chunk number, size)` per record
    fn scan(&self) -> Result<Vec<(String, u8, u64)>> {
        let entries = fs::read_dir(&self.root).map_err(|source| Error::ChunkIo {
            path: self.root.clone(),
            source,
        })?;

        let mut records = Vec::new();
        for entry in entries {
            let entry = entry?;
            let metadata = match entry.metadata() {
                Ok(metadata) if metadata.is_file() => metadata,
                Ok(_) => continue,
                Err(e) => {
                    warn!("skipping {:?}: {}", entry.path(), e);
                    continue;
                }
            };

            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if let Some((name, number)) = parse_record_name(file_name) {
                records.push((name.to_string(), number, metadata.len()));
            }
        }
        Ok(records)
    }
}

/// Split `<name>.<n>` into its parts; anything else is not a chunk record
fn parse_record_name(file_name: &str) -> Option<(&str, u8)> {
    let (name, suffix) = file_name.rsplit_once('.')?;
    let number: u8 = suffix.parse().ok()?;
    if name.is_empty() || number == 0 || number as usize > CHUNK_COUNT {
        return None;
    }
    Some((name, number))
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(Error::ChunkIo {
            path: path.to_path_buf(),
            source,
        }),
    }
}

impl ChunkStorage for DiskStore {
    fn store_chunk(&self, name: &str, number: u8, data: &[u8]) -> Result<()> {
        let path = self.chunk_path(name, number)?;
        self.write_atomically(&path, data)?;
        self.writes.fetch_add(1, Ordering::Relaxed);
        debug!("stored {:?} ({} bytes)", path, data.len());
        Ok(())
    }

    fn record_file_size(&self, name: &str, size: u64) -> Result<()> {
        let path = self.record_path(name, SIZE_SUFFIX)?;
        self.write_atomically(&path, size.to_string().as_bytes())
    }

    fn load_chunk(&self, name: &str, number: u8) -> Result<Option<Vec<u8>>> {
        let chunk = read_optional(&self.chunk_path(name, number)?)?;
        if chunk.is_some() {
            self.reads.fetch_add(1, Ordering::Relaxed);
        }
        Ok(chunk)
    }

    fn has_file(&self, name: &str) -> Result<bool> {
        Ok(self.chunk_size(name)?.is_some())
    }

    fn chunk_size(&self, name: &str) -> Result<Option<u64>> {
        for number in 1..=CHUNK_COUNT as u8 {
            match fs::metadata(self.chunk_path(name, number)?) {
                Ok(metadata) if metadata.is_file() => return Ok(Some(metadata.len())),
                Ok(_) => continue,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(None)
    }

    fn file_size(&self, name: &str) -> Result<Option<u64>> {
        let path = self.record_path(name, SIZE_SUFFIX)?;
        let Some(raw) = read_optional(&path)? else {
            return Ok(None);
        };
        match String::from_utf8_lossy(&raw).trim().parse() {
            Ok(size) => Ok(Some(size)),
            Err(_) => {
                warn!("ignoring unreadable size record {:?}", path);
                Ok(None)
            }
        }
    }

    fn list_files(&self) -> Result<Vec<String>> {
        let names: BTreeSet<String> = self.scan()?.into_iter().map(|(name, _, _)| name).collect();
        Ok(names.into_iter().collect())
    }

    fn stats(&self) -> Result<StorageStats> {
        let records = self.scan()?;
        Ok(StorageStats {
            total_chunks: records.len(),
            total_bytes: records.iter().map(|(_, _, size)| *size as usize).sum(),
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
        })
    }
}
