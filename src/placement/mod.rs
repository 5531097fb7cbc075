//! Deterministic chunk placement
//!
//! Placement is a pure function of the file name and the roster length. The
//! uploader, the downloader and the completeness check all recompute it; it
//! never travels over the wire, only the chunk numbers it produces do.

pub mod rotation;

pub use rotation::{rotate_pairs, ChunkPair, PAIR_TABLE};

use crate::{Error, Result, CHUNK_COUNT};
use sha2::{Digest, Sha256};

/// Stable 32-bit hash of a file name
///
/// Takes the first four bytes of the SHA-256 digest, little-endian.
pub fn file_hash(name: &str) -> u32 {
    let digest = Sha256::digest(name.as_bytes());
    u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// Chunk pair assignment for one file over a roster of a given size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    roster_size: usize,
    rotation: usize,
    pairs: [ChunkPair; CHUNK_COUNT],
}

impl Placement {
    /// How far the canonical table was rotated
    pub fn rotation(&self) -> usize {
        self.rotation
    }

    /// Number of roster positions this placement was computed for
    pub fn roster_size(&self) -> usize {
        self.roster_size
    }

    /// The rotated pair table
    pub fn pairs(&self) -> &[ChunkPair; CHUNK_COUNT] {
        &self.pairs
    }

    /// Pair assigned to a roster position
    ///
    /// Rosters longer than four positions wrap around the table.
    pub fn pair_for(&self, position: usize) -> ChunkPair {
        self.pairs[position % CHUNK_COUNT]
    }

    /// Roster positions that are assigned `chunk`
    pub fn positions_holding(&self, chunk: usize) -> Vec<usize> {
        (0..self.roster_size)
            .filter(|&position| self.pair_for(position).contains(chunk))
            .collect()
    }
}

/// Compute the placement of `name` over `roster_size` positions
pub fn placement(name: &str, roster_size: usize) -> Result<Placement> {
    if roster_size == 0 {
        return Err(Error::EmptyRoster);
    }

    let rotation = file_hash(name) as usize % roster_size;

    Ok(Placement {
        roster_size,
        rotation,
        pairs: rotate_pairs(rotation),
    })
}
