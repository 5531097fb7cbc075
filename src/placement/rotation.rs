//! Canonical chunk pair table and its rotation
//!
//! The four pairs form a ring over the chunk numbers, so every chunk number
//! shows up in exactly two pairs no matter how far the table is rotated.

use crate::CHUNK_COUNT;

/// Two chunk numbers (0-based) assigned to a single roster position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkPair(pub usize, pub usize);

impl ChunkPair {
    /// Both chunk numbers, in send order
    pub fn chunks(&self) -> [usize; 2] {
        [self.0, self.1]
    }

    /// Whether the pair includes `chunk`
    pub fn contains(&self, chunk: usize) -> bool {
        self.0 == chunk || self.1 == chunk
    }
}

impl std::fmt::Display for ChunkPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // wire numbering
        write!(f, "({}, {})", self.0 + 1, self.1 + 1)
    }
}

/// The unrotated pair table
pub const PAIR_TABLE: [ChunkPair; CHUNK_COUNT] = [
    ChunkPair(0, 1),
    ChunkPair(1, 2),
    ChunkPair(2, 3),
    ChunkPair(3, 0),
];

/// Rotate the pair table left by `rotation` positions
pub fn rotate_pairs(rotation: usize) -> [ChunkPair; CHUNK_COUNT] {
    let mut pairs = PAIR_TABLE;
    pairs.rotate_left(rotation % CHUNK_COUNT);
    pairs
}
