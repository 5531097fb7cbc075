//! Splitting files into four chunks and putting them back together
//!
//! Every file becomes exactly [`CHUNK_COUNT`] chunks of `ceil(len / 4)`
//! bytes. The tail is zero-padded, so the original length has to be kept
//! alongside the chunks to undo the padding.

use crate::CHUNK_COUNT;

/// A file split into equally sized chunks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitFile {
    /// Length of the original content
    pub file_size: u64,
    /// Size of every chunk
    pub chunk_size: u64,
    /// Chunk payloads, 0-based
    pub chunks: [Vec<u8>; CHUNK_COUNT],
}

/// Chunk size for a file of `file_size` bytes
pub fn chunk_size_for(file_size: u64) -> u64 {
    file_size.div_ceil(CHUNK_COUNT as u64)
}

/// Split data into equal-sized chunks, padding the last ones if necessary
pub fn split(data: &[u8]) -> SplitFile {
    let chunk_size = chunk_size_for(data.len() as u64) as usize;

    let chunks = std::array::from_fn(|i| {
        let start = (i * chunk_size).min(data.len());
        let end = (start + chunk_size).min(data.len());
        let mut chunk = data[start..end].to_vec();
        chunk.resize(chunk_size, 0);
        chunk
    });

    SplitFile {
        file_size: data.len() as u64,
        chunk_size: chunk_size as u64,
        chunks,
    }
}

/// Concatenate chunks in order and strip the padding
pub fn reassemble(chunks: &[Vec<u8>; CHUNK_COUNT], file_size: u64) -> Vec<u8> {
    let mut data = Vec::with_capacity(chunks.iter().map(Vec::len).sum());
    for chunk in chunks {
        data.extend_from_slice(chunk);
    }
    data.truncate(file_size as usize);
    data
}
