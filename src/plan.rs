//! Chunk planning: fixed-size byte ranges over a resource of known length.

/// Inclusive byte range `[start, end]` of one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    pub index: usize,
    pub start: u64,
    pub end: u64,
}

impl ChunkRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// HTTP Range header value: `bytes=start-end`.
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

/// Number of chunks needed to cover `total_size` bytes: `ceil(total / chunk)`.
///
/// `chunk_size` must be non-zero; configuration validation rejects zero.
pub fn chunk_count(total_size: u64, chunk_size: u64) -> usize {
    debug_assert!(chunk_size > 0);
    total_size.div_ceil(chunk_size) as usize
}

/// Byte range of chunk `index`. The last chunk ends at `total_size - 1`.
pub fn chunk_range(index: usize, total_size: u64, chunk_size: u64) -> ChunkRange {
    let start = index as u64 * chunk_size;
    let end = (start + chunk_size).min(total_size) - 1;
    ChunkRange { index, start, end }
}

/// All chunk ranges in index order.
pub fn plan(total_size: u64, chunk_size: u64) -> Vec<ChunkRange> {
    (0..chunk_count(total_size, chunk_size))
        .map(|i| chunk_range(i, total_size, chunk_size))
        .collect()
}
