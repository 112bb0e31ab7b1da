//! Chunker
//!
//! Splits a file size into an ordered list of fixed-size byte ranges.
//!
//! Partitioning is a pure function of `(total_size, chunk_size)`: the same
//! inputs always produce the same chunks with the same 1-based indices, which
//! is what lets a resumed upload match server-side state by index alone.
//!
//! A zero-byte file is partitioned into a single zero-length chunk
//! (`index 1, range 0..0`) so that every session has at least one chunk and
//! the completion request always carries `X-Total-Chunks >= 1`.
//!
//! # Example
//!
//! ```
//! use chunked_uploadr::chunker::partition;
//!
//! let chunks = partition(10, 4).unwrap();
//! assert_eq!(chunks.len(), 3);
//! assert_eq!(chunks[2].range, 8..10);
//! ```

use std::ops::Range;
use thiserror::Error;

/// Default chunk size (5MB)
pub const DEFAULT_CHUNK_SIZE: u64 = 5 * 1024 * 1024;

/// Chunking errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChunkError {
    #[error("Chunk size must be greater than zero")]
    ZeroChunkSize,

    #[error("File of {total_size} bytes needs more than {max} chunks at {chunk_size} bytes each")]
    TooManyChunks {
        total_size: u64,
        chunk_size: u64,
        max: u32,
    },
}

/// One contiguous byte range of the source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// 1-based chunk number
    pub index: u32,
    /// Byte range `[start, end)` within the source file
    pub range: Range<u64>,
}

impl Chunk {
    /// Length of the chunk in bytes
    pub fn len(&self) -> u64 {
        self.range.end - self.range.start
    }

    /// Whether the chunk covers no bytes (only for zero-byte files)
    pub fn is_empty(&self) -> bool {
        self.range.start == self.range.end
    }
}

/// Number of chunks a file of `total_size` bytes is split into.
///
/// Always at least 1.
pub fn chunk_count(total_size: u64, chunk_size: u64) -> Result<u32, ChunkError> {
    if chunk_size == 0 {
        return Err(ChunkError::ZeroChunkSize);
    }

    let count = total_size.div_ceil(chunk_size).max(1);
    u32::try_from(count).map_err(|_| ChunkError::TooManyChunks {
        total_size,
        chunk_size,
        max: u32::MAX,
    })
}

/// Partition `[0, total_size)` into chunks of `chunk_size` bytes.
///
/// Every chunk except the last is exactly `chunk_size` long; the last one
/// holds the remainder in `(0, chunk_size]`.
pub fn partition(total_size: u64, chunk_size: u64) -> Result<Vec<Chunk>, ChunkError> {
    let count = chunk_count(total_size, chunk_size)?;

    let chunks = (0..count)
        .map(|i| {
            let start = u64::from(i) * chunk_size;
            let end = start.saturating_add(chunk_size).min(total_size);
            Chunk {
                index: i + 1,
                range: start..end,
            }
        })
        .collect();

    Ok(chunks)
}
