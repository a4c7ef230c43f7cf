//! Chunk layout for a file of known size.

use crate::protocol::ChunkHeader;

/// Iterator over the chunk headers for a file of `size` bytes.
///
/// Every chunk is `chunk_size` bytes except the last, which carries the
/// remainder. When the size divides evenly the last chunk is a full one; a
/// zero-byte file has no chunks at all.
#[derive(Debug, Clone)]
pub struct ChunkPlan {
    remaining: u64,
    chunk_size: u64,
    next_part: u32,
}

impl ChunkPlan {
    pub fn new(size: u64, chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "chunk size must be non-zero");
        Self {
            remaining: size,
            chunk_size: chunk_size as u64,
            next_part: 1,
        }
    }
}

impl Iterator for ChunkPlan {
    type Item = ChunkHeader;

    fn next(&mut self) -> Option<ChunkHeader> {
        if self.remaining == 0 {
            return None;
        }
        let len = self.remaining.min(self.chunk_size);
        self.remaining -= len;

        let header = ChunkHeader {
            part: self.next_part,
            len: len as u32,
        };
        self.next_part = self.next_part.wrapping_add(1);
        Some(header)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining.div_ceil(self.chunk_size) as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for ChunkPlan {}
