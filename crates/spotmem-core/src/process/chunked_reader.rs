//! Chunked memory reading utilities.
//!
//! Large ranges are read in fixed-size chunks. Consecutive chunks can overlap
//! so a pattern straddling a chunk boundary is still seen in one piece.

use super::ReadMemory;
use crate::config::scan;
use crate::error::Result;

/// Default chunk size for memory reading.
pub const DEFAULT_CHUNK_SIZE: usize = scan::CHUNK_SIZE;

/// A chunk of memory read from a process.
#[derive(Debug)]
pub struct MemoryChunk {
    /// Starting address of this chunk.
    pub address: u64,
    /// The actual bytes read, including any overlap into the next chunk.
    pub data: Vec<u8>,
    /// Number of leading bytes that belong to this chunk alone.
    ///
    /// A match starting at or after this offset is reported again by the
    /// next chunk.
    pub owned: usize,
}

impl MemoryChunk {
    /// Whether an offset inside `data` is a start position owned by this chunk
    pub fn owns(&self, offset: usize) -> bool {
        offset < self.owned
    }
}

/// Iterator that reads memory in fixed-size chunks.
///
/// When the overlapped read fails the chunk is read again without the
/// overlap. If that fails too the chunk yields an `Err` and iteration
/// continues with the next one.
///
/// # Example
///
/// ```ignore
/// use spotmem_core::process::{ChunkedMemoryIterator, DEFAULT_CHUNK_SIZE};
///
/// let iter = ChunkedMemoryIterator::new(&reader, start, end, DEFAULT_CHUNK_SIZE)
///     .with_overlap(pattern.len() - 1);
/// for chunk in iter.flatten() {
///     // Process chunk.data
/// }
/// ```
pub struct ChunkedMemoryIterator<'a, R: ReadMemory + ?Sized> {
    reader: &'a R,
    current: u64,
    end: u64,
    chunk_size: usize,
    overlap: usize,
}

impl<'a, R: ReadMemory + ?Sized> ChunkedMemoryIterator<'a, R> {
    /// Create a new chunked memory iterator over `[start, end)`.
    pub fn new(reader: &'a R, start: u64, end: u64, chunk_size: usize) -> Self {
        Self {
            reader,
            current: start,
            end,
            chunk_size: chunk_size.max(1),
            overlap: 0,
        }
    }

    /// Extend every read by `overlap` bytes past the chunk, clamped to `end`.
    pub fn with_overlap(mut self, overlap: usize) -> Self {
        self.overlap = overlap;
        self
    }
}

impl<R: ReadMemory + ?Sized> Iterator for ChunkedMemoryIterator<'_, R> {
    type Item = Result<MemoryChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current >= self.end {
            return None;
        }

        let remaining = self.end - self.current;
        let owned = (self.chunk_size as u64).min(remaining) as usize;
        let read_size = ((self.chunk_size + self.overlap) as u64).min(remaining) as usize;
        let address = self.current;
        self.current += owned as u64;

        let data = match self.reader.read_bytes(address, read_size) {
            Err(_) if read_size > owned => self.reader.read_bytes(address, owned),
            result => result,
        };

        Some(data.map(|data| MemoryChunk {
            address,
            data,
            owned,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::MockMemoryBuilder;
    use crate::process::mock::MockProcess;

    #[test]
    fn test_chunked_iterator_single_chunk() {
        let reader = MockMemoryBuilder::new()
            .write_bytes(0, &[1, 2, 3, 4, 5, 6, 7, 8])
            .build();

        let chunks: Vec<_> = ChunkedMemoryIterator::new(&reader, 0x1000, 0x1008, 16)
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].address, 0x1000);
        assert_eq!(chunks[0].data, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(chunks[0].owned, 8);
    }

    #[test]
    fn test_chunked_iterator_partial_last_chunk() {
        let reader = MockMemoryBuilder::new()
            .write_bytes(0, &[1, 2, 3, 4, 5])
            .build();

        let chunks: Vec<_> = ChunkedMemoryIterator::new(&reader, 0x1000, 0x1005, 4)
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].data.len(), 4);
        assert_eq!(chunks[1].data, vec![5]);
    }

    #[test]
    fn test_chunked_iterator_empty_range() {
        let reader = MockMemoryBuilder::new().with_size(4).build();

        let mut iter = ChunkedMemoryIterator::new(&reader, 0x1000, 0x1000, 4);
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_overlap_extends_reads_but_not_stride() {
        let reader = MockMemoryBuilder::new()
            .write_bytes(0, &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10])
            .build();

        let chunks: Vec<_> = ChunkedMemoryIterator::new(&reader, 0x1000, 0x100A, 4)
            .with_overlap(2)
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].data, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(chunks[1].address, 0x1004);
        assert_eq!(chunks[1].data, vec![5, 6, 7, 8, 9, 10]);
        // Overlap is clamped to the end of the range
        assert_eq!(chunks[2].data, vec![9, 10]);
        assert!(chunks[0].owns(3));
        assert!(!chunks[0].owns(4));
    }

    #[test]
    fn test_failed_chunk_does_not_stop_iteration() {
        let process = MockProcess::new(MockMemoryBuilder::new().with_size(12).build())
            .with_unreadable(0x1004, 0x1008);

        let results: Vec<_> = ChunkedMemoryIterator::new(&process, 0x1000, 0x100C, 4).collect();

        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(results[2].is_ok());
    }

    #[test]
    fn test_unreadable_overlap_falls_back_to_owned_bytes() {
        let process = MockProcess::new(MockMemoryBuilder::new().with_size(12).build())
            .with_unreadable(0x1006, 0x100C);

        let chunks: Vec<_> = ChunkedMemoryIterator::new(&process, 0x1000, 0x100C, 4)
            .with_overlap(3)
            .collect();

        let first = chunks[0].as_ref().unwrap();
        assert_eq!(first.data.len(), 4);
        assert_eq!(first.owned, 4);
        assert!(chunks[1].is_err());
    }
}
