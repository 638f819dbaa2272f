//! Chunked text/byte search over process memory.

use std::fmt;

use memchr::memmem;
use tracing::trace;

use crate::process::{ChunkedMemoryIterator, DEFAULT_CHUNK_SIZE, MemoryRegion, ReadMemory};

type Condition = Box<dyn Fn(u64, usize) -> bool + Send + Sync>;

/// One step of a chained search.
///
/// The condition receives the match address and the index of the raw match
/// within this step, counted from zero.
pub struct SearchRule {
    pattern: Vec<u8>,
    condition: Condition,
}

impl SearchRule {
    /// Accept the first occurrence of `text`
    pub fn text(text: &str) -> Self {
        Self::bytes(text.as_bytes())
    }

    pub fn bytes(pattern: impl Into<Vec<u8>>) -> Self {
        Self {
            pattern: pattern.into(),
            condition: Box::new(|_, _| true),
        }
    }

    /// Accept the occurrence of `text` with match index `n`
    pub fn nth(text: &str, n: usize) -> Self {
        Self::text(text).with_condition(move |_, index| index == n)
    }

    pub fn with_condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(u64, usize) -> bool + Send + Sync + 'static,
    {
        self.condition = Box::new(condition);
        self
    }

    pub fn pattern(&self) -> &[u8] {
        &self.pattern
    }

    fn accepts(&self, address: u64, index: usize) -> bool {
        (self.condition)(address, index)
    }
}

impl fmt::Debug for SearchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchRule")
            .field("pattern", &String::from_utf8_lossy(&self.pattern))
            .finish_non_exhaustive()
    }
}

/// Forward scanner over a memory reader.
///
/// Every scan reads `chunk_size + pattern_len - 1` bytes per step so a match
/// that straddles two chunks is seen whole by the first one. Chunks that fail
/// to read are skipped.
pub struct PatternScanner<'a, R: ReadMemory + ?Sized> {
    reader: &'a R,
    chunk_size: usize,
}

impl<'a, R: ReadMemory + ?Sized> PatternScanner<'a, R> {
    pub fn new(reader: &'a R) -> Self {
        Self {
            reader,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// First address in `[start, end)` where `bytes` occurs
    pub fn find_in_memory(&self, start: u64, end: u64, bytes: &[u8]) -> Option<u64> {
        self.find_address_of_text(start, end, bytes, |_, _| true)
    }

    /// First match of `pattern` in `[start, end)` that `accept` agrees to.
    ///
    /// `accept` is called with each raw match in address order together with
    /// its match index.
    pub fn find_address_of_text<F>(
        &self,
        start: u64,
        end: u64,
        pattern: impl AsRef<[u8]>,
        mut accept: F,
    ) -> Option<u64>
    where
        F: FnMut(u64, usize) -> bool,
    {
        let mut index = 0;
        self.scan(start, end, pattern.as_ref(), &mut |address| {
            let accepted = accept(address, index);
            index += 1;
            accepted
        })
    }

    /// Every address in `[start, end)` where `pattern` occurs
    pub fn find_all(&self, start: u64, end: u64, pattern: impl AsRef<[u8]>) -> Vec<u64> {
        let mut matches = Vec::new();
        self.scan(start, end, pattern.as_ref(), &mut |address| {
            matches.push(address);
            false
        });
        matches
    }

    /// Run `rules` in order, each starting one byte past the previous match.
    ///
    /// Returns the address matched by the last rule.
    pub fn find_address_using_path(
        &self,
        start: u64,
        end: u64,
        rules: &[SearchRule],
    ) -> Option<u64> {
        let mut cursor = start;
        let mut last = None;
        for rule in rules {
            let found =
                self.find_address_of_text(cursor, end, rule.pattern(), |a, i| rule.accepts(a, i))?;
            trace!("Path step {:?} matched at 0x{:X}", rule, found);
            cursor = found + 1;
            last = Some(found);
        }
        last
    }

    /// Like [`find_address_of_text`](Self::find_address_of_text) but only
    /// walks the given readable regions. Match indices run across regions.
    pub fn find_text_in_regions<F>(
        &self,
        regions: &[MemoryRegion],
        pattern: impl AsRef<[u8]>,
        mut accept: F,
    ) -> Option<u64>
    where
        F: FnMut(u64, usize) -> bool,
    {
        let pattern = pattern.as_ref();
        let mut index = 0;
        for region in regions {
            let found = self.scan(region.start, region.end, pattern, &mut |address| {
                let accepted = accept(address, index);
                index += 1;
                accepted
            });
            if found.is_some() {
                return found;
            }
        }
        None
    }

    fn scan(
        &self,
        start: u64,
        end: u64,
        pattern: &[u8],
        on_match: &mut dyn FnMut(u64) -> bool,
    ) -> Option<u64> {
        if pattern.is_empty() || start >= end {
            return None;
        }

        let finder = memmem::Finder::new(pattern);
        let chunks = ChunkedMemoryIterator::new(self.reader, start, end, self.chunk_size)
            .with_overlap(pattern.len() - 1);

        for chunk in chunks {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    trace!("Skipping unreadable chunk: {}", e);
                    continue;
                }
            };

            let mut pos = 0;
            while let Some(found) = finder.find(&chunk.data[pos..]) {
                let offset = pos + found;
                if !chunk.owns(offset) {
                    break;
                }
                let address = chunk.address + offset as u64;
                if on_match(address) {
                    return Some(address);
                }
                pos = offset + 1;
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::mock::{MockMemoryBuilder, MockProcess};

    #[test]
    fn test_find_in_memory() {
        let reader = MockMemoryBuilder::new()
            .with_size(256)
            .write_bytes(100, b"needle")
            .build();
        let scanner = PatternScanner::new(&reader).with_chunk_size(32);

        assert_eq!(scanner.find_in_memory(0x1000, 0x1100, b"needle"), Some(0x1000 + 100));
        assert_eq!(scanner.find_in_memory(0x1000, 0x1100, b"thread"), None);
    }

    #[test]
    fn test_match_straddling_chunk_boundary() {
        // "needle" starts 3 bytes before the end of the first 64-byte chunk
        let reader = MockMemoryBuilder::new()
            .with_size(128)
            .write_bytes(61, b"needle")
            .build();
        let scanner = PatternScanner::new(&reader).with_chunk_size(64);

        assert_eq!(scanner.find_in_memory(0x1000, 0x1080, b"needle"), Some(0x1000 + 61));
    }

    #[test]
    fn test_match_at_chunk_start_reported_once() {
        let reader = MockMemoryBuilder::new()
            .with_size(128)
            .write_bytes(64, b"needle")
            .build();
        let scanner = PatternScanner::new(&reader).with_chunk_size(64);

        assert_eq!(scanner.find_all(0x1000, 0x1080, b"needle"), vec![0x1040]);
    }

    #[test]
    fn test_match_must_end_before_range_end() {
        let reader = MockMemoryBuilder::new()
            .with_size(64)
            .write_bytes(10, b"needle")
            .build();
        let scanner = PatternScanner::new(&reader);

        assert_eq!(scanner.find_in_memory(0x1000, 0x1000 + 15, b"needle"), None);
        assert_eq!(scanner.find_in_memory(0x1000, 0x1000 + 16, b"needle"), Some(0x100A));
    }

    #[test]
    fn test_accept_sees_match_indices_in_order() {
        let reader = MockMemoryBuilder::new()
            .with_size(64)
            .write_bytes(4, b"ab")
            .write_bytes(20, b"ab")
            .write_bytes(40, b"ab")
            .build();
        let scanner = PatternScanner::new(&reader).with_chunk_size(16);

        let mut seen = Vec::new();
        let found = scanner.find_address_of_text(0x1000, 0x1040, "ab", |address, index| {
            seen.push((address, index));
            index == 2
        });

        assert_eq!(found, Some(0x1000 + 40));
        assert_eq!(seen, vec![(0x1004, 0), (0x1014, 1), (0x1028, 2)]);
    }

    #[test]
    fn test_unreadable_chunks_are_skipped() {
        let memory = MockMemoryBuilder::new()
            .with_size(192)
            .write_bytes(10, b"needle")
            .write_bytes(140, b"needle")
            .build();
        let process = MockProcess::new(memory).with_unreadable(0x1000, 0x1040);
        let scanner = PatternScanner::new(&process).with_chunk_size(64);

        assert_eq!(scanner.find_in_memory(0x1000, 0x10C0, b"needle"), Some(0x1000 + 140));
    }

    #[test]
    fn test_match_before_unreadable_overlap_is_found() {
        let memory = MockMemoryBuilder::new()
            .with_size(128)
            .write_bytes(0x10, b"needle")
            .build();
        let process = MockProcess::new(memory).with_unreadable(0x1040, 0x1080);
        let scanner = PatternScanner::new(&process).with_chunk_size(64);

        assert_eq!(scanner.find_in_memory(0x1000, 0x1080, b"needle"), Some(0x1010));
    }

    #[test]
    fn test_find_address_using_path() {
        let reader = MockMemoryBuilder::new()
            .with_size(128)
            .write_bytes(5, b"track")
            .write_bytes(20, b"album")
            .write_bytes(50, b"track")
            .write_bytes(70, b"album")
            .build();
        let scanner = PatternScanner::new(&reader).with_chunk_size(32);

        let found = scanner.find_address_using_path(
            0x1000,
            0x1080,
            &[SearchRule::nth("track", 1), SearchRule::text("album")],
        );
        assert_eq!(found, Some(0x1000 + 70));
    }

    #[test]
    fn test_path_next_rule_starts_past_previous_match() {
        let reader = MockMemoryBuilder::new()
            .with_size(32)
            .write_bytes(4, b"aaa")
            .build();
        let scanner = PatternScanner::new(&reader);

        let found = scanner.find_address_using_path(
            0x1000,
            0x1020,
            &[SearchRule::text("aa"), SearchRule::text("aa")],
        );
        assert_eq!(found, Some(0x1005));
    }

    #[test]
    fn test_path_fails_when_any_rule_fails() {
        let reader = MockMemoryBuilder::new()
            .with_size(64)
            .write_bytes(5, b"track")
            .build();
        let scanner = PatternScanner::new(&reader);

        let found = scanner.find_address_using_path(
            0x1000,
            0x1040,
            &[SearchRule::text("track"), SearchRule::text("album")],
        );
        assert_eq!(found, None);
    }

    #[test]
    fn test_find_text_in_regions_skips_gaps() {
        let memory = MockMemoryBuilder::new()
            .with_size(256)
            .write_bytes(16, b"anchor")
            .write_bytes(200, b"anchor")
            .build();
        let process = MockProcess::new(memory);
        let regions = [
            MemoryRegion::new(0x1000, 0x1008),
            MemoryRegion::new(0x10C0, 0x1100),
        ];
        let scanner = PatternScanner::new(&process);

        let mut indices = Vec::new();
        let found = scanner.find_text_in_regions(&regions, "anchor", |_, index| {
            indices.push(index);
            true
        });

        assert_eq!(found, Some(0x1000 + 200));
        assert_eq!(indices, vec![0]);
    }

    #[test]
    fn test_empty_pattern_never_matches() {
        let reader = MockMemoryBuilder::new().with_size(16).build();
        let scanner = PatternScanner::new(&reader);
        assert_eq!(scanner.find_in_memory(0x1000, 0x1010, b""), None);
    }
}
