//! Mock memory reader and process for testing
//!
//! Provides configurable mock implementations of `ReadMemory` and
//! `ProcessInfo` backed by an in-memory buffer instead of a real process.

use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Error, Result};
use crate::process::{MemoryRegion, ModuleInfo, ProcessInfo, ReadMemory};

/// Mock memory reader for testing
///
/// Reads from an in-memory buffer, allowing tests to verify memory reading
/// logic without requiring access to a real process.
#[derive(Debug, Clone)]
pub struct MockMemoryReader {
    data: Vec<u8>,
    base: u64,
}

impl MockMemoryReader {
    /// Create a new mock reader with the given data at base address 0x1000
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, base: 0x1000 }
    }

    /// Create a new mock reader with custom base address
    pub fn with_base(data: Vec<u8>, base: u64) -> Self {
        Self { data, base }
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    /// Exclusive end address of the buffer
    pub fn end(&self) -> u64 {
        self.base + self.data.len() as u64
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Overwrite bytes at an absolute address
    pub fn patch(&mut self, address: u64, bytes: &[u8]) -> Result<()> {
        let offset = self.offset_of(address, bytes.len())?;
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn offset_of(&self, address: u64, size: usize) -> Result<usize> {
        if address < self.base {
            return Err(Error::read_failed(
                address,
                format!("Address below base (base=0x{:X})", self.base),
            ));
        }
        let offset = (address - self.base) as usize;
        if offset + size > self.data.len() {
            return Err(Error::read_failed(
                address,
                format!(
                    "Out of bounds: offset={}, size={}, len={}",
                    offset,
                    size,
                    self.data.len()
                ),
            ));
        }
        Ok(offset)
    }
}

impl ReadMemory for MockMemoryReader {
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        let offset = self.offset_of(address, size)?;
        Ok(self.data[offset..offset + size].to_vec())
    }
}

/// Builder for creating test memory buffers
#[derive(Debug, Clone)]
pub struct MockMemoryBuilder {
    data: Vec<u8>,
    base: u64,
}

impl Default for MockMemoryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockMemoryBuilder {
    /// Create a new builder with default base address (0x1000)
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            base: 0x1000,
        }
    }

    /// Set the base address for the mock reader
    pub fn base(mut self, base: u64) -> Self {
        self.base = base;
        self
    }

    /// Pre-allocate buffer with zeros up to the specified size
    pub fn with_size(mut self, size: usize) -> Self {
        self.data.resize(size, 0);
        self
    }

    /// Fill the whole buffer with one byte value
    pub fn fill(mut self, byte: u8) -> Self {
        self.data.iter_mut().for_each(|b| *b = byte);
        self
    }

    pub fn write_u8(mut self, offset: usize, value: u8) -> Self {
        self.ensure_size(offset + 1);
        self.data[offset] = value;
        self
    }

    /// Write a signed 32-bit integer at the specified offset from base
    pub fn write_i32(mut self, offset: usize, value: i32) -> Self {
        self.ensure_size(offset + 4);
        self.data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
        self
    }

    /// Write raw bytes at the specified offset from base
    pub fn write_bytes(mut self, offset: usize, bytes: &[u8]) -> Self {
        self.ensure_size(offset + bytes.len());
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
        self
    }

    /// Build the MockMemoryReader
    pub fn build(self) -> MockMemoryReader {
        MockMemoryReader {
            data: self.data,
            base: self.base,
        }
    }

    fn ensure_size(&mut self, required: usize) {
        if self.data.len() < required {
            self.data.resize(required, 0);
        }
    }
}

/// In-memory stand-in for a running player process
///
/// Memory, window title and liveness can be changed from a test while a
/// source or engine holds the process.
#[derive(Debug)]
pub struct MockProcess {
    memory: RwLock<MockMemoryReader>,
    pid: u32,
    modules: Vec<ModuleInfo>,
    regions: Option<Vec<MemoryRegion>>,
    unreadable: Vec<MemoryRegion>,
    title: RwLock<String>,
    alive: AtomicBool,
}

impl MockProcess {
    pub fn new(memory: MockMemoryReader) -> Self {
        Self {
            memory: RwLock::new(memory),
            pid: 4242,
            modules: Vec::new(),
            regions: None,
            unreadable: Vec::new(),
            title: RwLock::new(String::new()),
            alive: AtomicBool::new(true),
        }
    }

    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = pid;
        self
    }

    pub fn with_module(mut self, name: &str, base_address: u64, size: u64) -> Self {
        self.modules.push(ModuleInfo::new(name, base_address, size));
        self
    }

    /// Replace the default single region covering the whole buffer
    pub fn with_regions(mut self, regions: Vec<MemoryRegion>) -> Self {
        self.regions = Some(regions);
        self
    }

    /// Make every read touching `[start, end)` fail
    pub fn with_unreadable(mut self, start: u64, end: u64) -> Self {
        self.unreadable.push(MemoryRegion::new(start, end));
        self
    }

    pub fn with_title(self, title: &str) -> Self {
        self.set_title(title);
        self
    }

    pub fn set_title(&self, title: &str) {
        if let Ok(mut current) = self.title.write() {
            *current = title.to_string();
        }
    }

    /// Overwrite memory at an absolute address
    pub fn poke(&self, address: u64, bytes: &[u8]) {
        if let Ok(mut memory) = self.memory.write() {
            let _ = memory.patch(address, bytes);
        }
    }

    pub fn poke_i32(&self, address: u64, value: i32) {
        self.poke(address, &value.to_le_bytes());
    }

    pub fn kill(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }
}

impl ReadMemory for MockProcess {
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        let read_end = address + size as u64;
        if self
            .unreadable
            .iter()
            .any(|r| address < r.end && read_end > r.start)
        {
            return Err(Error::read_failed(address, "Page not readable"));
        }

        let memory = self
            .memory
            .read()
            .map_err(|_| Error::read_failed(address, "Mock memory poisoned"))?;
        memory.read_bytes(address, size)
    }
}

impl ProcessInfo for MockProcess {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn modules(&self) -> Result<Vec<ModuleInfo>> {
        Ok(self.modules.clone())
    }

    fn regions(&self) -> Result<Vec<MemoryRegion>> {
        if let Some(regions) = &self.regions {
            return Ok(regions.clone());
        }
        let memory = self
            .memory
            .read()
            .map_err(|_| Error::Unsupported("Mock memory poisoned".to_string()))?;
        Ok(vec![MemoryRegion::new(memory.base(), memory.end())])
    }

    fn window_title(&self) -> Result<String> {
        self.title
            .read()
            .map(|t| t.clone())
            .map_err(|_| Error::WindowNotFound(self.pid))
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_reader_with_base() {
        let reader = MockMemoryReader::with_base(vec![0x01, 0x02, 0x03, 0x04], 0x140000000);

        let bytes = reader.read_bytes(0x140000000, 4).unwrap();
        assert_eq!(bytes, vec![0x01, 0x02, 0x03, 0x04]);
        assert_eq!(reader.end(), 0x140000004);
    }

    #[test]
    fn test_mock_reader_below_base() {
        let reader = MockMemoryReader::with_base(vec![0x01, 0x02, 0x03, 0x04], 0x2000);

        let result = reader.read_bytes(0x1000, 4);
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_with_size() {
        let reader = MockMemoryBuilder::new()
            .with_size(100)
            .write_i32(96, 123)
            .build();

        assert_eq!(reader.len(), 100);
        assert_eq!(reader.read_i32(0x1000 + 96).unwrap(), 123);
    }

    #[test]
    fn test_builder_fill_then_write() {
        let reader = MockMemoryBuilder::new()
            .with_size(8)
            .fill(0xAA)
            .write_u8(2, 1)
            .build();

        assert_eq!(reader.read_u8(0x1000).unwrap(), 0xAA);
        assert!(reader.read_bool(0x1002).unwrap());
    }

    #[test]
    fn test_process_poke_and_title() {
        let process = MockProcess::new(MockMemoryBuilder::new().with_size(16).build())
            .with_title("Artist - Song");

        process.poke_i32(0x1004, 77);
        process.set_title("Spotify Free");

        assert_eq!(process.read_i32(0x1004).unwrap(), 77);
        assert_eq!(process.window_title().unwrap(), "Spotify Free");
    }

    #[test]
    fn test_process_unreadable_range() {
        let process = MockProcess::new(MockMemoryBuilder::new().with_size(64).build())
            .with_unreadable(0x1010, 0x1020);

        assert!(process.read_bytes(0x1000, 16).is_ok());
        assert!(process.read_bytes(0x100C, 8).is_err());
        assert!(process.read_bytes(0x1020, 8).is_ok());
    }

    #[test]
    fn test_process_default_region_covers_buffer() {
        let process = MockProcess::new(MockMemoryBuilder::new().with_size(32).build());

        let regions = process.regions().unwrap();
        assert_eq!(regions, vec![MemoryRegion::new(0x1000, 0x1020)]);
    }

    #[test]
    fn test_process_kill() {
        let process = MockProcess::new(MockMemoryReader::new(Vec::new()));
        assert!(process.is_alive());
        process.kill();
        assert!(!process.is_alive());
    }
}
