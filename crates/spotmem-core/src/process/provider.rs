//! Process provider abstraction for testability.
//!
//! This module provides traits that abstract process discovery and access,
//! enabling mock implementations for testing without a running player process.

use crate::error::{Error, Result};

/// A module (executable or library) loaded into the target process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    pub name: String,
    pub base_address: u64,
    pub size: u64,
}

impl ModuleInfo {
    pub fn new(name: impl Into<String>, base_address: u64, size: u64) -> Self {
        Self {
            name: name.into(),
            base_address,
            size,
        }
    }

    /// Exclusive end address of the mapped image
    pub fn end_address(&self) -> u64 {
        self.base_address + self.size
    }

    pub fn contains(&self, address: u64) -> bool {
        address >= self.base_address && address < self.end_address()
    }
}

/// A committed, readable range of the target's address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRegion {
    pub start: u64,
    pub end: u64,
}

impl MemoryRegion {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn size(&self) -> u64 {
        self.end - self.start
    }

    pub fn contains(&self, address: u64) -> bool {
        address >= self.start && address < self.end
    }
}

/// Trait for accessing process information.
///
/// This trait abstracts the properties of a process handle, allowing
/// mock implementations for testing.
pub trait ProcessInfo {
    /// Get the process ID.
    fn pid(&self) -> u32;

    /// All modules loaded into the process.
    fn modules(&self) -> Result<Vec<ModuleInfo>>;

    /// Committed, readable memory regions in ascending address order.
    fn regions(&self) -> Result<Vec<MemoryRegion>>;

    /// Title of the process's main window.
    fn window_title(&self) -> Result<String>;

    /// Check if the process is still running.
    fn is_alive(&self) -> bool;

    /// Find a loaded module by name (case-insensitive).
    fn module(&self, name: &str) -> Result<ModuleInfo> {
        self.modules()?
            .into_iter()
            .find(|m| m.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::ModuleNotFound(name.to_string()))
    }

    /// Highest address covered by any loaded module.
    fn max_address(&self) -> Result<u64> {
        Ok(self
            .modules()?
            .iter()
            .map(ModuleInfo::end_address)
            .max()
            .unwrap_or(0))
    }
}

/// Trait for finding and opening processes.
///
/// This trait abstracts process discovery, allowing mock implementations
/// that don't require actual system processes.
pub trait ProcessProvider {
    /// The type of process returned by this provider.
    type Process;

    /// Find and open a process by executable name.
    fn open_by_name(&self, name: &str) -> Result<Self::Process>;
}
