#![cfg_attr(not(target_os = "windows"), allow(dead_code, unused_variables))]

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::process::ProcessHandle;

#[cfg(target_os = "windows")]
use windows::Win32::System::Diagnostics::Debug::ReadProcessMemory;

/// Trait for reading memory from a process or buffer
///
/// This trait enables mocking for tests and abstracts over different memory sources.
pub trait ReadMemory {
    /// Read raw bytes from memory at the given address
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>>;

    /// Read a single byte
    fn read_u8(&self, address: u64) -> Result<u8> {
        let bytes = self.read_bytes(address, 1)?;
        Ok(bytes[0])
    }

    /// Read a boolean stored as one byte; only `1` counts as true
    fn read_bool(&self, address: u64) -> Result<bool> {
        Ok(self.read_u8(address)? == 1)
    }

    /// Read a signed 32-bit integer from memory
    fn read_i32(&self, address: u64) -> Result<i32> {
        let bytes = self.read_bytes(address, 4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read exactly `len` bytes as single-byte characters.
    ///
    /// Nothing is trimmed: embedded nulls and non-ASCII bytes are kept as-is so
    /// callers can reject them.
    fn read_fixed_string(&self, address: u64, len: usize) -> Result<String> {
        let bytes = self.read_bytes(address, len)?;
        Ok(bytes.iter().map(|&b| b as char).collect())
    }
}

impl<T: ReadMemory + ?Sized> ReadMemory for &T {
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        (**self).read_bytes(address, size)
    }
}

impl<T: ReadMemory + ?Sized> ReadMemory for Arc<T> {
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        (**self).read_bytes(address, size)
    }
}

impl ProcessHandle {
    #[cfg(target_os = "windows")]
    fn read_bytes_impl(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; size];
        let mut bytes_read = 0;

        // SAFETY: ReadProcessMemory is called with:
        // - A valid process handle from ProcessHandle (obtained via OpenProcess with PROCESS_VM_READ)
        // - An address within the target process's address space
        // - A properly allocated buffer of the requested size
        // - A pointer to receive the actual bytes read
        // The function may fail if the address is invalid, but this is handled via Result.
        unsafe {
            ReadProcessMemory(
                self.handle(),
                address as *const _,
                buffer.as_mut_ptr() as *mut _,
                size,
                Some(&mut bytes_read),
            )
            .map_err(|e| Error::read_failed(address, e.to_string()))?;
        }

        // Partial reads are treated as errors; a half-read structure is never interpreted.
        if bytes_read != size {
            return Err(Error::read_failed(
                address,
                format!("Expected {} bytes, read {}", size, bytes_read),
            ));
        }

        Ok(buffer)
    }

    #[cfg(not(target_os = "windows"))]
    fn read_bytes_impl(&self, address: u64, _size: usize) -> Result<Vec<u8>> {
        Err(Error::read_failed(
            address,
            "Windows only: memory reading not supported on this platform",
        ))
    }
}

impl ReadMemory for ProcessHandle {
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        self.read_bytes_impl(address, size)
    }
}
