#![cfg_attr(not(target_os = "windows"), allow(dead_code))]

use crate::error::{Error, Result};
use crate::process::provider::{MemoryRegion, ModuleInfo, ProcessInfo, ProcessProvider};

#[cfg(target_os = "windows")]
use tracing::{debug, warn};

#[cfg(target_os = "windows")]
use std::ffi::OsString;
#[cfg(target_os = "windows")]
use std::os::windows::ffi::OsStringExt;
#[cfg(target_os = "windows")]
use windows::Win32::Foundation::{BOOL, CloseHandle, HANDLE, HMODULE, HWND, LPARAM};
#[cfg(target_os = "windows")]
use windows::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, PROCESSENTRY32W, Process32FirstW, Process32NextW, TH32CS_SNAPPROCESS,
};
#[cfg(target_os = "windows")]
use windows::Win32::System::Memory::{
    MEM_COMMIT, MEMORY_BASIC_INFORMATION, PAGE_EXECUTE_READ, PAGE_EXECUTE_READWRITE,
    PAGE_EXECUTE_WRITECOPY, PAGE_GUARD, PAGE_NOACCESS, PAGE_READONLY, PAGE_READWRITE,
    PAGE_WRITECOPY, VirtualQueryEx,
};
#[cfg(target_os = "windows")]
use windows::Win32::System::ProcessStatus::{
    EnumProcessModulesEx, GetModuleBaseNameW, GetModuleInformation, LIST_MODULES_ALL, MODULEINFO,
};
#[cfg(target_os = "windows")]
use windows::Win32::System::Threading::{
    GetExitCodeProcess, OpenProcess, PROCESS_QUERY_INFORMATION, PROCESS_VM_READ,
};
#[cfg(target_os = "windows")]
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetWindowTextW, GetWindowThreadProcessId, IsWindowVisible,
};

/// Highest user-mode address on 64-bit Windows.
#[cfg(target_os = "windows")]
const MAX_USER_ADDRESS: u64 = 0x7FFF_FFFF_FFFF;

#[cfg(target_os = "windows")]
pub struct ProcessHandle {
    handle: HANDLE,
    window: Option<HWND>,
    pub pid: u32,
}

// SAFETY: process and window handles are plain kernel/user object identifiers that
// may be used from any thread. The handle is only closed in Drop.
#[cfg(target_os = "windows")]
unsafe impl Send for ProcessHandle {}
#[cfg(target_os = "windows")]
unsafe impl Sync for ProcessHandle {}

#[cfg(not(target_os = "windows"))]
pub struct ProcessHandle {
    pub pid: u32,
}

#[cfg(target_os = "windows")]
impl ProcessHandle {
    /// Find a process by executable name and open it for reading.
    pub fn open_by_name(name: &str) -> Result<Self> {
        let pid = find_process_id(name).map_err(|e| {
            debug!("Process detection failed: {}", e);
            e
        })?;
        debug!("Found {} with PID {}", name, pid);
        Self::open(pid)
    }

    pub fn open(pid: u32) -> Result<Self> {
        // SAFETY: OpenProcess is called with valid flags (PROCESS_QUERY_INFORMATION | PROCESS_VM_READ)
        // and a process ID obtained from CreateToolhelp32Snapshot. The returned handle is managed
        // by this struct and closed in Drop.
        let handle = unsafe {
            OpenProcess(PROCESS_QUERY_INFORMATION | PROCESS_VM_READ, false, pid).map_err(|e| {
                debug!("OpenProcess failed for PID {}: {}", pid, e);
                Error::ProcessOpenFailed(e.to_string())
            })?
        };

        let window = find_window_by_pid(pid);
        if window.is_none() {
            debug!("No visible window for PID {} yet", pid);
        }

        Ok(Self {
            handle,
            window,
            pid,
        })
    }

    pub fn handle(&self) -> HANDLE {
        self.handle
    }

    /// Check if the process is still running
    pub fn is_alive(&self) -> bool {
        const STILL_ACTIVE: u32 = 259;

        let mut exit_code: u32 = 0;
        // SAFETY: GetExitCodeProcess is called with a valid process handle obtained from OpenProcess.
        // The exit_code variable is properly initialized and passed by mutable reference.
        unsafe {
            if GetExitCodeProcess(self.handle, &mut exit_code).is_ok() {
                exit_code == STILL_ACTIVE
            } else {
                false
            }
        }
    }

    fn enumerate_modules(&self) -> Result<Vec<ModuleInfo>> {
        let mut handles = [HMODULE::default(); 2048];
        let mut needed: u32 = 0;

        // SAFETY: EnumProcessModulesEx is called with a valid process handle from OpenProcess,
        // and the modules array is large enough to hold typical module counts. The needed
        // parameter receives the actual bytes required.
        unsafe {
            EnumProcessModulesEx(
                self.handle,
                handles.as_mut_ptr(),
                (handles.len() * std::mem::size_of::<HMODULE>()) as u32,
                &mut needed,
                LIST_MODULES_ALL,
            )
            .map_err(|e| Error::ProcessOpenFailed(format!("Failed to enumerate modules: {}", e)))?;
        }

        let count = (needed as usize / std::mem::size_of::<HMODULE>()).min(handles.len());
        if count == 0 {
            return Err(Error::ProcessOpenFailed(
                "No modules found in process".to_string(),
            ));
        }

        let mut modules = Vec::with_capacity(count);
        for &module in &handles[..count] {
            let mut name = [0u16; 1024];
            // SAFETY: GetModuleBaseNameW writes at most name.len() UTF-16 units into the buffer.
            let len = unsafe { GetModuleBaseNameW(self.handle, module, &mut name) } as usize;

            let mut info = MODULEINFO::default();
            // SAFETY: GetModuleInformation is called with a valid process handle and a module
            // handle from the enumeration. The info struct is properly sized.
            let info_ok = unsafe {
                GetModuleInformation(
                    self.handle,
                    module,
                    &mut info,
                    std::mem::size_of::<MODULEINFO>() as u32,
                )
            };
            if let Err(e) = info_ok {
                debug!("GetModuleInformation failed: {}", e);
                continue;
            }

            modules.push(ModuleInfo::new(
                OsString::from_wide(&name[..len]).to_string_lossy(),
                info.lpBaseOfDll as u64,
                info.SizeOfImage as u64,
            ));
        }

        Ok(modules)
    }

    fn enumerate_regions(&self) -> Vec<MemoryRegion> {
        const READABLE: u32 = PAGE_READONLY.0
            | PAGE_READWRITE.0
            | PAGE_WRITECOPY.0
            | PAGE_EXECUTE_READ.0
            | PAGE_EXECUTE_READWRITE.0
            | PAGE_EXECUTE_WRITECOPY.0;

        let mut regions: Vec<MemoryRegion> = Vec::new();
        let mut address: u64 = 0;

        while address < MAX_USER_ADDRESS {
            let mut info = MEMORY_BASIC_INFORMATION::default();
            // SAFETY: VirtualQueryEx fills a properly sized MEMORY_BASIC_INFORMATION for the
            // region containing `address`; a zero return ends the walk.
            let written = unsafe {
                VirtualQueryEx(
                    self.handle,
                    Some(address as *const _),
                    &mut info,
                    std::mem::size_of::<MEMORY_BASIC_INFORMATION>(),
                )
            };
            if written == 0 || info.RegionSize == 0 {
                break;
            }

            let start = info.BaseAddress as u64;
            let end = start + info.RegionSize as u64;
            let protect = info.Protect.0;
            let readable = info.State == MEM_COMMIT
                && protect & READABLE != 0
                && protect & (PAGE_GUARD.0 | PAGE_NOACCESS.0) == 0;

            if readable {
                // Merge adjacent regions so patterns spanning them are still found
                match regions.last_mut() {
                    Some(last) if last.end == start => last.end = end,
                    _ => regions.push(MemoryRegion::new(start, end)),
                }
            }

            address = end;
        }

        regions
    }

    fn read_window_title(&self) -> Result<String> {
        let window = self
            .window
            .or_else(|| find_window_by_pid(self.pid))
            .ok_or(Error::WindowNotFound(self.pid))?;

        let mut buffer = [0u16; 512];
        // SAFETY: GetWindowTextW writes at most buffer.len() UTF-16 units.
        let len = unsafe { GetWindowTextW(window, &mut buffer) };
        let len = usize::try_from(len).unwrap_or(0);
        Ok(String::from_utf16_lossy(&buffer[..len]))
    }
}

#[cfg(target_os = "windows")]
impl ProcessInfo for ProcessHandle {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn modules(&self) -> Result<Vec<ModuleInfo>> {
        self.enumerate_modules()
    }

    fn regions(&self) -> Result<Vec<MemoryRegion>> {
        Ok(self.enumerate_regions())
    }

    fn window_title(&self) -> Result<String> {
        self.read_window_title()
    }

    fn is_alive(&self) -> bool {
        ProcessHandle::is_alive(self)
    }
}

#[cfg(not(target_os = "windows"))]
impl ProcessHandle {
    pub fn open_by_name(_name: &str) -> Result<Self> {
        Err(Error::ProcessNotFound(
            "Windows only: process access not supported on this platform".to_string(),
        ))
    }

    pub fn open(_pid: u32) -> Result<Self> {
        Err(Error::ProcessNotFound(
            "Windows only: process access not supported on this platform".to_string(),
        ))
    }

    /// Check if the process is still running (stub for non-Windows)
    pub fn is_alive(&self) -> bool {
        false
    }
}

#[cfg(not(target_os = "windows"))]
impl ProcessInfo for ProcessHandle {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn modules(&self) -> Result<Vec<ModuleInfo>> {
        Err(Error::Unsupported("module enumeration".to_string()))
    }

    fn regions(&self) -> Result<Vec<MemoryRegion>> {
        Err(Error::Unsupported("region enumeration".to_string()))
    }

    fn window_title(&self) -> Result<String> {
        Err(Error::Unsupported("window title".to_string()))
    }

    fn is_alive(&self) -> bool {
        ProcessHandle::is_alive(self)
    }
}

#[cfg(target_os = "windows")]
impl Drop for ProcessHandle {
    fn drop(&mut self) {
        if !self.handle.is_invalid() {
            // SAFETY: self.handle is a valid handle obtained from OpenProcess and has not been
            // closed yet. CloseHandle is safe to call on a valid handle.
            if let Err(e) = unsafe { CloseHandle(self.handle) } {
                warn!("Failed to close process handle: {}", e);
            }
        }
    }
}

/// Opens real processes through the OS.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessProvider;

impl ProcessProvider for SystemProcessProvider {
    type Process = ProcessHandle;

    fn open_by_name(&self, name: &str) -> Result<ProcessHandle> {
        ProcessHandle::open_by_name(name)
    }
}

/// Pick the process named `name` that owns a visible window.
///
/// The player runs several processes under the same executable name; only
/// the main one has the window. Falls back to the first match.
#[cfg(target_os = "windows")]
fn find_process_id(name: &str) -> Result<u32> {
    let pids = find_process_ids(name)?;
    let pid = pids
        .iter()
        .copied()
        .find(|&pid| find_window_by_pid(pid).is_some())
        .or_else(|| pids.first().copied())
        .ok_or_else(|| Error::ProcessNotFound(format!("Process '{}' not found", name)))?;
    if pids.len() > 1 {
        debug!("{} processes named {}, using PID {}", pids.len(), name, pid);
    }
    Ok(pid)
}

#[cfg(target_os = "windows")]
fn find_process_ids(name: &str) -> Result<Vec<u32>> {
    // SAFETY: CreateToolhelp32Snapshot with TH32CS_SNAPPROCESS is safe to call.
    // The returned handle is closed at the end of this function.
    let snapshot = unsafe {
        CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0)
            .map_err(|e| Error::ProcessNotFound(e.to_string()))?
    };

    let mut entry = PROCESSENTRY32W {
        dwSize: std::mem::size_of::<PROCESSENTRY32W>() as u32,
        ..Default::default()
    };

    let mut pids = Vec::new();
    // SAFETY: Process32FirstW and Process32NextW are safe to call with a valid snapshot handle
    // and properly initialized PROCESSENTRY32W structure.
    unsafe {
        if Process32FirstW(snapshot, &mut entry).is_ok() {
            loop {
                let len = entry
                    .szExeFile
                    .iter()
                    .position(|&c| c == 0)
                    .unwrap_or(entry.szExeFile.len());
                let exe_name = OsString::from_wide(&entry.szExeFile[..len]);

                if exe_name.to_string_lossy().eq_ignore_ascii_case(name) {
                    pids.push(entry.th32ProcessID);
                }

                if Process32NextW(snapshot, &mut entry).is_err() {
                    break;
                }
            }
        }
    }

    // SAFETY: snapshot is a valid handle from CreateToolhelp32Snapshot
    let _ = unsafe { CloseHandle(snapshot) };
    Ok(pids)
}

#[cfg(target_os = "windows")]
struct WindowSearch {
    pid: u32,
    found: Option<HWND>,
}

/// Find the first visible top-level window owned by `pid`.
#[cfg(target_os = "windows")]
fn find_window_by_pid(pid: u32) -> Option<HWND> {
    let mut search = WindowSearch { pid, found: None };

    // SAFETY: the LPARAM points at `search`, which outlives the synchronous EnumWindows call.
    // EnumWindows reports an error when the callback stops enumeration early, which is
    // exactly the "found" case, so the result is ignored.
    unsafe {
        let _ = EnumWindows(
            Some(enum_window_callback),
            LPARAM(&mut search as *mut WindowSearch as isize),
        );
    }

    search.found
}

#[cfg(target_os = "windows")]
unsafe extern "system" fn enum_window_callback(hwnd: HWND, lparam: LPARAM) -> BOOL {
    // SAFETY: lparam was created from a live &mut WindowSearch in find_window_by_pid.
    let search = unsafe { &mut *(lparam.0 as *mut WindowSearch) };

    let mut window_pid: u32 = 0;
    unsafe { GetWindowThreadProcessId(hwnd, Some(&mut window_pid)) };

    if window_pid == search.pid && unsafe { IsWindowVisible(hwnd) }.as_bool() {
        search.found = Some(hwnd);
        return BOOL(0); // Stop enumeration
    }
    BOOL(1) // Continue enumeration
}
