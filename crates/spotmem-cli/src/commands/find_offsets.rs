//! Run discovery once against the live player.

use anyhow::Result;
use serde::Serialize;
use spotmem_core::offset::{find_playback_registry, find_track_id_address, read_track_id};
use spotmem_core::process::ProcessInfo;
use spotmem_core::{EngineConfig, ProcessHandle};

/// What discovery found in one process
#[derive(Debug, Serialize)]
pub struct DiscoveryReport {
    pub pid: u32,
    pub track_id_address: Option<u64>,
    pub track_id: Option<String>,
    pub playback_base: Option<u64>,
    /// Resolved playback fields
    pub fields: Vec<(String, u64)>,
    pub errors: Vec<String>,
}

pub fn run(config: &EngineConfig, pid: Option<u32>, json: bool) -> Result<()> {
    let process = match pid {
        Some(pid) => ProcessHandle::open(pid)?,
        None => ProcessHandle::open_by_name(&config.process_name)?,
    };

    let mut report = DiscoveryReport {
        pid: process.pid(),
        track_id_address: None,
        track_id: None,
        playback_base: None,
        fields: Vec::new(),
        errors: Vec::new(),
    };

    match find_track_id_address(&process, &config.track_id) {
        Ok(address) => {
            report.track_id_address = Some(address);
            report.track_id = read_track_id(&process, address, &config.track_id).ok();
        }
        Err(e) => report.errors.push(format!("track id: {}", e)),
    }

    match find_playback_registry(&process, &config.playback) {
        Ok(registry) => {
            report.playback_base = Some(registry.discovered_base());
            report.fields = registry.resolved();
        }
        Err(e) => report.errors.push(format!("playback: {}", e)),
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("PID: {}", report.pid);
    match (report.track_id_address, &report.track_id) {
        (Some(address), Some(id)) => println!("Track ID:       0x{:X} ({})", address, id),
        (Some(address), None) => println!("Track ID:       0x{:X}", address),
        _ => println!("Track ID:       not found"),
    }
    match report.playback_base {
        Some(base) => {
            println!("Playback base:  0x{:X}", base);
            for (name, address) in &report.fields {
                println!("  {:<12} 0x{:X}", name, address);
            }
        }
        None => println!("Playback base:  not found"),
    }
    for error in &report.errors {
        println!("! {}", error);
    }
    Ok(())
}
