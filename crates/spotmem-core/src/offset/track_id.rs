//! Track id address discovery.

use tracing::debug;

use crate::error::{Error, Result};
use crate::offset::{PatternScanner, TrackIdLayout};
use crate::process::{ProcessInfo, ReadMemory};
use crate::track::is_alphanumeric_id;

/// Read the id that follows the prefix at `prefix_address`.
///
/// The bytes are returned as-is, valid or not.
pub fn read_track_id<R: ReadMemory + ?Sized>(
    reader: &R,
    prefix_address: u64,
    layout: &TrackIdLayout,
) -> Result<String> {
    reader.read_fixed_string(layout.id_address(prefix_address), layout.id_length)
}

/// Whether a well-formed id follows the prefix at `prefix_address`
pub fn has_track_id_at<R: ReadMemory + ?Sized>(
    reader: &R,
    prefix_address: u64,
    layout: &TrackIdLayout,
) -> bool {
    read_track_id(reader, prefix_address, layout)
        .is_ok_and(|id| is_alphanumeric_id(&id, layout.id_length))
}

/// Locate the `spotify:track:` prefix that precedes the current track id.
///
/// Historical offsets from the anchor module are tried first, then a
/// bounded scan around them. Returns the address of the prefix.
pub fn find_track_id_address<P>(process: &P, layout: &TrackIdLayout) -> Result<u64>
where
    P: ReadMemory + ProcessInfo + ?Sized,
{
    let module = process.module(&layout.anchor_module)?;
    let base = module.base_address;
    debug!("{} loaded at 0x{:X}", module.name, base);

    for &offset in &layout.historical_offsets {
        let candidate = base + offset;
        if has_track_id_at(process, candidate, layout) {
            debug!("Track id found at known offset +0x{:X}", offset);
            return Ok(candidate);
        }
    }

    let (start, end) = layout.scan_range(base).ok_or_else(|| {
        Error::DiscoveryFailed("No historical track id offsets configured".to_string())
    })?;
    debug!(
        "No known offset matched, scanning 0x{:X}..0x{:X} for {:?}",
        start, end, layout.prefix
    );

    let found = PatternScanner::new(process).find_address_of_text(
        start,
        end,
        layout.prefix.as_bytes(),
        |address, _| has_track_id_at(process, address, layout),
    );

    match found {
        Some(address) => {
            debug!(
                "Track id found by scan at 0x{:X} (+0x{:X})",
                address,
                address.wrapping_sub(base)
            );
            Ok(address)
        }
        None => Err(Error::DiscoveryFailed(
            "Could not find track id in memory".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{MockMemoryBuilder, MockProcess};

    const ID: &str = "4uLU6hMCjMI75M1A2tKUQC";

    fn small_layout() -> TrackIdLayout {
        TrackIdLayout {
            historical_offsets: vec![0x100, 0x140],
            ..Default::default()
        }
    }

    #[test]
    fn test_read_track_id() {
        let memory = MockMemoryBuilder::new()
            .write_bytes(0, format!("spotify:track:{}", ID).as_bytes())
            .build();
        let layout = TrackIdLayout::default();

        assert_eq!(read_track_id(&memory, 0x1000, &layout).unwrap(), ID);
        assert!(has_track_id_at(&memory, 0x1000, &layout));
        assert!(!has_track_id_at(&memory, 0x1001, &layout));
    }

    #[test]
    fn test_found_at_historical_offset() {
        let memory = MockMemoryBuilder::new()
            .with_size(0x400)
            .write_bytes(0x140, format!("spotify:track:{}", ID).as_bytes())
            .build();
        let process = MockProcess::new(memory).with_module("chrome_elf.dll", 0x1000, 0x400);

        let address = find_track_id_address(&process, &small_layout()).unwrap();
        assert_eq!(address, 0x1140);
    }

    #[test]
    fn test_found_by_scan_after_drift() {
        // Spread is 0x40, so the scan covers +0x40..+0x200
        let memory = MockMemoryBuilder::new()
            .with_size(0x400)
            .write_bytes(0x60, b"spotify:track:not-an-id-at-all!!")
            .write_bytes(0x1A0, format!("spotify:track:{}", ID).as_bytes())
            .build();
        let process = MockProcess::new(memory).with_module("CHROME_ELF.DLL", 0x1000, 0x400);

        let address = find_track_id_address(&process, &small_layout()).unwrap();
        assert_eq!(address, 0x11A0);
    }

    #[test]
    fn test_scan_window_is_bounded() {
        let memory = MockMemoryBuilder::new()
            .with_size(0x400)
            .write_bytes(0x300, format!("spotify:track:{}", ID).as_bytes())
            .build();
        let process = MockProcess::new(memory).with_module("chrome_elf.dll", 0x1000, 0x400);

        let result = find_track_id_address(&process, &small_layout());
        assert!(matches!(result, Err(Error::DiscoveryFailed(_))));
    }

    #[test]
    fn test_missing_anchor_module() {
        let process = MockProcess::new(MockMemoryBuilder::new().with_size(16).build());

        let result = find_track_id_address(&process, &small_layout());
        assert!(matches!(result, Err(Error::ModuleNotFound(_))));
    }
}
