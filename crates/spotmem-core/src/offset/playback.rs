//! Playback structure discovery.
//!
//! The anchor text is a short, common word, so a hit is only accepted when
//! the markers around it match and a trial read through the resulting
//! registry passes the range and parity checks.

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::offset::{PatternScanner, PlaybackLayout, PointerRegistry};
use crate::process::{ProcessInfo, ReadMemory};

/// Check whether `candidate` is the base of a live playback structure
pub fn validate_candidate<R: ReadMemory + ?Sized>(
    reader: &R,
    layout: &PlaybackLayout,
    candidate: u64,
) -> bool {
    if !layout.markers_match(reader, candidate) {
        return false;
    }

    let registry = layout.registry(candidate);
    match layout.read(reader, &registry) {
        Ok(reading) if reading.valid => true,
        Ok(reading) => {
            trace!("Candidate 0x{:X} rejected: {:?}", candidate, reading);
            false
        }
        Err(e) => {
            trace!("Candidate 0x{:X} unreadable: {}", candidate, e);
            false
        }
    }
}

/// Find the playback structure in the process's readable memory.
pub fn find_playback_registry<P>(process: &P, layout: &PlaybackLayout) -> Result<PointerRegistry>
where
    P: ReadMemory + ProcessInfo + ?Sized,
{
    if layout.anchor.is_empty() {
        return Err(Error::DiscoveryFailed(
            "No playback anchor configured".to_string(),
        ));
    }

    let regions = process.regions()?;
    debug!(
        "Scanning {} regions for playback anchor {:?}",
        regions.len(),
        layout.anchor
    );

    let mut candidates = 0usize;
    let found = PatternScanner::new(process).find_text_in_regions(
        &regions,
        layout.anchor.as_bytes(),
        |address, _| {
            candidates += 1;
            validate_candidate(process, layout, address)
        },
    );

    match found {
        Some(base) => {
            debug!(
                "Playback structure at 0x{:X} ({} candidates checked)",
                base, candidates
            );
            Ok(layout.registry(base))
        }
        None => Err(Error::DiscoveryFailed(format!(
            "No playback structure among {} anchor candidates",
            candidates
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offset::layout::fields;
    use crate::process::{MemoryRegion, MockMemoryBuilder, MockProcess};

    fn write_structure(
        builder: MockMemoryBuilder,
        base: usize,
        position: i32,
        length: i32,
        parity: [u8; 3],
    ) -> MockMemoryBuilder {
        let rel = |reference: u64| base + (reference - 0x0D3A2064) as usize;
        builder
            .write_bytes(base, b"playing")
            .write_bytes(base + 8, b"paused")
            .write_i32(rel(0x0D3A2178), position)
            .write_i32(rel(0x0D3A2188), length)
            .write_u8(rel(0x0D3A21AC), 1)
            .write_u8(rel(0x0D3A2199), parity[0])
            .write_u8(rel(0x0D3A21A4), parity[1])
            .write_u8(rel(0x0D3A216E), parity[2])
    }

    #[test]
    fn test_skips_decoys_and_finds_structure() {
        let builder = MockMemoryBuilder::new()
            .with_size(0x1000)
            // Bare anchor without markers
            .write_bytes(0x20, b"playing");
        // Markers present but parity disagrees with the playing flag
        let builder = write_structure(builder, 0x200, 1000, 200_000, [1, 0, 5]);
        // Markers present but length out of range
        let builder = write_structure(builder, 0x500, 1000, 900_000, [0, 0, 5]);
        let builder = write_structure(builder, 0x800, 1000, 200_000, [0, 0, 5]);
        let process = MockProcess::new(builder.build());

        let registry = find_playback_registry(&process, &PlaybackLayout::default()).unwrap();

        assert_eq!(registry.discovered_base(), 0x1800);
        assert_eq!(
            registry.resolve(fields::POSITION),
            Some(0x1800 + (0x0D3A2178 - 0x0D3A2064))
        );
    }

    #[test]
    fn test_only_scans_given_regions() {
        let builder = MockMemoryBuilder::new().with_size(0x1000);
        let builder = write_structure(builder, 0x800, 1000, 200_000, [0, 0, 5]);
        let process = MockProcess::new(builder.build())
            .with_regions(vec![MemoryRegion::new(0x1000, 0x1400)]);

        let result = find_playback_registry(&process, &PlaybackLayout::default());
        assert!(matches!(result, Err(Error::DiscoveryFailed(_))));
    }

    #[test]
    fn test_empty_anchor() {
        let process = MockProcess::new(MockMemoryBuilder::new().with_size(16).build());
        let layout = PlaybackLayout {
            anchor: String::new(),
            ..Default::default()
        };
        assert!(find_playback_registry(&process, &layout).is_err());
    }
}
