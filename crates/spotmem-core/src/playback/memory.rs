use tracing::trace;

use crate::error::{Error, Result};
use crate::offset::{PlaybackLayout, PointerRegistry, TrackIdLayout, read_track_id};
use crate::playback::{PlaybackSample, PlaybackSource, SourceKind, TitleCache};
use crate::process::{ProcessInfo, ReadMemory};
use crate::track::is_alphanumeric_id;

/// Reads track id, position, length and playing flag straight from memory.
///
/// Built once discovery has found both the track id prefix and the playback
/// structure. Name and artist come from the window title.
pub struct MemoryPlaybackSource<P> {
    process: P,
    track_id_address: u64,
    registry: PointerRegistry,
    track_id_layout: TrackIdLayout,
    playback_layout: PlaybackLayout,
    titles: TitleCache,
}

impl<P: ReadMemory + ProcessInfo> MemoryPlaybackSource<P> {
    pub fn new(
        process: P,
        track_id_address: u64,
        registry: PointerRegistry,
        track_id_layout: TrackIdLayout,
        playback_layout: PlaybackLayout,
    ) -> Self {
        Self {
            process,
            track_id_address,
            registry,
            track_id_layout,
            playback_layout,
            titles: TitleCache::new(),
        }
    }

    pub fn process(&self) -> &P {
        &self.process
    }

    pub fn track_id_address(&self) -> u64 {
        self.track_id_address
    }

    pub fn registry(&self) -> &PointerRegistry {
        &self.registry
    }
}

impl<P: ReadMemory + ProcessInfo + Send> PlaybackSource for MemoryPlaybackSource<P> {
    fn refresh(&mut self) -> Result<PlaybackSample> {
        if !self.process.is_alive() {
            return Err(Error::ProcessNotFound(format!(
                "Process {} exited",
                self.process.pid()
            )));
        }

        let track_id = read_track_id(&self.process, self.track_id_address, &self.track_id_layout)?;
        let reading = self.playback_layout.read(&self.process, &self.registry)?;

        let mut sample = PlaybackSample::new(track_id, reading.is_playing);
        match self.process.window_title() {
            Ok(raw) => {
                if let Some(title) = self.titles.update(&raw) {
                    sample = sample.with_title(title.clone());
                }
            }
            Err(e) => trace!("Window title unavailable: {}", e),
        }

        if !is_alphanumeric_id(&sample.track_id, self.track_id_layout.id_length) {
            trace!("Malformed track id: {:?}", sample.track_id);
            return Ok(sample.invalid());
        }

        if !reading.valid {
            trace!("Implausible playback reading: {:?}", reading);
            return Ok(sample.invalid());
        }

        Ok(sample
            .with_position(reading.position as u32)
            .with_length(reading.length as u32))
    }

    fn is_usable(&self) -> bool {
        self.process.is_alive()
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Memory
    }
}
