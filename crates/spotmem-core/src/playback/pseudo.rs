use crate::error::{Error, Result};
use crate::offset::{TrackIdLayout, read_track_id};
use crate::playback::title::is_playing_title;
use crate::playback::{PlaybackSample, PlaybackSource, SourceKind, TitleCache};
use crate::process::{ProcessInfo, ReadMemory};

/// Degraded source used when the playback structure could not be found.
///
/// The playing flag is guessed from the window title and position and length
/// are always unknown. The track id is still read when its address is known.
pub struct PseudoPlaybackSource<P> {
    process: P,
    track_id_address: Option<u64>,
    track_id_layout: TrackIdLayout,
    titles: TitleCache,
}

impl<P: ReadMemory + ProcessInfo> PseudoPlaybackSource<P> {
    pub fn new(process: P, track_id_address: Option<u64>, track_id_layout: TrackIdLayout) -> Self {
        Self {
            process,
            track_id_address,
            track_id_layout,
            titles: TitleCache::new(),
        }
    }

    pub fn process(&self) -> &P {
        &self.process
    }

    pub fn track_id_address(&self) -> Option<u64> {
        self.track_id_address
    }
}

impl<P: ReadMemory + ProcessInfo + Send> PlaybackSource for PseudoPlaybackSource<P> {
    fn refresh(&mut self) -> Result<PlaybackSample> {
        if !self.process.is_alive() {
            return Err(Error::ProcessNotFound(format!(
                "Process {} exited",
                self.process.pid()
            )));
        }

        let raw = self.process.window_title()?;
        let track_id = match self.track_id_address {
            Some(address) => read_track_id(&self.process, address, &self.track_id_layout)?,
            None => String::new(),
        };

        let mut sample = PlaybackSample::new(track_id, is_playing_title(&raw));
        if let Some(title) = self.titles.update(&raw) {
            sample = sample.with_title(title.clone());
        }
        Ok(sample)
    }

    fn is_usable(&self) -> bool {
        self.process.is_alive()
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Pseudo
    }
}
