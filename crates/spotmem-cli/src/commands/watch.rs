//! Follow playback until interrupted.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use owo_colors::OwoColorize;
use spotmem_core::engine::ShutdownSignal;
use spotmem_core::{Engine, EngineConfig, Error, PlaybackListener, Track};

/// Prints engine events as they happen
pub struct ConsoleListener;

impl PlaybackListener for ConsoleListener {
    fn on_connect(&self) {
        println!("{}", "Connected to Spotify".green());
    }

    fn on_track_changed(&self, track: &Track) {
        println!(
            "{} {} - {} ({})",
            "Track:".bold(),
            track.name.cyan(),
            track.artist,
            format_ms(track.length)
        );
    }

    fn on_position_changed(&self, position: u32) {
        println!("{} {}", "Seek:".bold(), format_ms(position));
    }

    fn on_playback_changed(&self, is_playing: bool) {
        if is_playing {
            println!("{}", "Playing".green());
        } else {
            println!("{}", "Paused".yellow());
        }
    }

    fn on_disconnect(&self, error: &Error) {
        println!("{} {}", "Disconnected:".red(), error);
    }
}

/// `m:ss`, or `-:--` when unknown
pub fn format_ms(ms: u32) -> String {
    if ms == 0 {
        return "-:--".to_string();
    }
    let seconds = ms / 1000;
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

pub fn run(config: EngineConfig) -> Result<()> {
    let shutdown = Arc::new(ShutdownSignal::new());
    let shutdown_ctrlc = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        println!("\nShutting down...");
        shutdown_ctrlc.trigger();
    })?;

    println!("spotmem v{}", env!("CARGO_PKG_VERSION"));
    println!("Waiting for {}... (Press Ctrl+C to quit)", config.process_name);

    let engine = Engine::new(config);
    engine.register_listener(Arc::new(ConsoleListener));
    engine.initialize()?;

    while !shutdown.wait(Duration::from_secs(1)) {}

    engine.shutdown();
    println!("Shutdown complete.");
    Ok(())
}
