//! Status command implementation.

use anyhow::Result;
use spotmem_core::{Engine, EngineConfig, EngineStatus};

use super::watch::format_ms;

/// Run the status command
pub fn run(config: EngineConfig, json: bool) -> Result<()> {
    let engine = Engine::builder(config).background(false).build();
    engine.initialize()?;
    let status = engine.status();
    engine.shutdown();

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print_status(&status);
    }
    Ok(())
}

fn print_status(status: &EngineStatus) {
    println!("Connection: {}", status.connection);
    if let Some(source) = status.source {
        println!("Source:     {}", source);
    }
    match &status.track {
        Some(track) => {
            println!("Track:      {} - {}", track.name, track.artist);
            println!("Track ID:   {}", track.id);
            println!("Length:     {}", format_ms(track.length));
        }
        None => println!("Track:      (none)"),
    }
    match status.position {
        Some(position) => println!("Position:   {}", format_ms(position)),
        None => println!("Position:   unknown"),
    }
    println!("Playing:    {}", status.is_playing);
}
