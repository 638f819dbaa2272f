//! CLI argument definitions for spotmem.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use spotmem_core::MediaKey;

#[derive(Parser)]
#[command(name = "spotmem")]
#[command(about = "Spotify desktop playback monitor", version)]
pub struct Args {
    /// Engine configuration file (TOML)
    #[arg(short, long, value_name = "FILE", env = "SPOTMEM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory for the discovery cache
    #[arg(long, value_name = "DIR", env = "SPOTMEM_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Follow playback and print events until Ctrl+C (default)
    Watch,
    /// Send a media key to the system
    Key {
        /// play-pause, next or prev
        key: MediaKey,
    },
    /// Run discovery once and print the addresses found
    FindOffsets {
        /// Process ID (skip lookup by name)
        #[arg(long)]
        pid: Option<u32>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Connect, take one sample and print the engine state
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
