mod cli;
mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Args, Command};
use spotmem_core::EngineConfig;
use spotmem_core::config::DEFAULT_DATA_DIR;
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(format!("spotmem={}", level).parse()?)
                .add_directive(format!("spotmem_core={}", level).parse()?),
        )
        .init();

    let config = load_config(&args)?;

    match args.command {
        None | Some(Command::Watch) => commands::watch::run(config),
        Some(Command::Key { key }) => commands::key::run(key),
        Some(Command::FindOffsets { pid, json }) => commands::find_offsets::run(&config, pid, json),
        Some(Command::Status { json }) => commands::status::run(config, json),
    }
}

/// Config file if given, with the data directory resolved
fn load_config(args: &Args) -> Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => EngineConfig::default(),
    };

    if let Some(dir) = &args.data_dir {
        config.data_dir = dir.clone();
    } else if args.config.is_none()
        && let Some(local) = dirs::data_local_dir()
    {
        config.data_dir = local.join(DEFAULT_DATA_DIR);
    }
    debug!("Data directory: {}", config.data_dir.display());

    Ok(config)
}
