//! Media key command.

use anyhow::Result;
use spotmem_core::MediaKey;
use spotmem_core::process::send_media_key;

pub fn run(key: MediaKey) -> Result<()> {
    send_media_key(key)?;
    println!("Sent {}", key);
    Ok(())
}
