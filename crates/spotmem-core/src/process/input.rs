//! Media key injection via the SendInput API.
//!
//! The player reacts to the global media keys, so a key press is sent to the
//! whole desktop rather than to the player window.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::error::{Error, Result};

/// Media keys the player understands.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum MediaKey {
    PlayPause,
    Next,
    #[strum(to_string = "prev", serialize = "previous")]
    Prev,
}

impl MediaKey {
    /// Windows virtual key code.
    pub fn virtual_key(self) -> u16 {
        match self {
            Self::PlayPause => 0xB3,
            Self::Next => 0xB0,
            Self::Prev => 0xB1,
        }
    }
}

/// Sends media key presses to the system.
pub trait MediaKeySender: Send + Sync {
    fn press(&self, key: MediaKey) -> Result<()>;
}

impl<T: MediaKeySender + ?Sized> MediaKeySender for std::sync::Arc<T> {
    fn press(&self, key: MediaKey) -> Result<()> {
        (**self).press(key)
    }
}

/// Sends media keys through the OS input queue.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemMediaKeys;

impl MediaKeySender for SystemMediaKeys {
    fn press(&self, key: MediaKey) -> Result<()> {
        send_media_key(key)
    }
}

/// Send a key down followed by a key up for `key`.
#[cfg(target_os = "windows")]
pub fn send_media_key(key: MediaKey) -> Result<()> {
    use windows::Win32::UI::Input::KeyboardAndMouse::*;

    let make_input = |flags: KEYBD_EVENT_FLAGS| INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: VIRTUAL_KEY(key.virtual_key()),
                wScan: 0,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    };

    let down = make_input(KEYBD_EVENT_FLAGS(0));
    let up = make_input(KEYEVENTF_KEYUP);

    // SAFETY: SendInput is called with properly initialized INPUT structs.
    // The slice length matches the number of events sent.
    let sent = unsafe { SendInput(&[down, up], std::mem::size_of::<INPUT>() as i32) };
    if sent != 2 {
        return Err(Error::InputFailed(format!(
            "SendInput sent {} of 2 events for {}: {}",
            sent,
            key,
            std::io::Error::last_os_error()
        )));
    }

    Ok(())
}

#[cfg(not(target_os = "windows"))]
pub fn send_media_key(key: MediaKey) -> Result<()> {
    Err(Error::Unsupported(format!(
        "media key {} (SendInput is only available on Windows)",
        key
    )))
}
