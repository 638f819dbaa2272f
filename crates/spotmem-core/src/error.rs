use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Process not found: {0}")]
    ProcessNotFound(String),

    #[error("Failed to open process: {0}")]
    ProcessOpenFailed(String),

    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    #[error("Failed to read process memory at address {address:#x}: {message}")]
    MemoryReadFailed { address: u64, message: String },

    #[error("Window not found for process {0}")]
    WindowNotFound(u32),

    #[error("Discovery failed: {0}")]
    DiscoveryFailed(String),

    #[error("Invalid playback sample: {0}")]
    InvalidSample(String),

    #[error("Unknown pointer: {0}")]
    UnknownPointer(String),

    #[error("The engine is already initialized")]
    AlreadyInitialized,

    #[error("The engine has been shut down")]
    EngineShutDown,

    #[error("Access token expired")]
    TokenExpired,

    #[error("Metadata lookup failed: {0}")]
    Metadata(String),

    #[error("Failed to send input: {0}")]
    InputFailed(String),

    #[error("Unsupported on this platform: {0}")]
    Unsupported(String),

    #[error("Config parse error: {0}")]
    ConfigParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Helper for the common "read failed" case
    pub fn read_failed(address: u64, message: impl Into<String>) -> Self {
        Error::MemoryReadFailed {
            address,
            message: message.into(),
        }
    }

    /// Check if this error is a "file not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }

    /// Errors raised by a caller misusing the engine lifecycle.
    ///
    /// These are never retried by the engine.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Error::AlreadyInitialized | Error::EngineShutDown)
    }
}
