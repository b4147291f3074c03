//! error.rs
//! Error types for the ReactorBot controller.
//!
//! Malformed or foreign protocol frames are never errors: the link drops them
//! silently. Only transport and configuration failures surface here.

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error (config file, CSV export)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file could not be parsed
    #[error("Config parse error: {0}")]
    Config(#[from] serde_json::Error),

    /// Config parsed but holds unusable values
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Byte transport failed to read or write
    #[error("Transport error: {0}")]
    Transport(String),

    /// Peer end of the transport has gone away
    #[error("Transport disconnected")]
    Disconnected,
}
