//! Error types for the gateway

use thiserror::Error;

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or inconsistent configuration
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Signaling error: {0}")]
    Dialog(#[from] dialog_core::DialogError),

    #[error("Media error: {0}")]
    Media(#[from] rtp_core::Error),

    /// Every RTP port of the configured range is in use
    #[error("No free RTP port in {min}-{max}")]
    NoFreePort { min: u16, max: u16 },

    /// The PBX never told us where to send audio
    #[error("No remote media address for call {0}")]
    NoRemoteMedia(String),

    /// The line adapter refused an action
    #[error("Line adapter failed to {action}: {source}")]
    Line {
        action: &'static str,
        #[source]
        source: std::io::Error,
    },
}
