//! Error handling for the codec library

use thiserror::Error;

/// Result type alias for codec operations
pub type Result<T> = std::result::Result<T, CodecError>;

/// Errors raised while selecting a codec or converting audio
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Encoding name not known to the gateway
    #[error("Unsupported codec: {name}")]
    UnsupportedCodec {
        /// Name as it appeared in configuration or SDP
        name: String,
    },

    /// RTP payload type without a G.711 decoder
    #[error("Unsupported payload type: {payload_type}")]
    UnsupportedPayloadType {
        /// Payload type taken from the RTP header
        payload_type: u8,
    },

    /// Output buffer cannot hold the converted frame
    #[error("Buffer too small: need {needed}, got {actual}")]
    BufferTooSmall {
        /// Required length in elements
        needed: usize,
        /// Length that was provided
        actual: usize,
    },

    /// Malformed input audio
    #[error("Invalid audio format: {details}")]
    InvalidFormat {
        /// What was wrong with the input
        details: String,
    },
}

impl CodecError {
    /// Create an unsupported codec error
    pub fn unsupported_codec(name: impl Into<String>) -> Self {
        Self::UnsupportedCodec { name: name.into() }
    }

    /// Create a buffer too small error
    pub fn buffer_too_small(needed: usize, actual: usize) -> Self {
        Self::BufferTooSmall { needed, actual }
    }

    /// Create an invalid format error
    pub fn invalid_format(details: impl Into<String>) -> Self {
        Self::InvalidFormat {
            details: details.into(),
        }
    }
}
