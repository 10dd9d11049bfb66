use std::io;
use thiserror::Error;

use codec_core::CodecError;

/// Error type for RTP operations
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid packet format
    #[error("Invalid RTP packet format: {0}")]
    InvalidPacket(String),

    /// Buffer too small
    #[error("Buffer too small for RTP packet: need {required} but have {available}")]
    BufferTooSmall { required: usize, available: usize },

    /// Invalid parameter for RTP operation
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Socket or audio device failure
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Companding failure
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}
