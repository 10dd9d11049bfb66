//! Codec identifiers and PCM frame constants

use crate::error::{CodecError, Result};
use std::fmt;
use std::str::FromStr;

/// Sample rate of both legs, in Hz
pub const SAMPLE_RATE: u32 = 8000;

/// Duration of one media frame
pub const FRAME_DURATION_MS: u32 = 20;

/// Samples per 20 ms frame at 8 kHz mono
pub const FRAME_SAMPLES: usize = 160;

/// Bytes per 20 ms frame of 16-bit linear PCM
pub const FRAME_BYTES: usize = FRAME_SAMPLES * 2;

/// G.711 variants negotiated with the PBX
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecType {
    /// G.711 μ-law, static payload type 0
    Pcmu,
    /// G.711 A-law, static payload type 8
    Pcma,
}

impl CodecType {
    /// RTP static payload type
    pub const fn payload_type(self) -> u8 {
        match self {
            Self::Pcmu => 0,
            Self::Pcma => 8,
        }
    }

    /// Codec for an RTP payload type, `None` for anything but 0 and 8
    pub const fn from_payload_type(payload_type: u8) -> Option<Self> {
        match payload_type {
            0 => Some(Self::Pcmu),
            8 => Some(Self::Pcma),
            _ => None,
        }
    }

    /// SDP encoding name
    pub const fn name(self) -> &'static str {
        match self {
            Self::Pcmu => "PCMU",
            Self::Pcma => "PCMA",
        }
    }
}

impl fmt::Display for CodecType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CodecType {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PCMU" | "G711U" | "ULAW" => Ok(Self::Pcmu),
            "PCMA" | "G711A" | "ALAW" => Ok(Self::Pcma),
            _ => Err(CodecError::unsupported_codec(s)),
        }
    }
}

/// Interpret little-endian 16-bit PCM bytes as samples.
///
/// `out` is cleared first; an odd trailing byte is rejected.
pub fn pcm_from_le_bytes(bytes: &[u8], out: &mut Vec<i16>) -> Result<()> {
    if bytes.len() % 2 != 0 {
        return Err(CodecError::invalid_format(format!(
            "odd PCM byte count {}",
            bytes.len()
        )));
    }
    out.clear();
    out.extend(
        bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]])),
    );
    Ok(())
}

/// Serialize samples as little-endian 16-bit PCM into `out`.
///
/// Returns the number of bytes written.
pub fn pcm_to_le_bytes(samples: &[i16], out: &mut [u8]) -> Result<usize> {
    let needed = samples.len() * 2;
    if out.len() < needed {
        return Err(CodecError::buffer_too_small(needed, out.len()));
    }
    for (chunk, sample) in out.chunks_exact_mut(2).zip(samples) {
        chunk.copy_from_slice(&sample.to_le_bytes());
    }
    Ok(needed)
}
