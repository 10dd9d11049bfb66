//! G.711 (PCMU/PCMA) codec
//!
//! Stateless sample-by-sample companding. Every PCM sample maps to exactly
//! one code byte, so a 160-sample frame encodes to a 160-byte payload.

pub mod reference;
pub mod tables;

#[cfg(test)]
mod tests;

pub use reference::{alaw_compress, alaw_expand, ulaw_compress, ulaw_expand};
pub use tables::{alaw_decode, alaw_encode, init_tables, ulaw_decode, ulaw_encode};

use crate::error::{CodecError, Result};
use crate::types::CodecType;

/// G.711 encoder/decoder for one companding law
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct G711Codec {
    codec_type: CodecType,
}

impl G711Codec {
    /// Codec for the given law
    pub const fn new(codec_type: CodecType) -> Self {
        Self { codec_type }
    }

    /// Codec matching an RTP payload type (0 or 8)
    pub fn for_payload_type(payload_type: u8) -> Result<Self> {
        CodecType::from_payload_type(payload_type)
            .map(Self::new)
            .ok_or(CodecError::UnsupportedPayloadType { payload_type })
    }

    /// Companding law in use
    pub const fn codec_type(&self) -> CodecType {
        self.codec_type
    }

    /// RTP payload type carried by this codec's packets
    pub const fn payload_type(&self) -> u8 {
        self.codec_type.payload_type()
    }

    /// Encode samples into `output`, returning the number of bytes written
    pub fn encode_to_buffer(&self, samples: &[i16], output: &mut [u8]) -> Result<usize> {
        if output.len() < samples.len() {
            return Err(CodecError::buffer_too_small(samples.len(), output.len()));
        }
        let encode = match self.codec_type {
            CodecType::Pcmu => ulaw_encode,
            CodecType::Pcma => alaw_encode,
        };
        for (slot, &sample) in output.iter_mut().zip(samples) {
            *slot = encode(sample);
        }
        Ok(samples.len())
    }

    /// Decode codes into `output`, returning the number of samples written
    pub fn decode_to_buffer(&self, data: &[u8], output: &mut [i16]) -> Result<usize> {
        if output.len() < data.len() {
            return Err(CodecError::buffer_too_small(data.len(), output.len()));
        }
        let decode = match self.codec_type {
            CodecType::Pcmu => ulaw_decode,
            CodecType::Pcma => alaw_decode,
        };
        for (slot, &code) in output.iter_mut().zip(data) {
            *slot = decode(code);
        }
        Ok(data.len())
    }

    /// Encode samples into a new buffer
    pub fn encode(&self, samples: &[i16]) -> Result<Vec<u8>> {
        let mut out = vec![0u8; samples.len()];
        self.encode_to_buffer(samples, &mut out)?;
        Ok(out)
    }

    /// Decode codes into a new buffer
    pub fn decode(&self, data: &[u8]) -> Result<Vec<i16>> {
        let mut out = vec![0i16; data.len()];
        self.decode_to_buffer(data, &mut out)?;
        Ok(out)
    }
}
