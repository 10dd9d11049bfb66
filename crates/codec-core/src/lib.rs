//! # Codec-Core: G.711 audio for the cellgate media path
//!
//! The gateway carries narrowband telephone audio only: 8 kHz mono 16-bit
//! linear PCM on the hardware side and G.711 (PCMU/PCMA) on the RTP side.
//! This crate provides
//!
//! - **G.711 companding**: bit-exact ITU-T reference algorithms plus
//!   pre-computed lookup tables used on the hot path
//! - **Codec selection** by RTP payload type or SDP encoding name
//! - **PCM framing helpers** for the 20 ms little-endian frames the audio
//!   adapters exchange
//!
//! ## Usage
//!
//! ```rust
//! use codec_core::{CodecType, G711Codec, FRAME_SAMPLES};
//!
//! let codec = G711Codec::new(CodecType::Pcmu);
//! let samples = vec![0i16; FRAME_SAMPLES];
//! let encoded = codec.encode(&samples)?;
//! assert_eq!(encoded.len(), FRAME_SAMPLES);
//!
//! let decoded = codec.decode(&encoded)?;
//! assert_eq!(decoded.len(), FRAME_SAMPLES);
//! # Ok::<(), codec_core::CodecError>(())
//! ```

#![warn(missing_docs)]

pub mod codecs;
pub mod error;
pub mod types;

pub use codecs::g711::G711Codec;
pub use error::{CodecError, Result};
pub use types::{
    CodecType, FRAME_BYTES, FRAME_DURATION_MS, FRAME_SAMPLES, SAMPLE_RATE, pcm_from_le_bytes,
    pcm_to_le_bytes,
};

/// Version information for the codec library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Force initialization of the G.711 lookup tables.
///
/// Tables are built lazily on first use; calling this at startup moves the
/// cost out of the first media frame. Safe to call more than once.
pub fn init() {
    codecs::g711::init_tables();
    tracing::debug!("codec-core v{} lookup tables ready", VERSION);
}
