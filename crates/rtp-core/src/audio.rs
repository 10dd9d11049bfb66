//! Capability interfaces onto the voice hardware
//!
//! The bridge only needs blocking frame I/O. Routing the modem audio to
//! these endpoints is platform work done by an adapter implementing
//! [`AudioControl`].

use std::io;

/// Blocking PCM source and sink for one call.
///
/// Frames are 16-bit little-endian mono samples at 8 kHz. Both calls block
/// for at most about one frame time.
pub trait AudioPath: Send + Sync {
    /// Fill `buf` with captured PCM, returning the number of bytes read.
    /// `Ok(0)` means no audio was available this frame time.
    fn read(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Play one buffer of PCM
    fn write(&self, buf: &[u8]) -> io::Result<()>;
}

/// Mixer control for the voice path (enable/disable/mute)
pub trait AudioControl: Send + Sync {
    fn enable(&self) -> io::Result<()>;

    fn disable(&self) -> io::Result<()>;

    fn set_muted(&self, muted: bool) -> io::Result<()>;
}
