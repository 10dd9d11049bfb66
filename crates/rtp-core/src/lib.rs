//! RTP core library for cellgate
//!
//! Carries one call's audio between the voice hardware and the PBX:
//!
//! - `packet`: RFC 3550 fixed header encode/decode
//! - `session`: per-call SSRC, sequence number and timestamp state
//! - `audio`: the blocking audio path and mixer capability interfaces
//! - `bridge`: the capture and playback loops of one call
//! - `stats`: packet counters and silence diagnostics

mod error;

pub mod audio;
pub mod bridge;
pub mod packet;
pub mod session;
pub mod stats;

pub use audio::{AudioControl, AudioPath};
pub use bridge::{BridgeConfig, BridgeEvent, MediaBridge, MediaDirection};
pub use error::Error;
pub use packet::{RtpHeader, RtpPacket};
pub use session::RtpSession;
pub use stats::{BridgeStats, SilenceMonitor};

/// The default maximum size for RTP packets in bytes
pub const DEFAULT_MAX_PACKET_SIZE: usize = 1500;

/// Typedef for RTP timestamp values
pub type RtpTimestamp = u32;

/// Typedef for RTP sequence numbers
pub type RtpSequenceNumber = u16;

/// Typedef for RTP synchronization source identifier
pub type RtpSsrc = u32;

/// Typedef for RTP contributing source identifier
pub type RtpCsrc = u32;

/// Result type for RTP operations
pub type Result<T> = std::result::Result<T, Error>;
