//! Per-call RTP sender state

use rand::Rng;
use std::net::SocketAddr;

use crate::packet::RtpHeader;
use crate::{RtpSequenceNumber, RtpSsrc, RtpTimestamp};

/// Sender half of one call's RTP session.
///
/// SSRC, initial sequence number and initial timestamp are random (RFC 3550
/// section 5.1). The SSRC never changes for the lifetime of the session.
#[derive(Debug, Clone)]
pub struct RtpSession {
    ssrc: RtpSsrc,
    sequence_number: RtpSequenceNumber,
    timestamp: RtpTimestamp,
    payload_type: u8,
    samples_per_packet: u32,
    remote: SocketAddr,
}

impl RtpSession {
    pub fn new(payload_type: u8, samples_per_packet: u32, remote: SocketAddr) -> Self {
        let mut rng = rand::thread_rng();
        Self::with_initial_state(
            rng.r#gen(),
            rng.r#gen(),
            rng.r#gen(),
            payload_type,
            samples_per_packet,
            remote,
        )
    }

    /// Deterministic constructor
    pub fn with_initial_state(
        ssrc: RtpSsrc,
        sequence_number: RtpSequenceNumber,
        timestamp: RtpTimestamp,
        payload_type: u8,
        samples_per_packet: u32,
        remote: SocketAddr,
    ) -> Self {
        Self {
            ssrc,
            sequence_number,
            timestamp,
            payload_type,
            samples_per_packet,
            remote,
        }
    }

    pub fn ssrc(&self) -> RtpSsrc {
        self.ssrc
    }

    pub fn payload_type(&self) -> u8 {
        self.payload_type
    }

    pub fn remote(&self) -> SocketAddr {
        self.remote
    }

    /// Header for the next outgoing packet; advances sequence and timestamp
    pub fn next_header(&mut self) -> RtpHeader {
        let header = RtpHeader::new(
            self.payload_type,
            self.sequence_number,
            self.timestamp,
            self.ssrc,
        );
        self.sequence_number = self.sequence_number.wrapping_add(1);
        self.timestamp = self.timestamp.wrapping_add(self.samples_per_packet);
        header
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote() -> SocketAddr {
        "127.0.0.1:20000".parse().unwrap()
    }

    #[test]
    fn test_headers_advance_and_wrap() {
        let mut session = RtpSession::with_initial_state(7, u16::MAX, u32::MAX - 100, 0, 160, remote());
        let first = session.next_header();
        let second = session.next_header();
        assert_eq!(first.sequence_number, u16::MAX);
        assert_eq!(second.sequence_number, 0);
        assert_eq!(first.timestamp, u32::MAX - 100);
        assert_eq!(second.timestamp, 59);
        assert_eq!(first.ssrc, 7);
        assert_eq!(second.ssrc, 7);
    }

    #[test]
    fn test_ssrc_fixed_for_session() {
        let mut session = RtpSession::new(8, 160, remote());
        let ssrc = session.ssrc();
        for _ in 0..10 {
            let header = session.next_header();
            assert_eq!(header.ssrc, ssrc);
            assert_eq!(header.payload_type, 8);
        }
    }
}
