//! RFC 3550 RTP header and packet codec
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |V=2|P|X|  CC   |M|     PT      |       sequence number         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                           timestamp                           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |           synchronization source (SSRC) identifier            |
//! +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
//! ```
//!
//! The bridge only emits the fixed 12-byte header. Received CSRC lists,
//! header extensions and padding are accepted and stripped from the payload.

use bitvec::prelude::*;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;

use crate::error::Error;
use crate::{Result, RtpCsrc, RtpSequenceNumber, RtpSsrc, RtpTimestamp};

/// RTP protocol version (always 2 in practice)
pub const RTP_VERSION: u8 = 2;

/// Minimum header size (without CSRC or extensions)
pub const RTP_MIN_HEADER_SIZE: usize = 12;

// Bit positions counted from the most significant bit of each byte
const PADDING_BIT: usize = 2;
const EXTENSION_BIT: usize = 3;
const CC_BITS: std::ops::Range<usize> = 4..8;
const MARKER_BIT: usize = 0;
const PT_BITS: std::ops::Range<usize> = 1..8;

/// RTP header implementation according to RFC 3550
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpHeader {
    /// RTP version (should be 2)
    pub version: u8,

    /// Padding flag
    pub padding: bool,

    /// Extension flag
    pub extension: bool,

    /// Marker bit
    pub marker: bool,

    /// Payload type
    pub payload_type: u8,

    /// Sequence number
    pub sequence_number: RtpSequenceNumber,

    /// Timestamp
    pub timestamp: RtpTimestamp,

    /// Synchronization source identifier
    pub ssrc: RtpSsrc,

    /// Contributing source identifiers
    pub csrc: Vec<RtpCsrc>,
}

impl RtpHeader {
    /// Create a fixed header with no CSRC list or extension
    pub fn new(
        payload_type: u8,
        sequence_number: RtpSequenceNumber,
        timestamp: RtpTimestamp,
        ssrc: RtpSsrc,
    ) -> Self {
        Self {
            version: RTP_VERSION,
            padding: false,
            extension: false,
            marker: false,
            payload_type,
            sequence_number,
            timestamp,
            ssrc,
            csrc: Vec::new(),
        }
    }

    /// Size of the serialized header in bytes
    pub fn size(&self) -> usize {
        RTP_MIN_HEADER_SIZE + self.csrc.len() * 4
    }

    /// Parse an RTP header, consuming any header extension it announces
    pub fn parse(buf: &mut impl Buf) -> Result<Self> {
        if buf.remaining() < RTP_MIN_HEADER_SIZE {
            return Err(Error::BufferTooSmall {
                required: RTP_MIN_HEADER_SIZE,
                available: buf.remaining(),
            });
        }

        let first_byte = buf.get_u8();
        let bits = first_byte.view_bits::<Msb0>();
        let version = bits[0..2].load_be::<u8>();
        if version != RTP_VERSION {
            return Err(Error::InvalidPacket(format!("Invalid RTP version: {}", version)));
        }
        let padding = bits[PADDING_BIT];
        let extension = bits[EXTENSION_BIT];
        let cc = bits[CC_BITS].load_be::<u8>() as usize;

        let second_byte = buf.get_u8();
        let bits = second_byte.view_bits::<Msb0>();
        let marker = bits[MARKER_BIT];
        let payload_type = bits[PT_BITS].load_be::<u8>();

        let sequence_number = buf.get_u16();
        let timestamp = buf.get_u32();
        let ssrc = buf.get_u32();

        if buf.remaining() < cc * 4 {
            return Err(Error::BufferTooSmall {
                required: cc * 4,
                available: buf.remaining(),
            });
        }
        let csrc = (0..cc).map(|_| buf.get_u32()).collect();

        if extension {
            if buf.remaining() < 4 {
                return Err(Error::BufferTooSmall {
                    required: 4,
                    available: buf.remaining(),
                });
            }
            let _profile = buf.get_u16();
            // Length in 32-bit words
            let ext_length = buf.get_u16() as usize * 4;
            if buf.remaining() < ext_length {
                return Err(Error::BufferTooSmall {
                    required: ext_length,
                    available: buf.remaining(),
                });
            }
            buf.advance(ext_length);
        }

        Ok(Self {
            version,
            padding,
            extension,
            marker,
            payload_type,
            sequence_number,
            timestamp,
            ssrc,
            csrc,
        })
    }

    /// Serialize the header to bytes
    pub fn serialize(&self, buf: &mut BytesMut) -> Result<()> {
        if self.extension {
            return Err(Error::InvalidParameter(
                "header extensions are not emitted".to_string(),
            ));
        }
        if self.csrc.len() > 15 {
            return Err(Error::InvalidParameter(format!(
                "CSRC list too long: {}",
                self.csrc.len()
            )));
        }
        buf.reserve(self.size());

        let mut first_byte = 0u8;
        {
            let bits = first_byte.view_bits_mut::<Msb0>();
            bits[0..2].store_be(self.version & 0x03);
            bits.set(PADDING_BIT, self.padding);
            bits[CC_BITS].store_be(self.csrc.len() as u8);
        }
        buf.put_u8(first_byte);

        let mut second_byte = 0u8;
        {
            let bits = second_byte.view_bits_mut::<Msb0>();
            bits.set(MARKER_BIT, self.marker);
            bits[PT_BITS].store_be(self.payload_type & 0x7F);
        }
        buf.put_u8(second_byte);

        buf.put_u16(self.sequence_number);
        buf.put_u32(self.timestamp);
        buf.put_u32(self.ssrc);
        for csrc in &self.csrc {
            buf.put_u32(*csrc);
        }
        Ok(())
    }
}

/// RTP packet implementation
#[derive(Clone, PartialEq, Eq)]
pub struct RtpPacket {
    /// RTP header
    pub header: RtpHeader,

    /// Payload data
    pub payload: Bytes,
}

impl RtpPacket {
    /// Create a new RTP packet
    pub fn new(header: RtpHeader, payload: Bytes) -> Self {
        Self { header, payload }
    }

    /// Get the total size of the packet in bytes
    pub fn size(&self) -> usize {
        self.header.size() + self.payload.len()
    }

    /// Parse an RTP packet from one datagram
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut buf = Bytes::copy_from_slice(data);
        let header = RtpHeader::parse(&mut buf)?;

        let padding_bytes = match (header.padding, buf.last()) {
            (true, Some(&count)) => {
                let count = count as usize;
                if count > buf.len() {
                    return Err(Error::InvalidPacket(format!(
                        "Invalid padding value: {} exceeds remaining bytes: {}",
                        count,
                        buf.len()
                    )));
                }
                count
            }
            _ => 0,
        };
        let payload = buf.slice(0..buf.len() - padding_bytes);

        Ok(Self { header, payload })
    }

    /// Serialize the packet to bytes
    pub fn serialize(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.size());
        self.header.serialize(&mut buf)?;
        buf.put_slice(&self.payload);
        Ok(buf.freeze())
    }

    /// Serialize into a caller-owned buffer, returning the datagram length
    pub fn serialize_into(header: &RtpHeader, payload: &[u8], out: &mut BytesMut) -> Result<usize> {
        out.clear();
        header.serialize(out)?;
        out.put_slice(payload);
        Ok(out.len())
    }
}

impl fmt::Debug for RtpPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RtpPacket")
            .field("header", &self.header)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}
