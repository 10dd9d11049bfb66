//! # SDP offer/answer for G.711 audio
//!
//! A deliberately small subset of RFC 4566: the gateway only needs the
//! remote RTP endpoint and the payload types of the first audio stream.
//!
//! ```text
//! v=0
//! o=cellgate 2890844526 2890844526 IN IP4 10.0.0.2
//! s=cellgate
//! c=IN IP4 10.0.0.2
//! t=0 0
//! m=audio 10000 RTP/AVP 0 8 101
//! a=rtpmap:0 PCMU/8000
//! a=rtpmap:8 PCMA/8000
//! a=rtpmap:101 telephone-event/8000
//! a=fmtp:101 0-16
//! a=ptime:20
//! a=sendrecv
//! ```

use std::fmt::Write as _;
use std::net::{IpAddr, SocketAddr};

use rand::Rng;

use crate::error::{Error, Result};

/// Static payload type of G.711 μ-law
pub const PCMU: u8 = 0;
/// Static payload type of G.711 A-law
pub const PCMA: u8 = 8;
/// Dynamic payload type we use for RFC 4733 DTMF events
pub const TELEPHONE_EVENT: u8 = 101;

/// Everything the gateway reads from a remote session description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdpInfo {
    pub connection_address: String,
    pub audio_port: u16,
    /// Payload types in offer order
    pub codecs: Vec<u8>,
    /// First listed payload type
    pub primary_codec: u8,
}

impl SdpInfo {
    /// Remote RTP endpoint, when the connection address is a literal IP
    pub fn rtp_endpoint(&self) -> Option<SocketAddr> {
        self.connection_address
            .parse::<IpAddr>()
            .ok()
            .map(|ip| SocketAddr::new(ip, self.audio_port))
    }

    /// First offered payload type that is also in `supported`
    pub fn choose_codec(&self, supported: &[u8]) -> Option<u8> {
        self.codecs.iter().copied().find(|pt| supported.contains(pt))
    }
}

fn encoding_name(payload_type: u8) -> Option<&'static str> {
    match payload_type {
        PCMU => Some("PCMU/8000"),
        PCMA => Some("PCMA/8000"),
        TELEPHONE_EVENT => Some("telephone-event/8000"),
        _ => None,
    }
}

// c=IN IP4 <addr>
fn parse_connection(value: &str) -> Option<String> {
    let mut parts = value.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some("IN"), Some("IP4" | "IP6"), Some(addr)) => {
            // Multicast TTL suffix is not part of the address
            Some(addr.split('/').next().unwrap_or(addr).to_string())
        }
        _ => None,
    }
}

// m=audio <port> RTP/AVP <fmt>...
fn parse_audio_media(value: &str) -> Option<(u16, Vec<u8>)> {
    let mut parts = value.split_whitespace();
    if parts.next()? != "audio" {
        return None;
    }
    let port = parts.next()?.split('/').next()?.parse::<u16>().ok()?;
    if port == 0 || !parts.next()?.starts_with("RTP/AVP") {
        return None;
    }
    let codecs: Vec<u8> = parts.filter_map(|fmt| fmt.parse().ok()).collect();
    (!codecs.is_empty()).then_some((port, codecs))
}

/// Which part of the body a line belongs to
#[derive(Clone, Copy)]
enum Section {
    Session,
    /// The chosen audio stream
    Audio,
    Other,
}

/// Extract the connection address and first usable audio stream.
///
/// Malformed lines are skipped. A `c=` line in the chosen audio section
/// overrides the session-level one; those of other media sections are
/// ignored. Fails only when no connection address or no usable
/// `m=audio` line was found in the whole body.
pub fn parse(body: &str) -> Result<SdpInfo> {
    let mut session_connection = None;
    let mut audio_connection = None;
    let mut audio: Option<(u16, Vec<u8>)> = None;
    let mut section = Section::Session;

    for line in body.lines().map(str::trim) {
        let Some((kind, value)) = line.split_once('=') else {
            continue;
        };
        match kind {
            "c" => {
                let Some(addr) = parse_connection(value) else {
                    continue;
                };
                match section {
                    Section::Session => session_connection = Some(addr),
                    Section::Audio => audio_connection = Some(addr),
                    Section::Other => {}
                }
            }
            "m" => {
                section = Section::Other;
                if audio.is_none() {
                    audio = parse_audio_media(value);
                    if audio.is_some() {
                        section = Section::Audio;
                    }
                }
            }
            _ => {}
        }
    }

    let connection = audio_connection.or(session_connection);
    let connection_address = connection.ok_or(Error::MissingConnection)?;
    let (audio_port, codecs) = audio.ok_or(Error::MissingAudioMedia)?;
    Ok(SdpInfo {
        connection_address,
        audio_port,
        primary_codec: codecs[0],
        codecs,
    })
}

/// Session description advertising `local_ip:port` with `codecs` in
/// preference order, followed by telephone-event.
///
/// Payload types other than PCMU/PCMA are ignored; an empty list falls
/// back to PCMU then PCMA.
pub fn build(local_ip: &str, port: u16, codecs: &[u8]) -> String {
    let mut payloads: Vec<u8> = Vec::with_capacity(3);
    for &pt in codecs {
        if matches!(pt, PCMU | PCMA) && !payloads.contains(&pt) {
            payloads.push(pt);
        }
    }
    if payloads.is_empty() {
        payloads = vec![PCMU, PCMA];
    }
    payloads.push(TELEPHONE_EVENT);

    let addr_type = if local_ip.contains(':') { "IP6" } else { "IP4" };
    let session_id = rand::thread_rng().gen_range(1_000_000_000u32..u32::MAX);
    let formats = payloads
        .iter()
        .map(u8::to_string)
        .collect::<Vec<_>>()
        .join(" ");

    let mut sdp = String::with_capacity(256);
    // Writing into a String cannot fail
    let _ = write!(
        sdp,
        "v=0\r\n\
         o=cellgate {session_id} {session_id} IN {addr_type} {local_ip}\r\n\
         s=cellgate\r\n\
         c=IN {addr_type} {local_ip}\r\n\
         t=0 0\r\n\
         m=audio {port} RTP/AVP {formats}\r\n"
    );
    for pt in &payloads {
        if let Some(name) = encoding_name(*pt) {
            let _ = write!(sdp, "a=rtpmap:{pt} {name}\r\n");
        }
    }
    sdp.push_str("a=fmtp:101 0-16\r\na=ptime:20\r\na=sendrecv\r\n");
    sdp
}
