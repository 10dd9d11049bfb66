//! # sip-core: SIP messages for the cellgate trunk
//!
//! The structured message model used by the signaling engine. Every inbound
//! datagram is parsed exactly once into a [`Request`] or [`Response`] whose
//! dialog headers (Via, From, To, Call-ID, CSeq, Contact) are typed fields;
//! everything else is kept as ordered name/value pairs.
//!
//! The crate also holds the pieces of SIP that are pure functions:
//!
//! - [`parser`]: datagram → [`Message`], built on `nom`
//! - [`builder`]: fluent request/response construction
//! - [`types::auth`]: Digest challenge parsing and MD5 response computation
//! - [`sdp`]: the offer/answer subset used for G.711 audio
//! - [`utils`]: tag, branch and Call-ID generation
//!
//! ```rust
//! use sip_core::{parse_message, Message, Method};
//!
//! let raw = "OPTIONS sip:gw@10.0.0.2 SIP/2.0\r\n\
//!            Via: SIP/2.0/UDP 10.0.0.1:5060;branch=z9hG4bK1\r\n\
//!            From: <sip:pbx@10.0.0.1>;tag=a1\r\n\
//!            To: <sip:gw@10.0.0.2>\r\n\
//!            Call-ID: abc@10.0.0.1\r\n\
//!            CSeq: 7 OPTIONS\r\n\
//!            Content-Length: 0\r\n\r\n";
//!
//! match parse_message(raw.as_bytes())? {
//!     Message::Request(req) => {
//!         assert_eq!(req.method, Method::Options);
//!         assert_eq!(req.headers.cseq.seq, 7);
//!     }
//!     Message::Response(_) => unreachable!(),
//! }
//! # Ok::<(), sip_core::Error>(())
//! ```

pub mod builder;
pub mod error;
pub mod message;
pub mod parser;
pub mod sdp;
pub mod types;
pub mod utils;

pub use builder::{RequestBuilder, ResponseBuilder};
pub use error::{Error, Result};
pub use message::{Headers, Message, Request, Response};
pub use parser::{is_keep_alive, parse_message};
pub use types::{
    address::NameAddr,
    auth::{Authorization, Credentials, DigestChallenge},
    cseq::CSeq,
    method::Method,
    param::Param,
    status::StatusCode,
    via::Via,
};

/// Protocol version on every start line
pub const SIP_VERSION: &str = "SIP/2.0";

/// Methods this user agent implements, as advertised in `Allow`
pub const ALLOWED_METHODS: &str = "INVITE, ACK, BYE, CANCEL, OPTIONS";
