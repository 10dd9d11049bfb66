//! Structured SIP requests and responses
//!
//! Dialog headers are typed fields filled in once by the parser. Headers
//! the engine does not interpret (User-Agent, Allow, WWW-Authenticate...)
//! stay in [`Headers::other`] in their original order.

use std::fmt::{self, Write as _};

use bytes::{Bytes, BytesMut};

use crate::SIP_VERSION;
use crate::types::{
    address::NameAddr, cseq::CSeq, method::Method, status::StatusCode, via::Via,
};

/// Header block shared by requests and responses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Headers {
    /// Via values, topmost first
    pub via: Vec<Via>,
    pub from: NameAddr,
    pub to: NameAddr,
    pub call_id: String,
    pub cseq: CSeq,
    pub contact: Option<NameAddr>,
    pub expires: Option<u32>,
    pub content_type: Option<String>,
    pub other: Vec<(String, String)>,
}

impl Headers {
    pub fn new(via: Vec<Via>, from: NameAddr, to: NameAddr, call_id: String, cseq: CSeq) -> Self {
        Headers {
            via,
            from,
            to,
            call_id,
            cseq,
            contact: None,
            expires: None,
            content_type: None,
            other: Vec::new(),
        }
    }

    pub fn top_via(&self) -> Option<&Via> {
        self.via.first()
    }

    /// First uninterpreted header called `name` (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&str> {
        self.other
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.other.push((name.into(), value.into()));
    }

    fn write_to(&self, out: &mut impl fmt::Write, max_forwards: Option<u32>, body: &str) -> fmt::Result {
        for via in &self.via {
            write!(out, "Via: {via}\r\n")?;
        }
        if let Some(hops) = max_forwards {
            write!(out, "Max-Forwards: {hops}\r\n")?;
        }
        write!(out, "From: {}\r\n", self.from)?;
        write!(out, "To: {}\r\n", self.to)?;
        write!(out, "Call-ID: {}\r\n", self.call_id)?;
        write!(out, "CSeq: {}\r\n", self.cseq)?;
        if let Some(contact) = &self.contact {
            write!(out, "Contact: {contact}\r\n")?;
        }
        if let Some(expires) = self.expires {
            write!(out, "Expires: {expires}\r\n")?;
        }
        for (name, value) in &self.other {
            write!(out, "{name}: {value}\r\n")?;
        }
        if let Some(content_type) = &self.content_type {
            write!(out, "Content-Type: {content_type}\r\n")?;
        }
        write!(out, "Content-Length: {}\r\n\r\n{}", body.len(), body)
    }
}

/// A SIP request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub uri: String,
    pub max_forwards: Option<u32>,
    pub headers: Headers,
    pub body: String,
}

impl Request {
    pub fn call_id(&self) -> &str {
        &self.headers.call_id
    }

    pub fn start_line(&self) -> String {
        format!("{} {} {}", self.method, self.uri, SIP_VERSION)
    }

    /// Wire encoding with a computed Content-Length
    pub fn to_bytes(&self) -> Bytes {
        encode(self)
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\r\n", self.start_line())?;
        self.headers.write_to(f, self.max_forwards, &self.body)
    }
}

/// A SIP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: StatusCode,
    pub reason: String,
    pub headers: Headers,
    pub body: String,
}

impl Response {
    pub fn call_id(&self) -> &str {
        &self.headers.call_id
    }

    pub fn start_line(&self) -> String {
        format!("{} {} {}", SIP_VERSION, self.status.as_u16(), self.reason)
    }

    pub fn to_bytes(&self) -> Bytes {
        encode(self)
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\r\n", self.start_line())?;
        self.headers.write_to(f, None, &self.body)
    }
}

fn encode(message: &impl fmt::Display) -> Bytes {
    let mut buf = BytesMut::with_capacity(1024);
    // Writing into BytesMut cannot fail
    let _ = write!(buf, "{message}");
    buf.freeze()
}

/// Either kind of SIP message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Request(Request),
    Response(Response),
}

impl Message {
    pub fn headers(&self) -> &Headers {
        match self {
            Message::Request(r) => &r.headers,
            Message::Response(r) => &r.headers,
        }
    }

    pub fn body(&self) -> &str {
        match self {
            Message::Request(r) => &r.body,
            Message::Response(r) => &r.body,
        }
    }

    pub fn start_line(&self) -> String {
        match self {
            Message::Request(r) => r.start_line(),
            Message::Response(r) => r.start_line(),
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        match self {
            Message::Request(r) => r.to_bytes(),
            Message::Response(r) => r.to_bytes(),
        }
    }
}

impl From<Request> for Message {
    fn from(r: Request) -> Self {
        Message::Request(r)
    }
}

impl From<Response> for Message {
    fn from(r: Response) -> Self {
        Message::Response(r)
    }
}
