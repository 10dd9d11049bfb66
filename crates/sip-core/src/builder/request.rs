use crate::error::{Error, Result};
use crate::message::{Headers, Request};
use crate::types::{address::NameAddr, cseq::CSeq, method::Method, via::Via};

/// Default Max-Forwards on every request we originate
pub const DEFAULT_MAX_FORWARDS: u32 = 70;

/// Builder for outbound requests
///
/// ```rust
/// use sip_core::{Method, NameAddr, RequestBuilder, Via};
///
/// let req = RequestBuilder::new(Method::Options, "sip:pbx.local")
///     .via(Via::udp("10.0.0.2", 5060, "z9hG4bK1"))
///     .from(NameAddr::new("sip:gw@10.0.0.2").with_tag("a1"))
///     .to(NameAddr::new("sip:pbx.local"))
///     .call_id("c1@10.0.0.2")
///     .cseq(1)
///     .build()
///     .unwrap();
/// assert_eq!(req.headers.cseq.method, Method::Options);
/// ```
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    method: Method,
    uri: String,
    via: Vec<Via>,
    from: Option<NameAddr>,
    to: Option<NameAddr>,
    call_id: Option<String>,
    cseq: Option<CSeq>,
    contact: Option<NameAddr>,
    expires: Option<u32>,
    other: Vec<(String, String)>,
    body: Option<(String, String)>,
}

impl RequestBuilder {
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        RequestBuilder {
            method,
            uri: uri.into(),
            via: Vec::new(),
            from: None,
            to: None,
            call_id: None,
            cseq: None,
            contact: None,
            expires: None,
            other: Vec::new(),
            body: None,
        }
    }

    pub fn via(mut self, via: Via) -> Self {
        self.via.push(via);
        self
    }

    pub fn from(mut self, from: NameAddr) -> Self {
        self.from = Some(from);
        self
    }

    pub fn to(mut self, to: NameAddr) -> Self {
        self.to = Some(to);
        self
    }

    pub fn call_id(mut self, call_id: impl Into<String>) -> Self {
        self.call_id = Some(call_id.into());
        self
    }

    /// CSeq with the request's own method
    pub fn cseq(mut self, seq: u32) -> Self {
        self.cseq = Some(CSeq::new(seq, self.method.clone()));
        self
    }

    pub fn contact(mut self, contact: NameAddr) -> Self {
        self.contact = Some(contact);
        self
    }

    pub fn expires(mut self, seconds: u32) -> Self {
        self.expires = Some(seconds);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.other.push((name.into(), value.into()));
        self
    }

    pub fn user_agent(self, agent: &str) -> Self {
        self.header("User-Agent", agent)
    }

    pub fn sdp(mut self, body: impl Into<String>) -> Self {
        self.body = Some(("application/sdp".to_string(), body.into()));
        self
    }

    pub fn build(self) -> Result<Request> {
        if self.via.is_empty() {
            return Err(Error::MissingHeader("Via"));
        }
        let mut headers = Headers::new(
            self.via,
            self.from.ok_or(Error::MissingHeader("From"))?,
            self.to.ok_or(Error::MissingHeader("To"))?,
            self.call_id.ok_or(Error::MissingHeader("Call-ID"))?,
            self.cseq.ok_or(Error::MissingHeader("CSeq"))?,
        );
        headers.contact = self.contact;
        headers.expires = self.expires;
        headers.other = self.other;
        let body = match self.body {
            Some((content_type, body)) => {
                headers.content_type = Some(content_type);
                body
            }
            None => String::new(),
        };
        Ok(Request {
            method: self.method,
            uri: self.uri,
            max_forwards: Some(DEFAULT_MAX_FORWARDS),
            headers,
            body,
        })
    }
}
