use crate::message::{Headers, Request, Response};
use crate::types::{address::NameAddr, status::StatusCode};

/// Builder for responses to a received request
///
/// Via, From, To, Call-ID and CSeq are copied from the request as
/// RFC 3261 section 8.2.6 requires.
#[derive(Debug, Clone)]
pub struct ResponseBuilder {
    status: StatusCode,
    reason: Option<String>,
    headers: Headers,
    body: String,
}

impl ResponseBuilder {
    pub fn from_request(request: &Request, status: StatusCode) -> Self {
        let src = &request.headers;
        ResponseBuilder {
            status,
            reason: None,
            headers: Headers::new(
                src.via.clone(),
                src.from.clone(),
                src.to.clone(),
                src.call_id.clone(),
                src.cseq.clone(),
            ),
            body: String::new(),
        }
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Set the To tag unless the request already carried one
    pub fn to_tag(mut self, tag: &str) -> Self {
        if self.headers.to.tag().is_none() {
            self.headers.to.set_tag(tag);
        }
        self
    }

    /// Replace the To header, e.g. with a dialog's cached tagged value
    pub fn to(mut self, to: NameAddr) -> Self {
        self.headers.to = to;
        self
    }

    pub fn contact(mut self, contact: NameAddr) -> Self {
        self.headers.contact = Some(contact);
        self
    }

    pub fn expires(mut self, seconds: u32) -> Self {
        self.headers.expires = Some(seconds);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(name, value);
        self
    }

    pub fn server(self, agent: &str) -> Self {
        self.header("Server", agent)
    }

    pub fn sdp(mut self, body: impl Into<String>) -> Self {
        self.headers.content_type = Some("application/sdp".to_string());
        self.body = body.into();
        self
    }

    pub fn build(self) -> Response {
        Response {
            reason: self
                .reason
                .unwrap_or_else(|| self.status.reason_phrase().to_string()),
            status: self.status,
            headers: self.headers,
            body: self.body,
        }
    }
}
