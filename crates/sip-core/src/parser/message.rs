//! Whole-datagram parsing

use tracing::debug;

use crate::error::{Error, Result};
use crate::message::{Headers, Message, Request, Response};
use crate::parser::address::parse_name_addr;
use crate::parser::start_line::{canonical_name, display_name, header_line, request_line, status_line};
use crate::parser::via::parse_via_list;
use crate::types::{address::NameAddr, cseq::CSeq, status::StatusCode, via::Via};

/// Whitespace-only datagrams are NAT keep-alives (RFC 5626 CRLF pings)
pub fn is_keep_alive(data: &[u8]) -> bool {
    data.iter().all(u8::is_ascii_whitespace)
}

fn split_head_body(text: &str) -> (&str, &str) {
    if let Some(i) = text.find("\r\n\r\n") {
        (&text[..i], &text[i + 4..])
    } else if let Some(i) = text.find("\n\n") {
        (&text[..i], &text[i + 2..])
    } else {
        (text, "")
    }
}

// Joins folded continuation lines onto the header they continue
fn unfold(head: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for raw in head.split('\n') {
        let line = raw.trim_end_matches('\r');
        if line.starts_with([' ', '\t']) {
            if let Some(last) = lines.last_mut() {
                last.push(' ');
                last.push_str(line.trim_start());
                continue;
            }
        }
        if !line.is_empty() {
            lines.push(line.to_string());
        }
    }
    lines
}

#[derive(Default)]
struct HeaderCollector {
    via: Vec<Via>,
    from: Option<NameAddr>,
    to: Option<NameAddr>,
    call_id: Option<String>,
    cseq: Option<CSeq>,
    contact: Option<NameAddr>,
    expires: Option<u32>,
    content_type: Option<String>,
    content_length: Option<usize>,
    max_forwards: Option<u32>,
    other: Vec<(String, String)>,
}

impl HeaderCollector {
    fn add(&mut self, name: &str, value: &str) -> Result<()> {
        match canonical_name(name).as_str() {
            "via" => self.via.extend(parse_via_list(value)?),
            "from" => self.from = Some(parse_name_addr(value)?),
            "to" => self.to = Some(parse_name_addr(value)?),
            "call-id" if !value.is_empty() => self.call_id = Some(value.to_string()),
            "cseq" => self.cseq = Some(value.parse()?),
            "contact" => {
                if self.contact.is_none() && value != "*" {
                    match parse_name_addr(value) {
                        Ok(contact) => self.contact = Some(contact),
                        Err(e) => debug!("ignoring unparsable Contact {:?}: {}", value, e),
                    }
                }
            }
            "expires" => match value.parse() {
                Ok(expires) => self.expires = Some(expires),
                Err(_) => debug!("ignoring unparsable Expires {:?}", value),
            },
            "content-type" => self.content_type = Some(value.to_string()),
            "content-length" => {
                let len = value
                    .parse()
                    .map_err(|_| Error::invalid_header("Content-Length", value))?;
                self.content_length = Some(len);
            }
            "max-forwards" => self.max_forwards = value.parse().ok(),
            _ => self
                .other
                .push((display_name(name).to_string(), value.to_string())),
        }
        Ok(())
    }

    fn finish(self) -> Result<(Headers, Option<usize>, Option<u32>)> {
        if self.via.is_empty() {
            return Err(Error::MissingHeader("Via"));
        }
        let headers = Headers {
            via: self.via,
            from: self.from.ok_or(Error::MissingHeader("From"))?,
            to: self.to.ok_or(Error::MissingHeader("To"))?,
            call_id: self.call_id.ok_or(Error::MissingHeader("Call-ID"))?,
            cseq: self.cseq.ok_or(Error::MissingHeader("CSeq"))?,
            contact: self.contact,
            expires: self.expires,
            content_type: self.content_type,
            other: self.other,
        };
        Ok((headers, self.content_length, self.max_forwards))
    }
}

/// Parse one datagram into a request or response.
///
/// Fails on a malformed start line or header, or when any of Via, From,
/// To, Call-ID and CSeq is missing.
pub fn parse_message(data: &[u8]) -> Result<Message> {
    let text = std::str::from_utf8(data)?.trim_start_matches(['\r', '\n']);
    let (head, body) = split_head_body(text);
    let mut lines = unfold(head).into_iter();
    let start = lines
        .next()
        .ok_or_else(|| Error::ParseError("empty message".to_string()))?;

    let mut collector = HeaderCollector::default();
    for line in lines {
        let (_, (name, value)) = header_line(&line)
            .map_err(|_| Error::ParseError(format!("malformed header line: {line}")))?;
        collector.add(name, value)?;
    }
    let (headers, content_length, max_forwards) = collector.finish()?;

    // Content-Length wins over trailing datagram bytes
    let body = match content_length {
        Some(len) => body.get(..len).unwrap_or(body),
        None => body,
    }
    .to_string();

    if start.starts_with("SIP/") {
        let (_, (code, reason)) = status_line(&start)
            .map_err(|_| Error::ParseError(format!("malformed status line: {start}")))?;
        let status = StatusCode::from_u16(code)?;
        let reason = if reason.is_empty() {
            status.reason_phrase().to_string()
        } else {
            reason.to_string()
        };
        Ok(Message::Response(Response {
            status,
            reason,
            headers,
            body,
        }))
    } else {
        let (_, (method, uri)) = request_line(&start)
            .map_err(|_| Error::ParseError(format!("malformed request line: {start}")))?;
        Ok(Message::Request(Request {
            method,
            uri: uri.to_string(),
            max_forwards,
            headers,
            body,
        }))
    }
}
