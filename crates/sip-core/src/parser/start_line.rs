//! Start lines and the `name: value` header line

use std::str::FromStr;

use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_while1},
    character::complete::{char, digit1, space0, space1},
    combinator::{map_res, rest, verify},
    sequence::{preceded, tuple},
};

use crate::parser::common::{ParseResult, token};
use crate::types::method::Method;

fn sip_version(input: &str) -> ParseResult<&str> {
    tag_no_case("SIP/2.0")(input)
}

/// `Method SP Request-URI SP SIP-Version`
pub fn request_line(input: &str) -> ParseResult<(Method, &str)> {
    let (input, method) = map_res(token, Method::from_str)(input)?;
    let (input, _) = space1(input)?;
    let (input, uri) = take_while1(|c: char| !c.is_whitespace())(input)?;
    let (input, _) = space1(input)?;
    let (input, _) = sip_version(input)?;
    let (input, _) = space0(input)?;
    Ok((input, (method, uri)))
}

/// `SIP-Version SP Status-Code [SP Reason-Phrase]`
pub fn status_line(input: &str) -> ParseResult<(u16, &str)> {
    let (input, _) = sip_version(input)?;
    let (input, _) = space1(input)?;
    let (input, code) = map_res(verify(digit1, |d: &str| d.len() == 3), str::parse::<u16>)(input)?;
    let (input, reason) = alt((preceded(space1, rest), rest))(input)?;
    Ok((input, (code, reason.trim())))
}

/// `header-name HCOLON header-value`
pub fn header_line(input: &str) -> ParseResult<(&str, &str)> {
    let (input, name) = token(input)?;
    let (input, _) = tuple((space0, char(':'), space0))(input)?;
    let (input, value) = rest(input)?;
    Ok((input, (name, value.trim())))
}

/// Lowercase full header name; compact forms are expanded
pub fn canonical_name(name: &str) -> String {
    let lower = name.to_ascii_lowercase();
    let full = match lower.as_str() {
        "v" => "via",
        "f" => "from",
        "t" => "to",
        "i" => "call-id",
        "m" => "contact",
        "l" => "content-length",
        "c" => "content-type",
        "k" => "supported",
        "s" => "subject",
        "e" => "content-encoding",
        _ => return lower,
    };
    full.to_string()
}

/// Display form for headers kept verbatim; compact names get their long form
pub fn display_name(name: &str) -> &str {
    match name {
        "k" | "K" => "Supported",
        "s" | "S" => "Subject",
        "e" | "E" => "Content-Encoding",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_line() {
        let (_, (method, uri)) = request_line("INVITE sip:1000@pbx.local SIP/2.0").unwrap();
        assert_eq!(method, Method::Invite);
        assert_eq!(uri, "sip:1000@pbx.local");
        assert!(request_line("INVITE sip:1000@pbx.local HTTP/1.1").is_err());
    }

    #[test]
    fn test_status_line() {
        assert_eq!(status_line("SIP/2.0 180 Ringing").unwrap().1, (180, "Ringing"));
        assert_eq!(status_line("SIP/2.0 486 Busy Here").unwrap().1, (486, "Busy Here"));
        assert_eq!(status_line("SIP/2.0 200").unwrap().1, (200, ""));
        assert!(status_line("SIP/2.0 20 OK").is_err());
    }

    #[test]
    fn test_header_line_and_names() {
        assert_eq!(header_line("Call-ID :  abc@host ").unwrap().1, ("Call-ID", "abc@host"));
        assert_eq!(canonical_name("i"), "call-id");
        assert_eq!(canonical_name("CSeq"), "cseq");
        assert_eq!(display_name("k"), "Supported");
        assert!(header_line("no colon here").is_err());
    }
}
