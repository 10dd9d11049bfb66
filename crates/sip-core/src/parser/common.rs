//! Grammar pieces shared by the header parsers

use nom::{
    IResult,
    branch::alt,
    bytes::complete::take_while1,
    character::complete::{char, space0},
    combinator::{map, opt},
    error::{Error as NomError, ErrorKind},
    multi::many0,
    sequence::{delimited, pair, preceded},
};

use crate::types::param::Param;

// Type alias for parser result
pub type ParseResult<'a, O> = IResult<&'a str, O>;

/// RFC 3261 `token` characters
pub fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '!' | '%' | '*' | '_' | '+' | '`' | '\'' | '~')
}

pub fn token(input: &str) -> ParseResult<&str> {
    take_while1(is_token_char)(input)
}

/// quoted-string; returns the content with `\` escapes resolved
pub fn quoted_string(input: &str) -> ParseResult<String> {
    let (rest, _) = char('"')(input)?;
    let mut out = String::new();
    let mut chars = rest.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok((&rest[i + 1..], out)),
            '\\' => match chars.next() {
                Some((_, escaped)) => out.push(escaped),
                None => break,
            },
            other => out.push(other),
        }
    }
    Err(nom::Err::Error(NomError::new(input, ErrorKind::Char)))
}

// Quoted values keep their quotes so they serialize back unchanged
fn param_value(input: &str) -> ParseResult<String> {
    alt((
        map(quoted_string, |s| format!("\"{s}\"")),
        map(
            take_while1(|c: char| !matches!(c, ';' | ',' | '>' | '?') && !c.is_whitespace()),
            str::to_string,
        ),
    ))(input)
}

/// `name[=value]`
pub fn param(input: &str) -> ParseResult<Param> {
    map(
        pair(
            token,
            opt(preceded(delimited(space0, char('='), space0), param_value)),
        ),
        |(name, value)| Param::new(name, value),
    )(input)
}

/// `*( ;param )`
pub fn params(input: &str) -> ParseResult<Vec<Param>> {
    many0(preceded(delimited(space0, char(';'), space0), param))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoted_string() {
        let (rest, s) = quoted_string(r#""Bob \"B\" Smith" <sip:b@c>"#).unwrap();
        assert_eq!(s, r#"Bob "B" Smith"#);
        assert_eq!(rest, " <sip:b@c>");
        assert!(quoted_string(r#""unterminated"#).is_err());
        assert_eq!(quoted_string(r#""""#).unwrap().1, "");
    }

    #[test]
    fn test_params() {
        let (rest, ps) = params(";tag=abc ; lr;expires=60, next").unwrap();
        assert_eq!(rest, ", next");
        assert_eq!(ps.len(), 3);
        assert_eq!(ps[0], Param::tag("abc"));
        assert_eq!(ps[1], Param::new("lr", None));
        assert_eq!(ps[2].value.as_deref(), Some("60"));
    }
}
