//! name-addr / addr-spec with header parameters (From, To, Contact)

use nom::{
    branch::alt,
    bytes::complete::{take_till, take_till1, take_while1},
    character::complete::{char, space0},
    combinator::map,
    sequence::{delimited, terminated},
};

use crate::error::{Error, Result};
use crate::parser::common::{ParseResult, params, quoted_string};
use crate::types::address::NameAddr;

fn display_name(input: &str) -> ParseResult<Option<String>> {
    alt((
        map(terminated(quoted_string, space0), Some),
        map(take_till(|c| c == '<'), |d: &str| {
            let d = d.trim();
            (!d.is_empty()).then(|| d.to_string())
        }),
    ))(input)
}

// [display-name] LAQUOT addr-spec RAQUOT
fn bracketed(input: &str) -> ParseResult<(Option<String>, &str)> {
    let (input, display) = display_name(input)?;
    let (input, uri) = delimited(char('<'), take_till1(|c| c == '>'), char('>'))(input)?;
    Ok((input, (display, uri)))
}

// Without brackets every `;param` belongs to the header, not the URI
fn addr_spec(input: &str) -> ParseResult<(Option<String>, &str)> {
    map(
        take_while1(|c: char| !matches!(c, ';' | ',' | '<' | '>' | '"') && !c.is_whitespace()),
        |uri| (None, uri),
    )(input)
}

pub fn name_addr(input: &str) -> ParseResult<NameAddr> {
    let (input, _) = space0(input)?;
    let (input, (display_name, uri)) = alt((bracketed, addr_spec))(input)?;
    let (input, params) = params(input)?;
    Ok((
        input,
        NameAddr {
            display_name,
            uri: uri.trim().to_string(),
            params,
        },
    ))
}

/// Parse an address header value. Only the first of a comma-separated
/// list is returned.
pub fn parse_name_addr(value: &str) -> Result<NameAddr> {
    match name_addr(value) {
        Ok((rest, addr)) => {
            let rest = rest.trim_start();
            if rest.is_empty() || rest.starts_with(',') {
                Ok(addr)
            } else {
                Err(Error::invalid_header("address", value))
            }
        }
        Err(_) => Err(Error::invalid_header("address", value)),
    }
}
