//! Via header values, `SIP/2.0/transport sent-by *(;param)`

use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_till1, take_while1},
    character::complete::{char, digit1, space0, space1},
    combinator::{all_consuming, map_res, opt, recognize},
    multi::separated_list1,
    sequence::{delimited, preceded, tuple},
};

use crate::error::{Error, Result};
use crate::parser::common::{ParseResult, params, token};
use crate::types::via::Via;

fn sent_protocol(input: &str) -> ParseResult<&str> {
    let (input, _) = tuple((
        tag_no_case("SIP"),
        space0,
        char('/'),
        space0,
        tag("2.0"),
        space0,
        char('/'),
        space0,
    ))(input)?;
    token(input)
}

fn host(input: &str) -> ParseResult<&str> {
    alt((
        recognize(delimited(char('['), take_till1(|c| c == ']'), char(']'))),
        take_while1(|c: char| c.is_ascii_alphanumeric() || c == '.' || c == '-'),
    ))(input)
}

pub fn via(input: &str) -> ParseResult<Via> {
    let (input, transport) = sent_protocol(input)?;
    let (input, _) = space1(input)?;
    let (input, host) = host(input)?;
    let (input, port) = opt(preceded(char(':'), map_res(digit1, str::parse::<u16>)))(input)?;
    let (input, params) = params(input)?;
    Ok((
        input,
        Via {
            transport: transport.to_ascii_uppercase(),
            host: host.to_string(),
            port,
            params,
        },
    ))
}

/// All Via values of one header line, in order
pub fn parse_via_list(value: &str) -> Result<Vec<Via>> {
    let list = separated_list1(delimited(space0, char(','), space0), via);
    match all_consuming(delimited(space0, list, space0))(value) {
        Ok((_, vias)) => Ok(vias),
        Err(_) => Err(Error::invalid_header("Via", value)),
    }
}
