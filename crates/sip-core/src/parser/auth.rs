//! WWW-Authenticate / Proxy-Authenticate Digest challenges

use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_while1},
    character::complete::{char, space0, space1},
    combinator::map,
    multi::separated_list1,
    sequence::{delimited, preceded, tuple},
};

use crate::error::{Error, Result};
use crate::parser::common::{ParseResult, quoted_string, token};
use crate::types::auth::DigestChallenge;

fn auth_param(input: &str) -> ParseResult<(&str, String)> {
    let (input, name) = token(input)?;
    let (input, _) = delimited(space0, char('='), space0)(input)?;
    let (input, value) = alt((
        quoted_string,
        map(
            take_while1(|c: char| c != ',' && !c.is_whitespace()),
            str::to_string,
        ),
    ))(input)?;
    Ok((input, (name, value)))
}

fn digest_params(input: &str) -> ParseResult<Vec<(&str, String)>> {
    preceded(
        tuple((space0, tag_no_case("Digest"), space1)),
        separated_list1(delimited(space0, char(','), space0), auth_param),
    )(input)
}

pub fn parse_digest_challenge(value: &str) -> Result<DigestChallenge> {
    let (_, params) =
        digest_params(value).map_err(|_| Error::InvalidChallenge(value.to_string()))?;
    let lookup = |key: &str| {
        params
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.clone())
    };
    let realm = lookup("realm").ok_or_else(|| Error::InvalidChallenge("missing realm".into()))?;
    let nonce = lookup("nonce").ok_or_else(|| Error::InvalidChallenge("missing nonce".into()))?;
    Ok(DigestChallenge {
        realm,
        nonce,
        algorithm: lookup("algorithm"),
        opaque: lookup("opaque"),
        qop: lookup("qop"),
    })
}
