//! # SIP Digest Authentication
//!
//! Client side of RFC 2617 Digest as PBXs use it for REGISTER and INVITE:
//!
//! ```text
//! HA1      = MD5(username:realm:password)
//! HA2      = MD5(METHOD:digest-uri)
//! response = MD5(HA1:nonce:HA2)
//! ```
//!
//! `qop` is not negotiated; challenges offering it are answered in the
//! RFC 2069 compatible form above.

use std::fmt;
use std::str::FromStr;

use md5::{Digest, Md5};

use crate::error::{Error, Result};
use crate::types::method::Method;

/// Parsed `WWW-Authenticate` / `Proxy-Authenticate` Digest challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
    pub algorithm: Option<String>,
    pub opaque: Option<String>,
    pub qop: Option<String>,
}

impl FromStr for DigestChallenge {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        crate::parser::auth::parse_digest_challenge(s)
    }
}

/// Account credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials {
            username: username.into(),
            password: password.into(),
        }
    }
}

// Keep the password out of logs
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

fn md5_hex(input: &str) -> String {
    format!("{:x}", Md5::digest(input.as_bytes()))
}

/// Digest `response` value for one request
pub fn digest_response(
    username: &str,
    realm: &str,
    password: &str,
    nonce: &str,
    method: &Method,
    uri: &str,
) -> String {
    let ha1 = md5_hex(&format!("{username}:{realm}:{password}"));
    let ha2 = md5_hex(&format!("{method}:{uri}"));
    md5_hex(&format!("{ha1}:{nonce}:{ha2}"))
}

/// `Authorization` / `Proxy-Authorization` header value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorization {
    pub username: String,
    pub realm: String,
    pub nonce: String,
    pub uri: String,
    pub response: String,
    pub opaque: Option<String>,
}

impl Authorization {
    /// Answer `challenge` for a request with the given method and Request-URI
    pub fn new(
        challenge: &DigestChallenge,
        credentials: &Credentials,
        method: &Method,
        uri: &str,
    ) -> Self {
        Authorization {
            username: credentials.username.clone(),
            realm: challenge.realm.clone(),
            nonce: challenge.nonce.clone(),
            uri: uri.to_string(),
            response: digest_response(
                &credentials.username,
                &challenge.realm,
                &credentials.password,
                &challenge.nonce,
                method,
                uri,
            ),
            opaque: challenge.opaque.clone(),
        }
    }
}

impl fmt::Display for Authorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\", response=\"{}\", algorithm=MD5",
            self.username, self.realm, self.nonce, self.uri, self.response
        )?;
        if let Some(opaque) = &self.opaque {
            write!(f, ", opaque=\"{opaque}\"")?;
        }
        Ok(())
    }
}
