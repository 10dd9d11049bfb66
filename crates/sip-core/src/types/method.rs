use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// SIP request methods
///
/// Only the methods the gateway handles get their own variant; anything
/// else arrives as [`Method::Extension`] and is answered 501.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    /// REGISTER
    Register,
    /// INVITE
    Invite,
    /// ACK
    Ack,
    /// BYE
    Bye,
    /// CANCEL
    Cancel,
    /// OPTIONS
    Options,
    /// Any other well-formed method token
    Extension(String),
}

impl Method {
    /// Method token as it appears on the wire
    pub fn as_str(&self) -> &str {
        match self {
            Method::Register => "REGISTER",
            Method::Invite => "INVITE",
            Method::Ack => "ACK",
            Method::Bye => "BYE",
            Method::Cancel => "CANCEL",
            Method::Options => "OPTIONS",
            Method::Extension(name) => name,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    // Method names are case-sensitive (RFC 3261 7.1)
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "REGISTER" => Ok(Method::Register),
            "INVITE" => Ok(Method::Invite),
            "ACK" => Ok(Method::Ack),
            "BYE" => Ok(Method::Bye),
            "CANCEL" => Ok(Method::Cancel),
            "OPTIONS" => Ok(Method::Options),
            "" => Err(Error::InvalidMethod(s.to_string())),
            other if other.chars().all(crate::parser::is_token_char) => {
                Ok(Method::Extension(other.to_string()))
            }
            other => Err(Error::InvalidMethod(other.to_string())),
        }
    }
}
