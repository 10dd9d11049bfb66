//! # SIP Via Header
//!
//! ```text
//! Via: SIP/2.0/UDP pc33.atlanta.com:5060;branch=z9hG4bK776asdhds
//! ```
//!
//! Responses echo the request's Via list unchanged; the `branch` of the top
//! value identifies the transaction.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::types::param::{self, Param};

/// One Via value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Via {
    pub transport: String,
    pub host: String,
    pub port: Option<u16>,
    pub params: Vec<Param>,
}

impl Via {
    /// `SIP/2.0/UDP host:port;branch=...;rport`
    pub fn udp(host: impl Into<String>, port: u16, branch: impl Into<String>) -> Self {
        Via {
            transport: "UDP".to_string(),
            host: host.into(),
            port: Some(port),
            params: vec![Param::branch(branch), Param::new("rport", None)],
        }
    }

    pub fn branch(&self) -> Option<&str> {
        self.param("branch")
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        param::find(&self.params, name)
    }

    pub fn set_param(&mut self, name: &str, value: Option<String>) {
        param::set(&mut self.params, name, value);
    }

    /// `host[:port]`
    pub fn sent_by(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{}", self.host, port),
            None => self.host.clone(),
        }
    }
}

impl fmt::Display for Via {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SIP/2.0/{} {}", self.transport, self.sent_by())?;
        for p in &self.params {
            write!(f, "{p}")?;
        }
        Ok(())
    }
}

impl FromStr for Via {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut vias = crate::parser::via::parse_via_list(s)?;
        match vias.len() {
            1 => Ok(vias.remove(0)),
            _ => Err(Error::invalid_header("Via", s)),
        }
    }
}
