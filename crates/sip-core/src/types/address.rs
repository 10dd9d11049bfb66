//! Name-addr values of From, To and Contact
//!
//! ```text
//! From: "Alice" <sip:alice@atlanta.com>;tag=1928301774
//! ```
//!
//! The URI is kept as text: the gateway only ever needs its user part and
//! echoes it back unchanged.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::types::param::{self, Param};

/// Display name, URI and header parameters of an address header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameAddr {
    pub display_name: Option<String>,
    pub uri: String,
    pub params: Vec<Param>,
}

impl NameAddr {
    pub fn new(uri: impl Into<String>) -> Self {
        NameAddr {
            display_name: None,
            uri: uri.into(),
            params: Vec::new(),
        }
    }

    /// `sip:user@host`, or `sip:user@host:port` when a port is given
    pub fn sip(user: &str, host: &str, port: Option<u16>) -> Self {
        match port {
            Some(port) => NameAddr::new(format!("sip:{user}@{host}:{port}")),
            None => NameAddr::new(format!("sip:{user}@{host}")),
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.set_tag(tag);
        self
    }

    pub fn with_param(mut self, name: &str, value: Option<String>) -> Self {
        param::set(&mut self.params, name, value);
        self
    }

    pub fn tag(&self) -> Option<&str> {
        self.param("tag").filter(|t| !t.is_empty())
    }

    pub fn set_tag(&mut self, tag: impl Into<String>) {
        param::set(&mut self.params, "tag", Some(tag.into()));
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        param::find(&self.params, name)
    }

    /// User part of a `sip:`/`sips:`/`tel:` URI, without URI parameters
    pub fn user(&self) -> Option<&str> {
        let rest = self
            .uri
            .strip_prefix("sip:")
            .or_else(|| self.uri.strip_prefix("sips:"))
            .or_else(|| self.uri.strip_prefix("tel:"))?;
        let user = match rest.find('@') {
            Some(at) => &rest[..at],
            None if self.uri.starts_with("tel:") => rest,
            None => return None,
        };
        let user = user.split([';', ':']).next().unwrap_or(user);
        (!user.is_empty()).then_some(user)
    }
}

impl fmt::Display for NameAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.display_name {
            write!(f, "\"{}\" ", name.replace('"', "\\\""))?;
        }
        write!(f, "<{}>", self.uri)?;
        for p in &self.params {
            write!(f, "{p}")?;
        }
        Ok(())
    }
}

impl FromStr for NameAddr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        crate::parser::address::parse_name_addr(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_parse() {
        let addr = NameAddr::sip("1000", "pbx.local", None)
            .with_display_name("Front Desk")
            .with_tag("a1b2c3d4");
        let text = addr.to_string();
        assert_eq!(text, "\"Front Desk\" <sip:1000@pbx.local>;tag=a1b2c3d4");
        assert_eq!(text.parse::<NameAddr>().unwrap(), addr);
    }

    #[test]
    fn test_user_part() {
        assert_eq!(NameAddr::new("sip:+15550100@gw;user=phone").user(), Some("+15550100"));
        assert_eq!(NameAddr::new("sip:alice:secret@host").user(), Some("alice"));
        assert_eq!(NameAddr::new("tel:5550100").user(), Some("5550100"));
        assert_eq!(NameAddr::new("sip:pbx.local").user(), None);
    }

    #[test]
    fn test_tag_replacement() {
        let mut addr = NameAddr::new("sip:a@b").with_tag("one");
        addr.set_tag("two");
        assert_eq!(addr.tag(), Some("two"));
        assert_eq!(addr.params.len(), 1);
    }
}
