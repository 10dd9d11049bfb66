use thiserror::Error;

/// Result type for sip-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while parsing or constructing SIP and SDP content
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed start line, header or body framing
    #[error("Parse error: {0}")]
    ParseError(String),

    /// One of Via, From, To, Call-ID or CSeq is absent
    #[error("Missing required header: {0}")]
    MissingHeader(&'static str),

    /// Header present but its value could not be interpreted
    #[error("Invalid {name} header: {value}")]
    InvalidHeader { name: String, value: String },

    /// Status code outside 100..=699
    #[error("Invalid status code: {0}")]
    InvalidStatusCode(u16),

    /// Method token with illegal characters
    #[error("Invalid method: {0}")]
    InvalidMethod(String),

    /// WWW-Authenticate/Proxy-Authenticate without a usable Digest challenge
    #[error("Invalid digest challenge: {0}")]
    InvalidChallenge(String),

    /// Session description without a `c=IN IP4` line
    #[error("SDP has no connection address")]
    MissingConnection,

    /// Session description without a usable `m=audio` line
    #[error("SDP has no usable audio media line")]
    MissingAudioMedia,
}

impl Error {
    pub(crate) fn invalid_header(name: &str, value: &str) -> Self {
        Error::InvalidHeader {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(e: std::str::Utf8Error) -> Self {
        Error::ParseError(format!("message is not UTF-8: {e}"))
    }
}
