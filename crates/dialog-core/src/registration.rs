//! Registration context
//!
//! One per engine. In client mode it tracks the outbound REGISTER
//! transaction and the Digest challenge; in trunk mode it only remembers
//! where the PBX last registered from.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use sip_core::{DigestChallenge, Response, StatusCode};

use crate::config::RegistrationMode;

/// Externally visible registration status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationState {
    Unregistered,
    Registering,
    Registered { expires: u32, remaining: Duration },
    /// Trunk mode: waiting for or serving the PBX
    Listening,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Status {
    Unregistered,
    Registering,
    Registered { expires: u32, since: Instant },
    Listening,
    Failed(String),
}

/// Header carrying our credentials, by challenge kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthHeader {
    /// Answer to 401 WWW-Authenticate
    Authorization,
    /// Answer to 407 Proxy-Authenticate
    ProxyAuthorization,
}

impl AuthHeader {
    pub fn for_status(status: StatusCode) -> Option<Self> {
        match status {
            StatusCode::Unauthorized => Some(AuthHeader::Authorization),
            StatusCode::ProxyAuthenticationRequired => Some(AuthHeader::ProxyAuthorization),
            _ => None,
        }
    }

    /// Header holding the challenge in the response
    pub fn challenge_header(self) -> &'static str {
        match self {
            AuthHeader::Authorization => "WWW-Authenticate",
            AuthHeader::ProxyAuthorization => "Proxy-Authenticate",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AuthHeader::Authorization => "Authorization",
            AuthHeader::ProxyAuthorization => "Proxy-Authorization",
        }
    }
}

/// Extract the Digest challenge of a 401/407 response
pub fn challenge_of(response: &Response) -> Option<(DigestChallenge, AuthHeader)> {
    let header = AuthHeader::for_status(response.status)?;
    let value = response.headers.get(header.challenge_header())?;
    value.parse().ok().map(|challenge| (challenge, header))
}

/// REGISTER awaiting its final response
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PendingRegister {
    pub cseq: u32,
    pub expires: u32,
    /// This attempt already answered a challenge
    pub auth_retried: bool,
}

#[derive(Debug)]
pub(crate) struct RegistrationContext {
    pub mode: RegistrationMode,
    pub status: Status,
    /// Client mode: resolved registrar. Trunk mode: learned PBX address.
    pub pbx_addr: Option<SocketAddr>,
    /// Stable across renewals (RFC 3261 section 10.2.4)
    pub call_id: String,
    pub from_tag: String,
    pub cseq: u32,
    pub pending: Option<PendingRegister>,
    pub challenge: Option<(DigestChallenge, AuthHeader)>,
}

impl RegistrationContext {
    pub fn new(mode: RegistrationMode, call_id: String, from_tag: String) -> Self {
        Self {
            mode,
            status: Status::Unregistered,
            pbx_addr: None,
            call_id,
            from_tag,
            cseq: 0,
            pending: None,
            challenge: None,
        }
    }

    pub fn next_cseq(&mut self) -> u32 {
        self.cseq += 1;
        self.cseq
    }

    pub fn is_registered(&self) -> bool {
        matches!(self.status, Status::Registered { .. })
    }

    /// Trunk mode: remember the PBX address; true when it changed
    pub fn learn_peer(&mut self, addr: SocketAddr) -> bool {
        let changed = self.pbx_addr != Some(addr);
        self.pbx_addr = Some(addr);
        changed
    }

    pub fn snapshot(&self, now: Instant) -> RegistrationState {
        match &self.status {
            Status::Unregistered => RegistrationState::Unregistered,
            Status::Registering => RegistrationState::Registering,
            Status::Registered { expires, since } => {
                let lifetime = Duration::from_secs(u64::from(*expires));
                RegistrationState::Registered {
                    expires: *expires,
                    remaining: lifetime.saturating_sub(now.saturating_duration_since(*since)),
                }
            }
            Status::Listening => RegistrationState::Listening,
            Status::Failed(reason) => RegistrationState::Failed {
                reason: reason.clone(),
            },
        }
    }
}

/// Lifetime granted by a 2xx to REGISTER.
///
/// The `Expires` header wins, then the Contact `expires` parameter, then
/// what we asked for.
pub fn granted_expiry(response: &Response, requested: u32) -> u32 {
    response
        .headers
        .expires
        .or_else(|| {
            response
                .headers
                .contact
                .as_ref()
                .and_then(|c| c.param("expires"))
                .and_then(|v| v.parse().ok())
        })
        .unwrap_or(requested)
}

/// Renewal delay: 80% of the granted lifetime, at least one second
pub fn renewal_delay(expires: u32) -> Duration {
    Duration::from_millis(u64::from(expires) * 800).max(Duration::from_secs(1))
}
