//! Engine configuration
//!
//! Durations are already resolved here; reading them from a file is the
//! application's business.

use std::net::SocketAddr;
use std::time::Duration;

use sip_core::Credentials;
use sip_core::sdp::{PCMA, PCMU};

use crate::errors::{DialogError, DialogResult};

/// How the engine finds the PBX
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationMode {
    /// Register to a configured PBX and keep the registration alive
    Client,
    /// Wait for the PBX to REGISTER to us and learn its address from that
    Trunk,
}

/// Retransmission and timeout settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerSettings {
    /// RFC 3261 T1
    pub t1: Duration,
    /// Delay before each retransmission; the last entry repeats
    pub retransmit_intervals: Vec<Duration>,
    pub max_retransmits: usize,
    /// Timer B: overall INVITE (and REGISTER) transaction timeout
    pub invite_timeout: Duration,
    /// Delay before retrying a failed registration
    pub register_retry: Duration,
    pub health_check_interval: Duration,
    /// Silence on the signaling socket after which the PBX is presumed gone
    pub dead_threshold: Duration,
    /// Receive poll interval of the signaling loop
    pub receive_timeout: Duration,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            t1: Duration::from_millis(500),
            retransmit_intervals: [500, 1000, 2000, 4000, 4000, 4000]
                .into_iter()
                .map(Duration::from_millis)
                .collect(),
            max_retransmits: 6,
            invite_timeout: Duration::from_secs(32),
            register_retry: Duration::from_secs(30),
            health_check_interval: Duration::from_secs(30),
            dead_threshold: Duration::from_secs(90),
            receive_timeout: Duration::from_millis(250),
        }
    }
}

impl TimerSettings {
    /// Delay before retransmission number `attempt` (0-based)
    pub fn retransmit_delay(&self, attempt: usize) -> Duration {
        self.retransmit_intervals
            .get(attempt)
            .or(self.retransmit_intervals.last())
            .copied()
            .unwrap_or(self.t1)
    }
}

/// Everything the signaling engine needs to run
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub mode: RegistrationMode,
    /// Socket address to bind; port 0 picks an ephemeral port
    pub bind_addr: SocketAddr,
    /// Address advertised in Via, Contact and SDP
    pub local_ip: String,
    /// Client mode registrar
    pub pbx_host: Option<String>,
    pub pbx_port: u16,
    /// SIP domain for Request-URIs; defaults to the PBX host
    pub domain: Option<String>,
    pub credentials: Credentials,
    /// Requested registration lifetime in seconds
    pub register_expires: u32,
    pub user_agent: String,
    /// Payload types in preference order
    pub codecs: Vec<u8>,
    pub timers: TimerSettings,
}

impl EngineConfig {
    pub fn new(mode: RegistrationMode, bind_addr: SocketAddr, local_ip: impl Into<String>) -> Self {
        Self {
            mode,
            bind_addr,
            local_ip: local_ip.into(),
            pbx_host: None,
            pbx_port: 5060,
            domain: None,
            credentials: Credentials::new("cellgate", ""),
            register_expires: 60,
            user_agent: format!("cellgate/{}", crate::VERSION),
            codecs: vec![PCMU, PCMA],
            timers: TimerSettings::default(),
        }
    }

    pub fn validate(&self) -> DialogResult<()> {
        if self.mode == RegistrationMode::Client && self.pbx_host.as_deref().unwrap_or("").is_empty() {
            return Err(DialogError::Config("client mode requires a PBX host".into()));
        }
        if self.codecs.is_empty() || self.codecs.iter().any(|pt| !matches!(*pt, PCMU | PCMA)) {
            return Err(DialogError::Config(format!(
                "codec list must be non-empty PCMU/PCMA, got {:?}",
                self.codecs
            )));
        }
        if self.timers.retransmit_intervals.is_empty() {
            return Err(DialogError::Config("no retransmit intervals".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retransmit_delay_repeats_last_interval() {
        let timers = TimerSettings::default();
        assert_eq!(timers.retransmit_delay(0), Duration::from_millis(500));
        assert_eq!(timers.retransmit_delay(2), Duration::from_secs(2));
        assert_eq!(timers.retransmit_delay(9), Duration::from_secs(4));
    }

    #[test]
    fn test_validate() {
        let addr = "127.0.0.1:0".parse().unwrap();
        let mut config = EngineConfig::new(RegistrationMode::Client, addr, "127.0.0.1");
        assert!(config.validate().is_err());
        config.pbx_host = Some("pbx.local".into());
        assert!(config.validate().is_ok());
        config.codecs = vec![18];
        assert!(config.validate().is_err());

        let trunk = EngineConfig::new(RegistrationMode::Trunk, addr, "127.0.0.1");
        assert!(trunk.validate().is_ok());
    }
}
