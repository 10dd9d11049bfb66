//! Gateway configuration file
//!
//! ```toml
//! [sip]
//! mode = "client"
//! local_ip = "192.168.1.50"
//! pbx_host = "192.168.1.10"
//! username = "1001"
//! password = "secret"
//!
//! [media]
//! rtp_port_min = 10000
//! rtp_port_max = 10100
//!
//! [routing]
//! extension = "100"
//! ```
//!
//! Every other key has a default; timers are given in milliseconds.

use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use codec_core::CodecType;
use dialog_core::{EngineConfig, RegistrationMode, TimerSettings};
use sip_core::Credentials;

use crate::errors::{Error, Result};
use crate::logging::LoggingConfig;

/// Complete gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default)]
    pub sip: SipConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// `mode` values of the `[sip]` section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SipMode {
    /// Register to `pbx_host`
    #[default]
    Client,
    /// Let the PBX register to us
    Trunk,
}

/// Signaling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SipConfig {
    #[serde(default)]
    pub mode: SipMode,
    /// Address advertised in Via, Contact and SDP
    #[serde(default = "default_local_ip")]
    pub local_ip: String,
    #[serde(default = "default_sip_port")]
    pub bind_port: u16,
    #[serde(default)]
    pub pbx_host: Option<String>,
    #[serde(default = "default_sip_port")]
    pub pbx_port: u16,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub domain: Option<String>,
    /// Requested registration lifetime in seconds
    #[serde(default = "default_register_expires")]
    pub register_expires: u32,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub timers: TimersConfig,
}

impl Default for SipConfig {
    fn default() -> Self {
        Self {
            mode: SipMode::default(),
            local_ip: default_local_ip(),
            bind_port: default_sip_port(),
            pbx_host: None,
            pbx_port: default_sip_port(),
            username: default_username(),
            password: String::new(),
            domain: None,
            register_expires: default_register_expires(),
            user_agent: default_user_agent(),
            timers: TimersConfig::default(),
        }
    }
}

/// `[sip.timers]`, all in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TimersConfig {
    pub t1_ms: u64,
    pub retransmit_intervals_ms: Vec<u64>,
    pub max_retransmits: usize,
    pub invite_timeout_ms: u64,
    pub register_retry_ms: u64,
    pub health_check_interval_ms: u64,
    pub dead_threshold_ms: u64,
    pub receive_timeout_ms: u64,
}

impl Default for TimersConfig {
    fn default() -> Self {
        Self {
            t1_ms: 500,
            retransmit_intervals_ms: vec![500, 1000, 2000, 4000, 4000, 4000],
            max_retransmits: 6,
            invite_timeout_ms: 32_000,
            register_retry_ms: 30_000,
            health_check_interval_ms: 30_000,
            dead_threshold_ms: 90_000,
            receive_timeout_ms: 250,
        }
    }
}

impl TimersConfig {
    pub fn to_settings(&self) -> TimerSettings {
        TimerSettings {
            t1: Duration::from_millis(self.t1_ms),
            retransmit_intervals: self
                .retransmit_intervals_ms
                .iter()
                .copied()
                .map(Duration::from_millis)
                .collect(),
            max_retransmits: self.max_retransmits,
            invite_timeout: Duration::from_millis(self.invite_timeout_ms),
            register_retry: Duration::from_millis(self.register_retry_ms),
            health_check_interval: Duration::from_millis(self.health_check_interval_ms),
            dead_threshold: Duration::from_millis(self.dead_threshold_ms),
            receive_timeout: Duration::from_millis(self.receive_timeout_ms),
        }
    }
}

/// RTP settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct MediaConfig {
    pub rtp_port_min: u16,
    pub rtp_port_max: u16,
    /// Codec names in preference order
    pub codecs: Vec<String>,
    /// Consecutive media faults reported as a bridge failure
    pub failure_threshold: u32,
    pub silence_threshold: u16,
    pub stats_interval_ms: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            rtp_port_min: 10_000,
            rtp_port_max: 20_000,
            codecs: vec!["PCMU".to_string(), "PCMA".to_string()],
            failure_threshold: 5,
            silence_threshold: 100,
            stats_interval_ms: 5000,
        }
    }
}

impl MediaConfig {
    /// Configured codecs, in preference order
    pub fn codec_types(&self) -> Result<Vec<CodecType>> {
        self.codecs
            .iter()
            .map(|name| {
                CodecType::from_str(name).map_err(|_| Error::Config(format!("unknown codec {name:?}")))
            })
            .collect()
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_millis(self.stats_interval_ms)
    }
}

/// Where calls from the cellular line go
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RoutingConfig {
    /// PBX extension dialed when the line rings
    pub extension: String,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            extension: "100".to_string(),
        }
    }
}

/// `[logging]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LoggingSection {
    pub level: String,
    pub json: bool,
    pub file_info: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file_info: false,
        }
    }
}

fn default_local_ip() -> String {
    "0.0.0.0".to_string()
}

fn default_sip_port() -> u16 {
    5060
}

fn default_username() -> String {
    "cellgate".to_string()
}

fn default_register_expires() -> u32 {
    60
}

fn default_user_agent() -> String {
    format!("cellgate/{}", env!("CARGO_PKG_VERSION"))
}

impl GatewayConfig {
    /// Read and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = text.parse()?;
        Ok(config)
    }

    /// Reject configurations the gateway cannot run with
    pub fn validate(&self) -> Result<()> {
        let sip = &self.sip;
        if sip.mode == SipMode::Client && sip.pbx_host.as_deref().is_none_or(str::is_empty) {
            return Err(Error::Config("client mode requires sip.pbx_host".into()));
        }
        if sip.local_ip.parse::<IpAddr>().is_err() {
            return Err(Error::Config(format!("sip.local_ip {:?} is not an IP address", sip.local_ip)));
        }
        let media = &self.media;
        if media.rtp_port_min == 0 || media.rtp_port_min > media.rtp_port_max {
            return Err(Error::Config(format!(
                "invalid RTP port range {}-{}",
                media.rtp_port_min, media.rtp_port_max
            )));
        }
        // Allocation hands out even ports only
        if (media.rtp_port_min..=media.rtp_port_max).all(|p| p % 2 != 0) {
            return Err(Error::Config(format!(
                "RTP port range {}-{} holds no even port",
                media.rtp_port_min, media.rtp_port_max
            )));
        }
        if media.codecs.is_empty() {
            return Err(Error::Config("media.codecs is empty".into()));
        }
        media.codec_types()?;
        if sip.timers.retransmit_intervals_ms.is_empty() {
            return Err(Error::Config("sip.timers.retransmit_intervals_ms is empty".into()));
        }
        if self.routing.extension.is_empty() {
            return Err(Error::Config("routing.extension is empty".into()));
        }
        Ok(())
    }

    /// Settings for the signaling engine
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let sip = &self.sip;
        let mode = match sip.mode {
            SipMode::Client => RegistrationMode::Client,
            SipMode::Trunk => RegistrationMode::Trunk,
        };
        let bind_ip: IpAddr = sip
            .local_ip
            .parse()
            .map_err(|_| Error::Config(format!("sip.local_ip {:?} is not an IP address", sip.local_ip)))?;
        let mut config = EngineConfig::new(mode, SocketAddr::new(bind_ip, sip.bind_port), sip.local_ip.clone());
        config.pbx_host = sip.pbx_host.clone();
        config.pbx_port = sip.pbx_port;
        config.domain = sip.domain.clone();
        config.credentials = Credentials::new(sip.username.clone(), sip.password.clone());
        config.register_expires = sip.register_expires;
        config.user_agent = sip.user_agent.clone();
        config.codecs = self.media.codec_types()?.iter().map(|c| c.payload_type()).collect();
        config.timers = sip.timers.to_settings();
        Ok(config)
    }

    pub fn logging_config(&self) -> Result<LoggingConfig> {
        LoggingConfig::from_section(&self.logging)
    }

    /// Effective configuration as TOML, password masked
    pub fn to_toml_redacted(&self) -> String {
        let mut shown = self.clone();
        if !shown.sip.password.is_empty() {
            shown.sip.password = "********".to_string();
        }
        toml::to_string_pretty(&shown).unwrap_or_else(|e| format!("# unprintable configuration: {e}\n"))
    }
}

impl FromStr for GatewayConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }
}
