//! # cellgate
//!
//! Bridges a GSM voice line to a SIP PBX. A cellular call ringing on the
//! line becomes a SIP call to a configured extension; a SIP call from the
//! PBX is dialed out on the line. Audio is carried as G.711 over RTP.
//!
//! The crate ties the workspace together:
//!
//! - [`config`]: the TOML configuration file
//! - [`logging`]: `tracing` subscriber setup
//! - [`line`]: the cellular line capability ([`CallControl`], [`LineEvent`])
//! - [`ports`]: RTP port allocation
//! - [`orchestrator`]: the [`Gateway`] event loop
//! - [`dev`]: stand-in line and audio adapters for hosts without a modem
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use cellgate::dev::{LoggingLine, SilenceAudio};
//! use cellgate::{Gateway, GatewayConfig};
//! use dialog_core::SipEngine;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GatewayConfig::load("cellgate.toml")?;
//! let (engine, events) = SipEngine::bind(config.engine_config()?).await?;
//! engine.start().await?;
//!
//! let (_line_tx, line_events) = tokio::sync::mpsc::unbounded_channel();
//! let gateway = Gateway::from_config(
//!     &config,
//!     engine.clone(),
//!     Arc::new(LoggingLine),
//!     Arc::new(SilenceAudio::new()),
//! );
//! gateway
//!     .run(events, line_events, async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//! engine.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dev;
pub mod errors;
pub mod line;
pub mod logging;
pub mod orchestrator;
pub mod ports;

pub use config::{GatewayConfig, SipMode};
pub use errors::{Error, Result};
pub use line::{CallControl, LineEvent};
pub use logging::{LoggingConfig, setup_logging};
pub use orchestrator::{Gateway, MediaSettings};
pub use ports::RtpPortAllocator;

/// Version of the gateway
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
