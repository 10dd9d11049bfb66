//! # dialog-core: the cellgate SIP user agent
//!
//! One [`SipEngine`] per trunk. It owns the signaling socket, registers to
//! the PBX (client mode) or learns the PBX from its REGISTER (trunk mode),
//! and keeps one [`Call`] per dialog in a shared [`CallRegistry`].
//!
//! ```text
//!   UdpTransport ──► receive loop ──► dispatch ──► protocol handlers
//!                                                     │
//!   make_call / answer_call / hangup ◄── owner ◄── EngineEvent
//! ```
//!
//! Every retransmission and timeout runs through a [`Scheduler`], so tests
//! can drive the engine with [`ManualScheduler`] instead of wall-clock
//! time. Calls only ever move forward through [`CallState`]; a late or
//! reordered message can therefore never resurrect a finished call.
//!
//! ```rust,no_run
//! use dialog_core::{EngineConfig, RegistrationMode, SipEngine};
//!
//! # async fn run() -> dialog_core::DialogResult<()> {
//! let mut config = EngineConfig::new(
//!     RegistrationMode::Client,
//!     "0.0.0.0:5060".parse().unwrap(),
//!     "192.168.1.50".to_string(),
//! );
//! config.pbx_host = Some("192.168.1.10".to_string());
//! let (engine, mut events) = SipEngine::bind(config).await?;
//! engine.start().await?;
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dialog;
pub mod errors;
pub mod events;
pub mod manager;
pub mod protocol;
pub mod registration;
pub mod registry;
pub mod timer;
pub mod transport;

pub use config::{EngineConfig, RegistrationMode, TimerSettings};
pub use dialog::{Call, CallDirection, CallState, HangupAction};
pub use errors::{DialogError, DialogResult};
pub use events::EngineEvent;
pub use manager::SipEngine;
pub use registration::RegistrationState;
pub use registry::{CallRegistry, SharedCall};
pub use timer::{ManualScheduler, Scheduler, TimerHandle, TokioScheduler};

/// Crate version, advertised in User-Agent and Server headers
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
