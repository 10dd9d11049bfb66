//! # Gateway orchestrator
//!
//! Couples one cellular line to the SIP engine. The [`Gateway`] owns at
//! most one call at a time and reacts to three event sources:
//!
//! ```text
//!   LineEvent ──┐
//!   EngineEvent ├──> Gateway::run ──> CallControl / SipEngine / MediaBridge
//!   BridgeEvent ┘
//! ```
//!
//! | event | action |
//! |---|---|
//! | line rings | INVITE the routing extension on the PBX |
//! | PBX answers our INVITE | answer the line, start media |
//! | PBX calls us | dial the requested number on the line |
//! | line answers our dial | answer the PBX call, start media |
//! | line disconnects | hang up the SIP call |
//! | SIP call ends or fails | hang up the line |
//! | media fails | hang up both sides |
//!
//! Line actions are blocking and run on the blocking pool; so does
//! stopping a bridge, which joins its threads.

use std::fmt;
use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use codec_core::CodecType;
use dialog_core::{CallDirection, DialogError, EngineEvent, SipEngine};
use rtp_core::{AudioControl, AudioPath, BridgeConfig, BridgeEvent, MediaBridge};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::{GatewayConfig, MediaConfig};
use crate::errors::{Error, Result};
use crate::line::{CallControl, LineEvent};
use crate::ports::RtpPortAllocator;

/// Bridge parameters that do not depend on the call
#[derive(Debug, Clone)]
pub struct MediaSettings {
    pub failure_threshold: u32,
    pub silence_threshold: u16,
    pub stats_interval: Duration,
}

impl From<&MediaConfig> for MediaSettings {
    fn from(config: &MediaConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold,
            silence_threshold: config.silence_threshold,
            stats_interval: config.stats_interval(),
        }
    }
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self::from(&MediaConfig::default())
    }
}

/// The call currently crossing the gateway
struct ActiveCall {
    call_id: String,
    direction: CallDirection,
    rtp_port: u16,
    bridge: Option<MediaBridge>,
}

/// Why the line or the SIP side goes away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Teardown {
    /// The SIP call is already gone; only the line is left to hang up
    SipEnded,
    /// The line is already gone; only the SIP call is left to end
    LineEnded,
    /// Neither side is finished yet
    Both,
}

/// One cellular line bridged to the PBX
pub struct Gateway {
    engine: SipEngine,
    line: Arc<dyn CallControl>,
    audio: Arc<dyn AudioPath>,
    audio_control: Option<Arc<dyn AudioControl>>,
    ports: RtpPortAllocator,
    media: MediaSettings,
    extension: String,
    active: Option<ActiveCall>,
    bridge_tx: mpsc::UnboundedSender<BridgeEvent>,
    bridge_rx: Option<mpsc::UnboundedReceiver<BridgeEvent>>,
}

impl Gateway {
    pub fn new(
        engine: SipEngine,
        line: Arc<dyn CallControl>,
        audio: Arc<dyn AudioPath>,
        ports: RtpPortAllocator,
        extension: impl Into<String>,
    ) -> Self {
        let (bridge_tx, bridge_rx) = mpsc::unbounded_channel();
        Self {
            engine,
            line,
            audio,
            audio_control: None,
            ports,
            media: MediaSettings::default(),
            extension: extension.into(),
            active: None,
            bridge_tx,
            bridge_rx: Some(bridge_rx),
        }
    }

    /// Gateway wired from the `[media]` and `[routing]` sections
    pub fn from_config(
        config: &GatewayConfig,
        engine: SipEngine,
        line: Arc<dyn CallControl>,
        audio: Arc<dyn AudioPath>,
    ) -> Self {
        let ports = RtpPortAllocator::new(config.media.rtp_port_min, config.media.rtp_port_max);
        Self::new(engine, line, audio, ports, config.routing.extension.clone())
            .with_media(MediaSettings::from(&config.media))
    }

    pub fn with_media(mut self, media: MediaSettings) -> Self {
        self.media = media;
        self
    }

    /// Mixer switched on while a bridge runs and off afterwards
    pub fn with_audio_control(mut self, control: Arc<dyn AudioControl>) -> Self {
        self.audio_control = Some(control);
        self
    }

    pub fn engine(&self) -> &SipEngine {
        &self.engine
    }

    /// Call-ID of the call in progress, if any
    pub fn active_call(&self) -> Option<&str> {
        self.active.as_ref().map(|call| call.call_id.as_str())
    }

    /// Process events until `shutdown` resolves or the engine's event
    /// channel closes. The call in progress, if any, is torn down on exit.
    pub async fn run(
        mut self,
        mut engine_events: mpsc::UnboundedReceiver<EngineEvent>,
        mut line_events: mpsc::UnboundedReceiver<LineEvent>,
        shutdown: impl Future<Output = ()>,
    ) -> Result<()> {
        tokio::pin!(shutdown);
        let mut bridge_events = self.bridge_rx.take().ok_or_else(|| {
            Error::Config("gateway event loop already ran".to_string())
        })?;
        let mut line_open = true;
        info!("gateway routing cellular calls to extension {}", self.extension);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("gateway shutting down");
                    break;
                }
                event = engine_events.recv() => match event {
                    Some(event) => self.handle_engine_event(event).await,
                    None => {
                        warn!("engine event channel closed");
                        break;
                    }
                },
                event = line_events.recv(), if line_open => match event {
                    Some(event) => self.handle_line_event(event).await,
                    None => {
                        warn!("line event channel closed");
                        line_open = false;
                    }
                },
                Some(event) = bridge_events.recv() => self.handle_bridge_event(event).await,
            }
        }

        if self.active.is_some() {
            self.teardown(Teardown::Both, "shutdown").await;
        }
        Ok(())
    }

    pub async fn handle_line_event(&mut self, event: LineEvent) {
        debug!("line event: {:?}", event);
        match event {
            LineEvent::Ringing { caller } => self.on_line_ringing(caller).await,
            LineEvent::Answered => self.on_line_answered().await,
            LineEvent::Disconnected => {
                if self.active.is_some() {
                    self.teardown(Teardown::LineEnded, "line disconnected").await;
                } else {
                    debug!("line disconnected with no call in progress");
                }
            }
        }
    }

    pub async fn handle_engine_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Registered { expires } => {
                info!("registered with the PBX for {}s", expires);
            }
            EngineEvent::RegistrationFailed { reason } => {
                warn!("registration failed: {}", reason);
            }
            EngineEvent::PeerLearned { addr } => info!("PBX registered from {}", addr),
            EngineEvent::IncomingCall {
                call_id,
                dialed,
                caller,
            } => self.on_incoming_call(call_id, dialed, caller).await,
            EngineEvent::CallAnswered { call_id } => {
                if self.is_active(&call_id) {
                    self.on_pbx_answered(&call_id).await;
                }
            }
            EngineEvent::CallConfirmed { call_id } => {
                // Late offer: the PBX address only arrived with the ACK
                if self.is_active(&call_id) && !self.has_bridge() {
                    self.start_media(&call_id).await;
                }
            }
            EngineEvent::CallProgress { call_id, status } => {
                debug!("{} progressing: {}", call_id, status.as_u16());
            }
            EngineEvent::EarlyMedia { call_id } => debug!("{} has early media", call_id),
            EngineEvent::CallFailed {
                call_id,
                status,
                reason,
            } => {
                if self.is_active(&call_id) {
                    info!("call {} failed: {} {}", call_id, status.as_u16(), reason);
                    self.teardown(Teardown::SipEnded, &reason).await;
                }
            }
            EngineEvent::CallEnded { call_id, reason } => {
                if self.is_active(&call_id) {
                    self.teardown(Teardown::SipEnded, &reason).await;
                }
            }
        }
    }

    pub async fn handle_bridge_event(&mut self, event: BridgeEvent) {
        match event {
            BridgeEvent::Failed {
                call_id,
                direction,
                consecutive_failures,
            } => {
                if !self.is_active(&call_id) {
                    return;
                }
                error!(
                    "{} media failed after {} consecutive errors, ending call {}",
                    direction, consecutive_failures, call_id
                );
                self.teardown(Teardown::Both, "media failure").await;
            }
        }
    }

    async fn on_line_ringing(&mut self, caller: String) {
        if let Some(active) = &self.active {
            warn!("line rang during call {}, ignoring", active.call_id);
            return;
        }
        let port = match self.ports.allocate() {
            Ok(port) => port,
            Err(e) => {
                error!("cannot route cellular call: {}", e);
                self.line_action("hang up", |line| line.hangup()).await;
                return;
            }
        };

        info!(
            "cellular call from {} -> extension {}",
            if caller.is_empty() { "unknown" } else { caller.as_str() },
            self.extension
        );
        match self.engine.make_call(&self.extension, port, &caller).await {
            Ok(call) => {
                self.active = Some(ActiveCall {
                    call_id: call.call_id,
                    direction: CallDirection::Outgoing,
                    rtp_port: port,
                    bridge: None,
                });
            }
            Err(e) => {
                error!("INVITE to extension {} failed: {}", self.extension, e);
                self.ports.release(port);
                self.line_action("hang up", |line| line.hangup()).await;
            }
        }
    }

    async fn on_incoming_call(&mut self, call_id: String, dialed: String, caller: String) {
        if self.active.is_some() {
            info!("line busy, declining {} from {}", call_id, caller);
            self.end_sip_call(&call_id, "busy").await;
            return;
        }
        if dialed.is_empty() {
            warn!("incoming call {} has no number to dial", call_id);
            self.end_sip_call(&call_id, "no number").await;
            return;
        }
        let port = match self.ports.allocate() {
            Ok(port) => port,
            Err(e) => {
                error!("cannot accept {}: {}", call_id, e);
                self.end_sip_call(&call_id, "no media port").await;
                return;
            }
        };

        info!("PBX call {} from {} -> dialing {}", call_id, caller, dialed);
        self.active = Some(ActiveCall {
            call_id,
            direction: CallDirection::Incoming,
            rtp_port: port,
            bridge: None,
        });
        let number = dialed.clone();
        if !self.line_action("dial", move |line| line.dial(&number)).await {
            self.teardown(Teardown::LineEnded, "dial failed").await;
        }
    }

    async fn on_line_answered(&mut self) {
        let Some((call_id, direction, port)) = self
            .active
            .as_ref()
            .map(|call| (call.call_id.clone(), call.direction, call.rtp_port))
        else {
            debug!("line answered with no call in progress");
            return;
        };
        if direction != CallDirection::Incoming {
            debug!("line answered for outgoing call {}, nothing to do", call_id);
            return;
        }

        if let Err(e) = self.engine.answer_call(&call_id, port).await {
            error!("answering {} failed: {}", call_id, e);
            self.teardown(Teardown::Both, "answer failed").await;
            return;
        }
        let has_remote = self
            .engine
            .call(&call_id)
            .is_some_and(|call| call.remote_rtp.is_some());
        if has_remote {
            self.start_media(&call_id).await;
        } else {
            debug!("{} has no offer yet, media starts on ACK", call_id);
        }
    }

    async fn on_pbx_answered(&mut self, call_id: &str) {
        if !self.line_action("answer", |line| line.answer()).await {
            self.teardown(Teardown::Both, "line answer failed").await;
            return;
        }
        self.start_media(call_id).await;
    }

    async fn start_media(&mut self, call_id: &str) {
        match self.try_start_media(call_id) {
            Ok(()) => {}
            Err(e) => {
                error!("starting media for {} failed: {}", call_id, e);
                self.teardown(Teardown::Both, "media setup failed").await;
            }
        }
    }

    fn try_start_media(&mut self, call_id: &str) -> Result<()> {
        let call = self
            .engine
            .call(call_id)
            .ok_or_else(|| DialogError::CallNotFound(call_id.to_string()))?;
        let remote = call
            .remote_rtp
            .ok_or_else(|| Error::NoRemoteMedia(call_id.to_string()))?;
        let codec = call
            .codec
            .and_then(CodecType::from_payload_type)
            .unwrap_or(CodecType::Pcmu);
        let Some(active) = self.active.as_mut() else {
            return Ok(());
        };

        if let Some(control) = &self.audio_control {
            if let Err(e) = control.enable() {
                warn!("enabling the audio path failed: {}", e);
            }
        }
        let mut config = BridgeConfig::new(active.rtp_port, remote, codec);
        config.failure_threshold = self.media.failure_threshold;
        config.silence_threshold = self.media.silence_threshold;
        config.stats_interval = self.media.stats_interval;

        let bridge = MediaBridge::start(
            call_id,
            config,
            Arc::clone(&self.audio),
            self.bridge_tx.clone(),
        )?;
        info!(
            "media for {}: {} <-> {} ({})",
            call_id,
            bridge.local_addr(),
            remote,
            codec.name()
        );
        active.bridge = Some(bridge);
        Ok(())
    }

    /// End the call in progress on whichever sides are still up and give
    /// back its resources
    async fn teardown(&mut self, teardown: Teardown, reason: &str) {
        let Some(active) = self.active.take() else {
            return;
        };
        info!("ending call {}: {}", active.call_id, reason);

        if teardown != Teardown::SipEnded {
            self.end_sip_call(&active.call_id, reason).await;
        }
        if teardown != Teardown::LineEnded {
            self.line_action("hang up", |line| line.hangup()).await;
        }

        if let Some(bridge) = active.bridge {
            let stats = bridge.stats();
            info!(
                "media for {}: sent {} packets, received {}, discarded {}",
                active.call_id, stats.packets_sent, stats.packets_received, stats.packets_discarded
            );
            // Dropping joins the bridge threads
            if let Err(e) = tokio::task::spawn_blocking(move || drop(bridge)).await {
                warn!("stopping media for {} failed: {}", active.call_id, e);
            }
            if let Some(control) = &self.audio_control {
                if let Err(e) = control.disable() {
                    warn!("disabling the audio path failed: {}", e);
                }
            }
        }
        self.ports.release(active.rtp_port);
    }

    async fn end_sip_call(&self, call_id: &str, reason: &str) {
        match self.engine.hangup(call_id, reason).await {
            Ok(()) | Err(DialogError::CallNotFound(_)) => {}
            Err(e) => warn!("hangup of {} failed: {}", call_id, e),
        }
    }

    /// Run a blocking line action; failures are logged and reported as `false`
    async fn line_action<F>(&self, action: &'static str, f: F) -> bool
    where
        F: FnOnce(&dyn CallControl) -> io::Result<()> + Send + 'static,
    {
        let line = Arc::clone(&self.line);
        let result = tokio::task::spawn_blocking(move || f(line.as_ref()))
            .await
            .unwrap_or_else(|e| Err(io::Error::other(e)))
            .map_err(|source| Error::Line { action, source });
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!("{}", e);
                false
            }
        }
    }

    fn is_active(&self, call_id: &str) -> bool {
        self.active.as_ref().is_some_and(|call| call.call_id == call_id)
    }

    fn has_bridge(&self) -> bool {
        self.active.as_ref().is_some_and(|call| call.bridge.is_some())
    }
}

impl fmt::Debug for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gateway")
            .field("engine", &self.engine)
            .field("extension", &self.extension)
            .field("active", &self.active_call())
            .field("ports_in_use", &self.ports.allocated_count())
            .finish()
    }
}
