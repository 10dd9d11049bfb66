//! Core SipEngine implementation: lifecycle, receive loop and dispatch

use dashmap::DashMap;
use futures::FutureExt;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use sip_core::utils::{generate_branch, generate_call_id, generate_tag};
use sip_core::{
    ALLOWED_METHODS, Message, Method, NameAddr, Request, Response, ResponseBuilder, StatusCode, Via,
};

use crate::config::{EngineConfig, RegistrationMode};
use crate::dialog::{Call, CallState};
use crate::errors::{DialogError, DialogResult};
use crate::events::EngineEvent;
use crate::protocol::{
    ByeHandler, InviteHandler, OptionsHandler, RegisterHandler, ResponseHandler,
};
use crate::registration::{RegistrationContext, RegistrationState, Status};
use crate::registry::CallRegistry;
use crate::timer::{Scheduler, TimerHandle, TokioScheduler};
use crate::transport::{Inbound, MAX_DATAGRAM_SIZE, UdpTransport};

/// Who a scheduled timer belongs to, for bulk cancellation
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TimerOwner {
    Call(String),
    Registration,
}

/// SIP user agent for one trunk.
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct SipEngine {
    pub(crate) config: Arc<EngineConfig>,
    pub(crate) transport: Arc<UdpTransport>,
    pub(crate) scheduler: Arc<dyn Scheduler>,
    pub(crate) registry: Arc<CallRegistry>,
    pub(crate) registration: Arc<Mutex<RegistrationContext>>,
    pub(crate) call_timers: Arc<DashMap<String, Vec<TimerHandle>>>,
    pub(crate) registration_timers: Arc<Mutex<Vec<TimerHandle>>>,
    pub(crate) events: mpsc::UnboundedSender<EngineEvent>,
    pub(crate) last_received: Arc<Mutex<Option<Instant>>>,
    pub(crate) running: Arc<AtomicBool>,
    receive_task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl SipEngine {
    /// Bind the signaling socket with a wall-clock scheduler and a fresh
    /// registry. Events are delivered on the returned receiver.
    pub async fn bind(
        config: EngineConfig,
    ) -> DialogResult<(Self, mpsc::UnboundedReceiver<EngineEvent>)> {
        Self::bind_with(config, Arc::new(TokioScheduler), Arc::new(CallRegistry::new())).await
    }

    /// Bind with an injected scheduler and registry
    pub async fn bind_with(
        config: EngineConfig,
        scheduler: Arc<dyn Scheduler>,
        registry: Arc<CallRegistry>,
    ) -> DialogResult<(Self, mpsc::UnboundedReceiver<EngineEvent>)> {
        config.validate()?;
        let transport = UdpTransport::bind(config.bind_addr).await?;
        let (events, rx) = mpsc::unbounded_channel();
        let registration = RegistrationContext::new(
            config.mode,
            generate_call_id(&config.local_ip),
            generate_tag(),
        );
        info!(
            "SIP engine bound to {} in {:?} mode",
            transport.local_addr(),
            config.mode
        );
        let engine = Self {
            config: Arc::new(config),
            transport: Arc::new(transport),
            scheduler,
            registry,
            registration: Arc::new(Mutex::new(registration)),
            call_timers: Arc::new(DashMap::new()),
            registration_timers: Arc::new(Mutex::new(Vec::new())),
            events,
            last_received: Arc::new(Mutex::new(None)),
            running: Arc::new(AtomicBool::new(false)),
            receive_task: Arc::new(Mutex::new(None)),
        };
        Ok((engine, rx))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    pub fn registry(&self) -> &Arc<CallRegistry> {
        &self.registry
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn registration_state(&self) -> RegistrationState {
        self.registration.lock().snapshot(self.scheduler.now())
    }

    /// Client mode: the registrar. Trunk mode: the learned PBX address.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.registration.lock().pbx_addr
    }

    /// Snapshot of one call
    pub fn call(&self, call_id: &str) -> Option<Call> {
        self.registry.get(call_id).map(|call| call.lock().clone())
    }

    pub fn call_state(&self, call_id: &str) -> Option<CallState> {
        self.registry.get(call_id).map(|call| call.lock().state())
    }

    /// Start receiving. Client mode registers to the PBX and keeps the
    /// registration alive; trunk mode is ready immediately.
    pub async fn start(&self) -> DialogResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let engine = self.clone();
        *self.receive_task.lock() = Some(tokio::spawn(engine.receive_loop()));

        match self.config.mode {
            RegistrationMode::Client => {
                let target = self.resolve_pbx().await?;
                self.registration.lock().pbx_addr = Some(target);
                info!("registering to {}", target);
                if let Err(e) = self.send_register(self.config.register_expires, false).await {
                    warn!("initial REGISTER failed: {}", e);
                    self.registration_failed(format!("send failed: {e}"));
                }
                self.schedule_health_check();
            }
            RegistrationMode::Trunk => {
                self.registration.lock().status = Status::Listening;
                info!("listening for PBX registration on {}", self.local_addr());
            }
        }
        Ok(())
    }

    /// De-register, hang up every call, cancel every timer and stop the
    /// receive loop
    pub async fn stop(&self) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }
        info!("stopping SIP engine");
        for call_id in self.registry.call_ids() {
            if let Err(e) = self.hangup(&call_id, "shutdown").await {
                debug!("hangup of {} during shutdown: {}", call_id, e);
            }
        }
        if self.registration.lock().is_registered() {
            if let Err(e) = self.send_register(0, false).await {
                warn!("de-registration failed: {}", e);
            }
        }
        self.cancel_registration_timers();
        for mut entry in self.call_timers.iter_mut() {
            entry.value_mut().drain(..).for_each(|t| t.cancel());
        }
        self.call_timers.clear();
        self.running.store(false, Ordering::SeqCst);
        let task = self.receive_task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!("receive loop ended abnormally: {}", e);
            }
        }
        self.registration.lock().status = Status::Unregistered;
    }

    async fn resolve_pbx(&self) -> DialogResult<SocketAddr> {
        let host = self.config.pbx_host.clone().unwrap_or_default();
        let port = self.config.pbx_port;
        tokio::net::lookup_host((host.as_str(), port))
            .await?
            .next()
            .ok_or(DialogError::Resolve(format!("{host}:{port}")))
    }

    async fn receive_loop(self) {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let poll = self.config.timers.receive_timeout;
        debug!("receive loop started");
        while self.running.load(Ordering::SeqCst) {
            match self.transport.receive(&mut buf, poll).await {
                Ok(Inbound::Message { message, source }) => {
                    self.touch();
                    let engine = self.clone();
                    tokio::spawn(async move { engine.dispatch(message, source).await });
                }
                Ok(Inbound::Ignored { .. }) => self.touch(),
                Ok(Inbound::Idle) => {}
                // ICMP port unreachable from an earlier send surfaces here
                Err(e) => debug!("receive error: {}", e),
            }
        }
        debug!("receive loop stopped");
    }

    fn touch(&self) {
        *self.last_received.lock() = Some(self.scheduler.now());
    }

    /// Route one parsed message to its handler
    pub(crate) async fn dispatch(&self, message: Message, source: SocketAddr) {
        let result = match message {
            Message::Request(request) => self.dispatch_request(request, source).await,
            Message::Response(response) => self.dispatch_response(response, source).await,
        };
        if let Err(e) = result {
            warn!("error handling message from {}: {}", source, e);
        }
    }

    async fn dispatch_request(&self, request: Request, source: SocketAddr) -> DialogResult<()> {
        match request.method {
            Method::Register => self.handle_register_method(request, source).await,
            Method::Invite => self.handle_invite_method(request, source).await,
            Method::Ack => self.handle_ack_method(request, source).await,
            Method::Bye => self.handle_bye_method(request, source).await,
            Method::Cancel => self.handle_cancel_method(request, source).await,
            Method::Options => self.handle_options_method(request, source).await,
            _ => {
                info!("{} not implemented", request.method);
                let response = self.response(&request, StatusCode::NotImplemented).build();
                self.send_response(&response, source).await
            }
        }
    }

    async fn dispatch_response(&self, response: Response, source: SocketAddr) -> DialogResult<()> {
        match response.headers.cseq.method {
            Method::Register => self.handle_register_response(response, source).await,
            Method::Invite => self.handle_invite_response(response, source).await,
            ref method => {
                debug!(
                    "{} {} to {} for {}",
                    response.status.as_u16(),
                    response.reason,
                    method,
                    response.call_id()
                );
                Ok(())
            }
        }
    }

    // --- shared helpers for handlers and operations ---

    pub(crate) fn emit(&self, event: EngineEvent) {
        debug!("engine event: {:?}", event);
        if self.events.send(event).is_err() {
            debug!("engine event receiver dropped");
        }
    }

    pub(crate) async fn send_request(&self, request: &Request, dest: SocketAddr) -> DialogResult<()> {
        self.transport.send(&Message::Request(request.clone()), dest).await
    }

    pub(crate) async fn send_response(&self, response: &Response, dest: SocketAddr) -> DialogResult<()> {
        self.transport.send(&Message::Response(response.clone()), dest).await
    }

    /// Response skeleton carrying our Server header
    pub(crate) fn response(&self, request: &Request, status: StatusCode) -> ResponseBuilder {
        ResponseBuilder::from_request(request, status).server(&self.config.user_agent)
    }

    /// Same, with `Allow` for responses that advertise capabilities
    pub(crate) fn response_with_allow(&self, request: &Request, status: StatusCode) -> ResponseBuilder {
        self.response(request, status).header("Allow", ALLOWED_METHODS)
    }

    pub(crate) fn new_via(&self) -> Via {
        Via::udp(self.config.local_ip.clone(), self.local_addr().port(), generate_branch())
    }

    pub(crate) fn contact(&self) -> NameAddr {
        NameAddr::sip(
            &self.config.credentials.username,
            &self.config.local_ip,
            Some(self.local_addr().port()),
        )
    }

    /// SIP domain for Request-URIs and address-of-record
    pub(crate) fn domain(&self) -> String {
        if let Some(domain) = &self.config.domain {
            return domain.clone();
        }
        if let Some(host) = &self.config.pbx_host {
            return host.clone();
        }
        self.peer_addr()
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| self.config.local_ip.clone())
    }

    pub(crate) fn track_timer(&self, owner: &TimerOwner, handle: TimerHandle) {
        match owner {
            TimerOwner::Call(call_id) => {
                if !self.registry.contains(call_id) {
                    handle.cancel();
                    return;
                }
                self.call_timers.entry(call_id.clone()).or_default().push(handle);
            }
            TimerOwner::Registration => self.registration_timers.lock().push(handle),
        }
    }

    pub(crate) fn cancel_call_timers(&self, call_id: &str) {
        if let Some((_, timers)) = self.call_timers.remove(call_id) {
            timers.iter().for_each(TimerHandle::cancel);
        }
    }

    pub(crate) fn cancel_registration_timers(&self) {
        let timers: Vec<_> = self.registration_timers.lock().drain(..).collect();
        timers.iter().for_each(TimerHandle::cancel);
    }

    /// Terminate a call, drop its timers and remove it from the registry.
    ///
    /// Returns the final snapshot to whichever caller actually removed the
    /// call, `None` to everyone else.
    pub(crate) fn finish_call(&self, call_id: &str) -> Option<Call> {
        self.cancel_call_timers(call_id);
        let shared = self.registry.get(call_id)?;
        let snapshot = {
            let mut call = shared.lock();
            call.terminate();
            call.clone()
        };
        self.registry.remove(call_id).map(|_| snapshot)
    }

    /// Run `task` after `delay` on behalf of `owner`
    pub(crate) fn schedule_for<F>(&self, owner: TimerOwner, delay: std::time::Duration, task: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let handle = self.scheduler.schedule(delay, task.boxed());
        self.track_timer(&owner, handle);
    }
}

impl std::fmt::Debug for SipEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SipEngine")
            .field("local_addr", &self.local_addr())
            .field("mode", &self.config.mode)
            .field("calls", &self.registry.len())
            .field("running", &self.is_running())
            .finish()
    }
}
