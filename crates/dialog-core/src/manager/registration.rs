//! Client-mode registration: REGISTER transactions, renewal, retry and
//! the signaling health check

use std::sync::Arc;
use tracing::{info, warn};

use super::engine::{SipEngine, TimerOwner};
use super::retransmit::PendingCheck;
use crate::config::RegistrationMode;
use crate::errors::{DialogError, DialogResult};
use crate::events::EngineEvent;
use crate::registration::{PendingRegister, Status, renewal_delay};

impl SipEngine {
    /// Start a REGISTER transaction asking for `expires` seconds.
    ///
    /// `auth_retried` marks the resend that answers a challenge, so a
    /// second challenge in the same attempt fails it.
    pub(crate) async fn send_register(&self, expires: u32, auth_retried: bool) -> DialogResult<()> {
        let (request, dest, cseq) = {
            let mut ctx = self.registration.lock();
            let dest = ctx.pbx_addr.ok_or(DialogError::NotStarted)?;
            let cseq = ctx.next_cseq();
            ctx.pending = Some(PendingRegister {
                cseq,
                expires,
                auth_retried,
            });
            if expires > 0 && !ctx.is_registered() {
                ctx.status = Status::Registering;
            }
            (self.build_register(&ctx, cseq, expires)?, dest, cseq)
        };

        let data = request.to_bytes();
        if let Err(e) = self.send_request(&request, dest).await {
            // No timer is armed yet to clear this attempt
            let mut ctx = self.registration.lock();
            if ctx.pending.as_ref().is_some_and(|p| p.cseq == cseq) {
                ctx.pending = None;
            }
            return Err(e);
        }

        let check: PendingCheck = Arc::new(move |engine: &SipEngine| {
            engine
                .registration
                .lock()
                .pending
                .as_ref()
                .is_some_and(|p| p.cseq == cseq)
        });
        self.schedule_retransmit(TimerOwner::Registration, data, dest, 0, check);
        self.schedule_register_timeout(cseq);
        Ok(())
    }

    fn schedule_register_timeout(&self, cseq: u32) {
        let engine = self.clone();
        let timeout = self.config.timers.invite_timeout;
        self.schedule_for(TimerOwner::Registration, timeout, async move {
            let expired = {
                let mut ctx = engine.registration.lock();
                let expired = ctx.pending.as_ref().is_some_and(|p| p.cseq == cseq);
                if expired {
                    ctx.pending = None;
                }
                expired
            };
            if expired {
                engine.registration_failed(format!("no response to REGISTER within {:?}", timeout));
            }
        });
    }

    /// Record a granted registration and schedule its renewal
    pub(crate) fn registration_succeeded(&self, expires: u32) {
        self.registration.lock().status = Status::Registered {
            expires,
            since: self.scheduler.now(),
        };
        info!("registered for {} seconds", expires);
        self.emit(EngineEvent::Registered { expires });

        let engine = self.clone();
        self.schedule_for(TimerOwner::Registration, renewal_delay(expires), async move {
            if !engine.is_running() {
                return;
            }
            info!("renewing registration");
            if let Err(e) = engine.send_register(engine.config.register_expires, false).await {
                engine.registration_failed(format!("renewal failed: {e}"));
            }
        });
    }

    /// Mark registration failed and schedule a fresh attempt
    pub(crate) fn registration_failed(&self, reason: String) {
        warn!("registration failed: {}", reason);
        self.registration.lock().status = Status::Failed(reason.clone());
        self.emit(EngineEvent::RegistrationFailed { reason });

        let engine = self.clone();
        self.schedule_for(TimerOwner::Registration, self.config.timers.register_retry, async move {
            let failed = matches!(engine.registration.lock().status, Status::Failed(_));
            if !engine.is_running() || !failed {
                return;
            }
            info!("retrying registration");
            if let Err(e) = engine.send_register(engine.config.register_expires, false).await {
                engine.registration_failed(format!("retry failed: {e}"));
            }
        });
    }

    /// Periodic check: re-register when calls are up but nothing has been
    /// heard from the PBX for longer than the dead threshold
    pub(crate) fn schedule_health_check(&self) {
        if self.config.mode != RegistrationMode::Client {
            return;
        }
        let engine = self.clone();
        let interval = self.config.timers.health_check_interval;
        self.schedule_for(TimerOwner::Registration, interval, async move {
            if !engine.is_running() {
                return;
            }
            let now = engine.scheduler.now();
            let silent_for = engine
                .last_received
                .lock()
                .map(|at| now.saturating_duration_since(at));
            let dead = silent_for.is_none_or(|d| d > engine.config.timers.dead_threshold);
            let pending = engine.registration.lock().pending.is_some();
            if dead && !engine.registry.is_empty() && !pending {
                warn!(
                    "no signaling from PBX for {:?} with {} active calls, re-registering",
                    silent_for,
                    engine.registry.len()
                );
                if let Err(e) = engine.send_register(engine.config.register_expires, false).await {
                    engine.registration_failed(format!("health check re-registration failed: {e}"));
                }
            }
            engine.schedule_health_check();
        });
    }
}
