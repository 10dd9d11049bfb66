//! Retransmission chains and transaction timeouts
//!
//! A chain is one scheduled step per retransmission; each step re-checks
//! its pending condition when it fires and schedules the next one. Steps
//! use the configured intervals, repeating the last one, up to the
//! configured maximum count.

use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use sip_core::StatusCode;

use super::engine::{SipEngine, TimerOwner};
use crate::dialog::CallState;
use crate::events::EngineEvent;

/// Condition under which a chain keeps retransmitting
pub(crate) type PendingCheck = Arc<dyn Fn(&SipEngine) -> bool + Send + Sync>;

impl SipEngine {
    /// Schedule retransmission `attempt` (0-based) of `data`
    pub(crate) fn schedule_retransmit(
        &self,
        owner: TimerOwner,
        data: Bytes,
        dest: SocketAddr,
        attempt: usize,
        still_pending: PendingCheck,
    ) {
        let timers = &self.config.timers;
        if attempt >= timers.max_retransmits {
            return;
        }
        let delay = timers.retransmit_delay(attempt);
        let engine = self.clone();
        let task_owner = owner.clone();
        self.schedule_for(owner, delay, async move {
            if !engine.is_running() || !still_pending(&engine) {
                return;
            }
            debug!(
                "retransmission {}/{} to {}",
                attempt + 1,
                engine.config.timers.max_retransmits,
                dest
            );
            if let Err(e) = engine.transport.send_raw(&data, dest).await {
                warn!("retransmission to {} failed: {}", dest, e);
            }
            engine.schedule_retransmit(task_owner, data, dest, attempt + 1, still_pending);
        });
    }

    /// Retransmit our INVITE while the call is unanswered and the INVITE
    /// with this CSeq is still the current one
    pub(crate) fn schedule_invite_retransmits(&self, call_id: &str, cseq: u32, data: Bytes, dest: SocketAddr) {
        let id = call_id.to_string();
        let check: PendingCheck = Arc::new(move |engine: &SipEngine| {
            engine.registry.get(&id).is_some_and(|call| {
                let call = call.lock();
                call.state().is_pending() && invite_cseq(&call) == Some(cseq)
            })
        });
        self.schedule_retransmit(TimerOwner::Call(call_id.to_string()), data, dest, 0, check);
    }

    /// Retransmit our 200 OK until the ACK confirms the call
    pub(crate) fn schedule_answer_retransmits(&self, call_id: &str, data: Bytes, dest: SocketAddr) {
        let id = call_id.to_string();
        let check: PendingCheck = Arc::new(move |engine: &SipEngine| {
            engine.call_state(&id) == Some(CallState::Answered)
        });
        self.schedule_retransmit(TimerOwner::Call(call_id.to_string()), data, dest, 0, check);
    }

    /// Timer B: fail the call if it is still unanswered when the timeout
    /// elapses
    pub(crate) fn schedule_invite_timeout(&self, call_id: &str, cseq: u32) {
        let engine = self.clone();
        let id = call_id.to_string();
        let timeout = self.config.timers.invite_timeout;
        self.schedule_for(TimerOwner::Call(call_id.to_string()), timeout, async move {
            let expired = engine.registry.get(&id).is_some_and(|call| {
                let call = call.lock();
                call.state().is_pending() && invite_cseq(&call) == Some(cseq)
            });
            if !expired {
                return;
            }
            info!("INVITE for {} timed out after {:?}", id, timeout);
            if engine.finish_call(&id).is_some() {
                let status = StatusCode::RequestTimeout;
                engine.emit(EngineEvent::CallFailed {
                    call_id: id,
                    status,
                    reason: status.reason_phrase().to_string(),
                });
            }
        });
    }
}

fn invite_cseq(call: &crate::dialog::Call) -> Option<u32> {
    call.invite.as_ref().map(|invite| invite.headers.cseq.seq)
}
