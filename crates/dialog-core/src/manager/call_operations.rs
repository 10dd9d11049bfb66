//! Call control operations driven by the gateway

use tracing::{debug, info, warn};

use sip_core::sdp;
use sip_core::utils::{generate_call_id, generate_tag};
use sip_core::StatusCode;

use super::engine::SipEngine;
use crate::config::RegistrationMode;
use crate::dialog::{Call, CallDirection, CallState, HangupAction};
use crate::errors::{DialogError, DialogResult};
use crate::events::EngineEvent;

impl SipEngine {
    /// Place a call to `target` on the PBX, offering audio on
    /// `local_rtp_port`. `display_id` becomes the caller identity.
    ///
    /// Trunk mode fails with [`DialogError::NoPeerKnown`] until the PBX has
    /// registered.
    pub async fn make_call(&self, target: &str, local_rtp_port: u16, display_id: &str) -> DialogResult<Call> {
        if !self.is_running() {
            return Err(DialogError::NotStarted);
        }
        let dest = match (self.config.mode, self.peer_addr()) {
            (_, Some(addr)) => addr,
            (RegistrationMode::Trunk, None) => return Err(DialogError::NoPeerKnown),
            (RegistrationMode::Client, None) => return Err(DialogError::NotStarted),
        };

        let call_id = generate_call_id(&self.config.local_ip);
        let invite = self.build_invite(&call_id, target, display_id, local_rtp_port)?;
        let cseq = invite.headers.cseq.seq;
        let data = invite.to_bytes();

        let mut call = Call::new(
            call_id.clone(),
            CallDirection::Outgoing,
            invite.headers.from.clone(),
            invite.headers.to.clone(),
            dest,
        );
        call.via = invite.headers.via.clone();
        call.local_rtp_port = local_rtp_port;
        call.local_cseq = cseq;
        call.dialed = target.to_string();
        call.caller = display_id.to_string();
        call.invite = Some(invite.clone());
        let snapshot = call.clone();
        self.registry.insert(call)?;

        info!("calling {} at {} ({})", target, dest, call_id);
        if let Err(e) = self.send_request(&invite, dest).await {
            // Retransmissions and the timeout still apply
            warn!("sending INVITE for {} failed: {}", call_id, e);
        }
        self.schedule_invite_retransmits(&call_id, cseq, data, dest);
        self.schedule_invite_timeout(&call_id, cseq);
        Ok(snapshot)
    }

    /// Answer an incoming call with audio on `local_rtp_port`
    pub async fn answer_call(&self, call_id: &str, local_rtp_port: u16) -> DialogResult<()> {
        let shared = self
            .registry
            .get(call_id)
            .ok_or_else(|| DialogError::CallNotFound(call_id.to_string()))?;

        let (response, dest) = {
            let mut call = shared.lock();
            let state = call.state();
            if call.direction != CallDirection::Incoming || !state.is_pending() {
                return Err(DialogError::invalid_state(call_id, state, "answer"));
            }
            let Some(invite) = call.invite.clone() else {
                return Err(DialogError::invalid_state(call_id, state, "answer"));
            };
            call.ensure_local_tag(generate_tag);
            call.local_rtp_port = local_rtp_port;

            // Negotiated codec first, the rest of our preference after it
            let mut codecs = Vec::with_capacity(self.config.codecs.len());
            codecs.extend(call.codec);
            codecs.extend(self.config.codecs.iter().copied().filter(|pt| Some(*pt) != call.codec));
            let answer = sdp::build(&self.config.local_ip, local_rtp_port, &codecs);

            let response = self
                .response_with_allow(&invite, StatusCode::Ok)
                .to(call.to.clone())
                .contact(self.contact())
                .sdp(answer)
                .build();
            call.advance(CallState::Answered);
            (response, call.peer)
        };

        info!("answering {} with RTP port {}", call_id, local_rtp_port);
        let data = response.to_bytes();
        if let Err(e) = self.send_response(&response, dest).await {
            warn!("sending 200 OK for {} failed: {}", call_id, e);
        }
        self.schedule_answer_retransmits(call_id, data, dest);
        Ok(())
    }

    /// End a call in whatever way its state requires.
    ///
    /// Pending timers are cancelled and the call is terminated and removed
    /// even when sending fails.
    pub async fn hangup(&self, call_id: &str, reason: &str) -> DialogResult<()> {
        self.cancel_call_timers(call_id);
        let shared = self
            .registry
            .get(call_id)
            .ok_or_else(|| DialogError::CallNotFound(call_id.to_string()))?;

        let (action, outbound) = {
            let mut call = shared.lock();
            let action = call.hangup_action();
            let outbound = match action {
                HangupAction::Cancel => call
                    .invite
                    .as_ref()
                    .map(|invite| self.build_cancel(invite).map(sip_core::Message::from)),
                HangupAction::Bye => {
                    let cseq = call.next_cseq();
                    Some(self.build_bye(&call, cseq).map(sip_core::Message::from))
                }
                HangupAction::Decline => {
                    call.ensure_local_tag(generate_tag);
                    call.invite.as_ref().map(|invite| {
                        Ok(self
                            .response(invite, StatusCode::Decline)
                            .to(call.to.clone())
                            .build()
                            .into())
                    })
                }
                HangupAction::Nothing => None,
            };
            call.terminate();
            (action, outbound.map(|m| (m, call.peer)))
        };

        debug!("hangup {} ({}): {:?}", call_id, reason, action);
        let result = match outbound {
            Some((Ok(message), dest)) => self.transport.send(&message, dest).await,
            Some((Err(e), _)) => Err(e),
            None => Ok(()),
        };

        if let Some(call) = self.finish_call(call_id) {
            info!("call {} ended: {}", call.call_id, reason);
            self.emit(EngineEvent::CallEnded {
                call_id: call.call_id,
                reason: reason.to_string(),
            });
        }
        result
    }
}
