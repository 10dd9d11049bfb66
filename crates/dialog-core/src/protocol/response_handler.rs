//! Responses to our INVITEs
//!
//! Provisional responses move an outgoing call through `Ringing` and
//! `EarlyMedia`, a 2xx is acknowledged and confirms it, and any other
//! final response is acknowledged and fails it. A single Digest
//! challenge is answered with an authenticated INVITE.

use std::net::SocketAddr;
use tracing::{debug, info, warn};

use sip_core::sdp;
use sip_core::{Authorization, Method, Request, Response, StatusCode};

use crate::dialog::{Call, CallDirection, CallState};
use crate::errors::DialogResult;
use crate::events::EngineEvent;
use crate::manager::SipEngine;
use crate::registration::challenge_of;

pub trait ResponseHandler {
    /// Handle a response whose CSeq method is INVITE
    fn handle_invite_response(
        &self,
        response: Response,
        source: SocketAddr,
    ) -> impl std::future::Future<Output = DialogResult<()>> + Send;
}

/// Next step for a final response, decided under the call lock
enum FinalStep {
    Ignore,
    /// Answered now: send the ACK and report it
    Answered { ack: Request, dest: SocketAddr },
    /// 2xx retransmission for a confirmed call
    Reack { ack: Request, dest: SocketAddr },
    /// Challenge answered: ACK the 401/407, then send the new INVITE
    Reauth {
        ack: Request,
        invite: Request,
        dest: SocketAddr,
    },
    Failed { ack: Request, dest: SocketAddr },
}

impl ResponseHandler for SipEngine {
    async fn handle_invite_response(&self, response: Response, source: SocketAddr) -> DialogResult<()> {
        let call_id = response.call_id().to_string();
        let status = response.status;

        let Some(shared) = self.registry.get(&call_id) else {
            if status.is_final() && !status.is_success() {
                // Still owed an ACK, e.g. the 487 after our CANCEL
                debug!("ACKing {} for finished call {}", status.as_u16(), call_id);
                let ack = self.build_ack_for_failure(&response.headers.to.uri, &response)?;
                self.send_request(&ack, source).await?;
            } else {
                debug!("{} for unknown call {}", status.as_u16(), call_id);
            }
            return Ok(());
        };

        if status.is_provisional() {
            let (progressed, early) = {
                let mut call = shared.lock();
                if call.direction != CallDirection::Outgoing || !call.state().is_pending() {
                    return Ok(());
                }
                call.learn_remote_tag(&response.headers.to);
                match status {
                    StatusCode::Trying => (false, false),
                    StatusCode::SessionProgress => {
                        let early = self.learn_remote_media(&mut call, &response.body);
                        let next = if early { CallState::EarlyMedia } else { CallState::Ringing };
                        (call.advance(next), early)
                    }
                    _ => (call.advance(CallState::Ringing), false),
                }
            };
            if status != StatusCode::Trying {
                debug!("call {} progress {} (state changed: {})", call_id, status.as_u16(), progressed);
                self.emit(EngineEvent::CallProgress {
                    call_id: call_id.clone(),
                    status,
                });
            }
            if early && progressed {
                self.emit(EngineEvent::EarlyMedia { call_id });
            }
            return Ok(());
        }

        let step = {
            let mut call = shared.lock();
            if call.direction != CallDirection::Outgoing {
                FinalStep::Ignore
            } else if status.is_success() {
                self.on_success(&mut call, &response)?
            } else {
                self.on_failure(&mut call, &response)?
            }
        };

        match step {
            FinalStep::Ignore => {}
            FinalStep::Answered { ack, dest } => {
                self.cancel_call_timers(&call_id);
                if let Err(e) = self.send_request(&ack, dest).await {
                    // The 2xx retransmission gets ACKed again
                    warn!("ACK for {} failed: {}", call_id, e);
                }
                info!("call {} answered", call_id);
                self.emit(EngineEvent::CallAnswered { call_id });
            }
            FinalStep::Reack { ack, dest } => {
                debug!("re-ACKing 2xx retransmission for {}", call_id);
                if let Err(e) = self.send_request(&ack, dest).await {
                    warn!("re-ACK for {} failed: {}", call_id, e);
                }
            }
            FinalStep::Reauth { ack, invite, dest } => {
                self.cancel_call_timers(&call_id);
                if let Err(e) = self.send_request(&ack, dest).await {
                    warn!("ACK of challenge for {} failed: {}", call_id, e);
                }
                info!("retrying INVITE for {} with credentials", call_id);
                let cseq = invite.headers.cseq.seq;
                if let Err(e) = self.send_request(&invite, dest).await {
                    warn!("sending authenticated INVITE for {} failed: {}", call_id, e);
                }
                self.schedule_invite_retransmits(&call_id, cseq, invite.to_bytes(), dest);
                self.schedule_invite_timeout(&call_id, cseq);
            }
            FinalStep::Failed { ack, dest } => {
                if let Err(e) = self.send_request(&ack, dest).await {
                    warn!("ACK for {} failed: {}", call_id, e);
                }
                if self.finish_call(&call_id).is_some() {
                    info!("call {} failed: {} {}", call_id, status.as_u16(), response.reason);
                    self.emit(EngineEvent::CallFailed {
                        call_id,
                        status,
                        reason: response.reason.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl SipEngine {
    /// Take the remote RTP endpoint and codec from an SDP body; true if
    /// the body described usable media
    fn learn_remote_media(&self, call: &mut Call, body: &str) -> bool {
        if body.trim().is_empty() {
            return false;
        }
        match sdp::parse(body) {
            Ok(info) => {
                if let Some(endpoint) = info.rtp_endpoint() {
                    call.remote_rtp = Some(endpoint);
                }
                if let Some(codec) = info.choose_codec(&self.config.codecs) {
                    call.codec = Some(codec);
                }
                call.remote_rtp.is_some()
            }
            Err(e) => {
                warn!("unusable SDP for {}: {}", call.call_id, e);
                false
            }
        }
    }

    fn on_success(&self, call: &mut Call, response: &Response) -> DialogResult<FinalStep> {
        let invite_cseq = response.headers.cseq.seq;
        if call.state() == CallState::Confirmed {
            let ack = self.build_ack_for_success(call, invite_cseq)?;
            return Ok(FinalStep::Reack { ack, dest: call.peer });
        }
        if !call.state().is_pending() {
            return Ok(FinalStep::Ignore);
        }
        call.learn_remote_tag(&response.headers.to);
        if let Some(contact) = &response.headers.contact {
            call.remote_target = Some(contact.uri.clone());
        }
        self.learn_remote_media(call, &response.body);
        call.advance(CallState::Answered);
        let ack = self.build_ack_for_success(call, invite_cseq)?;
        call.advance(CallState::Confirmed);
        Ok(FinalStep::Answered { ack, dest: call.peer })
    }

    fn on_failure(&self, call: &mut Call, response: &Response) -> DialogResult<FinalStep> {
        let request_uri = call
            .invite
            .as_ref()
            .map(|invite| invite.uri.clone())
            .unwrap_or_else(|| response.headers.to.uri.clone());
        let ack = self.build_ack_for_failure(&request_uri, response)?;
        if !call.state().is_pending() {
            return Ok(FinalStep::Ignore);
        }

        if response.status.is_auth_challenge() && !call.auth_retried {
            if let (Some((challenge, header)), Some(previous)) = (challenge_of(response), call.invite.clone()) {
                let auth = Authorization::new(&challenge, &self.config.credentials, &Method::Invite, &previous.uri);
                let mut invite = previous;
                invite.headers.via = vec![self.new_via()];
                invite.headers.cseq.seq += 1;
                invite.headers.push(header.name(), auth.to_string());
                call.local_cseq = invite.headers.cseq.seq;
                call.via = invite.headers.via.clone();
                call.invite = Some(invite.clone());
                call.auth_retried = true;
                return Ok(FinalStep::Reauth {
                    ack,
                    invite,
                    dest: call.peer,
                });
            }
        }
        Ok(FinalStep::Failed { ack, dest: call.peer })
    }
}
