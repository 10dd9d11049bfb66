//! Inbound INVITE and ACK
//!
//! An INVITE from the PBX creates an incoming call in `Ringing`, answered
//! with 100 Trying and 180 Ringing; the owner is told which number was
//! dialed. The ACK to our 200 OK confirms the call.

use std::net::SocketAddr;
use tracing::{debug, info, warn};

use sip_core::sdp::{self, SdpInfo};
use sip_core::utils::generate_tag;
use sip_core::{NameAddr, Request, StatusCode};

use crate::dialog::{Call, CallDirection, CallState};
use crate::errors::{DialogError, DialogResult};
use crate::events::EngineEvent;
use crate::manager::SipEngine;

/// INVITE-specific handling operations
pub trait InviteHandler {
    /// Handle an INVITE from the PBX
    fn handle_invite_method(
        &self,
        request: Request,
        source: SocketAddr,
    ) -> impl std::future::Future<Output = DialogResult<()>> + Send;

    /// Handle the ACK completing an INVITE transaction
    fn handle_ack_method(
        &self,
        request: Request,
        source: SocketAddr,
    ) -> impl std::future::Future<Output = DialogResult<()>> + Send;
}

impl InviteHandler for SipEngine {
    async fn handle_invite_method(&self, request: Request, source: SocketAddr) -> DialogResult<()> {
        let call_id = request.call_id().to_string();

        if let Some(existing) = self.registry.get(&call_id) {
            let (direction, state) = {
                let call = existing.lock();
                (call.direction, call.state())
            };
            if direction == CallDirection::Incoming && state.is_pending() {
                debug!("INVITE retransmission for {}", call_id);
                let trying = self.response(&request, StatusCode::Trying).build();
                return self.send_response(&trying, source).await;
            }
            info!("rejecting re-INVITE for {} in state {}", call_id, state);
            let reject = self.response(&request, StatusCode::NotAcceptableHere).build();
            return self.send_response(&reject, source).await;
        }

        let offer = match parse_offer(&request.body, &self.config.codecs) {
            Ok(offer) => offer,
            Err(reason) => {
                warn!("rejecting INVITE {}: {}", call_id, reason);
                let reject = self
                    .response(&request, StatusCode::NotAcceptableHere)
                    .to_tag(&generate_tag())
                    .build();
                return self.send_response(&reject, source).await;
            }
        };

        let headers = &request.headers;
        let dialed = NameAddr::new(request.uri.clone())
            .user()
            .or_else(|| headers.to.user())
            .unwrap_or_default()
            .to_string();
        let caller = headers
            .from
            .user()
            .or(headers.from.display_name.as_deref())
            .unwrap_or("anonymous")
            .to_string();

        let mut call = Call::new(
            call_id.clone(),
            CallDirection::Incoming,
            headers.from.clone(),
            headers.to.clone(),
            source,
        );
        call.ensure_local_tag(generate_tag);
        call.via = headers.via.clone();
        call.remote_target = headers.contact.as_ref().map(|c| c.uri.clone());
        call.dialed = dialed.clone();
        call.caller = caller.clone();
        if let Some(offer) = &offer {
            call.remote_rtp = offer.rtp_endpoint();
            call.codec = offer.choose_codec(&self.config.codecs);
        }
        call.invite = Some(request.clone());
        call.advance(CallState::Ringing);
        let to = call.to.clone();

        let trying = self.response(&request, StatusCode::Trying).build();
        match self.registry.insert(call) {
            Ok(_) => {}
            Err(DialogError::DuplicateCall(_)) => {
                // Lost a race with a retransmission of the same INVITE
                return self.send_response(&trying, source).await;
            }
            Err(e) => return Err(e),
        }

        info!("incoming call {} from {} to {}", call_id, caller, dialed);
        // The PBX retransmits its INVITE until a provisional gets through
        if let Err(e) = self.send_response(&trying, source).await {
            warn!("100 Trying for {} failed: {}", call_id, e);
        }
        let ringing = self
            .response(&request, StatusCode::Ringing)
            .to(to)
            .contact(self.contact())
            .build();
        if let Err(e) = self.send_response(&ringing, source).await {
            warn!("180 Ringing for {} failed: {}", call_id, e);
        }

        self.emit(EngineEvent::IncomingCall {
            call_id,
            dialed,
            caller,
        });
        Ok(())
    }

    async fn handle_ack_method(&self, request: Request, _source: SocketAddr) -> DialogResult<()> {
        let call_id = request.call_id();
        let Some(shared) = self.registry.get(call_id) else {
            debug!("ACK for unknown call {}", call_id);
            return Ok(());
        };

        let confirmed = {
            let mut call = shared.lock();
            if call.direction != CallDirection::Incoming {
                return Ok(());
            }
            // Late offer: our 200 OK carried the offer, the ACK the answer
            if call.remote_rtp.is_none() && !request.body.trim().is_empty() {
                match sdp::parse(&request.body) {
                    Ok(answer) => {
                        call.remote_rtp = answer.rtp_endpoint();
                        if call.codec.is_none() {
                            call.codec = answer.choose_codec(&self.config.codecs);
                        }
                    }
                    Err(e) => warn!("unusable SDP in ACK for {}: {}", call_id, e),
                }
            }
            call.state() == CallState::Answered && call.advance(CallState::Confirmed)
        };

        if confirmed {
            info!("call {} confirmed", call_id);
            self.emit(EngineEvent::CallConfirmed {
                call_id: call_id.to_string(),
            });
        }
        Ok(())
    }
}

/// Offer of an inbound INVITE; `None` for a late offer (no body)
fn parse_offer(body: &str, supported: &[u8]) -> Result<Option<SdpInfo>, String> {
    if body.trim().is_empty() {
        return Ok(None);
    }
    let offer = sdp::parse(body).map_err(|e| e.to_string())?;
    if offer.choose_codec(supported).is_none() {
        return Err(format!("no supported codec in {:?}", offer.codecs));
    }
    Ok(Some(offer))
}
