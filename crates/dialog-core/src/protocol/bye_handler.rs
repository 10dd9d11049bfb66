//! BYE and CANCEL from the PBX

use std::net::SocketAddr;
use tracing::{debug, info, warn};

use sip_core::{Request, StatusCode};

use crate::dialog::CallDirection;
use crate::errors::DialogResult;
use crate::events::EngineEvent;
use crate::manager::SipEngine;

/// Handlers for requests that end a call
pub trait ByeHandler {
    /// Handle BYE requests for dialog termination
    fn handle_bye_method(
        &self,
        request: Request,
        source: SocketAddr,
    ) -> impl std::future::Future<Output = DialogResult<()>> + Send;

    /// Handle CANCEL of a pending incoming INVITE
    fn handle_cancel_method(
        &self,
        request: Request,
        source: SocketAddr,
    ) -> impl std::future::Future<Output = DialogResult<()>> + Send;
}

impl ByeHandler for SipEngine {
    async fn handle_bye_method(&self, request: Request, source: SocketAddr) -> DialogResult<()> {
        let call_id = request.call_id().to_string();
        // Always 200: a BYE retransmitted after we dropped the call must
        // still stop the PBX retransmitting it
        let ok = self.response(&request, StatusCode::Ok).build();
        if let Err(e) = self.send_response(&ok, source).await {
            warn!("200 OK to BYE for {} failed: {}", call_id, e);
        }

        match self.finish_call(&call_id) {
            Some(_) => {
                info!("call {} ended by remote BYE", call_id);
                self.emit(EngineEvent::CallEnded {
                    call_id,
                    reason: "remote hangup".to_string(),
                });
            }
            None => debug!("BYE for unknown call {}", call_id),
        }
        Ok(())
    }

    async fn handle_cancel_method(&self, request: Request, source: SocketAddr) -> DialogResult<()> {
        let call_id = request.call_id().to_string();
        let ok = self.response(&request, StatusCode::Ok).build();
        if let Err(e) = self.send_response(&ok, source).await {
            warn!("200 OK to CANCEL for {} failed: {}", call_id, e);
        }

        let Some(shared) = self.registry.get(&call_id) else {
            debug!("CANCEL for unknown call {}", call_id);
            return Ok(());
        };

        // The INVITE transaction itself ends with 487 if still unanswered
        let terminated = {
            let call = shared.lock();
            if call.direction == CallDirection::Incoming && call.state().is_pending() {
                call.invite.as_ref().map(|invite| {
                    self.response(invite, StatusCode::RequestTerminated)
                        .to(call.to.clone())
                        .build()
                }).map(|response| (response, call.peer))
            } else {
                None
            }
        };
        if let Some((response, peer)) = terminated {
            if let Err(e) = self.send_response(&response, peer).await {
                warn!("487 for cancelled {} failed: {}", call_id, e);
            }
        }

        if self.finish_call(&call_id).is_some() {
            info!("call {} cancelled by PBX", call_id);
            self.emit(EngineEvent::CallEnded {
                call_id,
                reason: "cancelled".to_string(),
            });
        }
        Ok(())
    }
}
