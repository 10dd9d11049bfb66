//! REGISTER in both directions
//!
//! Trunk mode answers the PBX's REGISTER and learns where to send calls.
//! Client mode handles the registrar's responses to our REGISTER,
//! answering a Digest challenge once per attempt.

use std::net::SocketAddr;
use tracing::{debug, info, warn};

use sip_core::utils::generate_tag;
use sip_core::{Request, Response, StatusCode};

use crate::config::RegistrationMode;
use crate::errors::DialogResult;
use crate::events::EngineEvent;
use crate::manager::SipEngine;
use crate::registration::{Status, challenge_of, granted_expiry};

/// REGISTER request and response handling
pub trait RegisterHandler {
    /// Handle a REGISTER from the PBX
    fn handle_register_method(
        &self,
        request: Request,
        source: SocketAddr,
    ) -> impl std::future::Future<Output = DialogResult<()>> + Send;

    /// Handle the registrar's response to our REGISTER
    fn handle_register_response(
        &self,
        response: Response,
        source: SocketAddr,
    ) -> impl std::future::Future<Output = DialogResult<()>> + Send;
}

/// What a REGISTER response leads to, decided under the context lock
enum Outcome {
    Ignore,
    Unregistered,
    Registered(u32),
    Challenged(u32),
    Failed(String),
}

impl RegisterHandler for SipEngine {
    async fn handle_register_method(&self, request: Request, source: SocketAddr) -> DialogResult<()> {
        if self.config.mode == RegistrationMode::Client {
            debug!("REGISTER from {} refused in client mode", source);
            let response = self
                .response_with_allow(&request, StatusCode::MethodNotAllowed)
                .build();
            return self.send_response(&response, source).await;
        }

        let expires = request
            .headers
            .expires
            .or_else(|| {
                request
                    .headers
                    .contact
                    .as_ref()
                    .and_then(|c| c.param("expires"))
                    .and_then(|v| v.parse().ok())
            })
            .unwrap_or(self.config.register_expires);

        // Latest REGISTER wins
        let changed = self.registration.lock().learn_peer(source);

        let mut builder = self
            .response(&request, StatusCode::Ok)
            .to_tag(&generate_tag())
            .expires(expires);
        if let Some(contact) = &request.headers.contact {
            builder = builder.contact(contact.clone().with_param("expires", Some(expires.to_string())));
        }
        if let Err(e) = self.send_response(&builder.build(), source).await {
            warn!("200 OK to REGISTER from {} failed: {}", source, e);
        }

        if changed {
            info!("PBX registered from {} for {} seconds", source, expires);
            self.emit(EngineEvent::PeerLearned { addr: source });
        } else {
            debug!("PBX refreshed registration from {}", source);
        }
        Ok(())
    }

    async fn handle_register_response(&self, response: Response, _source: SocketAddr) -> DialogResult<()> {
        let status = response.status;
        if status.is_provisional() {
            return Ok(());
        }

        let outcome = {
            let mut ctx = self.registration.lock();
            let matches = ctx.call_id == response.call_id()
                && ctx
                    .pending
                    .as_ref()
                    .is_some_and(|p| p.cseq == response.headers.cseq.seq);
            match ctx.pending.take() {
                Some(pending) if matches => {
                    if status.is_success() {
                        if pending.expires == 0 {
                            ctx.status = Status::Unregistered;
                            Outcome::Unregistered
                        } else {
                            Outcome::Registered(granted_expiry(&response, pending.expires))
                        }
                    } else if status.is_auth_challenge() {
                        match challenge_of(&response) {
                            Some(challenge) if !pending.auth_retried => {
                                ctx.challenge = Some(challenge);
                                Outcome::Challenged(pending.expires)
                            }
                            Some(_) => Outcome::Failed("credentials rejected".to_string()),
                            None => Outcome::Failed(format!("{} without a Digest challenge", status.as_u16())),
                        }
                    } else {
                        Outcome::Failed(format!("{} {}", status.as_u16(), response.reason))
                    }
                }
                other => {
                    ctx.pending = other;
                    Outcome::Ignore
                }
            }
        };

        match outcome {
            Outcome::Ignore => debug!(
                "stray REGISTER response {} for CSeq {}",
                status.as_u16(),
                response.headers.cseq.seq
            ),
            Outcome::Unregistered => {
                self.cancel_registration_timers();
                info!("unregistered");
            }
            Outcome::Registered(expires) => {
                self.cancel_registration_timers();
                self.registration_succeeded(expires);
                if self.is_running() {
                    self.schedule_health_check();
                }
            }
            Outcome::Challenged(expires) => {
                self.cancel_registration_timers();
                debug!("answering {} challenge", status.as_u16());
                if let Err(e) = self.send_register(expires, true).await {
                    warn!("authenticated REGISTER failed: {}", e);
                    self.registration_failed(format!("send failed: {e}"));
                }
            }
            Outcome::Failed(reason) => {
                self.cancel_registration_timers();
                self.registration_failed(reason);
                if self.is_running() {
                    self.schedule_health_check();
                }
            }
        }
        Ok(())
    }
}
