//! Requests the engine originates

use sip_core::sdp;
use sip_core::utils::generate_tag;
use sip_core::{
    ALLOWED_METHODS, Authorization, Method, NameAddr, Request, RequestBuilder, Response,
};

use super::engine::SipEngine;
use crate::dialog::Call;
use crate::errors::DialogResult;
use crate::registration::RegistrationContext;

impl SipEngine {
    /// REGISTER for the configured account, with credentials when a
    /// challenge is known
    pub(crate) fn build_register(&self, ctx: &RegistrationContext, cseq: u32, expires: u32) -> DialogResult<Request> {
        let domain = self.domain();
        let uri = format!("sip:{domain}");
        let user = &self.config.credentials.username;
        let aor = NameAddr::sip(user, &domain, None);

        let mut builder = RequestBuilder::new(Method::Register, uri.clone())
            .via(self.new_via())
            .from(aor.clone().with_tag(ctx.from_tag.clone()))
            .to(aor)
            .call_id(ctx.call_id.clone())
            .cseq(cseq)
            .contact(self.contact().with_param("expires", Some(expires.to_string())))
            .expires(expires)
            .header("Allow", ALLOWED_METHODS)
            .user_agent(&self.config.user_agent);
        if let Some((challenge, header)) = &ctx.challenge {
            let auth = Authorization::new(challenge, &self.config.credentials, &Method::Register, &uri);
            builder = builder.header(header.name(), auth.to_string());
        }
        Ok(builder.build()?)
    }

    /// Initial INVITE of an outgoing call with an SDP offer
    pub(crate) fn build_invite(
        &self,
        call_id: &str,
        target: &str,
        display_id: &str,
        local_rtp_port: u16,
    ) -> DialogResult<Request> {
        let domain = self.domain();
        let uri = format!("sip:{target}@{domain}");
        let identity = if display_id.is_empty() {
            self.config.credentials.username.as_str()
        } else {
            display_id
        };
        let mut from = NameAddr::sip(identity, &domain, None).with_tag(generate_tag());
        if !display_id.is_empty() {
            from = from.with_display_name(display_id);
        }
        let offer = sdp::build(&self.config.local_ip, local_rtp_port, &self.config.codecs);

        Ok(RequestBuilder::new(Method::Invite, uri.clone())
            .via(self.new_via())
            .from(from)
            .to(NameAddr::new(uri))
            .call_id(call_id)
            .cseq(1)
            .contact(self.contact())
            .header("Allow", ALLOWED_METHODS)
            .user_agent(&self.config.user_agent)
            .sdp(offer)
            .build()?)
    }

    /// ACK for a 2xx: a new transaction inside the dialog
    pub(crate) fn build_ack_for_success(&self, call: &Call, cseq: u32) -> DialogResult<Request> {
        Ok(RequestBuilder::new(Method::Ack, call.remote_uri())
            .via(self.new_via())
            .from(call.local_party().clone())
            .to(call.remote_party().clone())
            .call_id(call.call_id.clone())
            .cseq(cseq)
            .contact(self.contact())
            .user_agent(&self.config.user_agent)
            .build()?)
    }

    /// ACK for a non-2xx final response: part of the INVITE transaction,
    /// so it reuses the response's top Via and To
    pub(crate) fn build_ack_for_failure(&self, request_uri: &str, response: &Response) -> DialogResult<Request> {
        let headers = &response.headers;
        let mut builder = RequestBuilder::new(Method::Ack, request_uri)
            .from(headers.from.clone())
            .to(headers.to.clone())
            .call_id(headers.call_id.clone())
            .cseq(headers.cseq.seq)
            .user_agent(&self.config.user_agent);
        builder = match headers.top_via() {
            Some(via) => builder.via(via.clone()),
            None => builder.via(self.new_via()),
        };
        Ok(builder.build()?)
    }

    /// In-dialog BYE with From/To oriented by who placed the call
    pub(crate) fn build_bye(&self, call: &Call, cseq: u32) -> DialogResult<Request> {
        Ok(RequestBuilder::new(Method::Bye, call.remote_uri())
            .via(self.new_via())
            .from(call.local_party().clone())
            .to(call.remote_party().clone())
            .call_id(call.call_id.clone())
            .cseq(cseq)
            .user_agent(&self.config.user_agent)
            .build()?)
    }

    /// CANCEL matching our INVITE: same Request-URI, Via, From, To,
    /// Call-ID and CSeq number
    pub(crate) fn build_cancel(&self, invite: &Request) -> DialogResult<Request> {
        let headers = &invite.headers;
        let mut builder = RequestBuilder::new(Method::Cancel, invite.uri.clone())
            .from(headers.from.clone())
            .to(headers.to.clone())
            .call_id(headers.call_id.clone())
            .cseq(headers.cseq.seq)
            .user_agent(&self.config.user_agent);
        for via in &headers.via {
            builder = builder.via(via.clone());
        }
        Ok(builder.build()?)
    }
}
