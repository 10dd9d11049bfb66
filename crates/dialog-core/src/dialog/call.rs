//! The Call record: one per SIP dialog

use std::net::SocketAddr;

use sip_core::{NameAddr, Request, Via};
use tracing::{debug, trace};

use crate::dialog::CallState;

/// Which side sent the initial INVITE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallDirection {
    /// The PBX called us
    Incoming,
    /// We called the PBX
    Outgoing,
}

/// Protocol action that ends a call in its current state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HangupAction {
    Cancel,
    Bye,
    Decline,
    /// Already terminated, or nothing on the wire can end it
    Nothing,
}

/// One call's dialog state
///
/// `from` and `to` are kept as they appeared on the initial INVITE, with
/// the tags filled in as they become known. For an incoming call our
/// identity is therefore `to`, for an outgoing one it is `from`.
#[derive(Debug, Clone)]
pub struct Call {
    pub call_id: String,
    pub direction: CallDirection,
    pub from: NameAddr,
    pub to: NameAddr,
    /// Via list of the initial INVITE
    pub via: Vec<Via>,
    /// Remote Contact URI, the Request-URI of in-dialog requests
    pub remote_target: Option<String>,
    /// Our next CSeq number for in-dialog requests
    pub local_cseq: u32,
    state: CallState,
    /// Remote RTP endpoint learned from SDP
    pub remote_rtp: Option<SocketAddr>,
    /// Negotiated payload type
    pub codec: Option<u8>,
    pub local_rtp_port: u16,
    /// Transport address of the other party
    pub peer: SocketAddr,
    /// The initial INVITE, kept for CANCEL and for answering
    pub invite: Option<Request>,
    /// Dialed number of an incoming call, target of an outgoing one
    pub dialed: String,
    /// Caller identity
    pub caller: String,
    /// An authenticated INVITE was already sent
    pub auth_retried: bool,
}

impl Call {
    pub fn new(
        call_id: impl Into<String>,
        direction: CallDirection,
        from: NameAddr,
        to: NameAddr,
        peer: SocketAddr,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            direction,
            from,
            to,
            via: Vec::new(),
            remote_target: None,
            local_cseq: 1,
            state: CallState::Idle,
            remote_rtp: None,
            codec: None,
            local_rtp_port: 0,
            peer,
            invite: None,
            dialed: String::new(),
            caller: String::new(),
            auth_retried: false,
        }
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    /// Move forward in the lattice.
    ///
    /// Returns false, leaving the state untouched, for a backward or
    /// repeated move or any move out of `Terminated`.
    pub fn advance(&mut self, next: CallState) -> bool {
        if !self.state.can_transition_to(next) {
            trace!(call_id = %self.call_id, "ignoring {} -> {}", self.state, next);
            return false;
        }
        debug!(call_id = %self.call_id, "call state {} -> {}", self.state, next);
        self.state = next;
        true
    }

    pub fn terminate(&mut self) -> bool {
        self.advance(CallState::Terminated)
    }

    /// Our tag in this dialog
    pub fn local_tag(&self) -> Option<&str> {
        self.local_party().tag()
    }

    pub fn remote_tag(&self) -> Option<&str> {
        self.remote_party().tag()
    }

    /// Our identity (From of our in-dialog requests)
    pub fn local_party(&self) -> &NameAddr {
        match self.direction {
            CallDirection::Incoming => &self.to,
            CallDirection::Outgoing => &self.from,
        }
    }

    /// The other side's identity (To of our in-dialog requests)
    pub fn remote_party(&self) -> &NameAddr {
        match self.direction {
            CallDirection::Incoming => &self.from,
            CallDirection::Outgoing => &self.to,
        }
    }

    /// Record the remote tag from a response's To header
    pub fn learn_remote_tag(&mut self, to: &NameAddr) {
        if self.direction == CallDirection::Outgoing && self.to.tag().is_none() {
            if let Some(tag) = to.tag() {
                self.to.set_tag(tag);
            }
        }
    }

    /// Make sure an incoming call's To carries our tag; returns the tag
    pub fn ensure_local_tag(&mut self, generate: impl FnOnce() -> String) -> String {
        let party = match self.direction {
            CallDirection::Incoming => &mut self.to,
            CallDirection::Outgoing => &mut self.from,
        };
        match party.tag() {
            Some(tag) => tag.to_string(),
            None => {
                let tag = generate();
                party.set_tag(tag.clone());
                tag
            }
        }
    }

    /// Request-URI for in-dialog requests
    pub fn remote_uri(&self) -> String {
        self.remote_target
            .clone()
            .unwrap_or_else(|| self.remote_party().uri.clone())
    }

    /// Next local CSeq number
    pub fn next_cseq(&mut self) -> u32 {
        self.local_cseq += 1;
        self.local_cseq
    }

    /// How `hangup` ends the call.
    ///
    /// Checked in this order: unanswered outgoing call with its INVITE at
    /// hand is cancelled, an answered call gets a BYE, an unanswered
    /// incoming call is declined.
    pub fn hangup_action(&self) -> HangupAction {
        let state = self.state;
        if state.is_terminated() {
            HangupAction::Nothing
        } else if state.is_pending() && self.direction == CallDirection::Outgoing && self.invite.is_some() {
            HangupAction::Cancel
        } else if state.is_answered() {
            HangupAction::Bye
        } else if state.is_pending() && self.direction == CallDirection::Incoming {
            HangupAction::Decline
        } else {
            HangupAction::Nothing
        }
    }
}
