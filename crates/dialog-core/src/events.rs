//! Notifications from the engine to its owner

use std::net::SocketAddr;

use sip_core::StatusCode;

/// Protocol-driven changes the call owner reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Registration accepted with this lifetime in seconds
    Registered { expires: u32 },
    RegistrationFailed { reason: String },
    /// Trunk mode learned (or re-learned) the PBX address
    PeerLearned { addr: SocketAddr },
    /// The PBX is calling `dialed`
    IncomingCall {
        call_id: String,
        dialed: String,
        caller: String,
    },
    /// Provisional response to one of our INVITEs
    CallProgress { call_id: String, status: StatusCode },
    /// The remote side announced early media (183 with SDP)
    EarlyMedia { call_id: String },
    /// Our INVITE was answered
    CallAnswered { call_id: String },
    /// The PBX acknowledged our answer
    CallConfirmed { call_id: String },
    /// Call setup failed with a final response or a timeout
    CallFailed {
        call_id: String,
        status: StatusCode,
        reason: String,
    },
    CallEnded { call_id: String, reason: String },
}

impl EngineEvent {
    /// The call this event concerns, if any
    pub fn call_id(&self) -> Option<&str> {
        match self {
            EngineEvent::IncomingCall { call_id, .. }
            | EngineEvent::CallProgress { call_id, .. }
            | EngineEvent::EarlyMedia { call_id }
            | EngineEvent::CallAnswered { call_id }
            | EngineEvent::CallConfirmed { call_id }
            | EngineEvent::CallFailed { call_id, .. }
            | EngineEvent::CallEnded { call_id, .. } => Some(call_id),
            _ => None,
        }
    }
}
