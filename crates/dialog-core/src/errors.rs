//! Error types for dialog-core

use thiserror::Error;

use crate::dialog::CallState;

/// Result type for engine operations
pub type DialogResult<T> = Result<T, DialogError>;

/// Errors surfaced by the signaling engine
#[derive(Debug, Error)]
pub enum DialogError {
    /// Socket send or receive failure
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// Message construction or parsing failure
    #[error("SIP error: {0}")]
    Sip(#[from] sip_core::Error),

    /// Trunk mode has not seen a REGISTER from the PBX yet
    #[error("No PBX address known yet")]
    NoPeerKnown,

    #[error("Call not found: {0}")]
    CallNotFound(String),

    #[error("Call already exists: {0}")]
    DuplicateCall(String),

    /// The call's state does not allow the requested operation
    #[error("Call {call_id} is {state}, cannot {operation}")]
    InvalidState {
        call_id: String,
        state: CallState,
        operation: &'static str,
    },

    #[error("Engine not started")]
    NotStarted,

    #[error("Could not resolve {0}")]
    Resolve(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl DialogError {
    pub(crate) fn invalid_state(call_id: &str, state: CallState, operation: &'static str) -> Self {
        DialogError::InvalidState {
            call_id: call_id.to_string(),
            state,
            operation,
        }
    }
}
