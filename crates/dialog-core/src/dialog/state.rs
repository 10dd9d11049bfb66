//! Call state lattice
//!
//! ```text
//! IDLE -> RINGING -> [EARLY_MEDIA] -> ANSWERED -> CONFIRMED -> TERMINATED
//!   \________\___________\_____________\______________________/
//! ```
//!
//! States are totally ordered; a call only ever moves forward and any
//! state may jump straight to `Terminated`.

use std::fmt;

/// State of one call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CallState {
    /// INVITE sent or received, nothing else yet
    Idle,
    Ringing,
    /// 183 with SDP received
    EarlyMedia,
    /// 200 OK sent or received
    Answered,
    /// ACK exchanged
    Confirmed,
    Terminated,
}

impl CallState {
    /// Not yet answered: retransmission and INVITE timeout still apply
    pub fn is_pending(self) -> bool {
        matches!(self, CallState::Idle | CallState::Ringing | CallState::EarlyMedia)
    }

    pub fn is_answered(self) -> bool {
        matches!(self, CallState::Answered | CallState::Confirmed)
    }

    pub fn is_terminated(self) -> bool {
        self == CallState::Terminated
    }

    /// Whether `next` is a forward move in the lattice
    pub fn can_transition_to(self, next: CallState) -> bool {
        !self.is_terminated() && next > self
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CallState::Idle => "IDLE",
            CallState::Ringing => "RINGING",
            CallState::EarlyMedia => "EARLY_MEDIA",
            CallState::Answered => "ANSWERED",
            CallState::Confirmed => "CONFIRMED",
            CallState::Terminated => "TERMINATED",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_only() {
        assert!(CallState::Idle.can_transition_to(CallState::Ringing));
        assert!(CallState::Idle.can_transition_to(CallState::Answered));
        assert!(CallState::Ringing.can_transition_to(CallState::Terminated));
        assert!(!CallState::Answered.can_transition_to(CallState::Ringing));
        assert!(!CallState::EarlyMedia.can_transition_to(CallState::EarlyMedia));
        assert!(!CallState::Terminated.can_transition_to(CallState::Terminated));
    }

    #[test]
    fn test_pending_set() {
        assert!(CallState::Idle.is_pending());
        assert!(CallState::EarlyMedia.is_pending());
        assert!(!CallState::Answered.is_pending());
        assert!(!CallState::Terminated.is_pending());
        assert_eq!(CallState::EarlyMedia.to_string(), "EARLY_MEDIA");
    }
}
