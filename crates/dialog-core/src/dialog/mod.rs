//! Per-call dialog state

mod call;
mod state;

pub use call::{Call, CallDirection, HangupAction};
pub use state::CallState;
