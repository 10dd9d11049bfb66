//! The signaling engine
//!
//! [`SipEngine`] owns the socket, the call registry and the registration
//! context. Its behaviour is split across submodules by concern:
//!
//! - `engine`: construction, start/stop, receive loop and dispatch
//! - `call_operations`: `make_call`, `answer_call`, `hangup`
//! - `registration`: client-mode REGISTER, renewal and health checks
//! - `retransmit`: retransmission chains and transaction timeouts
//! - `messages`: construction of the requests the engine originates

mod call_operations;
mod engine;
mod messages;
mod registration;
mod retransmit;

pub use engine::SipEngine;
