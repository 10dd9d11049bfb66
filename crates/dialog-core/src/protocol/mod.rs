//! Method handlers
//!
//! Each handler is a trait implemented on [`SipEngine`](crate::SipEngine)
//! so the dispatch table in the engine reads as a list of capabilities.
//! Handlers never hold a call lock across a send.

mod bye_handler;
mod invite_handler;
mod options_handler;
mod register_handler;
mod response_handler;

pub use bye_handler::ByeHandler;
pub use invite_handler::InviteHandler;
pub use options_handler::OptionsHandler;
pub use register_handler::RegisterHandler;
pub use response_handler::ResponseHandler;
