//! SIP parsing built on `nom`
//!
//! Datagrams are decoded exactly once into the structured [`Message`]
//! model. Individual header grammars live in the submodules and are also
//! reachable through the `FromStr` impls of the typed values.
//!
//! [`Message`]: crate::message::Message

pub mod address;
pub mod auth;
pub mod common;
pub mod message;
pub mod start_line;
pub mod via;

pub use common::{ParseResult, is_token_char};
pub use message::{is_keep_alive, parse_message};
