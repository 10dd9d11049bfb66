//! Typed values of the SIP headers the gateway reads and writes

pub mod address;
pub mod auth;
pub mod cseq;
pub mod method;
pub mod param;
pub mod status;
pub mod via;
