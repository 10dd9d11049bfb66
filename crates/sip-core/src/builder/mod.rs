//! Fluent construction of outbound requests and responses

mod request;
mod response;

pub use request::RequestBuilder;
pub use response::ResponseBuilder;
