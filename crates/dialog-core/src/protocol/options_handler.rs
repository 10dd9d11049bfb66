//! OPTIONS: capability queries and PBX keep-alive pings

use std::net::SocketAddr;
use tracing::debug;

use sip_core::{Request, StatusCode};

use crate::errors::DialogResult;
use crate::manager::SipEngine;

pub trait OptionsHandler {
    fn handle_options_method(
        &self,
        request: Request,
        source: SocketAddr,
    ) -> impl std::future::Future<Output = DialogResult<()>> + Send;
}

impl OptionsHandler for SipEngine {
    async fn handle_options_method(&self, request: Request, source: SocketAddr) -> DialogResult<()> {
        debug!("OPTIONS from {}", source);
        let response = self
            .response_with_allow(&request, StatusCode::Ok)
            .header("Accept", "application/sdp")
            .contact(self.contact())
            .build();
        self.send_response(&response, source).await
    }
}
