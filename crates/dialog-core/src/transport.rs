//! UDP signaling transport

use bytes::Bytes;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use sip_core::{Message, is_keep_alive, parse_message};

use crate::errors::DialogResult;

/// Largest datagram we accept
pub const MAX_DATAGRAM_SIZE: usize = 65_535;

/// One received datagram
#[derive(Debug)]
pub enum Inbound {
    Message { message: Message, source: SocketAddr },
    /// Keep-alive or unparsable datagram, already logged
    Ignored { source: SocketAddr },
    /// Nothing arrived within the poll interval
    Idle,
}

/// The engine's signaling socket
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    local_addr: SocketAddr,
}

impl UdpTransport {
    pub async fn bind(addr: SocketAddr) -> DialogResult<Self> {
        let socket = UdpSocket::bind(addr).await?;
        let local_addr = socket.local_addr()?;
        info!("SIP transport bound to {}", local_addr);
        Ok(Self { socket, local_addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Send one message, logging its start line and dialog headers
    pub async fn send(&self, message: &Message, dest: SocketAddr) -> DialogResult<()> {
        let data = message.to_bytes();
        log_message("sending", message, dest);
        self.send_raw(&data, dest).await
    }

    /// Send pre-encoded bytes (retransmissions)
    pub async fn send_raw(&self, data: &Bytes, dest: SocketAddr) -> DialogResult<()> {
        self.socket.send_to(data, dest).await?;
        Ok(())
    }

    /// Wait up to `timeout` for one datagram and parse it
    pub async fn receive(&self, buf: &mut [u8], timeout: Duration) -> DialogResult<Inbound> {
        let (len, source) = match tokio::time::timeout(timeout, self.socket.recv_from(buf)).await {
            Ok(result) => result?,
            Err(_) => return Ok(Inbound::Idle),
        };
        let data = &buf[..len];
        if is_keep_alive(data) {
            return Ok(Inbound::Ignored { source });
        }
        match parse_message(data) {
            Ok(message) => {
                log_message("received", &message, source);
                Ok(Inbound::Message { message, source })
            }
            Err(e) => {
                warn!("dropping unparsable datagram from {}: {}", source, e);
                Ok(Inbound::Ignored { source })
            }
        }
    }
}

fn log_message(verb: &str, message: &Message, peer: SocketAddr) {
    info!("{} {} ({})", verb, message.start_line(), peer);
    let headers = message.headers();
    debug!(
        from = %headers.from,
        to = %headers.to,
        call_id = %headers.call_id,
        cseq = %headers.cseq,
        contact = ?headers.contact.as_ref().map(ToString::to_string),
        "dialog headers"
    );
}
