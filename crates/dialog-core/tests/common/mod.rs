//! Fake PBX on a loopback socket, shared by the engine tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::mpsc;

use dialog_core::{
    CallRegistry, EngineConfig, EngineEvent, ManualScheduler, RegistrationMode, SipEngine,
};
use sip_core::utils::{generate_branch, generate_call_id, generate_tag};
use sip_core::{
    Message, Method, NameAddr, Request, RequestBuilder, Response, ResponseBuilder, StatusCode, Via,
    parse_message,
};

pub const WAIT: Duration = Duration::from_secs(2);
pub const QUIET: Duration = Duration::from_millis(200);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("dialog_core=debug")
        .with_test_writer()
        .try_init();
}

pub struct FakePbx {
    pub socket: UdpSocket,
    pub addr: SocketAddr,
    pub tag: String,
}

impl FakePbx {
    pub async fn new() -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        Self {
            socket,
            addr,
            tag: generate_tag(),
        }
    }

    pub async fn send(&self, message: impl Into<Message>, dest: SocketAddr) {
        let data = message.into().to_bytes();
        self.socket.send_to(&data, dest).await.unwrap();
    }

    /// Next message within `wait`, or `None`
    pub async fn recv_within(&self, wait: Duration) -> Option<Message> {
        let mut buf = vec![0u8; 65_535];
        let (len, _) = tokio::time::timeout(wait, self.socket.recv_from(&mut buf))
            .await
            .ok()?
            .unwrap();
        Some(parse_message(&buf[..len]).unwrap())
    }

    /// Next request with `method`, skipping anything else
    pub async fn expect_request(&self, method: Method) -> Request {
        loop {
            match self.recv_within(WAIT).await {
                Some(Message::Request(req)) if req.method == method => return req,
                Some(_) => continue,
                None => panic!("no {method} received"),
            }
        }
    }

    /// Next response with `status`, skipping anything else
    pub async fn expect_response(&self, status: StatusCode) -> Response {
        loop {
            match self.recv_within(WAIT).await {
                Some(Message::Response(resp)) if resp.status == status => return resp,
                Some(_) => continue,
                None => panic!("no {} response received", status.as_u16()),
            }
        }
    }

    /// Count requests with `method` arriving until the socket goes quiet
    pub async fn count_requests(&self, method: Method) -> usize {
        let mut count = 0;
        while let Some(message) = self.recv_within(QUIET).await {
            if matches!(&message, Message::Request(req) if req.method == method) {
                count += 1;
            }
        }
        count
    }

    pub fn via(&self) -> Via {
        Via::udp("127.0.0.1", self.addr.port(), generate_branch())
    }

    pub fn identity(&self) -> NameAddr {
        NameAddr::sip("pbx", "127.0.0.1", Some(self.addr.port()))
    }

    /// REGISTER announcing the PBX to a trunk-mode engine
    pub fn register(&self, engine: SocketAddr, expires: u32) -> Request {
        let aor = NameAddr::sip("pbx", "127.0.0.1", None);
        RequestBuilder::new(Method::Register, format!("sip:{}", engine))
            .via(self.via())
            .from(aor.clone().with_tag(generate_tag()))
            .to(aor)
            .call_id(generate_call_id("127.0.0.1"))
            .cseq(1)
            .contact(self.identity())
            .expires(expires)
            .build()
            .unwrap()
    }

    /// INVITE for `dialed` with an audio offer on `rtp_port`
    pub fn invite(&self, engine: SocketAddr, dialed: &str, rtp_port: u16) -> Request {
        let sdp = format!(
            "v=0\r\no=pbx 1 1 IN IP4 127.0.0.1\r\ns=-\r\nc=IN IP4 127.0.0.1\r\nt=0 0\r\n\
             m=audio {rtp_port} RTP/AVP 0 8\r\na=rtpmap:0 PCMU/8000\r\na=rtpmap:8 PCMA/8000\r\n"
        );
        RequestBuilder::new(Method::Invite, format!("sip:{dialed}@{engine}"))
            .via(self.via())
            .from(NameAddr::sip("2001", "127.0.0.1", None).with_tag(self.tag.clone()))
            .to(NameAddr::sip(dialed, "127.0.0.1", None))
            .call_id(generate_call_id("127.0.0.1"))
            .cseq(1)
            .contact(self.identity())
            .sdp(sdp)
            .build()
            .unwrap()
    }

    /// In-dialog request for a call the PBX placed, after our 200 OK
    pub fn in_dialog(&self, invite: &Request, ok: &Response, method: Method, cseq: u32) -> Request {
        RequestBuilder::new(method, invite.headers.to.uri.clone())
            .via(self.via())
            .from(invite.headers.from.clone())
            .to(ok.headers.to.clone())
            .call_id(invite.headers.call_id.clone())
            .cseq(cseq)
            .build()
            .unwrap()
    }

    /// Response to a request from the engine, tagged and with a Contact
    pub fn respond(&self, request: &Request, status: StatusCode) -> ResponseBuilder {
        ResponseBuilder::from_request(request, status)
            .to_tag(&self.tag)
            .contact(self.identity())
    }

    /// Answer SDP for an engine INVITE
    pub fn answer_sdp(rtp_port: u16) -> String {
        format!(
            "v=0\r\no=pbx 2 2 IN IP4 127.0.0.1\r\ns=-\r\nc=IN IP4 127.0.0.1\r\nt=0 0\r\n\
             m=audio {rtp_port} RTP/AVP 8\r\na=rtpmap:8 PCMA/8000\r\n"
        )
    }
}

pub fn config(mode: RegistrationMode, pbx: &FakePbx) -> EngineConfig {
    let mut config = EngineConfig::new(mode, "127.0.0.1:0".parse().unwrap(), "127.0.0.1");
    config.pbx_host = Some("127.0.0.1".to_string());
    config.pbx_port = pbx.addr.port();
    config.credentials = sip_core::Credentials::new("1001", "secret");
    config
}

pub struct Harness {
    pub engine: SipEngine,
    pub events: mpsc::UnboundedReceiver<EngineEvent>,
    pub clock: Arc<ManualScheduler>,
    pub pbx: FakePbx,
}

impl Harness {
    /// Started engine on a manual clock with a fake PBX
    pub async fn start(mode: RegistrationMode) -> Self {
        Self::start_with(|_| {}, mode).await
    }

    /// Client engine whose PBX address refuses every send (broadcast
    /// without SO_BROADCAST fails with EACCES)
    pub async fn unreachable() -> Self {
        Self::start_with(
            |config| config.pbx_host = Some("255.255.255.255".to_string()),
            RegistrationMode::Client,
        )
        .await
    }

    pub async fn start_with(tweak: impl FnOnce(&mut EngineConfig), mode: RegistrationMode) -> Self {
        init_tracing();
        let pbx = FakePbx::new().await;
        let clock = Arc::new(ManualScheduler::new());
        let mut config = config(mode, &pbx);
        tweak(&mut config);
        let (engine, events) = SipEngine::bind_with(
            config,
            clock.clone(),
            Arc::new(CallRegistry::new()),
        )
        .await
        .unwrap();
        engine.start().await.unwrap();
        Self {
            engine,
            events,
            clock,
            pbx,
        }
    }

    /// Trunk-mode engine that has already learned the PBX
    pub async fn trunk() -> Self {
        let mut harness = Self::start(RegistrationMode::Trunk).await;
        let register = harness.pbx.register(harness.engine.local_addr(), 3600);
        harness.pbx.send(register, harness.engine.local_addr()).await;
        harness.pbx.expect_response(StatusCode::Ok).await;
        match harness.next_event().await {
            EngineEvent::PeerLearned { addr } => assert_eq!(addr, harness.pbx.addr),
            other => panic!("unexpected event {other:?}"),
        }
        harness
    }

    pub fn engine_addr(&self) -> SocketAddr {
        self.engine.local_addr()
    }

    pub async fn next_event(&mut self) -> EngineEvent {
        tokio::time::timeout(WAIT, self.events.recv())
            .await
            .expect("timed out waiting for an engine event")
            .expect("event channel closed")
    }

    /// Assert nothing else was emitted
    pub async fn no_event(&mut self) {
        if let Ok(Some(event)) = tokio::time::timeout(QUIET, self.events.recv()).await {
            panic!("unexpected event {event:?}");
        }
    }
}
