//! End-to-end call routing through the gateway against a loopback PBX

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use cellgate::dev::SilenceAudio;
use cellgate::{CallControl, Gateway, LineEvent, RtpPortAllocator};
use dialog_core::{EngineConfig, RegistrationMode, SipEngine};
use sip_core::utils::{generate_branch, generate_call_id, generate_tag};
use sip_core::{
    Message, Method, NameAddr, Request, RequestBuilder, Response, StatusCode, Via, parse_message,
};

const WAIT: Duration = Duration::from_secs(2);
const QUIET: Duration = Duration::from_millis(300);

/// Line adapter that reports every action on a channel
struct RecordingLine {
    actions: mpsc::UnboundedSender<String>,
    fail_dial: bool,
}

impl CallControl for RecordingLine {
    fn answer(&self) -> std::io::Result<()> {
        let _ = self.actions.send("answer".to_string());
        Ok(())
    }

    fn dial(&self, number: &str) -> std::io::Result<()> {
        let _ = self.actions.send(format!("dial {number}"));
        if self.fail_dial {
            return Err(std::io::Error::other("no network"));
        }
        Ok(())
    }

    fn hangup(&self) -> std::io::Result<()> {
        let _ = self.actions.send("hangup".to_string());
        Ok(())
    }
}

struct Pbx {
    sip: UdpSocket,
    addr: SocketAddr,
    rtp: UdpSocket,
    tag: String,
}

impl Pbx {
    async fn new() -> Self {
        let sip = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = sip.local_addr().unwrap();
        let rtp = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        Self {
            sip,
            addr,
            rtp,
            tag: generate_tag(),
        }
    }

    fn rtp_port(&self) -> u16 {
        self.rtp.local_addr().unwrap().port()
    }

    async fn send(&self, message: impl Into<Message>, dest: SocketAddr) {
        self.sip.send_to(&message.into().to_bytes(), dest).await.unwrap();
    }

    async fn recv_within(&self, wait: Duration) -> Option<Message> {
        let mut buf = vec![0u8; 65_535];
        let (len, _) = tokio::time::timeout(wait, self.sip.recv_from(&mut buf))
            .await
            .ok()?
            .unwrap();
        Some(parse_message(&buf[..len]).unwrap())
    }

    async fn expect_request(&self, method: Method) -> Request {
        loop {
            match self.recv_within(WAIT).await {
                Some(Message::Request(req)) if req.method == method => return req,
                Some(_) => continue,
                None => panic!("no {method} received"),
            }
        }
    }

    async fn expect_response(&self, status: StatusCode) -> Response {
        loop {
            match self.recv_within(WAIT).await {
                Some(Message::Response(resp)) if resp.status == status => return resp,
                Some(_) => continue,
                None => panic!("no {} response received", status.as_u16()),
            }
        }
    }

    /// Payload type of the next RTP packet from the gateway
    async fn expect_rtp(&self) -> u8 {
        let mut buf = [0u8; 1500];
        let (len, _) = tokio::time::timeout(WAIT, self.rtp.recv_from(&mut buf))
            .await
            .expect("no RTP received")
            .unwrap();
        assert_eq!(len, 12 + 160);
        assert_eq!(buf[0] >> 6, 2);
        buf[1] & 0x7f
    }

    fn via(&self) -> Via {
        Via::udp("127.0.0.1", self.addr.port(), generate_branch())
    }

    fn identity(&self) -> NameAddr {
        NameAddr::sip("pbx", "127.0.0.1", Some(self.addr.port()))
    }

    fn sdp(&self, payload_types: &str) -> String {
        format!(
            "v=0\r\no=pbx 1 1 IN IP4 127.0.0.1\r\ns=-\r\nc=IN IP4 127.0.0.1\r\nt=0 0\r\n\
             m=audio {} RTP/AVP {payload_types}\r\n",
            self.rtp_port()
        )
    }

    async fn register_with(&self, engine: SocketAddr) {
        let aor = NameAddr::sip("pbx", "127.0.0.1", None);
        let register = RequestBuilder::new(Method::Register, format!("sip:{engine}"))
            .via(self.via())
            .from(aor.clone().with_tag(generate_tag()))
            .to(aor)
            .call_id(generate_call_id("127.0.0.1"))
            .cseq(1)
            .contact(self.identity())
            .expires(3600)
            .build()
            .unwrap();
        self.send(register, engine).await;
        self.expect_response(StatusCode::Ok).await;
    }

    fn invite(&self, engine: SocketAddr, dialed: &str) -> Request {
        RequestBuilder::new(Method::Invite, format!("sip:{dialed}@{engine}"))
            .via(self.via())
            .from(NameAddr::sip("2001", "127.0.0.1", None).with_tag(self.tag.clone()))
            .to(NameAddr::sip(dialed, "127.0.0.1", None))
            .call_id(generate_call_id("127.0.0.1"))
            .cseq(1)
            .contact(self.identity())
            .sdp(self.sdp("0 8"))
            .build()
            .unwrap()
    }

    /// PBX-side request inside a dialog; `local`/`remote` are the PBX's
    /// own and the gateway's party
    fn in_dialog(
        &self,
        method: Method,
        target: &str,
        local: &NameAddr,
        remote: &NameAddr,
        call_id: &str,
        cseq: u32,
    ) -> Request {
        RequestBuilder::new(method, target)
            .via(self.via())
            .from(local.clone())
            .to(remote.clone())
            .call_id(call_id)
            .cseq(cseq)
            .build()
            .unwrap()
    }
}

struct Harness {
    pbx: Pbx,
    engine: SipEngine,
    line_tx: mpsc::UnboundedSender<LineEvent>,
    actions: mpsc::UnboundedReceiver<String>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<cellgate::Result<()>>,
}

impl Harness {
    async fn start(rtp_min: u16, fail_dial: bool) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("cellgate=debug,dialog_core=debug")
            .with_test_writer()
            .try_init();

        let pbx = Pbx::new().await;
        let config = EngineConfig::new(
            RegistrationMode::Trunk,
            "127.0.0.1:0".parse().unwrap(),
            "127.0.0.1",
        );
        let (engine, engine_events) = SipEngine::bind(config).await.unwrap();
        engine.start().await.unwrap();
        pbx.register_with(engine.local_addr()).await;

        let (actions_tx, actions) = mpsc::unbounded_channel();
        let line = Arc::new(RecordingLine {
            actions: actions_tx,
            fail_dial,
        });
        let (line_tx, line_events) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let gateway = Gateway::new(
            engine.clone(),
            line,
            Arc::new(SilenceAudio::new()),
            RtpPortAllocator::new(rtp_min, rtp_min + 10),
            "100",
        );
        let task = tokio::spawn(gateway.run(engine_events, line_events, async {
            let _ = shutdown_rx.await;
        }));

        Self {
            pbx,
            engine,
            line_tx,
            actions,
            shutdown: Some(shutdown_tx),
            task,
        }
    }

    fn engine_addr(&self) -> SocketAddr {
        self.engine.local_addr()
    }

    async fn next_action(&mut self) -> String {
        tokio::time::timeout(WAIT, self.actions.recv())
            .await
            .expect("timed out waiting for a line action")
            .expect("line dropped")
    }

    async fn no_action(&mut self) {
        if let Ok(Some(action)) = tokio::time::timeout(QUIET, self.actions.recv()).await {
            panic!("unexpected line action {action}");
        }
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.task.await.unwrap().unwrap();
        self.engine.stop().await;
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cellular_call_reaches_extension() {
    let mut h = Harness::start(46_000, false).await;

    h.line_tx
        .send(LineEvent::Ringing {
            caller: "+15551234".to_string(),
        })
        .unwrap();
    let invite = h.pbx.expect_request(Method::Invite).await;
    assert!(invite.uri.starts_with("sip:100@"));
    assert_eq!(invite.headers.from.user(), Some("+15551234"));
    let offer = sip_core::sdp::parse(&invite.body).unwrap();
    assert!((46_000..=46_010).contains(&offer.audio_port));
    assert_eq!(offer.audio_port % 2, 0);

    let ringing = sip_core::ResponseBuilder::from_request(&invite, StatusCode::Ringing)
        .to_tag(&h.pbx.tag)
        .build();
    h.pbx.send(ringing, h.engine_addr()).await;
    let ok = sip_core::ResponseBuilder::from_request(&invite, StatusCode::Ok)
        .to_tag(&h.pbx.tag)
        .contact(h.pbx.identity())
        .sdp(h.pbx.sdp("8"))
        .build();
    h.pbx.send(ok.clone(), h.engine_addr()).await;

    h.pbx.expect_request(Method::Ack).await;
    assert_eq!(h.next_action().await, "answer");
    assert_eq!(h.pbx.expect_rtp().await, 8);

    let bye = h.pbx.in_dialog(
        Method::Bye,
        &invite.headers.contact.as_ref().unwrap().uri,
        &ok.headers.to,
        &invite.headers.from,
        invite.call_id(),
        1,
    );
    h.pbx.send(bye, h.engine_addr()).await;
    h.pbx.expect_response(StatusCode::Ok).await;
    assert_eq!(h.next_action().await, "hangup");
    assert!(h.engine.call(invite.call_id()).is_none());

    h.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_pbx_call_dialed_on_line() {
    let mut h = Harness::start(46_100, false).await;

    let invite = h.pbx.invite(h.engine_addr(), "5550100");
    h.pbx.send(invite.clone(), h.engine_addr()).await;
    h.pbx.expect_response(StatusCode::Ringing).await;
    assert_eq!(h.next_action().await, "dial 5550100");

    h.line_tx.send(LineEvent::Answered).unwrap();
    let ok = h.pbx.expect_response(StatusCode::Ok).await;
    let answer = sip_core::sdp::parse(&ok.body).unwrap();
    assert!((46_100..=46_110).contains(&answer.audio_port));
    let ack = h.pbx.in_dialog(
        Method::Ack,
        &ok.headers.contact.as_ref().unwrap().uri,
        &invite.headers.from,
        &ok.headers.to,
        invite.call_id(),
        1,
    );
    h.pbx.send(ack, h.engine_addr()).await;
    assert_eq!(h.pbx.expect_rtp().await, 0);

    h.line_tx.send(LineEvent::Disconnected).unwrap();
    let bye = h.pbx.expect_request(Method::Bye).await;
    assert_eq!(bye.call_id(), invite.call_id());
    // The line hung up by itself; nothing to send back to it
    h.no_action().await;

    h.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_second_pbx_call_declined_while_busy() {
    let mut h = Harness::start(46_200, false).await;

    let first = h.pbx.invite(h.engine_addr(), "5550100");
    h.pbx.send(first.clone(), h.engine_addr()).await;
    assert_eq!(h.next_action().await, "dial 5550100");

    let second = h.pbx.invite(h.engine_addr(), "5550199");
    h.pbx.send(second.clone(), h.engine_addr()).await;
    let declined = h.pbx.expect_response(StatusCode::Decline).await;
    assert_eq!(declined.call_id(), second.call_id());
    h.no_action().await;
    assert!(h.engine.call(first.call_id()).is_some());

    h.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_busy_extension_hangs_up_line() {
    let mut h = Harness::start(46_300, false).await;

    h.line_tx
        .send(LineEvent::Ringing {
            caller: String::new(),
        })
        .unwrap();
    let invite = h.pbx.expect_request(Method::Invite).await;
    let busy = sip_core::ResponseBuilder::from_request(&invite, StatusCode::BusyHere)
        .to_tag(&h.pbx.tag)
        .build();
    h.pbx.send(busy, h.engine_addr()).await;

    h.pbx.expect_request(Method::Ack).await;
    assert_eq!(h.next_action().await, "hangup");

    // The line is free again for the next cellular call
    h.line_tx
        .send(LineEvent::Ringing {
            caller: "+15550000".to_string(),
        })
        .unwrap();
    let retry = h.pbx.expect_request(Method::Invite).await;
    assert_ne!(retry.call_id(), invite.call_id());

    h.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failed_dial_declines_pbx_call() {
    let mut h = Harness::start(46_400, true).await;

    let invite = h.pbx.invite(h.engine_addr(), "5550100");
    h.pbx.send(invite.clone(), h.engine_addr()).await;
    assert_eq!(h.next_action().await, "dial 5550100");
    let declined = h.pbx.expect_response(StatusCode::Decline).await;
    assert_eq!(declined.call_id(), invite.call_id());
    h.no_action().await;

    h.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_shutdown_ends_active_call() {
    let h = Harness::start(46_500, false).await;

    h.line_tx
        .send(LineEvent::Ringing {
            caller: "+15551234".to_string(),
        })
        .unwrap();
    let invite = h.pbx.expect_request(Method::Invite).await;
    let Harness {
        pbx,
        engine,
        shutdown,
        task,
        mut actions,
        ..
    } = h;
    if let Some(tx) = shutdown {
        let _ = tx.send(());
    }
    task.await.unwrap().unwrap();

    let cancel = pbx.expect_request(Method::Cancel).await;
    assert_eq!(cancel.call_id(), invite.call_id());
    let action = tokio::time::timeout(WAIT, actions.recv()).await.unwrap();
    assert_eq!(action.as_deref(), Some("hangup"));
    engine.stop().await;
}
