//! Inbound and outbound call flows against a fake PBX

mod common;

use common::{FakePbx, Harness};
use dialog_core::{CallDirection, CallState, EngineEvent};
use sip_core::{Method, StatusCode};

#[tokio::test]
async fn test_incoming_call_answer_and_remote_hangup() {
    let mut h = Harness::trunk().await;
    let invite = h.pbx.invite(h.engine_addr(), "1000", 20000);
    let call_id = invite.headers.call_id.clone();
    h.pbx.send(invite.clone(), h.engine_addr()).await;

    h.pbx.expect_response(StatusCode::Trying).await;
    let ringing = h.pbx.expect_response(StatusCode::Ringing).await;
    let local_tag = ringing.headers.to.tag().unwrap().to_string();
    match h.next_event().await {
        EngineEvent::IncomingCall { call_id: id, dialed, caller } => {
            assert_eq!(id, call_id);
            assert_eq!(dialed, "1000");
            assert_eq!(caller, "2001");
        }
        other => panic!("unexpected event {other:?}"),
    }

    let call = h.engine.call(&call_id).unwrap();
    assert_eq!(call.direction, CallDirection::Incoming);
    assert_eq!(call.state(), CallState::Ringing);
    assert_eq!(call.codec, Some(0));
    assert_eq!(call.remote_rtp.unwrap().port(), 20000);

    h.engine.answer_call(&call_id, 30000).await.unwrap();
    let ok = h.pbx.expect_response(StatusCode::Ok).await;
    assert_eq!(ok.headers.to.tag(), Some(local_tag.as_str()));
    assert!(ok.body.contains("m=audio 30000 RTP/AVP 0 8 101"));
    assert_eq!(h.engine.call_state(&call_id), Some(CallState::Answered));

    h.pbx.send(h.pbx.in_dialog(&invite, &ok, Method::Ack, 1), h.engine_addr()).await;
    assert_eq!(h.next_event().await, EngineEvent::CallConfirmed { call_id: call_id.clone() });
    assert_eq!(h.engine.call_state(&call_id), Some(CallState::Confirmed));

    h.pbx.send(h.pbx.in_dialog(&invite, &ok, Method::Bye, 2), h.engine_addr()).await;
    let bye_ok = h.pbx.expect_response(StatusCode::Ok).await;
    assert_eq!(bye_ok.headers.cseq.method, Method::Bye);
    assert_eq!(
        h.next_event().await,
        EngineEvent::CallEnded {
            call_id: call_id.clone(),
            reason: "remote hangup".to_string()
        }
    );
    assert!(h.engine.registry().is_empty());
}

#[tokio::test]
async fn test_invite_retransmission_does_not_duplicate_call() {
    let mut h = Harness::trunk().await;
    let invite = h.pbx.invite(h.engine_addr(), "1000", 20000);
    h.pbx.send(invite.clone(), h.engine_addr()).await;
    h.pbx.expect_response(StatusCode::Ringing).await;
    assert!(matches!(h.next_event().await, EngineEvent::IncomingCall { .. }));

    h.pbx.send(invite, h.engine_addr()).await;
    h.pbx.expect_response(StatusCode::Trying).await;
    h.no_event().await;
    assert_eq!(h.engine.registry().len(), 1);
}

#[tokio::test]
async fn test_unsupported_offer_rejected() {
    let mut h = Harness::trunk().await;
    let mut invite = h.pbx.invite(h.engine_addr(), "1000", 20000);
    invite.body = "v=0\r\nc=IN IP4 127.0.0.1\r\nm=audio 20000 RTP/AVP 18\r\n".to_string();
    h.pbx.send(invite, h.engine_addr()).await;
    h.pbx.expect_response(StatusCode::NotAcceptableHere).await;
    h.no_event().await;
    assert!(h.engine.registry().is_empty());
}

#[tokio::test]
async fn test_pbx_cancels_ringing_call() {
    let mut h = Harness::trunk().await;
    let invite = h.pbx.invite(h.engine_addr(), "1000", 20000);
    let call_id = invite.headers.call_id.clone();
    h.pbx.send(invite.clone(), h.engine_addr()).await;
    h.pbx.expect_response(StatusCode::Ringing).await;
    h.next_event().await;

    let mut cancel = invite.clone();
    cancel.method = Method::Cancel;
    cancel.headers.cseq.method = Method::Cancel;
    cancel.body.clear();
    cancel.headers.content_type = None;
    h.pbx.send(cancel, h.engine_addr()).await;

    let ok = h.pbx.expect_response(StatusCode::Ok).await;
    assert_eq!(ok.headers.cseq.method, Method::Cancel);
    let terminated = h.pbx.expect_response(StatusCode::RequestTerminated).await;
    assert_eq!(terminated.headers.cseq.method, Method::Invite);
    assert_eq!(
        h.next_event().await,
        EngineEvent::CallEnded {
            call_id,
            reason: "cancelled".to_string()
        }
    );
    assert!(h.engine.registry().is_empty());
}

#[tokio::test]
async fn test_outgoing_call_answered_then_hung_up() {
    let mut h = Harness::trunk().await;
    let call = h.engine.make_call("1000", 40000, "+15551234567").await.unwrap();
    let invite = h.pbx.expect_request(Method::Invite).await;
    assert_eq!(invite.headers.call_id, call.call_id);
    assert_eq!(invite.headers.from.user(), Some("+15551234567"));

    h.pbx.send(h.pbx.respond(&invite, StatusCode::Trying).build(), h.engine_addr()).await;
    h.pbx.send(h.pbx.respond(&invite, StatusCode::Ringing).build(), h.engine_addr()).await;
    assert_eq!(
        h.next_event().await,
        EngineEvent::CallProgress {
            call_id: call.call_id.clone(),
            status: StatusCode::Ringing
        }
    );
    assert_eq!(h.engine.call_state(&call.call_id), Some(CallState::Ringing));

    let ok = h
        .pbx
        .respond(&invite, StatusCode::Ok)
        .sdp(FakePbx::answer_sdp(22000))
        .build();
    h.pbx.send(ok.clone(), h.engine_addr()).await;
    let ack = h.pbx.expect_request(Method::Ack).await;
    assert_eq!(ack.headers.cseq.seq, invite.headers.cseq.seq);
    assert_eq!(ack.headers.to.tag(), Some(h.pbx.tag.as_str()));
    assert_eq!(h.next_event().await, EngineEvent::CallAnswered { call_id: call.call_id.clone() });

    let answered = h.engine.call(&call.call_id).unwrap();
    assert_eq!(answered.state(), CallState::Confirmed);
    assert_eq!(answered.codec, Some(8));
    assert_eq!(answered.remote_rtp.unwrap().port(), 22000);

    // A retransmitted 200 is ACKed again without another event
    h.pbx.send(ok, h.engine_addr()).await;
    h.pbx.expect_request(Method::Ack).await;
    h.no_event().await;

    h.engine.hangup(&call.call_id, "gsm hangup").await.unwrap();
    let bye = h.pbx.expect_request(Method::Bye).await;
    assert_eq!(bye.headers.cseq.seq, invite.headers.cseq.seq + 1);
    assert_eq!(bye.headers.to.tag(), Some(h.pbx.tag.as_str()));
    assert_eq!(bye.headers.from.tag(), invite.headers.from.tag());
    assert_eq!(
        h.next_event().await,
        EngineEvent::CallEnded {
            call_id: call.call_id.clone(),
            reason: "gsm hangup".to_string()
        }
    );
    assert!(h.engine.call(&call.call_id).is_none());
}

#[tokio::test]
async fn test_hangup_before_answer_sends_cancel() {
    let mut h = Harness::trunk().await;
    let call = h.engine.make_call("1000", 40000, "").await.unwrap();
    let invite = h.pbx.expect_request(Method::Invite).await;
    h.pbx.send(h.pbx.respond(&invite, StatusCode::Ringing).build(), h.engine_addr()).await;
    h.next_event().await;

    h.engine.hangup(&call.call_id, "caller gave up").await.unwrap();
    let cancel = h.pbx.expect_request(Method::Cancel).await;
    assert_eq!(cancel.headers.cseq.seq, invite.headers.cseq.seq);
    assert_eq!(cancel.headers.top_via(), invite.headers.top_via());
    assert_eq!(cancel.uri, invite.uri);
    assert!(matches!(h.next_event().await, EngineEvent::CallEnded { .. }));

    // The 487 that follows still gets its ACK
    let terminated = h.pbx.respond(&invite, StatusCode::RequestTerminated).build();
    h.pbx.send(terminated, h.engine_addr()).await;
    let ack = h.pbx.expect_request(Method::Ack).await;
    assert_eq!(ack.headers.cseq.seq, invite.headers.cseq.seq);
    h.no_event().await;
}

#[tokio::test]
async fn test_hangup_of_ringing_incoming_call_declines() {
    let mut h = Harness::trunk().await;
    let invite = h.pbx.invite(h.engine_addr(), "1000", 20000);
    let call_id = invite.headers.call_id.clone();
    h.pbx.send(invite, h.engine_addr()).await;
    let ringing = h.pbx.expect_response(StatusCode::Ringing).await;
    h.next_event().await;

    h.engine.hangup(&call_id, "no free line").await.unwrap();
    let decline = h.pbx.expect_response(StatusCode::Decline).await;
    assert_eq!(decline.headers.to.tag(), ringing.headers.to.tag());
    assert!(matches!(h.next_event().await, EngineEvent::CallEnded { .. }));

    // Hanging up twice is an error, not a second message
    assert!(h.engine.hangup(&call_id, "again").await.is_err());
    assert!(h.pbx.recv_within(common::QUIET).await.is_none());
}

#[tokio::test]
async fn test_busy_fails_outgoing_call() {
    let mut h = Harness::trunk().await;
    let call = h.engine.make_call("1000", 40000, "").await.unwrap();
    let invite = h.pbx.expect_request(Method::Invite).await;
    h.pbx.send(h.pbx.respond(&invite, StatusCode::BusyHere).build(), h.engine_addr()).await;

    let ack = h.pbx.expect_request(Method::Ack).await;
    assert_eq!(ack.headers.top_via(), invite.headers.top_via());
    assert_eq!(
        h.next_event().await,
        EngineEvent::CallFailed {
            call_id: call.call_id.clone(),
            status: StatusCode::BusyHere,
            reason: "Busy Here".to_string()
        }
    );
    assert!(h.engine.registry().is_empty());
}

#[tokio::test]
async fn test_invite_challenge_retried_once() {
    let mut h = Harness::trunk().await;
    let call = h.engine.make_call("1000", 40000, "").await.unwrap();
    let invite = h.pbx.expect_request(Method::Invite).await;
    let challenge = h
        .pbx
        .respond(&invite, StatusCode::ProxyAuthenticationRequired)
        .header("Proxy-Authenticate", r#"Digest realm="asterisk", nonce="xyz""#)
        .build();
    h.pbx.send(challenge.clone(), h.engine_addr()).await;

    h.pbx.expect_request(Method::Ack).await;
    let retry = h.pbx.expect_request(Method::Invite).await;
    assert_eq!(retry.headers.call_id, invite.headers.call_id);
    assert_eq!(retry.headers.cseq.seq, invite.headers.cseq.seq + 1);
    assert_ne!(retry.headers.top_via(), invite.headers.top_via());
    assert!(retry.headers.get("Proxy-Authorization").unwrap().contains(r#"realm="asterisk""#));

    let second = h
        .pbx
        .respond(&retry, StatusCode::ProxyAuthenticationRequired)
        .header("Proxy-Authenticate", r#"Digest realm="asterisk", nonce="xyz2""#)
        .build();
    h.pbx.send(second, h.engine_addr()).await;
    h.pbx.expect_request(Method::Ack).await;
    match h.next_event().await {
        EngineEvent::CallFailed { call_id, status, .. } => {
            assert_eq!(call_id, call.call_id);
            assert_eq!(status, StatusCode::ProxyAuthenticationRequired);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn test_unknown_bye_and_cancel_answered() {
    let mut h = Harness::trunk().await;
    let invite = h.pbx.invite(h.engine_addr(), "1000", 20000);
    for method in [Method::Bye, Method::Cancel] {
        let mut request = invite.clone();
        request.method = method.clone();
        request.headers.cseq.method = method;
        request.body.clear();
        h.pbx.send(request, h.engine_addr()).await;
        h.pbx.expect_response(StatusCode::Ok).await;
    }
    h.no_event().await;
}

#[tokio::test]
async fn test_options_and_unknown_methods() {
    let h = Harness::trunk().await;
    let mut options = h.pbx.invite(h.engine_addr(), "1000", 20000);
    options.method = Method::Options;
    options.headers.cseq.method = Method::Options;
    options.body.clear();
    h.pbx.send(options.clone(), h.engine_addr()).await;
    let ok = h.pbx.expect_response(StatusCode::Ok).await;
    assert!(ok.headers.get("Allow").unwrap().contains("BYE"));
    assert_eq!(ok.headers.get("Accept"), Some("application/sdp"));

    let mut info = options;
    info.method = Method::Extension("INFO".to_string());
    info.headers.cseq.method = info.method.clone();
    h.pbx.send(info, h.engine_addr()).await;
    h.pbx.expect_response(StatusCode::NotImplemented).await;
}

#[tokio::test]
async fn test_session_progress_with_sdp_starts_early_media() {
    let mut h = Harness::trunk().await;
    let call = h.engine.make_call("1000", 40000, "").await.unwrap();
    let invite = h.pbx.expect_request(Method::Invite).await;

    let progress = h
        .pbx
        .respond(&invite, StatusCode::SessionProgress)
        .sdp(FakePbx::answer_sdp(24000))
        .build();
    h.pbx.send(progress, h.engine_addr()).await;
    assert_eq!(
        h.next_event().await,
        EngineEvent::CallProgress {
            call_id: call.call_id.clone(),
            status: StatusCode::SessionProgress
        }
    );
    assert_eq!(h.next_event().await, EngineEvent::EarlyMedia { call_id: call.call_id.clone() });

    let early = h.engine.call(&call.call_id).unwrap();
    assert_eq!(early.state(), CallState::EarlyMedia);
    assert_eq!(early.remote_rtp.unwrap().port(), 24000);
    assert_eq!(early.codec, Some(8));
    assert_eq!(early.remote_tag(), Some(h.pbx.tag.as_str()));
}

#[tokio::test]
async fn test_bye_for_incoming_call_uses_our_tag_in_from() {
    let mut h = Harness::trunk().await;
    let invite = h.pbx.invite(h.engine_addr(), "1000", 20000);
    let call_id = invite.headers.call_id.clone();
    h.pbx.send(invite.clone(), h.engine_addr()).await;
    h.pbx.expect_response(StatusCode::Ringing).await;
    h.next_event().await;

    h.engine.answer_call(&call_id, 30000).await.unwrap();
    let ok = h.pbx.expect_response(StatusCode::Ok).await;
    h.pbx.send(h.pbx.in_dialog(&invite, &ok, Method::Ack, 1), h.engine_addr()).await;
    assert_eq!(h.next_event().await, EngineEvent::CallConfirmed { call_id: call_id.clone() });

    h.engine.hangup(&call_id, "gsm hangup").await.unwrap();
    let bye = h.pbx.expect_request(Method::Bye).await;
    assert_eq!(bye.uri, h.pbx.identity().uri);
    assert_eq!(bye.headers.call_id, call_id);
    assert_eq!(bye.headers.from.uri, invite.headers.to.uri);
    assert_eq!(bye.headers.from.tag(), ok.headers.to.tag());
    assert!(bye.headers.from.tag().is_some());
    assert_eq!(bye.headers.to.uri, invite.headers.from.uri);
    assert_eq!(bye.headers.to.tag(), Some(h.pbx.tag.as_str()));
    assert!(matches!(h.next_event().await, EngineEvent::CallEnded { .. }));
}

#[tokio::test]
async fn test_answer_reported_when_ack_cannot_be_sent() {
    let mut h = Harness::unreachable().await;
    assert!(matches!(h.next_event().await, EngineEvent::RegistrationFailed { .. }));

    // The INVITE itself never leaves; answer it from the recorded copy
    let call = h.engine.make_call("1000", 40000, "").await.unwrap();
    let invite = call.invite.clone().unwrap();
    let ok = h
        .pbx
        .respond(&invite, StatusCode::Ok)
        .sdp(FakePbx::answer_sdp(22000))
        .build();
    h.pbx.send(ok, h.engine_addr()).await;

    assert_eq!(h.next_event().await, EngineEvent::CallAnswered { call_id: call.call_id.clone() });
    assert_eq!(h.engine.call_state(&call.call_id), Some(CallState::Confirmed));
}
