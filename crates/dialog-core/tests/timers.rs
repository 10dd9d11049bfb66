//! Retransmission and timeout behavior on a manual clock

mod common;

use std::time::Duration;

use common::Harness;
use dialog_core::{CallState, EngineEvent};
use sip_core::{Method, StatusCode};

#[tokio::test]
async fn test_invite_retransmitted_then_timed_out() {
    let mut h = Harness::trunk().await;
    let call = h.engine.make_call("1000", 40000, "").await.unwrap();
    let original = h.pbx.expect_request(Method::Invite).await;

    // 0.5, 1.5, 3.5, 7.5, 11.5 and 15.5 seconds
    for at_ms in [500, 1500, 3500, 7500, 11_500, 15_500] {
        h.clock.advance_to(Duration::from_millis(at_ms - 1)).await;
        assert_eq!(h.pbx.count_requests(Method::Invite).await, 0, "early at {at_ms}ms");
        h.clock.advance_to(Duration::from_millis(at_ms)).await;
        let again = h.pbx.expect_request(Method::Invite).await;
        assert_eq!(again, original);
    }

    h.clock.advance_to(Duration::from_millis(31_999)).await;
    assert_eq!(h.pbx.count_requests(Method::Invite).await, 0);
    assert_eq!(h.engine.call_state(&call.call_id), Some(CallState::Idle));
    h.no_event().await;

    h.clock.advance_to(Duration::from_secs(32)).await;
    assert_eq!(
        h.next_event().await,
        EngineEvent::CallFailed {
            call_id: call.call_id.clone(),
            status: StatusCode::RequestTimeout,
            reason: "Request Timeout".to_string()
        }
    );
    assert!(h.engine.registry().is_empty());

    h.clock.advance(Duration::from_secs(120)).await;
    h.no_event().await;
    assert_eq!(h.clock.pending(), 0);
}

#[tokio::test]
async fn test_provisional_response_keeps_call_until_timeout() {
    let mut h = Harness::trunk().await;
    let call = h.engine.make_call("1000", 40000, "").await.unwrap();
    let invite = h.pbx.expect_request(Method::Invite).await;
    h.pbx.send(h.pbx.respond(&invite, StatusCode::Ringing).build(), h.engine_addr()).await;
    h.next_event().await;

    h.clock.advance(Duration::from_secs(32)).await;
    assert!(matches!(
        h.next_event().await,
        EngineEvent::CallFailed { status: StatusCode::RequestTimeout, .. }
    ));
    assert!(h.engine.call(&call.call_id).is_none());
}

#[tokio::test]
async fn test_answer_stops_invite_timers() {
    let mut h = Harness::trunk().await;
    let call = h.engine.make_call("1000", 40000, "").await.unwrap();
    let invite = h.pbx.expect_request(Method::Invite).await;
    let ok = h
        .pbx
        .respond(&invite, StatusCode::Ok)
        .sdp(common::FakePbx::answer_sdp(22000))
        .build();
    h.pbx.send(ok, h.engine_addr()).await;
    h.pbx.expect_request(Method::Ack).await;
    h.next_event().await;

    h.clock.advance(Duration::from_secs(60)).await;
    assert_eq!(h.pbx.count_requests(Method::Invite).await, 0);
    h.no_event().await;
    assert_eq!(h.engine.call_state(&call.call_id), Some(CallState::Confirmed));
}

#[tokio::test]
async fn test_answer_retransmitted_until_ack() {
    let mut h = Harness::trunk().await;
    let invite = h.pbx.invite(h.engine_addr(), "1000", 20000);
    let call_id = invite.headers.call_id.clone();
    h.pbx.send(invite.clone(), h.engine_addr()).await;
    h.pbx.expect_response(StatusCode::Ringing).await;
    h.next_event().await;

    h.engine.answer_call(&call_id, 30000).await.unwrap();
    let ok = h.pbx.expect_response(StatusCode::Ok).await;

    h.clock.advance_to(Duration::from_millis(500)).await;
    assert_eq!(h.pbx.expect_response(StatusCode::Ok).await, ok);
    h.clock.advance_to(Duration::from_millis(1500)).await;
    assert_eq!(h.pbx.expect_response(StatusCode::Ok).await, ok);

    h.pbx.send(h.pbx.in_dialog(&invite, &ok, Method::Ack, 1), h.engine_addr()).await;
    assert_eq!(h.next_event().await, EngineEvent::CallConfirmed { call_id: call_id.clone() });

    h.clock.advance(Duration::from_secs(30)).await;
    assert!(h.pbx.recv_within(common::QUIET).await.is_none());
}

#[tokio::test]
async fn test_stop_hangs_up_and_cancels_timers() {
    let mut h = Harness::trunk().await;
    let call = h.engine.make_call("1000", 40000, "").await.unwrap();
    h.pbx.expect_request(Method::Invite).await;

    h.engine.stop().await;
    h.pbx.expect_request(Method::Cancel).await;
    assert!(matches!(h.next_event().await, EngineEvent::CallEnded { call_id, .. } if call_id == call.call_id));
    assert!(!h.engine.is_running());
    assert_eq!(h.clock.pending(), 0);
}

#[tokio::test]
async fn test_challenge_with_failing_sends_still_times_out() {
    let mut h = Harness::unreachable().await;
    assert!(matches!(h.next_event().await, EngineEvent::RegistrationFailed { .. }));

    let call = h.engine.make_call("1000", 40000, "").await.unwrap();
    let invite = call.invite.clone().unwrap();
    let challenge = h
        .pbx
        .respond(&invite, StatusCode::ProxyAuthenticationRequired)
        .header("Proxy-Authenticate", r#"Digest realm="asterisk", nonce="xyz""#)
        .build();
    h.pbx.send(challenge, h.engine_addr()).await;

    // Wait for the challenge to be taken before moving the clock
    for _ in 0..50 {
        if h.engine.call(&call.call_id).is_some_and(|c| c.auth_retried) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(h.engine.call(&call.call_id).unwrap().auth_retried);
    tokio::time::sleep(Duration::from_millis(100)).await;

    h.clock.advance(Duration::from_secs(32)).await;
    loop {
        match h.next_event().await {
            EngineEvent::RegistrationFailed { .. } => continue,
            EngineEvent::CallFailed { call_id, status, .. } => {
                assert_eq!(call_id, call.call_id);
                assert_eq!(status, StatusCode::RequestTimeout);
                break;
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert!(h.engine.registry().is_empty());
}
