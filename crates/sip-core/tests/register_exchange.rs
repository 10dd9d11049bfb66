//! Client-side REGISTER challenge round trip, as a PBX would drive it

use md5::{Digest, Md5};
use sip_core::types::auth::digest_response;
use sip_core::{
    Authorization, Credentials, DigestChallenge, Message, Method, NameAddr, RequestBuilder,
    StatusCode, Via, parse_message,
};

const CHALLENGE: &str = "SIP/2.0 401 Unauthorized\r\n\
    Via: SIP/2.0/UDP 10.0.0.2:5060;branch=z9hG4bKreg1;rport=5060;received=10.0.0.2\r\n\
    From: <sip:u@pbx.local>;tag=11111111\r\n\
    To: <sip:u@pbx.local>;tag=as5f0e\r\n\
    Call-ID: reg-1@10.0.0.2\r\n\
    CSeq: 1 REGISTER\r\n\
    Server: Asterisk PBX 18\r\n\
    WWW-Authenticate: Digest algorithm=MD5, realm=\"asterisk\", nonce=\"abc123\"\r\n\
    Content-Length: 0\r\n\r\n";

fn md5_hex(input: &str) -> String {
    format!("{:x}", Md5::digest(input.as_bytes()))
}

#[test]
fn test_challenge_answered_with_expected_digest() {
    let Message::Response(resp) = parse_message(CHALLENGE.as_bytes()).unwrap() else {
        panic!("expected a response");
    };
    assert_eq!(resp.status, StatusCode::Unauthorized);
    assert!(resp.status.is_auth_challenge());

    let challenge: DigestChallenge = resp.headers.get("WWW-Authenticate").unwrap().parse().unwrap();
    let uri = "sip:pbx.local";
    let auth = Authorization::new(&challenge, &Credentials::new("u", "p"), &Method::Register, uri);

    let ha1 = md5_hex("u:asterisk:p");
    let ha2 = md5_hex("REGISTER:sip:pbx.local");
    let expected = md5_hex(&format!("{ha1}:abc123:{ha2}"));
    assert_eq!(auth.response, expected);
    assert_eq!(
        digest_response("u", "asterisk", "p", "abc123", &Method::Register, uri),
        expected
    );

    let retry = RequestBuilder::new(Method::Register, uri)
        .via(Via::udp("10.0.0.2", 5060, "z9hG4bKreg2"))
        .from(resp.headers.from.clone())
        .to(NameAddr::sip("u", "pbx.local", None))
        .call_id(resp.call_id())
        .cseq(2)
        .expires(60)
        .header("Authorization", auth.to_string())
        .build()
        .unwrap();

    let Message::Request(parsed) = parse_message(&retry.to_bytes()).unwrap() else {
        panic!("expected a request");
    };
    assert_eq!(parsed.headers.cseq.seq, 2);
    assert_eq!(parsed.headers.expires, Some(60));
    let header = parsed.headers.get("authorization").unwrap();
    assert!(header.contains(&format!("response=\"{expected}\"")));
    assert!(header.contains("realm=\"asterisk\""));
}
