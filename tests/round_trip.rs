//! Scenario 1 (spec §8): round-trip command against a fake endpoint that
//! echoes a canned result.


use std::time::Duration;

use cdp_session::{Session, SessionConfig};
use serde_json::json;

#[tokio::test]
async fn synchronous_call_returns_the_echoed_result() {
    let peer = harness::FakePeer::bind().await;
    let url = peer.url();

    let server = tokio::spawn(async move {
        let mut stream = peer.accept().await;
        let frame = harness::read_frame(&mut stream).await;
        assert_eq!(frame.opcode, 0x1);
        let text = String::from_utf8(frame.payload).unwrap();
        let request: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(request["id"], 1);
        assert_eq!(request["method"], "X");

        let response = json!({"id": 1, "result": {"ok": true}}).to_string();
        harness::write_text(&mut stream, &response).await;
        stream
    });

    let session = Session::connect(&url, SessionConfig::default()).await.unwrap();
    let outcome = session.send_sync("X", json!({}), Duration::from_secs(5)).await.unwrap();

    match outcome {
        cdp_protocol::ResponseOutcome::Result(value) => assert_eq!(value["ok"], true),
        cdp_protocol::ResponseOutcome::Error(e) => panic!("unexpected error response: {e:?}"),
    }

    server.await.unwrap();
}
