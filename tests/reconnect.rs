//! Scenario 6 (spec §8): losing the peer mid-session drives
//! connected -> reconnecting -> connected, firing the lifecycle callbacks
//! in order, while any request in flight at the moment of loss fails with
//! `connection`.


use std::sync::Arc;
use std::time::Duration;

use cdp_session::{Session, SessionConfig, SessionError, SessionState};
use serde_json::json;
use tokio::sync::Notify;

#[tokio::test]
async fn connection_loss_triggers_reconnect_and_in_flight_requests_fail() {
    let peer = harness::FakePeer::bind().await;
    let url = peer.url();

    let server = tokio::spawn(async move {
        let mut first = peer.accept().await;
        let req1 = harness::read_frame(&mut first).await;
        let v: serde_json::Value = serde_json::from_slice(&req1.payload).unwrap();
        assert_eq!(v["method"], "X");
        harness::write_text(&mut first, &json!({"id": v["id"], "result": {"ok": true}}).to_string()).await;

        // Read the in-flight request, then go dark without answering it.
        let _req2 = harness::read_frame(&mut first).await;
        drop(first);

        let mut second = peer.accept().await;
        let req3 = harness::read_frame(&mut second).await;
        let v3: serde_json::Value = serde_json::from_slice(&req3.payload).unwrap();
        harness::write_text(&mut second, &json!({"id": v3["id"], "result": {"ok": true}}).to_string()).await;
        second
    });

    let mut config = SessionConfig::default();
    config.auto_reconnect = true;
    config.reconnect_initial_delay = Duration::from_millis(20);
    config.reconnect_max_delay = Duration::from_millis(200);

    let session = Session::connect(&url, config).await.unwrap();

    let reconnecting = Arc::new(Notify::new());
    let reconnected = Arc::new(Notify::new());
    let attempt_slot = Arc::new(std::sync::Mutex::new(0u32));

    let r1 = Arc::clone(&reconnecting);
    let attempt_clone = Arc::clone(&attempt_slot);
    session.set_on_reconnecting(move |attempt| {
        *attempt_clone.lock().unwrap() = attempt;
        r1.notify_one();
    });
    let r2 = Arc::clone(&reconnected);
    session.set_on_reconnected(move || r2.notify_one());

    let first = session.send_sync("X", json!({}), Duration::from_secs(5)).await.unwrap();
    match first {
        cdp_protocol::ResponseOutcome::Result(v) => assert_eq!(v["ok"], true),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(session.state(), SessionState::Connected);

    let in_flight_session = session.clone();
    let in_flight = tokio::spawn(async move { in_flight_session.send_sync("Y", json!({}), Duration::from_secs(5)).await });

    tokio::time::timeout(Duration::from_secs(5), reconnecting.notified()).await.expect("never entered reconnecting");
    assert_eq!(*attempt_slot.lock().unwrap(), 1);

    let in_flight_result = in_flight.await.unwrap();
    assert!(matches!(in_flight_result, Err(SessionError::Connection)));

    tokio::time::timeout(Duration::from_secs(5), reconnected.notified()).await.expect("never reconnected");
    assert_eq!(session.state(), SessionState::Connected);

    let third = session.send_sync("Z", json!({}), Duration::from_secs(5)).await.unwrap();
    match third {
        cdp_protocol::ResponseOutcome::Result(v) => assert_eq!(v["ok"], true),
        other => panic!("unexpected {other:?}"),
    }

    server.await.unwrap();
}
