//! Scenario 3 (spec §8, invariant 6): a synchronous call issued from
//! inside a subscribed handler (i.e. from the reader task) must fail with
//! `would_deadlock` and must not put a frame on the wire.


use std::sync::Arc;
use std::time::Duration;

use cdp_session::{Session, SessionConfig, SessionError};
use serde_json::json;
use tokio::sync::Notify;

#[tokio::test]
async fn send_sync_from_within_a_handler_fails_without_any_io() {
    let peer = harness::FakePeer::bind().await;
    let url = peer.url();

    let server = tokio::spawn(async move {
        let mut stream = peer.accept().await;
        let event = json!({"method": "Page.loadEventFired", "params": {}}).to_string();
        harness::write_text(&mut stream, &event).await;

        // Nothing else should ever arrive: a short read-with-timeout that
        // fires proves the guard, not its absence.
        let saw_more = tokio::time::timeout(Duration::from_millis(300), harness::read_frame(&mut stream)).await;
        assert!(saw_more.is_err(), "a frame was sent despite the reader-task guard");
        stream
    });

    let session = Session::connect(&url, SessionConfig::default()).await.unwrap();

    let result_slot: Arc<std::sync::Mutex<Option<Result<(), SessionError>>>> = Arc::new(std::sync::Mutex::new(None));
    let notify = Arc::new(Notify::new());

    let slot = Arc::clone(&result_slot);
    let notified = Arc::clone(&notify);
    let handler_session = session.clone();
    let _token = session.on_event(
        "Page.loadEventFired",
        Arc::new(move |_method, _params| {
            let outcome = futures::executor::block_on(handler_session.send_sync(
                "Noop.noop",
                json!({}),
                Duration::from_millis(100),
            ));
            *slot.lock().unwrap() = Some(outcome.map(|_| ()).map_err(|e| e));
            notified.notify_one();
        }),
    );

    tokio::time::timeout(Duration::from_secs(5), notify.notified()).await.expect("handler never ran");

    let outcome = result_slot.lock().unwrap().take().expect("handler recorded no result");
    assert!(matches!(outcome, Err(SessionError::WouldDeadlock)));

    server.await.unwrap();
}
