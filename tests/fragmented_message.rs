//! Scenario 4 (spec §8): a text message split across a FIN=0 frame and a
//! FIN=1 continuation reassembles into one message before dispatch.


use std::sync::Arc;
use std::time::Duration;

use cdp_session::{Session, SessionConfig};
use serde_json::json;
use tokio::sync::Notify;

#[tokio::test]
async fn continuation_frame_completes_the_message() {
    let peer = harness::FakePeer::bind().await;
    let url = peer.url();

    let server = tokio::spawn(async move {
        let mut stream = peer.accept().await;
        harness::write_frame(&mut stream, false, 0x1, br#"{"meth"#).await;
        harness::write_frame(&mut stream, true, 0x0, br#"od":"E"}"#).await;
        stream
    });

    let session = Session::connect(&url, SessionConfig::default()).await.unwrap();

    let notify = Arc::new(Notify::new());
    let observed = Arc::new(std::sync::Mutex::new(None));

    let notified = Arc::clone(&notify);
    let slot = Arc::clone(&observed);
    let _token = session.on_event(
        "E",
        Arc::new(move |_method, params| {
            *slot.lock().unwrap() = Some(params.clone());
            notified.notify_one();
        }),
    );

    tokio::time::timeout(Duration::from_secs(5), notify.notified()).await.expect("reassembled message never dispatched");

    let params = observed.lock().unwrap().take().unwrap();
    assert_eq!(params, json!({}));

    server.await.unwrap();
}
