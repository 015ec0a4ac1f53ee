//! Connection-level behavior seen through the client

mod common;

use common::{init_tracing, wait_for_calls};
use futures::future::join_all;
use serde_json::json;
use std::sync::{Arc, Mutex};
use turbocopilot::testing::FakeRuntime;
use turbocopilot::{ClientOptions, ConnectionState, CopilotError, SessionConfig};
use turbocopilot_protocol::methods;
use turbocopilot_protocol::rpc::SessionLifecycleEventType;

#[tokio::test]
async fn test_concurrent_calls_get_their_own_answers() {
    init_tracing();
    let runtime = FakeRuntime::builder().build();
    let client = runtime.client();
    client.start().await.unwrap();

    let pings = (0..20).map(|i| {
        let client = client.clone();
        async move {
            let message = format!("ping-{}", i);
            let reply = client.ping(Some(&message)).await.unwrap();
            (message, reply.message)
        }
    });

    for (sent, echoed) in join_all(pings).await {
        assert_eq!(echoed.as_deref(), Some(sent.as_str()));
    }
}

#[tokio::test]
async fn test_state_follows_start_and_stop() {
    let runtime = FakeRuntime::builder().build();
    let client = runtime.client();
    assert_eq!(client.state(), ConnectionState::Closed);

    client.start().await.unwrap();
    assert_eq!(client.state(), ConnectionState::Ready);
    // Starting again is a no-op
    client.start().await.unwrap();
    assert_eq!(runtime.calls_to(methods::PING), 1);

    client.stop().await;
    assert_eq!(client.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn test_pending_calls_fail_on_teardown() {
    let runtime = FakeRuntime::builder().silent(methods::STATUS_GET).build();
    let client = runtime.client();
    client.start().await.unwrap();

    let pending = {
        let client = client.clone();
        tokio::spawn(async move { client.get_status().await })
    };
    wait_for_calls(&runtime, methods::STATUS_GET, 1).await;

    client.force_stop().await;
    let err = pending.await.unwrap().unwrap_err();
    assert!(matches!(err, CopilotError::ConnectionClosed));
}

#[tokio::test]
async fn test_no_auto_start_refuses_calls() {
    let runtime = FakeRuntime::builder()
        .options(ClientOptions::default().with_auto_start(false))
        .build();
    let client = runtime.client();

    let err = client
        .create_session(SessionConfig::new())
        .await
        .unwrap_err();
    assert!(matches!(err, CopilotError::ConnectionClosed));
    assert!(runtime.calls().is_empty());
}

#[tokio::test]
async fn test_version_mismatch_fails_start() {
    let runtime = FakeRuntime::builder()
        .respond(
            methods::PING,
            json!({"message": null, "timestamp": 0, "protocolVersion": 1}),
        )
        .build();
    let client = runtime.client();

    let err = client.start().await.unwrap_err();
    assert!(matches!(
        err,
        CopilotError::VersionMismatch {
            expected: 2,
            got: 1
        }
    ));
    assert_eq!(client.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn test_lifecycle_notifications_reach_listeners() {
    let runtime = FakeRuntime::builder().build();
    let client = runtime.client();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let subscription = client.on_lifecycle(move |event| {
        sink.lock()
            .unwrap()
            .push((event.event_type.clone(), event.session_id.clone()));
    });
    let session = client.create_session(SessionConfig::new()).await.unwrap();

    runtime.notify(
        methods::SESSION_LIFECYCLE,
        json!({"type": "session.foreground", "sessionId": session.session_id()}),
    );
    // A round trip guarantees the notification was handled first
    client.ping(None).await.unwrap();

    subscription.unsubscribe();
    runtime.notify(
        methods::SESSION_LIFECYCLE,
        json!({"type": "session.deleted", "sessionId": session.session_id()}),
    );
    client.ping(None).await.unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![(SessionLifecycleEventType::Foreground, session.session_id())]
    );
}

#[tokio::test]
async fn test_events_for_unknown_sessions_are_dropped() {
    let runtime = FakeRuntime::builder().build();
    let client = runtime.client();
    let session = client.create_session(SessionConfig::new()).await.unwrap();
    let mut events = session.subscribe();

    runtime.emit("not-ours", "assistant.message", json!({"messageId": "x", "content": "stray"}));
    runtime.emit(&session.session_id(), "session.idle", json!({}));

    let first = events.next_event().await.unwrap();
    assert_eq!(first.event_type, "session.idle");
}
