//! Session flows against the in-process fake runtime

mod common;

use common::{scripted_builder, scripted_runtime, wait_for_calls};
use futures::StreamExt;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use turbocopilot::testing::FakeRuntime;
use turbocopilot::{
    CopilotError, ResumeSessionConfig, SessionConfig, SessionEventPayload, SessionEventType,
    SessionStatus, SystemMessageConfig,
};
use turbocopilot_protocol::methods;

#[tokio::test]
async fn test_simple_question_gets_answer() {
    let runtime = scripted_runtime();
    let client = runtime.client();

    let session = client.create_session(SessionConfig::new()).await.unwrap();
    let reply = session
        .send_and_wait("What is 2+2?", None)
        .await
        .unwrap()
        .expect("turn produced a message");

    assert_eq!(reply.kind(), SessionEventType::AssistantMessage);
    assert!(reply.assistant_content().unwrap().contains('4'));
    assert_eq!(session.workspace_path().as_deref(), Some("/tmp/fake-workspace"));

    let created = runtime.params_of(methods::SESSION_CREATE);
    assert_eq!(created.len(), 1);
    assert_eq!(created[0]["sessionId"], json!(session.session_id()));

    assert!(client.stop().await.is_empty());
}

#[tokio::test]
async fn test_resumed_session_remembers_earlier_turns() {
    let runtime = scripted_runtime();
    let client = runtime.client();

    let session = client.create_session(SessionConfig::new()).await.unwrap();
    let session_id = session.session_id();
    session
        .send_and_wait("Remember the word PINEAPPLE.", None)
        .await
        .unwrap();
    session.destroy().await.unwrap();

    let resumed = client
        .resume_session(ResumeSessionConfig::new(&session_id))
        .await
        .unwrap();
    assert_eq!(resumed.session_id(), session_id);

    let reply = resumed
        .send_and_wait("What is the secret word?", None)
        .await
        .unwrap()
        .and_then(|event| event.assistant_content())
        .unwrap();
    assert!(reply.contains("PINEAPPLE"));
}

#[tokio::test]
async fn test_fresh_session_does_not_share_memory() {
    let runtime = scripted_runtime();
    let client = runtime.client();

    let first = client.create_session(SessionConfig::new()).await.unwrap();
    first
        .send_and_wait("Remember the word PINEAPPLE.", None)
        .await
        .unwrap();

    let second = client.create_session(SessionConfig::new()).await.unwrap();
    let reply = second
        .send_and_wait("What is the secret word?", None)
        .await
        .unwrap()
        .and_then(|event| event.assistant_content())
        .unwrap();
    assert!(!reply.contains("PINEAPPLE"));
}

#[tokio::test]
async fn test_resume_unknown_session_is_not_found() {
    let runtime = FakeRuntime::builder()
        .fail(
            methods::SESSION_RESUME,
            turbocopilot_protocol::RpcErrorObject::new(-32603, "Session not found: ghost"),
        )
        .build();
    let client = runtime.client();

    let err = client
        .resume_session(ResumeSessionConfig::new("ghost"))
        .await
        .unwrap_err();
    assert!(matches!(err, CopilotError::SessionNotFound(ref id) if id == "ghost"));
}

#[tokio::test]
async fn test_concurrent_sessions_stay_isolated() {
    let runtime = scripted_runtime();
    let client = runtime.client();

    let pirate = client
        .create_session(
            SessionConfig::new().with_system_message(SystemMessageConfig::append(
                "Always talk like a pirate.",
            )),
        )
        .await
        .unwrap();
    let robot = client
        .create_session(
            SessionConfig::new()
                .with_system_message(SystemMessageConfig::append("You are a robot.")),
        )
        .await
        .unwrap();

    let pirate_seen = Arc::new(Mutex::new(Vec::new()));
    let robot_seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&pirate_seen);
    let _pirate_sub = pirate.on(move |event| {
        if let Some(content) = event.assistant_content() {
            sink.lock().unwrap().push(content);
        }
    });
    let sink = Arc::clone(&robot_seen);
    let _robot_sub = robot.on(move |event| {
        if let Some(content) = event.assistant_content() {
            sink.lock().unwrap().push(content);
        }
    });

    let (pirate_reply, robot_reply) = tokio::join!(
        pirate.send_and_wait("Introduce yourself.", None),
        robot.send_and_wait("Introduce yourself.", None),
    );

    let pirate_text = pirate_reply.unwrap().and_then(|e| e.assistant_content()).unwrap();
    let robot_text = robot_reply.unwrap().and_then(|e| e.assistant_content()).unwrap();
    assert!(pirate_text.contains("matey"));
    assert!(robot_text.contains("ROBOT"));

    assert_eq!(*pirate_seen.lock().unwrap(), vec![pirate_text]);
    assert_eq!(*robot_seen.lock().unwrap(), vec![robot_text]);
}

#[tokio::test]
async fn test_streaming_deltas_precede_final_message() {
    let runtime = scripted_runtime();
    let client = runtime.client();

    let session = client
        .create_session(
            SessionConfig::new()
                .with_streaming(true)
                .with_system_message(SystemMessageConfig::append("Always talk like a pirate.")),
        )
        .await
        .unwrap();
    let mut events = session.subscribe();

    let reply = session
        .send_and_wait("Introduce yourself.", None)
        .await
        .unwrap()
        .and_then(|event| event.assistant_content())
        .unwrap();

    let mut streamed = String::new();
    let mut saw_final = false;
    while let Some(event) = events.next().await {
        match event.payload() {
            SessionEventPayload::AssistantMessageDelta(delta) => {
                assert!(!saw_final, "delta arrived after the final message");
                streamed.push_str(&delta.delta_content);
            }
            SessionEventPayload::AssistantMessage(_) => saw_final = true,
            SessionEventPayload::SessionIdle => break,
            _ => {}
        }
    }

    assert!(saw_final);
    assert_eq!(streamed, reply);
}

#[tokio::test]
async fn test_turn_without_message_yields_none() {
    let runtime = FakeRuntime::builder()
        .on(methods::SESSION_SEND, |params, handle| {
            let session_id = params["sessionId"].as_str().unwrap_or_default();
            handle.emit(session_id, "session.idle", json!({}));
            Ok(json!({"messageId": "m-1"}))
        })
        .build();
    let session = runtime
        .client()
        .create_session(SessionConfig::new())
        .await
        .unwrap();

    assert!(session.send_and_wait("hi", None).await.unwrap().is_none());
}

#[tokio::test]
async fn test_session_error_fails_the_wait() {
    let runtime = FakeRuntime::builder()
        .on(methods::SESSION_SEND, |params, handle| {
            let session_id = params["sessionId"].as_str().unwrap_or_default();
            handle.emit(
                session_id,
                "session.error",
                json!({"errorType": "model", "message": "quota exceeded"}),
            );
            Ok(json!({"messageId": "m-1"}))
        })
        .build();
    let session = runtime
        .client()
        .create_session(SessionConfig::new())
        .await
        .unwrap();

    let err = session.send_and_wait("hi", None).await.unwrap_err();
    match err {
        CopilotError::SessionError {
            error_type,
            message,
        } => {
            assert_eq!(error_type, "model");
            assert_eq!(message, "quota exceeded");
        }
        other => panic!("expected a session error, got {:?}", other),
    }
    assert_eq!(session.status(), SessionStatus::Active);
}

#[tokio::test]
async fn test_wait_times_out_and_session_stays_usable() {
    let runtime = FakeRuntime::builder()
        .respond(methods::SESSION_SEND, json!({"messageId": "m-1"}))
        .build();
    let session = runtime
        .client()
        .create_session(SessionConfig::new())
        .await
        .unwrap();

    let limit = Duration::from_millis(50);
    let err = session.send_and_wait("hi", Some(limit)).await.unwrap_err();
    assert!(matches!(err, CopilotError::Timeout(d) if d == limit));

    assert_eq!(session.status(), SessionStatus::Active);
    assert_eq!(session.send("again").await.unwrap(), "m-1");
}

#[tokio::test]
async fn test_wait_times_out_when_send_is_never_answered() {
    let runtime = FakeRuntime::builder().silent(methods::SESSION_SEND).build();
    let session = runtime
        .client()
        .create_session(SessionConfig::new())
        .await
        .unwrap();

    let limit = Duration::from_millis(50);
    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        session.send_and_wait("hi", Some(limit)),
    )
    .await
    .expect("send_and_wait honors its own limit");
    assert!(matches!(outcome, Err(CopilotError::Timeout(d)) if d == limit));
    assert_eq!(runtime.calls_to(methods::SESSION_SEND), 1);
    assert_eq!(session.status(), SessionStatus::Active);
}

#[tokio::test]
async fn test_destroy_interrupts_pending_wait() {
    let runtime = FakeRuntime::builder()
        .respond(methods::SESSION_SEND, json!({"messageId": "m-1"}))
        .build();
    let session = runtime
        .client()
        .create_session(SessionConfig::new())
        .await
        .unwrap();

    let waiting = session.clone();
    let wait = tokio::spawn(async move { waiting.send_and_wait("hi", None).await });
    wait_for_calls(&runtime, methods::SESSION_SEND, 1).await;

    session.destroy().await.unwrap();
    let err = wait.await.unwrap().unwrap_err();
    assert!(matches!(err, CopilotError::SessionDestroyed(_)));

    assert!(matches!(
        session.send("after").await,
        Err(CopilotError::SessionDestroyed(_))
    ));
    // Destroy is idempotent and only reaches the runtime once
    session.destroy().await.unwrap();
    assert_eq!(runtime.calls_to(methods::SESSION_DESTROY), 1);
}

#[tokio::test]
async fn test_lost_connection_reaches_every_session() {
    let runtime = FakeRuntime::builder()
        .respond(methods::SESSION_SEND, json!({"messageId": "m-1"}))
        .build();
    let client = runtime.client();
    let first = client.create_session(SessionConfig::new()).await.unwrap();
    let second = client.create_session(SessionConfig::new()).await.unwrap();

    let mut first_events = first.subscribe();
    let mut second_events = second.subscribe();

    let waiting = first.clone();
    let wait = tokio::spawn(async move { waiting.send_and_wait("hi", None).await });
    wait_for_calls(&runtime, methods::SESSION_SEND, 1).await;

    runtime.disconnect().await;

    let err = wait.await.unwrap().unwrap_err();
    assert!(matches!(err, CopilotError::ConnectionClosed));

    for events in [&mut first_events, &mut second_events] {
        let event = events.next_event().await.unwrap();
        assert_eq!(event.kind(), SessionEventType::Disconnected);
        assert!(events.next_event().await.is_none());
    }

    assert_eq!(first.status(), SessionStatus::Disconnected);
    assert!(matches!(
        second.send("after").await,
        Err(CopilotError::ConnectionClosed)
    ));
}

#[tokio::test]
async fn test_stop_destroys_open_sessions() {
    let runtime = scripted_runtime();
    let client = runtime.client();
    let first = client.create_session(SessionConfig::new()).await.unwrap();
    let second = client.create_session(SessionConfig::new()).await.unwrap();

    assert!(client.stop().await.is_empty());

    assert_eq!(runtime.calls_to(methods::SESSION_DESTROY), 2);
    assert!(first.is_destroyed());
    assert!(second.is_destroyed());
    // Stopping twice is harmless
    assert!(client.stop().await.is_empty());
}

#[tokio::test]
async fn test_stop_collects_destroy_failures() {
    let runtime = scripted_builder()
        .fail(
            methods::SESSION_DESTROY,
            turbocopilot_protocol::RpcErrorObject::internal("busy"),
        )
        .build();
    let client = runtime.client();
    client.create_session(SessionConfig::new()).await.unwrap();
    client.create_session(SessionConfig::new()).await.unwrap();

    let errors = client.stop().await;
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|err| err.rpc_code() == Some(-32603)));
}

#[tokio::test]
async fn test_history_comes_back_in_order() {
    let runtime = FakeRuntime::builder()
        .respond(
            methods::SESSION_GET_MESSAGES,
            json!({"events": [
                {"id": "e1", "timestamp": "2025-01-01T00:00:00Z", "type": "user.message",
                 "data": {"content": "hi"}},
                {"id": "e2", "timestamp": "2025-01-01T00:00:01Z", "type": "assistant.message",
                 "data": {"messageId": "m1", "content": "hello"}},
            ]}),
        )
        .build();
    let session = runtime
        .client()
        .create_session(SessionConfig::new())
        .await
        .unwrap();

    let history = session.get_messages().await.unwrap();
    let ids: Vec<_> = history.iter().map(|event| event.id.as_str()).collect();
    assert_eq!(ids, ["e1", "e2"]);
    assert_eq!(history[1].assistant_content().as_deref(), Some("hello"));
}
