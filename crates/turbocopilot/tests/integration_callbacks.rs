//! Server-initiated requests: permissions, hooks, user input, tools

mod common;

use common::init_tracing;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use turbocopilot::testing::FakeRuntime;
use turbocopilot::{
    CopilotError, PermissionKind, PermissionResult, Session, SessionConfig, SessionHooks, Tool,
    ToolResult, UserInputResponse, approve_all,
};
use turbocopilot_protocol::PermissionDecision;
use turbocopilot_protocol::hooks::PreToolUseOutput;
use turbocopilot_protocol::methods;

async fn open(config: SessionConfig) -> (FakeRuntime, Session) {
    init_tracing();
    let runtime = FakeRuntime::builder().build();
    let session = runtime.client().create_session(config).await.unwrap();
    (runtime, session)
}

fn permission(session: &Session, kind: &str, call_id: &str) -> Value {
    json!({
        "sessionId": session.session_id(),
        "permissionRequest": {
            "kind": kind,
            "toolCallId": call_id,
            "fullCommandText": "ls -la",
        }
    })
}

fn result_kind(reply: &Value) -> &str {
    reply["result"]["kind"].as_str().unwrap_or_default()
}

#[tokio::test]
async fn test_permission_denied_without_handler() {
    let (runtime, session) = open(SessionConfig::new()).await;

    let created = &runtime.params_of(methods::SESSION_CREATE)[0];
    assert!(created.get("requestPermission").is_none());

    let reply = runtime
        .request(methods::PERMISSION_REQUEST, permission(&session, "shell", "c1"))
        .await
        .unwrap();
    assert_eq!(
        result_kind(&reply),
        "denied-no-approval-rule-and-could-not-request-from-user"
    );
}

#[tokio::test]
async fn test_permission_handler_decides() {
    let config = SessionConfig::new().on_permission_request(|request, invocation| async move {
        assert!(!invocation.session_id.is_empty());
        if request.kind == PermissionKind::Read {
            Ok(PermissionResult::approved())
        } else {
            Ok(PermissionResult::denied_interactively_by_user())
        }
    });
    let (runtime, session) = open(config).await;

    let created = &runtime.params_of(methods::SESSION_CREATE)[0];
    assert_eq!(created["requestPermission"], json!(true));

    let read = runtime
        .request(methods::PERMISSION_REQUEST, permission(&session, "read", "c1"))
        .await
        .unwrap();
    assert_eq!(result_kind(&read), "approved");

    let shell = runtime
        .request(methods::PERMISSION_REQUEST, permission(&session, "shell", "c2"))
        .await
        .unwrap();
    assert_eq!(result_kind(&shell), "denied-interactively-by-user");
}

#[tokio::test]
async fn test_failing_permission_handler_denies() {
    let config = SessionConfig::new().on_permission_request(|_, _| async {
        Err(CopilotError::Handler("policy store offline".to_string()))
    });
    let (runtime, session) = open(config).await;

    let reply = runtime
        .request(methods::PERMISSION_REQUEST, permission(&session, "write", "c1"))
        .await
        .unwrap();
    assert_eq!(
        result_kind(&reply),
        "denied-no-approval-rule-and-could-not-request-from-user"
    );
}

#[tokio::test]
async fn test_permission_for_unknown_session_denied() {
    let runtime = FakeRuntime::builder().build();
    runtime
        .client()
        .create_session(SessionConfig::new().with_permission_handler(approve_all()))
        .await
        .unwrap();

    let reply = runtime
        .request(
            methods::PERMISSION_REQUEST,
            json!({"sessionId": "someone-else", "permissionRequest": {"kind": "shell"}}),
        )
        .await
        .unwrap();
    assert_eq!(
        result_kind(&reply),
        "denied-no-approval-rule-and-could-not-request-from-user"
    );
}

#[tokio::test]
async fn test_pre_tool_use_hook_overrides_once() {
    let hooks = SessionHooks::new().on_pre_tool_use(|input, _| async move {
        if input.tool_name == "bash" {
            Ok(Some(
                PreToolUseOutput::decide(PermissionDecision::Deny).with_reason("no shells"),
            ))
        } else {
            Ok(None)
        }
    });
    let config = SessionConfig::new()
        .with_permission_handler(approve_all())
        .with_hooks(hooks);
    let (runtime, session) = open(config).await;

    let created = &runtime.params_of(methods::SESSION_CREATE)[0];
    assert_eq!(created["hooks"], json!(true));

    let hook_reply = runtime
        .request(
            methods::HOOKS_INVOKE,
            json!({
                "sessionId": session.session_id(),
                "hookType": "preToolUse",
                "input": {
                    "timestamp": 1,
                    "cwd": "/work",
                    "toolName": "bash",
                    "toolArgs": {"command": "ls"},
                    "toolCallId": "c1"
                }
            }),
        )
        .await
        .unwrap();
    assert_eq!(hook_reply["output"]["permissionDecision"], json!("deny"));

    let denied = runtime
        .request(methods::PERMISSION_REQUEST, permission(&session, "shell", "c1"))
        .await
        .unwrap();
    assert_eq!(result_kind(&denied), "denied-by-rules");

    // The decision is consumed; the handler answers the next request
    let again = runtime
        .request(methods::PERMISSION_REQUEST, permission(&session, "shell", "c1"))
        .await
        .unwrap();
    assert_eq!(result_kind(&again), "approved");
}

#[tokio::test]
async fn test_hook_decision_without_call_id_approves_nothing() {
    let hooks = SessionHooks::new().on_pre_tool_use(|_, _| async {
        Ok(Some(PreToolUseOutput::decide(PermissionDecision::Allow)))
    });
    let (runtime, session) = open(SessionConfig::new().with_hooks(hooks)).await;

    let hook_reply = runtime
        .request(
            methods::HOOKS_INVOKE,
            json!({
                "sessionId": session.session_id(),
                "hookType": "preToolUse",
                "input": {"timestamp": 1, "cwd": "/work", "toolName": "view", "toolArgs": {"path": "README.md"}}
            }),
        )
        .await
        .unwrap();
    assert_eq!(hook_reply["output"]["permissionDecision"], json!("allow"));

    let shell = runtime
        .request(
            methods::PERMISSION_REQUEST,
            json!({
                "sessionId": session.session_id(),
                "permissionRequest": {"kind": "shell", "toolCallId": "c9", "fullCommandText": "rm -rf /"}
            }),
        )
        .await
        .unwrap();
    assert_eq!(
        result_kind(&shell),
        "denied-no-approval-rule-and-could-not-request-from-user"
    );
}

#[tokio::test]
async fn test_missing_hook_answers_null() {
    let (runtime, session) = open(SessionConfig::new()).await;

    let reply = runtime
        .request(
            methods::HOOKS_INVOKE,
            json!({
                "sessionId": session.session_id(),
                "hookType": "postToolUse",
                "input": {"timestamp": 1, "cwd": "/", "toolName": "x", "toolArgs": {}, "toolResult": {}}
            }),
        )
        .await
        .unwrap();
    assert_eq!(reply, json!({"output": null}));
}

#[tokio::test]
async fn test_user_input_handler_answers() {
    let config = SessionConfig::new().on_user_input_request(|request, _| async move {
        let choice = request
            .choices
            .and_then(|choices| choices.into_iter().last())
            .unwrap_or_default();
        Ok(UserInputResponse::choice(choice))
    });
    let (runtime, session) = open(config).await;

    let created = &runtime.params_of(methods::SESSION_CREATE)[0];
    assert_eq!(created["requestUserInput"], json!(true));

    let reply = runtime
        .request(
            methods::USER_INPUT_REQUEST,
            json!({
                "sessionId": session.session_id(),
                "question": "Which color?",
                "choices": ["red", "blue"],
            }),
        )
        .await
        .unwrap();
    assert_eq!(reply, json!({"answer": "blue", "wasFreeform": false}));
}

#[tokio::test]
async fn test_user_input_without_handler_fails() {
    let (runtime, session) = open(SessionConfig::new()).await;

    let err = runtime
        .request(
            methods::USER_INPUT_REQUEST,
            json!({"sessionId": session.session_id(), "question": "Continue?"}),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, -32603);
}

#[tokio::test]
async fn test_tool_call_runs_handler() {
    let tool = Tool::new("lookup_weather", |invocation| async move {
        let city = invocation.arguments["city"].as_str().unwrap_or("nowhere").to_string();
        Ok(ToolResult::success(format!("Sunny in {}", city)))
    })
    .with_description("Weather by city")
    .with_parameters(json!({"type": "object", "properties": {"city": {"type": "string"}}}));
    let (runtime, session) = open(SessionConfig::new().with_tool(tool)).await;

    let created = &runtime.params_of(methods::SESSION_CREATE)[0];
    assert_eq!(created["tools"][0]["name"], json!("lookup_weather"));
    assert_eq!(created["tools"][0]["description"], json!("Weather by city"));

    let reply = runtime
        .request(
            methods::TOOL_CALL,
            json!({
                "sessionId": session.session_id(),
                "toolCallId": "t1",
                "toolName": "lookup_weather",
                "arguments": {"city": "Oslo"},
            }),
        )
        .await
        .unwrap();
    assert_eq!(reply["result"]["resultType"], json!("success"));
    assert_eq!(reply["result"]["textResultForLlm"], json!("Sunny in Oslo"));
}

#[tokio::test]
async fn test_tool_errors_and_unknown_tools_become_failures() {
    let tool = Tool::new("flaky", |_| async {
        Err(CopilotError::Handler("disk full".to_string()))
    });
    let (runtime, session) = open(SessionConfig::new().with_tool(tool)).await;

    let failed = runtime
        .request(
            methods::TOOL_CALL,
            json!({"sessionId": session.session_id(), "toolCallId": "t1", "toolName": "flaky"}),
        )
        .await
        .unwrap();
    assert_eq!(failed["result"]["resultType"], json!("failure"));

    let unknown = runtime
        .request(
            methods::TOOL_CALL,
            json!({"sessionId": session.session_id(), "toolCallId": "t2", "toolName": "missing"}),
        )
        .await
        .unwrap();
    assert_eq!(unknown["result"]["resultType"], json!("failure"));
    assert!(
        unknown["result"]["textResultForLlm"]
            .as_str()
            .unwrap()
            .contains("missing")
    );
}

#[tokio::test]
async fn test_slow_callbacks_do_not_block_each_other() {
    let started = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&started);
    let config = SessionConfig::new().on_permission_request(move |request, _| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            if request.tool_call_id.as_deref() == Some("slow") {
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
            Ok(PermissionResult::approved())
        }
    });
    let (runtime, session) = open(config).await;

    let slow = runtime.request(methods::PERMISSION_REQUEST, permission(&session, "shell", "slow"));
    let fast = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let reply = runtime
            .request(methods::PERMISSION_REQUEST, permission(&session, "shell", "fast"))
            .await
            .unwrap();
        // The fast answer arrives while the slow handler is still sleeping
        assert_eq!(started.load(Ordering::SeqCst), 2);
        reply
    };

    let (slow, fast) = tokio::join!(slow, fast);
    assert_eq!(result_kind(&slow.unwrap()), "approved");
    assert_eq!(result_kind(&fast), "approved");
}
