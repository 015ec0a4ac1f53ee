//! Shared helpers for integration tests

#![allow(dead_code)]

use serde_json::{Value, json};
use std::sync::Once;
use turbocopilot::testing::{FakeHandle, FakeRuntime, FakeRuntimeBuilder};
use turbocopilot_protocol::methods;

static TRACING: Once = Once::new();

/// Install a test subscriber once; honors `RUST_LOG`
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A runtime whose `session.send` answers like a tiny deterministic model
pub fn scripted_runtime() -> FakeRuntime {
    scripted_builder().build()
}

/// Builder for [`scripted_runtime`], for adding more scripted methods
pub fn scripted_builder() -> FakeRuntimeBuilder {
    init_tracing();
    FakeRuntime::builder().on(methods::SESSION_SEND, |params, handle| {
        let session_id = params
            .get("sessionId")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let prompt = params
            .get("prompt")
            .and_then(Value::as_str)
            .unwrap_or_default();

        let answer = answer(&session_id, prompt, handle);
        if streams(&session_id, handle) {
            for (index, chunk) in answer.split_inclusive(' ').enumerate() {
                handle.emit(
                    &session_id,
                    "assistant.message_delta",
                    json!({"messageId": format!("delta-{}", index), "deltaContent": chunk}),
                );
            }
        }
        handle.reply(&session_id, &answer);

        Ok(json!({"messageId": format!("m-{}", handle.calls().len())}))
    })
}

fn answer(session_id: &str, prompt: &str, handle: &FakeHandle) -> String {
    if prompt.contains("2+2") {
        return "4".to_string();
    }
    if prompt.contains("secret word") {
        // The word must have been taught earlier in this same session
        let taught = sent_prompts(session_id, handle)
            .iter()
            .any(|earlier| earlier.contains("PINEAPPLE") && !earlier.contains("secret word"));
        return if taught {
            "The secret word is PINEAPPLE.".to_string()
        } else {
            "I don't know any secret word.".to_string()
        };
    }
    if prompt.contains("PINEAPPLE") {
        return "Got it, I will remember.".to_string();
    }
    if prompt.contains("Introduce yourself") {
        let system = system_message(session_id, handle);
        if system.contains("pirate") {
            return "Ahoy, matey! I be yer assistant.".to_string();
        }
        if system.contains("robot") {
            return "BEEP. I AM A HELPFUL ROBOT.".to_string();
        }
        return "Hello, I am an assistant.".to_string();
    }
    format!("You said: {}", prompt)
}

fn sent_prompts(session_id: &str, handle: &FakeHandle) -> Vec<String> {
    handle
        .calls()
        .into_iter()
        .filter(|call| call.method == methods::SESSION_SEND)
        .filter(|call| call.params.get("sessionId").and_then(Value::as_str) == Some(session_id))
        .filter_map(|call| {
            call.params
                .get("prompt")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .collect()
}

fn creation_params(session_id: &str, handle: &FakeHandle) -> Option<Value> {
    handle
        .calls()
        .into_iter()
        .filter(|call| call.method == methods::SESSION_CREATE)
        .find(|call| call.params.get("sessionId").and_then(Value::as_str) == Some(session_id))
        .map(|call| call.params)
}

fn system_message(session_id: &str, handle: &FakeHandle) -> String {
    creation_params(session_id, handle)
        .and_then(|params| {
            params
                .pointer("/systemMessage/content")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_default()
}

fn streams(session_id: &str, handle: &FakeHandle) -> bool {
    creation_params(session_id, handle)
        .and_then(|params| params.get("streaming").and_then(Value::as_bool))
        .unwrap_or(false)
}

/// Wait until the client has made `count` calls to `method`
pub async fn wait_for_calls(runtime: &FakeRuntime, method: &str, count: usize) {
    tokio::time::timeout(std::time::Duration::from_secs(5), async {
        while runtime.calls_to(method) < count {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("client never made {} call(s) to {}", count, method));
}
