//! `userInput.request` payloads

use serde::{Deserialize, Serialize};

/// A question the runtime wants a human to answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInputRequest {
    /// The question
    pub question: String,

    /// Suggested answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<String>>,

    /// Whether an answer outside `choices` is acceptable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_freeform: Option<bool>,
}

/// Params of a `userInput.request` server call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInputParams {
    /// Session asking
    pub session_id: String,

    /// The question
    #[serde(flatten)]
    pub request: UserInputRequest,
}

/// The host's answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInputResponse {
    /// Answer text
    pub answer: String,

    /// True when the answer was typed rather than picked from `choices`
    pub was_freeform: bool,
}

impl UserInputResponse {
    /// An answer picked from the offered choices
    pub fn choice(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            was_freeform: false,
        }
    }

    /// A typed answer
    pub fn freeform(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            was_freeform: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_params_flatten() {
        let params: UserInputParams = serde_json::from_value(json!({
            "sessionId": "s-1",
            "question": "Which branch?",
            "choices": ["main", "dev"],
            "allowFreeform": false
        }))
        .unwrap();
        assert_eq!(params.request.question, "Which branch?");
        assert_eq!(params.request.choices.as_ref().map(Vec::len), Some(2));
    }

    #[test]
    fn test_response_wire_shape() {
        assert_eq!(
            serde_json::to_value(UserInputResponse::freeform("feature/x")).unwrap(),
            json!({"answer": "feature/x", "wasFreeform": true})
        );
    }
}
