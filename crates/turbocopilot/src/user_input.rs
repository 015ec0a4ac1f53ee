//! Answering `userInput.request`
//!
//! There is no default answer: without a handler the request fails back to
//! the runtime.

use crate::error::Result;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use turbocopilot_protocol::{UserInputRequest, UserInputResponse};

/// Where a user-input request came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInputInvocation {
    /// Session asking
    pub session_id: String,
}

/// Type alias for async user-input handlers
pub type UserInputHandler = Arc<
    dyn Fn(
            UserInputRequest,
            UserInputInvocation,
        ) -> Pin<Box<dyn Future<Output = Result<UserInputResponse>> + Send>>
        + Send
        + Sync,
>;

/// Wrap an async closure as a [`UserInputHandler`]
pub fn user_input_handler<F, Fut>(handler: F) -> UserInputHandler
where
    F: Fn(UserInputRequest, UserInputInvocation) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<UserInputResponse>> + Send + 'static,
{
    Arc::new(move |request, invocation| Box::pin(handler(request, invocation)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handler_answers() {
        let handler = user_input_handler(|request, _| async move {
            let first = request.choices.and_then(|c| c.into_iter().next());
            Ok(match first {
                Some(choice) => UserInputResponse::choice(choice),
                None => UserInputResponse::freeform("blue"),
            })
        });

        let request = UserInputRequest {
            question: "Favourite colour?".to_string(),
            choices: Some(vec!["red".to_string(), "green".to_string()]),
            allow_freeform: Some(true),
        };
        let response = handler(
            request,
            UserInputInvocation {
                session_id: "s1".to_string(),
            },
        )
        .await
        .unwrap();
        assert_eq!(response, UserInputResponse::choice("red"));
    }
}
