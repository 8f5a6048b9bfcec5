//! Conversions between [`ChatMessage`] and `async-openai` request types.

use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionResponse,
};

use crate::error::{FailureKind, ModelError};
use crate::message::{ChatMessage, Role};

pub(super) fn to_request_message(
    message: &ChatMessage,
) -> Result<ChatCompletionRequestMessage, OpenAIError> {
    let content = message.content.as_str();
    Ok(match message.role {
        Role::System => {
            ChatCompletionRequestSystemMessageArgs::default().content(content).build()?.into()
        }
        Role::User => {
            ChatCompletionRequestUserMessageArgs::default().content(content).build()?.into()
        }
        Role::Assistant => {
            ChatCompletionRequestAssistantMessageArgs::default().content(content).build()?.into()
        }
    })
}

/// Pull the first choice's text out of a completion.
pub(super) fn first_choice_text(
    provider: &str,
    response: CreateChatCompletionResponse,
) -> Result<String, ModelError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| {
            ModelError::provider(provider, FailureKind::Malformed, "completion contained no text")
        })
}

pub(super) fn map_openai_error(provider: &str, err: OpenAIError) -> ModelError {
    match err {
        OpenAIError::Reqwest(e) => {
            ModelError::provider(provider, FailureKind::from_reqwest(&e), format!("request failed: {e}"))
        }
        OpenAIError::ApiError(api) => {
            // No HTTP status survives here; classify on the message alone.
            let kind = FailureKind::from_status(0, &api.message);
            ModelError::provider(provider, kind, format!("API error: {}", api.message))
        }
        OpenAIError::JSONDeserialize(e) => ModelError::provider(
            provider,
            FailureKind::Malformed,
            format!("failed to parse response: {e}"),
        ),
        other => ModelError::provider(provider, FailureKind::Rejected, other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_every_role() {
        for message in [
            ChatMessage::system("rules"),
            ChatMessage::user("Question: why?"),
            ChatMessage::assistant("because"),
        ] {
            let converted = to_request_message(&message).unwrap();
            let matches_role = matches!(
                (&message.role, &converted),
                (Role::System, ChatCompletionRequestMessage::System(_))
                    | (Role::User, ChatCompletionRequestMessage::User(_))
                    | (Role::Assistant, ChatCompletionRequestMessage::Assistant(_))
            );
            assert!(matches_role, "role {:?} converted to wrong variant", message.role);
        }
    }
}
