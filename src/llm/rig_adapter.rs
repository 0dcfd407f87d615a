//! Bridges rig's `CompletionModel` to our `LlmProvider` trait.
//!
//! System messages are folded into rig's preamble, the last user message
//! becomes the prompt and any earlier user messages become chat history.

use async_trait::async_trait;
use rig::completion::{CompletionError, CompletionModel};
use rig::message::{AssistantContent, Message};
use rig::one_or_many::OneOrMany;

use crate::error::UpstreamError;
use crate::llm::provider::{
    ChatMessage, CompletionRequest, CompletionResponse, LlmProvider, Role,
};

/// An [`LlmProvider`] backed by any rig completion model.
pub struct RigAdapter<M> {
    model: M,
    model_name: String,
}

impl<M: CompletionModel> RigAdapter<M> {
    pub fn new(model: M, model_name: impl Into<String>) -> Self {
        Self {
            model,
            model_name: model_name.into(),
        }
    }
}

/// A request split into rig's shape.
#[derive(Debug, PartialEq)]
struct RigParts {
    preamble: Option<String>,
    history: Vec<String>,
    prompt: String,
}

/// `None` when the request carries no user message to prompt with.
fn split_messages(messages: &[ChatMessage]) -> Option<RigParts> {
    let system: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();
    let user: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::User)
        .map(|m| m.content.as_str())
        .collect();

    let (prompt, earlier) = user.split_last()?;
    Some(RigParts {
        preamble: (!system.is_empty()).then(|| system.join("\n\n")),
        history: earlier.iter().map(|t| t.to_string()).collect(),
        prompt: prompt.to_string(),
    })
}

/// Concatenated text of the reply, trimmed. Non-text content is ignored.
fn response_text(choice: &OneOrMany<AssistantContent>) -> Option<String> {
    let text: String = choice
        .iter()
        .filter_map(|content| match content {
            AssistantContent::Text(text) => Some(text.text.as_str()),
            _ => None,
        })
        .collect();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn map_error(model: &str, err: CompletionError) -> UpstreamError {
    match err {
        CompletionError::JsonError(e) => UpstreamError::InvalidResponse {
            model: model.to_string(),
            reason: e.to_string(),
        },
        CompletionError::ResponseError(reason) => UpstreamError::InvalidResponse {
            model: model.to_string(),
            reason,
        },
        CompletionError::ProviderError(reason) => UpstreamError::Provider {
            model: model.to_string(),
            reason,
        },
        other => UpstreamError::RequestFailed {
            model: model.to_string(),
            reason: other.to_string(),
        },
    }
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, UpstreamError> {
        let parts = split_messages(&request.messages).ok_or_else(|| {
            UpstreamError::RequestFailed {
                model: self.model_name.clone(),
                reason: "request has no user message".into(),
            }
        })?;

        let mut builder = self
            .model
            .completion_request(Message::user(parts.prompt))
            .messages(parts.history.into_iter().map(|text| Message::user(text)).collect());
        if let Some(preamble) = parts.preamble {
            builder = builder.preamble(preamble);
        }
        if let Some(temperature) = request.temperature {
            builder = builder.temperature(f64::from(temperature));
        }

        let response = self
            .model
            .completion(builder.build())
            .await
            .map_err(|e| map_error(&self.model_name, e))?;

        let content =
            response_text(&response.choice).ok_or_else(|| UpstreamError::InvalidResponse {
                model: self.model_name.clone(),
                reason: "no text in completion".into(),
            })?;

        Ok(CompletionResponse {
            content,
            input_tokens: response.usage.input_tokens,
            output_tokens: response.usage.output_tokens,
        })
    }
}
