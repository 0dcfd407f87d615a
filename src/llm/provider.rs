//! Provider-neutral chat completion types.

use async_trait::async_trait;

use crate::error::UpstreamError;

/// Message author as understood by chat completion APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
}

/// One message of a completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A completion request. The model is chosen by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// A completed reply.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    pub content: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// A chat completion backend bound to one model.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Model identifier sent upstream.
    fn model_name(&self) -> &str;

    /// Run one completion.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, UpstreamError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder_sets_temperature() {
        let request = CompletionRequest::new(vec![ChatMessage::user("hi")]).with_temperature(0.7);
        assert_eq!(request.temperature, Some(0.7));
        assert_eq!(request.messages[0].role, Role::User);
    }

    #[test]
    fn new_request_has_no_temperature() {
        let request = CompletionRequest::new(vec![ChatMessage::system("be nice")]);
        assert_eq!(request.temperature, None);
        assert_eq!(request.messages[0].content, "be nice");
    }
}
