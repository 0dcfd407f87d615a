//! Chatwoot adapter: webhook payload decoding and reply delivery.
//!
//! Chatwoot posts every conversation event to the webhook. Only
//! `message_created` events with `message_type == "incoming"` carry user
//! messages; everything else is acknowledged and dropped.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;

use crate::channels::ReplySink;
use crate::config::ChatwootConfig;
use crate::error::{ChannelError, PipelineError};
use crate::pipeline::types::{InboundMessage, OutboundReply};

/// Placeholder text when a message carries attachments but no text.
pub const ATTACHMENT_PLACEHOLDER: &str = "User sent an attachment";

/// Placeholder text when a message has neither text nor attachments.
pub const REPLY_PLACEHOLDER: &str = "User replied to a message";

// ── Webhook payload ─────────────────────────────────────────────────

/// The subset of a Chatwoot webhook body the responder reads.
#[derive(Debug, Default, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub message_type: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub conversation: Option<IdRef>,
    #[serde(default)]
    pub sender: Option<IdRef>,
    #[serde(default)]
    pub attachments: Option<Vec<Value>>,
}

/// An object of which only the `id` matters.
#[derive(Debug, Default, Deserialize)]
pub struct IdRef {
    #[serde(default)]
    pub id: Option<Value>,
}

/// Chatwoot ids arrive as numbers, but strings are accepted too.
fn id_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

impl WebhookEvent {
    /// Parse a raw webhook body.
    pub fn from_slice(body: &[u8]) -> Result<Self, ChannelError> {
        serde_json::from_slice(body).map_err(|e| ChannelError::InvalidPayload(e.to_string()))
    }

    /// Whether this is a new message written by the contact.
    pub fn is_incoming_message(&self) -> bool {
        self.event.as_deref() == Some("message_created")
            && self.message_type.as_deref() == Some("incoming")
    }

    /// Convert into a pipeline message.
    ///
    /// Non-message events and events without a conversation id are errors
    /// the caller acknowledges and drops.
    pub fn into_inbound(self) -> Result<InboundMessage, PipelineError> {
        if !self.is_incoming_message() {
            return Err(PipelineError::Ignored(format!(
                "event={} message_type={}",
                self.event.as_deref().unwrap_or("none"),
                self.message_type.as_deref().unwrap_or("none"),
            )));
        }

        let conversation_id = id_string(self.conversation.as_ref().and_then(|c| c.id.as_ref()))
            .ok_or_else(|| PipelineError::MalformedInput("missing conversation id".into()))?;
        let sender = id_string(self.sender.as_ref().and_then(|s| s.id.as_ref()));

        let text = match self.content.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => text.to_string(),
            _ if self.attachments.as_ref().is_some_and(|a| !a.is_empty()) => {
                ATTACHMENT_PLACEHOLDER.to_string()
            }
            _ => REPLY_PLACEHOLDER.to_string(),
        };

        let mut message = InboundMessage::new(conversation_id, sender.as_deref(), text);
        if let Some(id) = id_string(self.id.as_ref()) {
            message.id = id;
        }
        Ok(message)
    }
}

// ── Delivery ────────────────────────────────────────────────────────

/// Posts replies into Chatwoot conversations.
pub struct ChatwootClient {
    client: reqwest::Client,
    base_url: String,
    account_id: String,
    api_key: SecretString,
}

impl ChatwootClient {
    pub fn new(config: &ChatwootConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            account_id: config.account_id.clone(),
            api_key: config.api_key.clone(),
        }
    }

    fn messages_url(&self, conversation_id: &str) -> String {
        format!(
            "{}/api/v1/accounts/{}/conversations/{}/messages",
            self.base_url, self.account_id, conversation_id
        )
    }
}

#[async_trait]
impl ReplySink for ChatwootClient {
    fn name(&self) -> &str {
        "chatwoot"
    }

    async fn deliver(&self, reply: &OutboundReply) -> Result<(), ChannelError> {
        let resp = self
            .client
            .post(self.messages_url(reply.conversation_id.as_str()))
            .header("api_access_token", self.api_key.expose_secret())
            .json(&serde_json::json!({
                "content": reply.text,
                "message_type": "outgoing",
            }))
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "chatwoot".into(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed {
                name: "chatwoot".into(),
                reason: format!("HTTP {status}: {}", body.chars().take(200).collect::<String>()),
            });
        }

        tracing::info!(
            conversation_id = %reply.conversation_id,
            status = status.as_u16(),
            "Reply delivered"
        );
        Ok(())
    }
}
