//! Chat Responder: rule-first auto-responder for a chat inbox.

pub mod channels;
pub mod config;
pub mod conversation;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod safety;
