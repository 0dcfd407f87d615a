//! Configuration types.
//!
//! Everything is read from the process environment once at startup.
//! [`AppConfig::from_lookup`] takes the lookup as a function so tests can
//! supply variables without touching the real environment.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default persona prompt sent as the first system message.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a friendly, playful Instagram DM assistant. \
Always call the user 'ponnu'. \
Talk casually like a Malayali friend. \
Never say you are an AI or bot. \
If asked who you are, say: I'm Radhin's personal assistant 😌. \
If confused, suggest playing a game. \
Keep replies short and fun.";

pub const DEFAULT_PORT: u16 = 10000;
pub const DEFAULT_OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_PRIMARY_MODEL: &str = "mistralai/mistral-7b-instruct";
pub const DEFAULT_FALLBACK_MODEL: &str = "meta-llama/llama-3.1-8b-instruct";
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_MEMORY_CAPACITY: usize = 10;
pub const DEFAULT_OFFER_COOLDOWN: Duration = Duration::from_secs(1800);
pub const DEFAULT_GAME_RANGE: u32 = 10;

/// Chatwoot account used to deliver replies.
#[derive(Debug, Clone)]
pub struct ChatwootConfig {
    pub base_url: String,
    pub account_id: String,
    pub api_key: SecretString,
}

/// Upstream completion service settings.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub api_key: SecretString,
    pub primary_model: String,
    pub fallback_model: String,
    /// Applied to each call separately, primary and fallback alike.
    pub timeout: Duration,
}

/// Conversation behaviour knobs.
#[derive(Debug, Clone)]
pub struct ResponderConfig {
    pub system_prompt: String,
    pub memory_capacity: usize,
    pub offer_cooldown: Duration,
    pub game_range: u32,
    pub allowed_senders: Vec<String>,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            offer_cooldown: DEFAULT_OFFER_COOLDOWN,
            game_range: DEFAULT_GAME_RANGE,
            allowed_senders: Vec::new(),
        }
    }
}

/// Full process configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub chatwoot: ChatwootConfig,
    pub upstream: UpstreamConfig,
    pub responder: ResponderConfig,
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| get(key).ok_or_else(|| ConfigError::MissingEnvVar(key.into()));

        let port = parse_or(&get, "PORT", DEFAULT_PORT)?;

        let chatwoot = ChatwootConfig {
            base_url: require("CHATWOOT_BASE_URL")?
                .trim_end_matches('/')
                .to_string(),
            account_id: require("CHATWOOT_ACCOUNT_ID")?,
            api_key: SecretString::from(require("CHATWOOT_API_KEY")?),
        };

        let upstream = UpstreamConfig {
            base_url: get("OPENROUTER_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENROUTER_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key: SecretString::from(require("OPENROUTER_API_KEY")?),
            primary_model: get("RESPONDER_PRIMARY_MODEL")
                .unwrap_or_else(|| DEFAULT_PRIMARY_MODEL.to_string()),
            fallback_model: get("RESPONDER_FALLBACK_MODEL")
                .unwrap_or_else(|| DEFAULT_FALLBACK_MODEL.to_string()),
            timeout: Duration::from_secs(parse_or(
                &get,
                "RESPONDER_UPSTREAM_TIMEOUT_SECS",
                DEFAULT_UPSTREAM_TIMEOUT.as_secs(),
            )?),
        };

        let memory_capacity: usize =
            parse_or(&get, "RESPONDER_MEMORY_CAPACITY", DEFAULT_MEMORY_CAPACITY)?;
        if memory_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "RESPONDER_MEMORY_CAPACITY".into(),
                message: "must be at least 1".into(),
            });
        }

        let game_range: u32 = parse_or(&get, "RESPONDER_GAME_RANGE", DEFAULT_GAME_RANGE)?;
        if game_range == 0 {
            return Err(ConfigError::InvalidValue {
                key: "RESPONDER_GAME_RANGE".into(),
                message: "must be at least 1".into(),
            });
        }

        let responder = ResponderConfig {
            system_prompt: get("RESPONDER_SYSTEM_PROMPT")
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            memory_capacity,
            offer_cooldown: Duration::from_secs(parse_or(
                &get,
                "RESPONDER_OFFER_COOLDOWN_SECS",
                DEFAULT_OFFER_COOLDOWN.as_secs(),
            )?),
            game_range,
            allowed_senders: get("RESPONDER_ALLOWED_SENDERS")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        };

        Ok(Self {
            port,
            chatwoot,
            upstream,
            responder,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{raw:?}: {e}"),
        }),
        None => Ok(default),
    }
}
