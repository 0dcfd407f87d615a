//! Deterministic reply rules, evaluated before any upstream call.
//!
//! Rules run in a fixed order and the first one that produces a reply wins:
//! 1. prohibited content → deflection
//! 2. running game → guess evaluation
//! 3. explicit game request → new game
//!
//! If no rule matches the router falls through to the completion client.

use std::sync::Arc;

use regex::Regex;
use tracing::debug;

use crate::conversation::{GameEngine, GameState};
use crate::pipeline::types::{ReplyKind, RuleReply};

/// Denylisted tokens (matched as substrings of the lowercased message).
pub const DENYLIST: &[&str] = &["kundi", "kundii", "ass", "fuck", "shit", "myre", "myr", "punda"];

/// Phrases that explicitly ask for a game.
pub const GAME_TRIGGERS: &[&str] = &[
    "play",
    "game",
    "kalikkam",
    "kalikk",
    "bore",
    "boring",
    "oru game",
    "lets play",
    "entha cheyyam",
];

/// Fixed reply to denylisted content.
pub const DEFLECTION_REPLY: &str = "Hehe ponnu 😄 kundi means ass in Malayalam alle? Chill da 😌";

// ── Phrase matching ─────────────────────────────────────────────────

/// "Lowercased text contains any of these phrases" matcher.
///
/// Text is lowercased with `str::to_lowercase` before a case-sensitive
/// search, so only characters that lowercase onto a phrase match it.
#[derive(Debug, Clone)]
pub struct PhraseMatcher {
    regex: Option<Regex>,
}

impl PhraseMatcher {
    /// Compile a matcher from literal phrases. Empty phrases are skipped.
    pub fn new<I, S>(phrases: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let alternation: Vec<String> = phrases
            .into_iter()
            .map(|p| p.as_ref().trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .map(|p| regex::escape(&p))
            .collect();

        if alternation.is_empty() {
            return Ok(Self { regex: None });
        }

        let regex = Regex::new(&alternation.join("|"))?;
        Ok(Self { regex: Some(regex) })
    }

    /// The first phrase found in `text`, lowercased.
    pub fn find(&self, text: &str) -> Option<String> {
        let regex = self.regex.as_ref()?;
        regex.find(&text.to_lowercase()).map(|m| m.as_str().to_string())
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex
            .as_ref()
            .is_some_and(|r| r.is_match(&text.to_lowercase()))
    }
}

// ── Rule trait ──────────────────────────────────────────────────────

/// What a rule may look at and change while classifying one message.
pub struct RuleContext<'a> {
    /// Raw message text.
    pub text: &'a str,
    /// The conversation's game state, locked for this message.
    pub game: &'a mut GameState,
}

/// A deterministic rule: a definite reply, or `None` to pass.
pub trait Rule: Send + Sync {
    /// Stable name for logs and ordering checks.
    fn name(&self) -> &'static str;

    fn try_classify(&self, ctx: &mut RuleContext<'_>) -> Option<RuleReply>;
}

/// Deflects denylisted content so it never reaches the model.
pub struct ProhibitedContentRule {
    denylist: PhraseMatcher,
    reply: String,
}

impl ProhibitedContentRule {
    pub fn new(denylist: PhraseMatcher, reply: impl Into<String>) -> Self {
        Self {
            denylist,
            reply: reply.into(),
        }
    }
}

impl Rule for ProhibitedContentRule {
    fn name(&self) -> &'static str {
        "prohibited_content"
    }

    fn try_classify(&self, ctx: &mut RuleContext<'_>) -> Option<RuleReply> {
        let token = self.denylist.find(ctx.text)?;
        debug!(token = %token, "Message contains denylisted token");
        Some(RuleReply {
            kind: ReplyKind::Deflection,
            text: self.reply.clone(),
        })
    }
}

/// Sends every message to the running game, if there is one.
pub struct ActiveGameRule {
    games: Arc<GameEngine>,
}

impl ActiveGameRule {
    pub fn new(games: Arc<GameEngine>) -> Self {
        Self { games }
    }
}

impl Rule for ActiveGameRule {
    fn name(&self) -> &'static str {
        "active_game"
    }

    fn try_classify(&self, ctx: &mut RuleContext<'_>) -> Option<RuleReply> {
        let result = self.games.guess(ctx.game, ctx.text)?;
        debug!(result = ?result, "Evaluated guess");
        Some(RuleReply {
            kind: ReplyKind::GameMove,
            text: self.games.reply_for(&result),
        })
    }
}

/// Starts a game when the user asks for one.
pub struct GameRequestRule {
    triggers: PhraseMatcher,
    games: Arc<GameEngine>,
}

impl GameRequestRule {
    pub fn new(triggers: PhraseMatcher, games: Arc<GameEngine>) -> Self {
        Self { triggers, games }
    }
}

impl Rule for GameRequestRule {
    fn name(&self) -> &'static str {
        "game_request"
    }

    fn try_classify(&self, ctx: &mut RuleContext<'_>) -> Option<RuleReply> {
        let trigger = self.triggers.find(ctx.text)?;
        debug!(trigger = %trigger, "Explicit game request");
        Some(RuleReply {
            kind: ReplyKind::GameStart,
            text: self.games.start(ctx.game),
        })
    }
}

// ── Engine ──────────────────────────────────────────────────────────

/// Ordered list of rules; the first definite reply wins.
pub struct RulesEngine {
    rules: Vec<Box<dyn Rule>>,
}

impl RulesEngine {
    /// The standard rule chain: prohibited content, active game, game request.
    pub fn default_rules(games: Arc<GameEngine>) -> Result<Self, regex::Error> {
        let denylist = PhraseMatcher::new(DENYLIST)?;
        let triggers = PhraseMatcher::new(GAME_TRIGGERS)?;

        Ok(Self {
            rules: vec![
                Box::new(ProhibitedContentRule::new(denylist, DEFLECTION_REPLY)),
                Box::new(ActiveGameRule::new(Arc::clone(&games))),
                Box::new(GameRequestRule::new(triggers, games)),
            ],
        })
    }

    /// Rule names in evaluation order.
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Run the rules in order; returns the matching rule's name and reply.
    pub fn evaluate(&self, ctx: &mut RuleContext<'_>) -> Option<(&'static str, RuleReply)> {
        self.rules
            .iter()
            .find_map(|rule| rule.try_classify(ctx).map(|reply| (rule.name(), reply)))
    }
}
