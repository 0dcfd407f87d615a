//! Decision router: picks exactly one reply per inbound message.
//!
//! Flow for one message, per conversation:
//! 1. Lock, append the user entry, run the deterministic rules.
//!    A rule reply is appended and returned without unlocking in between.
//! 2. Otherwise release the lock and call the completion client.
//! 3. Re-lock, apply the confusion and offer overlays, append the reply.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::config::ResponderConfig;
use crate::conversation::{
    Clock, ConversationState, ConversationStore, GameEngine, MemoryEntry, SystemClock,
};
use crate::llm::{Completion, CompletionClient, ServedBy};
use crate::pipeline::rules::{PhraseMatcher, RuleContext, RulesEngine};
use crate::pipeline::types::{InboundMessage, OutboundReply, ReplyKind};

/// Messages that count as the user drifting off (exact, trimmed, lowercase).
pub const LOW_ENGAGEMENT_PHRASES: &[&str] = &[
    "ok", "okay", "k", "kk", "fine", "idk", "hmm", "hm", "mm", "nothing", "sheri", "mathi",
];

/// Markers of a generated reply that didn't know what to say.
pub const CONFUSION_MARKERS: &[&str] = &["not sure", "don't know", "confused", "can't understand"];

/// Appended to a generated reply when offering a game.
pub const GAME_INVITATION: &str = "Bore adikkunnundo ponnu? Oru game kalikkam? 🎮 'play' ennu para 😌";

/// Post-completion adjustments.
pub struct OverlayPolicy {
    low_engagement: HashSet<String>,
    cooldown: Duration,
    invitation: String,
    confusion: PhraseMatcher,
}

impl OverlayPolicy {
    pub fn new(cooldown: Duration) -> Result<Self, regex::Error> {
        Ok(Self {
            low_engagement: LOW_ENGAGEMENT_PHRASES.iter().map(|p| p.to_string()).collect(),
            cooldown,
            invitation: GAME_INVITATION.to_string(),
            confusion: PhraseMatcher::new(CONFUSION_MARKERS)?,
        })
    }

    pub fn is_low_engagement(&self, text: &str) -> bool {
        self.low_engagement.contains(&text.trim().to_lowercase())
    }
}

/// Orchestrates rules, game, cooldown and completion for one conversation.
pub struct DecisionRouter {
    store: Arc<ConversationStore>,
    rules: RulesEngine,
    games: Arc<GameEngine>,
    completion: CompletionClient,
    overlays: OverlayPolicy,
    system_prompt: String,
    clock: Arc<dyn Clock>,
}

impl DecisionRouter {
    /// Router with the default rule chain.
    pub fn new(
        config: &ResponderConfig,
        store: Arc<ConversationStore>,
        games: Arc<GameEngine>,
        completion: CompletionClient,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            store,
            rules: RulesEngine::default_rules(Arc::clone(&games))?,
            games,
            completion,
            overlays: OverlayPolicy::new(config.offer_cooldown)?,
            system_prompt: config.system_prompt.clone(),
            clock: Arc::new(SystemClock),
        })
    }

    /// Replace the wall clock (tests drive the cooldown with a fake one).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    /// Decide the reply to `message` and record both sides in memory.
    pub async fn respond(&self, message: &InboundMessage) -> OutboundReply {
        let id = &message.conversation_id;

        let history = {
            let mut state = self.store.lock(id).await;
            state.memory.push(MemoryEntry::user(&message.text));

            let mut ctx = RuleContext {
                text: &message.text,
                game: &mut state.game,
            };
            if let Some((rule, reply)) = self.rules.evaluate(&mut ctx) {
                info!(
                    conversation_id = %id,
                    rule,
                    kind = reply.kind.label(),
                    "Rule matched, skipping completion"
                );
                state.memory.push(MemoryEntry::assistant(&reply.text));
                return OutboundReply {
                    conversation_id: id.clone(),
                    text: reply.text,
                    kind: reply.kind,
                };
            }

            // Everything before the message we just appended.
            let mut history = state.memory.snapshot();
            history.pop();
            history
        };

        debug!(conversation_id = %id, history = history.len(), "No rule matched, calling upstream");
        let completion = self
            .completion
            .complete(&self.system_prompt, &history, &message.text)
            .await;

        let served_by = completion.served_by;
        let mut state = self.store.lock(id).await;
        let (text, kind) = self.apply_overlays(&mut state, message, completion);
        state.memory.push(MemoryEntry::assistant(&text));

        info!(
            conversation_id = %id,
            served_by = served_by.label(),
            kind = kind.label(),
            "Generated reply"
        );
        OutboundReply {
            conversation_id: id.clone(),
            text,
            kind,
        }
    }

    fn apply_overlays(
        &self,
        state: &mut ConversationState,
        message: &InboundMessage,
        completion: Completion,
    ) -> (String, ReplyKind) {
        let Completion { mut text, served_by } = completion;

        // A game started by another message while the lock was released wins.
        if served_by != ServedBy::Degraded && !state.game.is_active() {
            if let Some(marker) = self.overlays.confusion.find(&text) {
                debug!(marker = %marker, "Generated reply sounds confused, starting a game");
                return (self.games.start(&mut state.game), ReplyKind::GameStart);
            }
        }

        let mut kind = if served_by == ServedBy::Degraded {
            ReplyKind::Degraded
        } else {
            ReplyKind::Generated
        };

        if self.overlays.is_low_engagement(&message.text) {
            let now = self.clock.now();
            if state.cooldown.offer_due(now, self.overlays.cooldown) {
                text.push_str("\n\n");
                text.push_str(&self.overlays.invitation);
                state.cooldown.record_offer(now);
                if kind == ReplyKind::Generated {
                    kind = ReplyKind::GeneratedWithOffer;
                }
                debug!(conversation_id = %message.conversation_id, "Appended game offer");
            } else {
                debug!(conversation_id = %message.conversation_id, "Game offer on cooldown");
            }
        }

        (text, kind)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::conversation::{EntryRole, GameState};
    use crate::error::UpstreamError;
    use crate::llm::failover::DEGRADED_REPLY;
    use crate::llm::{CompletionRequest, CompletionResponse, LlmProvider};
    use crate::pipeline::rules::DEFLECTION_REPLY;

    struct StubLlm {
        reply: Option<&'static str>,
        delay: Duration,
        calls: Mutex<Vec<CompletionRequest>>,
    }

    impl StubLlm {
        fn replying(reply: &'static str) -> Arc<Self> {
            Self::slow(reply, Duration::ZERO)
        }

        fn slow(reply: &'static str, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                reply: Some(reply),
                delay,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: None,
                delay: Duration::ZERO,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LlmProvider for StubLlm {
        fn model_name(&self) -> &str {
            "stub"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, UpstreamError> {
            self.calls.lock().unwrap().push(request);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match self.reply {
                Some(text) => Ok(CompletionResponse {
                    content: text.to_string(),
                    input_tokens: 0,
                    output_tokens: 0,
                }),
                None => Err(UpstreamError::Provider {
                    model: "stub".into(),
                    reason: "500 Internal Server Error".into(),
                }),
            }
        }
    }

    struct FakeClock(Mutex<DateTime<Utc>>);

    impl FakeClock {
        fn advance(&self, secs: i64) {
            *self.0.lock().unwrap() += chrono::Duration::seconds(secs);
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    fn router_with(llm: Arc<StubLlm>, seed: u64) -> (DecisionRouter, Arc<FakeClock>) {
        router_in_range(llm, ResponderConfig::default().game_range, seed)
    }

    fn router_in_range(
        llm: Arc<StubLlm>,
        range: u32,
        seed: u64,
    ) -> (DecisionRouter, Arc<FakeClock>) {
        let config = ResponderConfig::default();
        let store = Arc::new(ConversationStore::new(config.memory_capacity));
        let games = Arc::new(GameEngine::with_seed(range, seed));
        let completion = CompletionClient::new(llm.clone(), llm, Duration::from_secs(1));
        let clock = Arc::new(FakeClock(Mutex::new(Utc::now())));
        let router = DecisionRouter::new(&config, store, games, completion)
            .unwrap()
            .with_clock(clock.clone());
        (router, clock)
    }

    fn msg(text: &str) -> InboundMessage {
        InboundMessage::new("conv-1", Some("U1"), text)
    }

    #[tokio::test]
    async fn generated_reply_is_remembered_after_user_message() {
        let llm = StubLlm::replying("hey ponnu 😌");
        let (router, _) = router_with(llm.clone(), 1);

        let reply = router.respond(&msg("hi")).await;
        assert_eq!(reply.text, "hey ponnu 😌");
        assert_eq!(reply.kind, ReplyKind::Generated);

        let snap = router.store().snapshot(&"conv-1".into()).await;
        assert_eq!(snap, vec![MemoryEntry::user("hi"), MemoryEntry::assistant("hey ponnu 😌")]);
    }

    #[tokio::test]
    async fn upstream_request_summarises_prior_history() {
        let llm = StubLlm::replying("sure");
        let (router, _) = router_with(llm.clone(), 1);

        router.respond(&msg("first")).await;
        router.respond(&msg("second")).await;

        let calls = llm.calls.lock().unwrap();
        let last = calls.last().unwrap();
        assert_eq!(last.messages.len(), 3);
        assert!(last.messages[1].content.contains("User: first\nAssistant: sure"));
        assert!(!last.messages[1].content.contains("second"));
        assert_eq!(last.messages[2].content, "second");
    }

    #[tokio::test]
    async fn deflection_never_reaches_upstream() {
        let llm = StubLlm::replying("should not be used");
        let (router, _) = router_with(llm.clone(), 1);

        let reply = router.respond(&msg("you are an ASS")).await;
        assert_eq!(reply.text, DEFLECTION_REPLY);
        assert_eq!(reply.kind, ReplyKind::Deflection);
        assert_eq!(llm.call_count(), 0);

        let snap = router.store().snapshot(&"conv-1".into()).await;
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[1].role, EntryRole::Assistant);
    }

    #[tokio::test]
    async fn play_then_guess_secret_ends_game() {
        let llm = StubLlm::replying("unused");
        let (router, _) = router_with(llm.clone(), 42);
        let id = "conv-1".into();

        let start = router.respond(&msg("play")).await;
        assert_eq!(start.kind, ReplyKind::GameStart);
        let GameState::AwaitingGuess { secret } = router.store().game_state(&id).await else {
            panic!("game should be active");
        };
        assert!((1..=10).contains(&secret));

        let wrong = if secret == 1 { 2 } else { secret - 1 };
        let hint = router.respond(&msg(&wrong.to_string())).await;
        assert_eq!(hint.kind, ReplyKind::GameMove);
        assert!(router.store().game_state(&id).await.is_active());

        let done = router.respond(&msg(&secret.to_string())).await;
        assert!(done.text.contains("correct"));
        assert_eq!(router.store().game_state(&id).await, GameState::Idle);
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn both_models_failing_yields_remembered_degraded_reply() {
        let (router, _) = router_with(StubLlm::failing(), 1);

        let reply = router.respond(&msg("tell me a story")).await;
        assert_eq!(reply.text, DEGRADED_REPLY);
        assert_eq!(reply.kind, ReplyKind::Degraded);

        let snap = router.store().snapshot(&"conv-1".into()).await;
        assert_eq!(snap.last(), Some(&MemoryEntry::assistant(DEGRADED_REPLY)));
    }

    #[tokio::test]
    async fn low_engagement_offer_respects_cooldown() {
        let (router, clock) = router_with(StubLlm::replying("hmm okay"), 1);

        let first = router.respond(&msg("ok")).await;
        assert_eq!(first.kind, ReplyKind::GeneratedWithOffer);
        assert!(first.text.ends_with(GAME_INVITATION));

        clock.advance(60);
        let second = router.respond(&msg("  OK ")).await;
        assert_eq!(second.kind, ReplyKind::Generated);
        assert!(!second.text.contains(GAME_INVITATION));

        clock.advance(1800);
        let third = router.respond(&msg("idk")).await;
        assert_eq!(third.kind, ReplyKind::GeneratedWithOffer);
    }

    #[tokio::test]
    async fn cooldown_is_per_conversation() {
        let (router, _) = router_with(StubLlm::replying("fine"), 1);
        let a = InboundMessage::new("a", Some("U1"), "ok");
        let b = InboundMessage::new("b", Some("U1"), "ok");
        assert_eq!(router.respond(&a).await.kind, ReplyKind::GeneratedWithOffer);
        assert_eq!(router.respond(&b).await.kind, ReplyKind::GeneratedWithOffer);
    }

    #[tokio::test]
    async fn engaged_message_gets_no_offer() {
        let (router, _) = router_with(StubLlm::replying("nice"), 1);
        let reply = router.respond(&msg("ok so what did you eat today")).await;
        assert_eq!(reply.kind, ReplyKind::Generated);
    }

    #[tokio::test]
    async fn confused_reply_is_replaced_by_game() {
        let (router, _) = router_with(StubLlm::replying("I'm not sure what you mean"), 5);
        let reply = router.respond(&msg("asdfgh")).await;
        assert_eq!(reply.kind, ReplyKind::GameStart);
        assert!(router.store().game_state(&"conv-1".into()).await.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn confused_reply_keeps_game_started_while_upstream_was_busy() {
        let llm = StubLlm::slow("I'm not sure what you mean", Duration::from_millis(200));
        let (router, _) = router_in_range(llm, 1_000_000, 9);
        let id = "conv-1".into();

        let (hello, play) = (msg("hello"), msg("play"));
        let (first, second) = tokio::join!(router.respond(&hello), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            router.respond(&play).await
        });
        assert_eq!(second.kind, ReplyKind::GameStart);
        assert_eq!(first.kind, ReplyKind::Generated);
        assert_eq!(first.text, "I'm not sure what you mean");

        // The secret is still the first draw of the seeded engine.
        let mut expected = GameState::Idle;
        GameEngine::with_seed(1_000_000, 9).start(&mut expected);
        assert_eq!(router.store().game_state(&id).await, expected);

        let snap = router.store().snapshot(&id).await;
        let prompts = snap.iter().filter(|e| e.text.contains("game time")).count();
        assert_eq!(prompts, 1);
    }

    #[tokio::test]
    async fn rule_reply_does_not_consume_offer_cooldown() {
        let (router, _) = router_with(StubLlm::replying("yo"), 1);
        // "bore" is a game trigger; the offer overlay must not run for it.
        let start = router.respond(&msg("bore")).await;
        assert_eq!(start.kind, ReplyKind::GameStart);
        let guess = router.respond(&msg("ok")).await;
        assert_eq!(guess.kind, ReplyKind::GameMove);

        let state = router.store().lock(&"conv-1".into()).await;
        assert_eq!(state.cooldown.last_offer(), None);
    }

    #[tokio::test]
    async fn memory_stays_bounded_across_turns() {
        let (router, _) = router_with(StubLlm::replying("r"), 1);
        for i in 0..20 {
            router.respond(&msg(&format!("message {i}"))).await;
        }
        let snap = router.store().snapshot(&"conv-1".into()).await;
        assert_eq!(snap.len(), 10);
        assert_eq!(snap.last(), Some(&MemoryEntry::assistant("r")));
        assert_eq!(snap[8], MemoryEntry::user("message 19"));
    }

    #[test]
    fn low_engagement_is_exact_trimmed_lowercase() {
        let policy = OverlayPolicy::new(Duration::from_secs(1800)).unwrap();
        assert!(policy.is_low_engagement(" Fine "));
        assert!(policy.is_low_engagement("IDK"));
        assert!(!policy.is_low_engagement("fine thanks"));
    }
}
