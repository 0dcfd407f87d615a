//! Message decision pipeline.
//!
//! Every inbound chat message flows through:
//! 1. `AccessFilter::allow()`: allowlisted senders only
//! 2. `RulesEngine::evaluate()`: deterministic rules (no upstream call)
//! 3. `CompletionClient::complete()`: generated reply, only if no rule matched
//! 4. Overlays: confusion → game, low-engagement → game offer (cooldown)
//!
//! Both sides of every exchange are recorded in conversation memory.

pub mod processor;
pub mod router;
pub mod rules;
pub mod types;

pub use processor::MessageProcessor;
pub use router::DecisionRouter;
pub use rules::{Rule, RuleContext, RulesEngine};
pub use types::{InboundMessage, OutboundReply, ReplyKind, RuleReply};
