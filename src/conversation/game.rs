//! Number-guessing mini-game.
//!
//! Idle → AwaitingGuess{secret} on `start`; back to Idle on a correct guess.
//! Wrong or unparseable guesses leave the state alone. A second `start`
//! while a game is running replaces the secret.

use std::cmp::Ordering;
use std::num::IntErrorKind;
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::GameError;

/// Per-conversation game state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GameState {
    #[default]
    Idle,
    AwaitingGuess { secret: u32 },
}

impl GameState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::AwaitingGuess { .. })
    }
}

impl std::fmt::Display for GameState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::AwaitingGuess { .. } => write!(f, "awaiting_guess"),
        }
    }
}

/// Result of a parsed guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuessOutcome {
    Correct { secret: u32 },
    TooLow,
    TooHigh,
}

/// Drives [`GameState`] transitions and owns the random source.
pub struct GameEngine {
    range: u32,
    rng: Mutex<StdRng>,
}

impl GameEngine {
    /// Engine drawing secrets from `[1, range]` with an entropy-seeded RNG.
    pub fn new(range: u32) -> Self {
        Self::with_rng(range, StdRng::from_entropy())
    }

    /// Engine with a fixed seed, for reproducible secrets.
    pub fn with_seed(range: u32, seed: u64) -> Self {
        Self::with_rng(range, StdRng::seed_from_u64(seed))
    }

    fn with_rng(range: u32, rng: StdRng) -> Self {
        Self {
            range: range.max(1),
            rng: Mutex::new(rng),
        }
    }


    /// Start (or restart) a game and return the prompt to send.
    pub fn start(&self, state: &mut GameState) -> String {
        let secret = {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            rng.gen_range(1..=self.range)
        };
        *state = GameState::AwaitingGuess { secret };
        tracing::debug!(range = self.range, "Game started");
        format!(
            "Ok ponnu 😌 game time 🎮\nI'm thinking of a number between 1 and {} 👀\nGuess cheyyu!",
            self.range
        )
    }

    /// Apply a guess; `None` when no game is running.
    ///
    /// Only a correct guess changes the state. Integers too large for `i64`
    /// still count as guesses.
    pub fn guess(
        &self,
        state: &mut GameState,
        text: &str,
    ) -> Option<Result<GuessOutcome, GameError>> {
        let GameState::AwaitingGuess { secret } = *state else {
            return None;
        };

        let input = text.trim();
        let outcome = match input.parse::<i64>() {
            Ok(value) => match value.cmp(&i64::from(secret)) {
                Ordering::Equal => {
                    *state = GameState::Idle;
                    GuessOutcome::Correct { secret }
                }
                Ordering::Less => GuessOutcome::TooLow,
                Ordering::Greater => GuessOutcome::TooHigh,
            },
            Err(e) if *e.kind() == IntErrorKind::PosOverflow => GuessOutcome::TooHigh,
            Err(e) if *e.kind() == IntErrorKind::NegOverflow => GuessOutcome::TooLow,
            Err(_) => {
                return Some(Err(GameError::NotANumber {
                    input: input.to_string(),
                }));
            }
        };
        Some(Ok(outcome))
    }

    /// Text sent back for a guess result.
    pub fn reply_for(&self, result: &Result<GuessOutcome, GameError>) -> String {
        match result {
            Ok(GuessOutcome::Correct { secret }) => {
                format!("Ayy correct ponnu 😌🔥 njan {secret} aanu vicharichathu!")
            }
            Ok(GuessOutcome::TooLow) => "Alla ponnu 😄 athilum valiya number aanu ⬆️".to_string(),
            Ok(GuessOutcome::TooHigh) => "Alla ponnu 😄 athilum cheriya number aanu ⬇️".to_string(),
            Err(GameError::NotANumber { .. }) => {
                format!("Number para ponnu 😅 1 muthal {} vare", self.range)
            }
        }
    }
}
