//! Conversation Context
//!
//! A bounded, ordered log of conversation turns. The pipeline appends the
//! user question before any model call and the final answer text after, so
//! correction and classification prompts can see both sides of the exchange.
//!
//! # Invariants
//! - Insertion order is chronological and never reordered
//! - Length never exceeds the configured cap; overflow drops the OLDEST turns
//! - Turns are immutable once appended

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default maximum number of turns retained in the context
pub const DEFAULT_MAX_CONTEXT: usize = 10;

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human asking questions
    User,
    /// The agent's answers
    Assistant,
}

impl Role {
    /// Get the role name as a string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    /// Display label used when rendering history into a prompt
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One message in the conversation log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Who produced this turn
    pub role: Role,

    /// The turn text (question or final answer text)
    pub content: String,
}

impl Turn {
    /// Create a user turn
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    /// Create an assistant turn
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Bounded conversation log with FIFO eviction
#[derive(Debug, Clone)]
pub struct Context {
    turns: VecDeque<Turn>,
    max_turns: usize,
}

impl Context {
    /// Create an empty context with the given cap
    ///
    /// A cap of zero keeps the context permanently empty.
    #[must_use]
    pub fn new(max_turns: usize) -> Self {
        Self { turns: VecDeque::with_capacity(max_turns), max_turns }
    }

    /// Append a turn, evicting the oldest turn if the cap is exceeded
    pub fn push(&mut self, turn: Turn) {
        self.turns.push_back(turn);
        while self.turns.len() > self.max_turns {
            self.turns.pop_front();
        }
    }

    /// Number of turns currently held
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether the log is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// The configured cap
    #[must_use]
    pub const fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// Iterate over turns in chronological order
    pub fn iter(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    /// Reset the log to empty; the cap is unchanged
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// The trailing turns visible to a prompt stage
    ///
    /// `window` is the single configurable "turns visible to a prompt"
    /// parameter; `None` exposes the full bounded log. Every prompt stage
    /// uses the same window.
    #[must_use]
    pub fn visible(&self, window: Option<usize>) -> Vec<Turn> {
        let take = window.unwrap_or(self.turns.len()).min(self.turns.len());
        self.turns.iter().skip(self.turns.len() - take).cloned().collect()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONTEXT)
    }
}
