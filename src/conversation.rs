//! Conversation store: the append-only log of turns kept for one session.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::llm::ChatMessage;

/// Number of most recent turns sent to the model alongside the system prompt.
pub const DEFAULT_CONTEXT_TURNS: usize = 10;

/// Role in conversation
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// Individual conversation entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Role and content only, as sent over the wire.
    pub fn to_message(&self) -> ChatMessage {
        ChatMessage {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// Ordered log of turns. The full log is kept for display; only the tail
/// is used as model context.
#[derive(Debug, Clone)]
pub struct Conversation {
    turns: Vec<Turn>,
    context_limit: usize,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self::with_context_limit(DEFAULT_CONTEXT_TURNS)
    }

    pub fn with_context_limit(context_limit: usize) -> Self {
        Self {
            turns: Vec::new(),
            context_limit,
        }
    }

    /// Add a turn to the end of the log.
    ///
    /// Timestamps must strictly increase, so a turn stamped at or before the
    /// current tail is restamped one microsecond after it.
    pub fn append(&mut self, mut turn: Turn) -> &Turn {
        if let Some(last) = self.turns.last() {
            if turn.timestamp <= last.timestamp {
                turn.timestamp = last.timestamp + Duration::microseconds(1);
            }
        }
        self.turns.push(turn);
        &self.turns[self.turns.len() - 1]
    }

    /// `[system_prompt]` followed by the most recent turns, oldest first.
    pub fn context_window(&self, system_prompt: &str) -> Vec<ChatMessage> {
        let start = self.turns.len().saturating_sub(self.context_limit);

        let mut messages = Vec::with_capacity(self.turns.len() - start + 1);
        messages.push(ChatMessage {
            role: Role::System,
            content: system_prompt.to_string(),
        });
        messages.extend(self.turns[start..].iter().map(Turn::to_message));
        messages
    }

    /// Drop every turn.
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn context_limit(&self) -> usize {
        self.context_limit
    }
}
