//! Short-term conversation memory.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Default number of retained turns (five exchanges).
pub const DEFAULT_MAX_TURNS: usize = 10;

/// Speaker of a turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationRole {
    /// The person asking.
    User,
    /// The assistant's reply.
    Assistant,
}

impl ConversationRole {
    /// Label used in prompts.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Chatify",
        }
    }
}

/// A single message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Speaker.
    pub role: ConversationRole,
    /// Message text.
    pub text: String,
}

/// Bounded FIFO of recent turns, held in memory for the session only.
#[derive(Clone, Debug)]
pub struct ConversationHistory {
    turns: VecDeque<ConversationTurn>,
    max_turns: usize,
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TURNS)
    }
}

impl ConversationHistory {
    /// Empty history keeping at most `max_turns` turns.
    #[must_use]
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: VecDeque::with_capacity(max_turns),
            max_turns,
        }
    }

    /// Record a question and its answer, evicting the oldest turns first.
    pub fn record_exchange(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.turns.push_back(ConversationTurn {
            role: ConversationRole::User,
            text: question.into(),
        });
        self.turns.push_back(ConversationTurn {
            role: ConversationRole::Assistant,
            text: answer.into(),
        });
        while self.turns.len() > self.max_turns {
            self.turns.pop_front();
        }
    }

    /// The most recent `n` turns, oldest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter().skip(self.turns.len().saturating_sub(n))
    }

    /// All retained turns, oldest first.
    pub fn turns(&self) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter()
    }

    /// Number of retained turns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether nothing has been said yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Drop every turn.
    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_most_recent_exchanges() {
        let mut history = ConversationHistory::default();
        for i in 0..7 {
            history.record_exchange(format!("q{i}"), format!("a{i}"));
        }
        assert_eq!(history.len(), 10);
        let texts: Vec<_> = history.turns().map(|t| t.text.as_str()).collect();
        assert_eq!(texts.first(), Some(&"q2"));
        assert_eq!(texts.last(), Some(&"a6"));
        assert_eq!(history.turns().next().map(|t| t.role), Some(ConversationRole::User));
    }

    #[test]
    fn test_recent_returns_tail_in_order() {
        let mut history = ConversationHistory::default();
        history.record_exchange("q0", "a0");
        history.record_exchange("q1", "a1");
        let recent: Vec<_> = history.recent(3).map(|t| t.text.as_str()).collect();
        assert_eq!(recent, vec!["a0", "q1", "a1"]);
        assert_eq!(history.recent(50).count(), 4);
    }

    #[test]
    fn test_clear() {
        let mut history = ConversationHistory::new(4);
        history.record_exchange("q", "a");
        history.clear();
        assert!(history.is_empty());
    }
}
