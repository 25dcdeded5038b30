//! UI-agnostic conversation state
//!
//! The message log is append-only, except for the last message while it is
//! the model turn currently being streamed.

use serde::{Deserialize, Serialize};

use crate::prompts::APOLOGY;

/// A chat message in the AI conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatRole {
    User,
    Model,
}

/// Which screen the session is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewState {
    #[default]
    Initial,
    Conversation,
}

#[derive(Debug, Default)]
pub struct MessageLog {
    messages: Vec<ChatMessage>,
    /// Set while the last message is a model turn still receiving fragments.
    in_progress: bool,
    /// Cumulative text of the in-progress turn.
    accumulated: String,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn is_streaming(&self) -> bool {
        self.in_progress
    }

    pub fn push_user(&mut self, label: impl Into<String>) {
        self.messages.push(ChatMessage {
            role: ChatRole::User,
            text: label.into(),
        });
    }

    /// Append the empty model placeholder that fragments will fill.
    pub fn begin_model_turn(&mut self) {
        self.messages.push(ChatMessage {
            role: ChatRole::Model,
            text: String::new(),
        });
        self.accumulated.clear();
        self.in_progress = true;
    }

    /// Apply one fragment: the in-progress message becomes the cumulative text.
    /// Returns false (and changes nothing) if no model turn is in progress.
    pub fn apply_fragment(&mut self, fragment: &str) -> bool {
        if !self.in_progress {
            return false;
        }
        self.accumulated.push_str(fragment);
        match self.messages.last_mut() {
            Some(last) if last.role == ChatRole::Model => {
                last.text.clone_from(&self.accumulated);
                true
            }
            _ => false,
        }
    }

    /// Stream ended normally. Returns the final text of the turn.
    pub fn finish_model_turn(&mut self) -> String {
        self.in_progress = false;
        std::mem::take(&mut self.accumulated)
    }

    /// Stream failed. Whatever arrived is kept as a degraded reply; if nothing
    /// arrived the placeholder becomes the apology. With no placeholder at all,
    /// the apology is appended.
    pub fn fail_model_turn(&mut self) {
        let received_nothing = self.accumulated.is_empty();
        self.in_progress = false;
        self.accumulated.clear();

        match self.messages.last_mut() {
            Some(last) if last.role == ChatRole::Model => {
                if received_nothing {
                    last.text = APOLOGY.to_string();
                }
            }
            _ => self.messages.push(ChatMessage {
                role: ChatRole::Model,
                text: APOLOGY.to_string(),
            }),
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Indices of model messages with text, oldest first.
    pub fn model_indices(&self) -> Vec<usize> {
        self.messages
            .iter()
            .enumerate()
            .filter(|(_, m)| m.role == ChatRole::Model && !m.text.is_empty())
            .map(|(i, _)| i)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragments_concatenate_in_order() {
        let mut log = MessageLog::new();
        log.push_user("Analyze");
        log.begin_model_turn();
        for fragment in ["Hel", "lo, ", "", "world", "!"] {
            assert!(log.apply_fragment(fragment));
        }
        assert_eq!(log.messages()[1].text, "Hello, world!");
        assert_eq!(log.finish_model_turn(), "Hello, world!");
        assert!(!log.is_streaming());
    }

    #[test]
    fn test_prior_messages_untouched_by_fragments() {
        let mut log = MessageLog::new();
        log.push_user("first");
        log.begin_model_turn();
        log.apply_fragment("reply one");
        log.finish_model_turn();
        log.push_user("second");
        log.begin_model_turn();
        log.apply_fragment("reply two");

        let texts: Vec<_> = log.messages().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "reply one", "second", "reply two"]);
    }

    #[test]
    fn test_fragment_without_turn_is_ignored() {
        let mut log = MessageLog::new();
        log.push_user("hi");
        assert!(!log.apply_fragment("stray"));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_failure_with_no_fragments_becomes_apology() {
        let mut log = MessageLog::new();
        log.push_user("hi");
        log.begin_model_turn();
        log.fail_model_turn();
        assert_eq!(log.messages()[1].text, APOLOGY);
        assert_eq!(log.messages()[0].text, "hi");
    }

    #[test]
    fn test_failure_keeps_partial_text() {
        let mut log = MessageLog::new();
        log.push_user("hi");
        log.begin_model_turn();
        log.apply_fragment("partial ans");
        log.fail_model_turn();
        assert_eq!(log.messages()[1].text, "partial ans");
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_failure_without_placeholder_appends_apology() {
        let mut log = MessageLog::new();
        log.push_user("hi");
        log.fail_model_turn();
        assert_eq!(log.len(), 2);
        assert_eq!(log.messages()[1].role, ChatRole::Model);
        assert_eq!(log.messages()[1].text, APOLOGY);
    }

    #[test]
    fn test_model_indices_skip_empty() {
        let mut log = MessageLog::new();
        log.push_user("hi");
        log.begin_model_turn();
        assert!(log.model_indices().is_empty());
        log.apply_fragment("x");
        assert_eq!(log.model_indices(), vec![1]);
    }
}
