use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Title given to freshly created conversations.
pub const DEFAULT_TITLE: &str = "New Chat";

/// Marker appended to a derived title that was cut short.
pub const TITLE_ELLIPSIS: char = '…';

/// Who authored a message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::System => write!(f, "system"),
        }
    }
}

/// Whether a message is still being streamed into.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    #[default]
    Complete,
    InFlight,
}

/// A single entry of a conversation transcript.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub status: MessageStatus,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            status: MessageStatus::Complete,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// An empty assistant message that tokens will be appended to.
    pub fn in_flight() -> Self {
        Self {
            status: MessageStatus::InFlight,
            ..Self::new(Role::Assistant, String::new())
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.status == MessageStatus::InFlight
    }
}

/// An ordered transcript; insertion order is display order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Conversation {
    pub id: Uuid,
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            messages: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn message(&self, id: Uuid) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn message_mut(&mut self, id: Uuid) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    pub fn has_user_message(&self) -> bool {
        self.messages.iter().any(|m| m.role == Role::User)
    }

    /// Index of the most recent user message, scanning from the end.
    pub fn last_user_index(&self) -> Option<usize> {
        self.messages.iter().rposition(|m| m.role == Role::User)
    }

    pub fn last_user_message(&self) -> Option<&Message> {
        self.last_user_index().map(|i| &self.messages[i])
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new(DEFAULT_TITLE)
    }
}

/// Derive a conversation title from its first prompt.
///
/// Counts characters, not bytes, and appends an ellipsis when the prompt is cut.
pub fn derive_title(prompt: &str, max_chars: usize) -> String {
    let prompt = prompt.trim();
    let mut chars = prompt.char_indices();
    match chars.nth(max_chars) {
        Some((cut, _)) => {
            let mut title = prompt[..cut].to_string();
            title.push(TITLE_ELLIPSIS);
            title
        }
        None => prompt.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_prompt_becomes_title_unchanged() {
        let prompt = "What is the capital of France?";
        assert_eq!(prompt.chars().count(), 30);
        assert_eq!(derive_title(prompt, 30), prompt);
    }

    #[test]
    fn test_long_prompt_is_truncated_with_ellipsis() {
        let prompt = "Explain the borrow checker to me like I'm ten";
        assert_eq!(prompt.chars().count(), 45);
        let title = derive_title(prompt, 30);
        assert_eq!(title, "Explain the borrow checker to …");
        assert_eq!(title.chars().count(), 31);
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let title = derive_title("ééééé", 3);
        assert_eq!(title, "ééé…");
    }

    #[test]
    fn test_last_user_message_scans_from_end() {
        let mut conv = Conversation::default();
        conv.push(Message::user("first"));
        conv.push(Message::assistant("reply"));
        conv.push(Message::user("second"));
        conv.push(Message::assistant("reply 2"));
        assert_eq!(conv.last_user_message().unwrap().content, "second");
        assert_eq!(conv.last_user_index(), Some(2));
    }

    #[test]
    fn test_message_status_defaults_to_complete_when_absent() {
        let json =
            r#"{"id":"7f1f4d1e-7f0a-4a4e-9a7b-2d0c5d0b8a11","role":"assistant","content":"hi"}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.status, MessageStatus::Complete);
        assert_eq!(msg.role, Role::Assistant);
    }
}
