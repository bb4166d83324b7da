//! Conversation transcript types shared between the stores and the UI layer.
//!
//! A conversation is an ordered list of turns plus display metadata. The
//! stores hand out owned values of these types; nothing here holds live
//! references into storage.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Placeholder title for a conversation with no custom title and no user
/// turn to derive one from.
pub const UNTITLED: &str = "New Chat";

/// Derived titles are cut at this many characters, ellipsis appended.
const TITLE_MAX_CHARS: usize = 30;

/// Who authored a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
    System,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Assistant => "assistant",
            Sender::System => "system",
        }
    }
}

/// One attributed message within a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub sender: Sender,
    pub text: String,
}

impl Turn {
    pub fn new(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            sender,
            text: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Sender::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Sender::Assistant, text)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Sender::System, text)
    }
}

/// A full conversation record as persisted on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Immutable once assigned by the store.
    pub id: u64,
    pub turns: Vec<Turn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_title: Option<String>,
    #[serde(default)]
    pub pinned: bool,
    /// Model that produced the most recent assistant turn.
    #[serde(default)]
    pub model: String,
    /// Unix seconds. Bumped on transcript changes, not on metadata edits.
    pub updated_at: i64,
    /// Reminders attached to this conversation. Always present, empty by
    /// default (never created lazily on first use).
    #[serde(default)]
    pub reminders: Vec<String>,
}

impl Conversation {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            turns: Vec::new(),
            custom_title: None,
            pinned: false,
            model: String::new(),
            updated_at: Utc::now().timestamp(),
            reminders: Vec::new(),
        }
    }

    /// Stamp the record as modified now.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now().timestamp();
    }

    /// Title shown in the chat list: the custom title if set, otherwise
    /// the first user turn truncated to 30 characters, otherwise
    /// [`UNTITLED`].
    pub fn display_title(&self) -> String {
        if let Some(title) = &self.custom_title {
            return title.clone();
        }
        self.turns
            .iter()
            .find(|t| t.sender == Sender::User)
            .map(|t| truncate_title(t.text.trim()))
            .unwrap_or_else(|| UNTITLED.to_string())
    }

    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            id: self.id,
            title: self.display_title(),
            pinned: self.pinned,
            model: self.model.clone(),
            updated_at: self.updated_at,
            turn_count: self.turns.len(),
        }
    }
}

/// Lightweight listing entry for the sidebar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: u64,
    pub title: String,
    pub pinned: bool,
    pub model: String,
    pub updated_at: i64,
    pub turn_count: usize,
}

fn truncate_title(text: &str) -> String {
    if text.chars().count() > TITLE_MAX_CHARS {
        let cut: String = text.chars().take(TITLE_MAX_CHARS).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}
