use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Audio,
}

/// One conversation entry. Immutable once appended to the log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,

    pub content: String,

    pub kind: MessageKind,

    /// Opaque handle naming the recording an audio message was built from
    pub audio_reference: Option<String>,

    /// When this entry was appended
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user_text(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            kind: MessageKind::Text,
            audio_reference: None,
            timestamp: Utc::now(),
        }
    }

    pub fn user_audio(content: impl Into<String>, reference: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            kind: MessageKind::Audio,
            audio_reference: Some(reference.into()),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant_text(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            kind: MessageKind::Text,
            audio_reference: None,
            timestamp: Utc::now(),
        }
    }
}

/// Append-only, insertion-ordered sequence of messages.
///
/// Lives only as long as the session; there is no edit, delete, or
/// persistence operation.
#[derive(Debug, Default)]
pub struct ConversationLog {
    entries: Vec<Message>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.entries.push(message);
    }

    pub fn entries(&self) -> &[Message] {
        &self.entries
    }

    pub fn last(&self) -> Option<&Message> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
