pub mod store;

pub use store::SessionStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Message;

/// One user's conversation state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Add a message to the end of the history.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
        self.updated_at = Utc::now();
    }

    /// The most recent `max_messages` messages, oldest first.
    pub fn recent(&self, max_messages: usize) -> &[Message] {
        recent(&self.messages, max_messages)
    }
}

/// Tail of `messages` holding at most `max_messages` entries.
pub fn recent(messages: &[Message], max_messages: usize) -> &[Message] {
    let start = messages.len().saturating_sub(max_messages);
    &messages[start..]
}
