use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::session::Session;
use crate::types::Message;

/// In-memory session store keyed by user id.
///
/// A single readers-writer lock covers the whole map. Guards are never held
/// across anything but the map operation itself, so the upstream call in
/// [`crate::service::ChatService`] always runs unlocked.
///
/// Sessions live for the lifetime of the process; nothing is persisted.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the user's session, creating an empty one if absent.
    pub async fn get_or_create(&self, user_id: &str) -> Session {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(user_id.to_string())
            .or_insert_with(|| Session::new(user_id))
            .clone()
    }

    /// Append one message to the user's history. Unknown users get a fresh
    /// session first.
    pub async fn append_message(&self, user_id: &str, message: Message) {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(user_id.to_string())
            .or_insert_with(|| Session::new(user_id))
            .push(message);
    }

    /// Copy of the user's history in insertion order. Empty for unknown users.
    pub async fn get_history(&self, user_id: &str) -> Vec<Message> {
        let sessions = self.sessions.read().await;
        sessions
            .get(user_id)
            .map(|s| s.messages.clone())
            .unwrap_or_default()
    }

    /// Drop the user's session. Returns whether one existed.
    pub async fn clear(&self, user_id: &str) -> bool {
        self.sessions.write().await.remove(user_id).is_some()
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
