//! In-memory conversation state.

use serde::Serialize;
use uuid::Uuid;

use crate::models::message::Message;

/// How many trailing messages the host UI marks as "in context".
pub const VISUAL_CONTEXT_WINDOW: usize = 10;

/// One turn of history as the webhook expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub role: String,
    pub content: String,
}

/// All messages of the current session, newest last.
#[derive(Debug)]
pub struct ConversationStore {
    messages: Vec<Message>,
    session_id: String,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationStore {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            session_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn messages_mut(&mut self) -> &mut [Message] {
        &mut self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Conversation history in wire form. `limit` caps the number of
    /// trailing entries; zero means no cap.
    pub fn history(&self, limit: usize) -> Vec<HistoryEntry> {
        let entries: Vec<HistoryEntry> = self
            .messages
            .iter()
            .map(|m| HistoryEntry {
                role: if m.is_user { "user" } else { "assistant" }.to_string(),
                content: m.text.clone(),
            })
            .collect();
        if limit > 0 && entries.len() > limit {
            entries[entries.len() - limit..].to_vec()
        } else {
            entries
        }
    }

    /// Per-message flags marking the trailing context window, oldest first.
    pub fn context_marks(&self) -> Vec<bool> {
        let n = self.messages.len();
        let start = n.saturating_sub(VISUAL_CONTEXT_WINDOW);
        (0..n).map(|i| i >= start).collect()
    }

    /// Drop all messages and previews and start a fresh session.
    pub fn reset(&mut self) {
        for message in &mut self.messages {
            for attachment in &mut message.attachments {
                attachment.release_preview();
            }
        }
        self.messages.clear();
        self.session_id = Uuid::new_v4().to_string();
    }
}
