//! Conversation data model.

pub mod conversation;
pub mod message;

pub use conversation::{ConversationStore, HistoryEntry, VISUAL_CONTEXT_WINDOW};
pub use message::{Attachment, AttachmentKind, Message};
