//! Embeddable chat-panel core for a webhook-backed course assistant.
//!
//! The crate covers everything behind the panel UI: rendering assistant
//! markdown (with deferred math typesetting), fitting attachments to an
//! upload budget, keeping conversation state, and speaking the webhook's
//! request and response contract. Hosts wire a [`session::ChatSession`]
//! to their UI toolkit and walk the [`render`] block tree to display
//! messages.

pub mod config;
pub mod encoding;
pub mod error;
pub mod models;
pub mod render;
pub mod services;
pub mod session;
pub mod transport;

pub use config::{AnswerMode, PdfStrategy, WidgetConfig};
pub use error::ChatError;
pub use session::{ChatSession, SendOutcome};
