//! Chat session orchestration.
//!
//! A [`ChatSession`] owns the conversation, the pending attachment tray,
//! and the transport. All methods take `&self`; state lives behind short
//! lived locks that are never held across an await, so a host can share
//! the session behind an `Arc` and call into it from anywhere.
//!
//! Sends are serialized with a busy flag. A send that loses the race
//! returns [`SendOutcome::Busy`] without touching the conversation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{AnswerMode, WidgetConfig};
use crate::models::{Attachment, AttachmentKind, ConversationStore, Message};
use crate::services;
use crate::transport::auth::sciper_from_cookies;
use crate::transport::{
    ChatRequest, FeedbackPayload, Transport, build_body, extract_reply, parse_body,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AttachmentError {
    #[error("unsupported file type")]
    Unsupported,
    #[error("PDF attachments are disabled")]
    PdfDisabled,
}

#[derive(Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// Another send is in flight.
    Busy,
    /// Nothing to send: no text and no attachments.
    Empty,
    Completed { reply: String },
    /// The request failed; `message` was appended as the assistant turn.
    Failed { message: String },
}

pub struct ChatSession {
    config: WidgetConfig,
    transport: Arc<dyn Transport>,
    store: Mutex<ConversationStore>,
    pending: Mutex<Vec<Attachment>>,
    answer_mode: Mutex<AnswerMode>,
    sciper: Mutex<Option<String>>,
    busy: AtomicBool,
}

impl ChatSession {
    pub fn new(config: WidgetConfig, transport: Arc<dyn Transport>) -> Self {
        let answer_mode = config.default_answer;
        Self {
            config,
            transport,
            store: Mutex::new(ConversationStore::new()),
            pending: Mutex::new(Vec::new()),
            answer_mode: Mutex::new(answer_mode),
            sciper: Mutex::new(None),
            busy: AtomicBool::new(false),
        }
    }

    /// Pick up the student id from the host page's cookies.
    pub fn read_identity(&self, cookies: &str) {
        *self.sciper.lock() = sciper_from_cookies(cookies);
    }

    pub fn sciper(&self) -> Option<String> {
        self.sciper.lock().clone()
    }

    pub fn session_id(&self) -> String {
        self.store.lock().session_id().to_string()
    }

    pub fn answer_mode(&self) -> AnswerMode {
        *self.answer_mode.lock()
    }

    pub fn set_answer_mode(&self, mode: AnswerMode) {
        *self.answer_mode.lock() = mode;
    }

    /// Read conversation state under the lock.
    pub fn with_store<R>(&self, f: impl FnOnce(&ConversationStore) -> R) -> R {
        f(&self.store.lock())
    }

    /// Queue an attachment for the next send. A preview temp file is
    /// created eagerly so the host can thumbnail it right away.
    pub fn add_attachment(&self, mut attachment: Attachment) -> Result<(), AttachmentError> {
        match attachment.kind {
            AttachmentKind::Other => return Err(AttachmentError::Unsupported),
            AttachmentKind::Pdf if !self.config.allow_pdf => {
                return Err(AttachmentError::PdfDisabled);
            }
            _ => {}
        }
        if let Err(err) = attachment.ensure_preview() {
            warn!(file = %attachment.file_name, error = %err, "preview creation failed");
        }
        self.pending.lock().push(attachment);
        Ok(())
    }

    pub fn remove_attachment(&self, index: usize) -> bool {
        let mut pending = self.pending.lock();
        if index >= pending.len() {
            return false;
        }
        let mut removed = pending.remove(index);
        removed.release_preview();
        true
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Send a message with any pending attachments.
    ///
    /// The user turn is recorded before the network call, so it stays in
    /// the conversation even when the request fails. Previews of the sent
    /// attachments are released and the busy flag cleared on every path.
    pub async fn send(&self, text: &str) -> SendOutcome {
        let text = text.trim();
        if text.is_empty() && self.pending.lock().is_empty() {
            return SendOutcome::Empty;
        }
        if self.busy.swap(true, Ordering::SeqCst) {
            return SendOutcome::Busy;
        }
        let outcome = self.send_inner(text).await;
        self.release_sent_previews();
        self.busy.store(false, Ordering::SeqCst);
        outcome
    }

    async fn send_inner(&self, text: &str) -> SendOutcome {
        let attachments = std::mem::take(&mut *self.pending.lock());
        let fitted = services::fit(&attachments, &self.config);
        if fitted.retry_pass_used {
            debug!(total = fitted.total_bytes(), "attachments recompressed to approach budget");
        }
        let mode = self.answer_mode();

        let (session_id, history) = {
            let mut store = self.store.lock();
            store.push(Message::user(text, attachments));
            (
                store.session_id().to_string(),
                store.history(self.config.max_history),
            )
        };

        let request = ChatRequest::new(&self.config, &session_id, mode, &history, self.sciper());
        let result = match build_body(&request, fitted.files) {
            Ok(body) => self.transport.send(body).await,
            Err(err) => Err(err),
        };

        match result {
            Ok(body) => {
                let reply = extract_reply(&parse_body(&body));
                self.store
                    .lock()
                    .push(Message::assistant(reply.clone(), mode));
                SendOutcome::Completed { reply }
            }
            Err(err) => {
                let message = err.user_message();
                self.store
                    .lock()
                    .push(Message::assistant(message.clone(), mode));
                SendOutcome::Failed { message }
            }
        }
    }

    fn release_sent_previews(&self) {
        let mut store = self.store.lock();
        if let Some(last_user) = store.messages_mut().iter_mut().rev().find(|m| m.is_user) {
            for attachment in &mut last_user.attachments {
                attachment.release_preview();
            }
        }
    }

    /// Clear the conversation and the tray and start a new session id.
    pub fn reset(&self) {
        self.store.lock().reset();
        let mut pending = self.pending.lock();
        for attachment in pending.iter_mut() {
            attachment.release_preview();
        }
        pending.clear();
        *self.answer_mode.lock() = self.config.default_answer;
    }

    /// Rate an assistant message. Fire and forget; failures are logged.
    /// Must be called from within a tokio runtime.
    pub fn send_feedback(&self, msg_id: &str, liked: bool) -> tokio::task::JoinHandle<()> {
        let payload =
            FeedbackPayload::new(msg_id.to_string(), self.session_id(), self.sciper(), liked);
        let transport = Arc::clone(&self.transport);
        tokio::spawn(async move {
            if let Err(err) = transport.send_feedback(payload).await {
                warn!(error = %err, "feedback delivery failed");
            }
        })
    }
}
