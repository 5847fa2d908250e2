//! Outbound request construction.
//!
//! Requests without files go out as JSON. Requests with files become
//! multipart forms carrying the same fields as text parts plus one `files`
//! part per attachment.

use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde_json::Value;

use crate::config::{AnswerMode, WidgetConfig};
use crate::error::ChatError;
use crate::models::HistoryEntry;
use crate::services::OutboundFile;

/// The JSON payload the webhook receives.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    pub answer: String,
    /// Only the latest turn goes in `messages`. Earlier turns are already
    /// known to the backend through the session id.
    pub messages: Vec<HistoryEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sciper: Option<String>,
}

impl ChatRequest {
    pub fn new(
        config: &WidgetConfig,
        session_id: &str,
        answer: AnswerMode,
        history: &[HistoryEntry],
        sciper: Option<String>,
    ) -> Self {
        Self {
            session_id: session_id.to_string(),
            topic: (!config.topic.is_empty()).then(|| config.topic.clone()),
            page: (!config.page.is_empty()).then(|| config.page.clone()),
            answer: answer.as_str().to_string(),
            messages: history.last().cloned().into_iter().collect(),
            sciper,
        }
    }
}

/// The two wire encodings of a request.
pub enum RequestBody {
    Json(Value),
    Multipart(Form),
}

/// Encode `request` with its files, if any.
pub fn build_body(request: &ChatRequest, files: Vec<OutboundFile>) -> Result<RequestBody, ChatError> {
    if files.is_empty() {
        return Ok(RequestBody::Json(
            serde_json::to_value(request).map_err(|e| ChatError::Request(e.to_string()))?,
        ));
    }

    let mut form = Form::new()
        .text("sessionId", request.session_id.clone())
        .text("answer", request.answer.clone())
        .text(
            "messages",
            serde_json::to_string(&request.messages).unwrap_or_else(|_| "[]".to_string()),
        );
    if let Some(topic) = &request.topic {
        form = form.text("topic", topic.clone());
    }
    if let Some(page) = &request.page {
        form = form.text("page", page.clone());
    }
    if let Some(sciper) = &request.sciper {
        form = form.text("sciper", sciper.clone());
    }
    for file in files {
        let part = Part::bytes(file.data)
            .file_name(file.file_name)
            .mime_str(&file.mime)
            .map_err(|e| ChatError::Request(format!("invalid attachment type: {e}")))?;
        form = form.part("files", part);
    }
    Ok(RequestBody::Multipart(form))
}
