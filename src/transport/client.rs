//! The HTTP transport behind the chat session.
//!
//! [`Transport`] is the seam tests replace. The real implementation posts
//! through the configured proxy with reqwest and maps failures onto
//! [`ChatError`].

use async_trait::async_trait;
use serde::Serialize;

use crate::config::WidgetConfig;
use crate::encoding::encode_component;
use crate::error::ChatError;
use crate::transport::request::RequestBody;

/// Fire-and-forget rating for a single assistant message.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackPayload {
    pub msg_id: String,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sciper: Option<String>,
    pub liked: bool,
}

impl FeedbackPayload {
    pub fn new(msg_id: String, session_id: String, sciper: Option<String>, liked: bool) -> Self {
        Self {
            msg_id,
            session_id,
            sciper,
            liked,
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Post a chat request and return the raw response body.
    async fn send(&self, body: RequestBody) -> Result<String, ChatError>;

    /// Post a feedback rating.
    async fn send_feedback(&self, payload: FeedbackPayload) -> Result<(), ChatError>;
}

/// The URL requests actually go to: the webhook, or the proxy with the
/// webhook percent-encoded into it.
pub fn endpoint_url(config: &WidgetConfig) -> String {
    if config.proxy_url.is_empty() {
        config.webhook_url.clone()
    } else {
        format!("{}{}", config.proxy_url, encode_component(&config.webhook_url))
    }
}

pub struct WebhookClient {
    http: reqwest::Client,
    url: String,
    feedback_url: String,
}

impl WebhookClient {
    pub fn new(config: &WidgetConfig) -> Self {
        let url = endpoint_url(config);
        let feedback_url = if config.feedback_url.is_empty() {
            url.clone()
        } else {
            config.feedback_url.clone()
        };
        Self {
            http: reqwest::Client::new(),
            url,
            feedback_url,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for WebhookClient {
    async fn send(&self, body: RequestBody) -> Result<String, ChatError> {
        let request = self
            .http
            .post(&self.url)
            .header(reqwest::header::ACCEPT, "application/json");
        let request = match body {
            RequestBody::Json(value) => request.json(&value),
            RequestBody::Multipart(form) => request.multipart(form),
        };
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ChatError::http(status.as_u16(), &body));
        }
        Ok(body)
    }

    async fn send_feedback(&self, payload: FeedbackPayload) -> Result<(), ChatError> {
        let response = self
            .http
            .post(&self.feedback_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&payload)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::http(status.as_u16(), &body));
        }
        Ok(())
    }
}
