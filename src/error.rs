//! Errors surfaced to the host while talking to the webhook.

use thiserror::Error;

pub const PAYLOAD_TOO_LARGE_MESSAGE: &str =
    "Server rejected the request (too large). Images were compressed, but may still be too big.";
pub const NETWORK_ERROR_MESSAGE: &str = "Network error. Please try again.";

#[derive(Debug, Error)]
pub enum ChatError {
    /// The request never produced an HTTP response.
    #[error("{NETWORK_ERROR_MESSAGE}")]
    Network(#[from] reqwest::Error),

    /// The webhook answered with a non-success status.
    #[error("{message}")]
    Http { status: u16, message: String },

    /// The request could not be encoded at all.
    #[error("failed to build request: {0}")]
    Request(String),
}

impl ChatError {
    /// Build the error for a non-success response. The body is parsed the
    /// same lenient way as replies so a backend explanation still reaches
    /// the user.
    pub fn http(status: u16, body: &str) -> Self {
        let message = if status == 413 {
            PAYLOAD_TOO_LARGE_MESSAGE.to_string()
        } else {
            let detail = crate::transport::extract_reply(&crate::transport::parse_body(body));
            if detail.is_empty() {
                format!("Error {status}.")
            } else {
                format!("Error {status}. {detail}")
            }
        };
        Self::Http { status, message }
    }

    /// Text safe to show in the chat panel.
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}
