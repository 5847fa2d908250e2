//! Widget configuration.
//!
//! Hosts embed the panel with a small JSON config. Every field is optional;
//! missing fields fall back to the defaults below, so a config of `{}` is
//! valid and `webhook_url` is the only field a host realistically must set.

use serde::{Deserialize, Serialize};

/// How much help the assistant should give by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerMode {
    /// Guide the student without giving the final answer.
    Hints,
    /// Provide the complete worked answer.
    Full,
}

impl AnswerMode {
    /// Lenient parse used for host-supplied strings. Anything that is not a
    /// recognizable request for full answers means hints.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "full" | "full answer" => Self::Full,
            _ => Self::Hints,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hints => "hints",
            Self::Full => "full",
        }
    }
}

/// What to do with an attached PDF when building the upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PdfStrategy {
    /// Send the PDF bytes unchanged.
    Send,
    /// Replace the PDF with a JPEG of its first page.
    Image,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WidgetConfig {
    /// Upstream webhook receiving chat requests.
    pub webhook_url: String,
    /// Proxy prefix the webhook URL is appended to, percent-encoded.
    pub proxy_url: String,
    /// Where feedback ratings go. Empty means the chat endpoint.
    pub feedback_url: String,
    /// Course or topic identifier forwarded with every request.
    pub topic: String,
    /// Page identifier forwarded with every request.
    pub page: String,
    /// Total upload budget in megabytes.
    pub max_upload_mb: u64,
    /// History entries sent per request. Zero means unbounded.
    pub max_history: usize,
    /// Longest image edge after compression, in pixels.
    pub max_image_dim: u32,
    /// JPEG quality for the first compression pass, 0.0 to 1.0.
    pub image_quality: f32,
    /// JPEG quality for the retry pass when still over budget.
    pub retry_image_quality: f32,
    pub pdf_strategy: PdfStrategy,
    /// Whether PDF attachments are accepted at all.
    pub allow_pdf: bool,
    pub default_answer: AnswerMode,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            proxy_url: String::new(),
            feedback_url: String::new(),
            topic: String::new(),
            page: String::new(),
            max_upload_mb: 10,
            max_history: 0,
            max_image_dim: 1600,
            image_quality: 0.82,
            retry_image_quality: 0.6,
            pdf_strategy: PdfStrategy::Send,
            allow_pdf: false,
            default_answer: AnswerMode::Hints,
        }
    }
}

impl WidgetConfig {
    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb * 1024 * 1024
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: WidgetConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.max_upload_mb, 10);
        assert_eq!(config.max_history, 0);
        assert_eq!(config.max_image_dim, 1600);
        assert_eq!(config.image_quality, 0.82);
        assert_eq!(config.retry_image_quality, 0.6);
        assert_eq!(config.pdf_strategy, PdfStrategy::Send);
        assert!(!config.allow_pdf);
        assert_eq!(config.default_answer, AnswerMode::Hints);
    }

    #[test]
    fn test_partial_config_overrides() {
        let config: WidgetConfig = serde_json::from_str(
            r#"{"webhookUrl": "https://hook", "maxUploadMb": 5, "pdfStrategy": "image", "allowPdf": true}"#,
        )
        .unwrap();
        assert_eq!(config.webhook_url, "https://hook");
        assert_eq!(config.max_upload_bytes(), 5 * 1024 * 1024);
        assert_eq!(config.pdf_strategy, PdfStrategy::Image);
        assert!(config.allow_pdf);
        assert_eq!(config.max_image_dim, 1600);
    }

    #[test]
    fn test_answer_mode_parse() {
        assert_eq!(AnswerMode::parse("full"), AnswerMode::Full);
        assert_eq!(AnswerMode::parse("Full Answer"), AnswerMode::Full);
        assert_eq!(AnswerMode::parse("hints"), AnswerMode::Hints);
        assert_eq!(AnswerMode::parse("anything else"), AnswerMode::Hints);
        assert_eq!(AnswerMode::parse(""), AnswerMode::Hints);
    }

    #[test]
    fn test_answer_mode_wire_form() {
        assert_eq!(AnswerMode::Full.as_str(), "full");
        assert_eq!(AnswerMode::Hints.as_str(), "hints");
    }
}
