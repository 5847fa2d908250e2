//! Webhook wire contract: authentication, requests, and response parsing.

pub mod auth;
pub mod client;
pub mod reply;
pub mod request;

pub use client::{FeedbackPayload, Transport, WebhookClient, endpoint_url};
pub use reply::{PARSE_FALLBACK, extract_reply, parse_body};
pub use request::{ChatRequest, RequestBody, build_body};
