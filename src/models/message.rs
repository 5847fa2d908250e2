//! Messages and attachments.

use std::io::Write as _;
use std::path::Path;
use std::time::SystemTime;

use anyhow::{Context, Result};
use tempfile::NamedTempFile;
use uuid::Uuid;

use crate::config::AnswerMode;

/// Attachment classification driving compression and upload rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Image,
    Pdf,
    Other,
}

impl AttachmentKind {
    /// Classify by MIME type, falling back to the file extension for PDFs
    /// served as generic byte streams.
    pub fn detect(mime: &str, file_name: &str) -> Self {
        if mime.starts_with("image/") {
            Self::Image
        } else if mime == "application/pdf" || file_name.to_lowercase().ends_with(".pdf") {
            Self::Pdf
        } else {
            Self::Other
        }
    }
}

/// A file the user attached to a message.
///
/// The preview is a temp file the host UI can point a thumbnail at. It is
/// created on demand and must be released after the message is sent so
/// sent conversations do not pin temp files for their whole lifetime.
#[derive(Debug)]
pub struct Attachment {
    pub file_name: String,
    pub mime: String,
    pub data: Vec<u8>,
    pub kind: AttachmentKind,
    preview: Option<NamedTempFile>,
}

impl Attachment {
    pub fn new(file_name: impl Into<String>, mime: impl Into<String>, data: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let mime = mime.into();
        let kind = AttachmentKind::detect(&mime, &file_name);
        Self {
            file_name,
            mime,
            data,
            kind,
            preview: None,
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Write the attachment bytes to a temp file and return its path. The
    /// file persists until [`release_preview`](Self::release_preview).
    pub fn ensure_preview(&mut self) -> Result<&Path> {
        let file = match self.preview.take() {
            Some(file) => file,
            None => {
                let mut file = NamedTempFile::new().context("failed to create preview file")?;
                file.write_all(&self.data)
                    .context("failed to write preview file")?;
                file
            }
        };
        Ok(self.preview.insert(file).path())
    }

    pub fn preview_path(&self) -> Option<&Path> {
        self.preview.as_ref().map(NamedTempFile::path)
    }

    /// Delete the preview temp file if one exists.
    pub fn release_preview(&mut self) {
        self.preview = None;
    }
}

#[derive(Debug)]
pub struct Message {
    pub id: String,
    pub text: String,
    pub is_user: bool,
    pub timestamp: SystemTime,
    pub attachments: Vec<Attachment>,
    /// Answer mode in effect when the reply was requested. Set on
    /// assistant messages only.
    pub mode: Option<AnswerMode>,
}

impl Message {
    pub fn user(text: impl Into<String>, attachments: Vec<Attachment>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            is_user: true,
            timestamp: SystemTime::now(),
            attachments,
            mode: None,
        }
    }

    pub fn assistant(text: impl Into<String>, mode: AnswerMode) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            is_user: false,
            timestamp: SystemTime::now(),
            attachments: Vec::new(),
            mode: Some(mode),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_detection() {
        assert_eq!(AttachmentKind::detect("image/png", "a.png"), AttachmentKind::Image);
        assert_eq!(AttachmentKind::detect("image/jpeg", "photo"), AttachmentKind::Image);
        assert_eq!(AttachmentKind::detect("application/pdf", "notes"), AttachmentKind::Pdf);
        assert_eq!(
            AttachmentKind::detect("application/octet-stream", "Slides.PDF"),
            AttachmentKind::Pdf
        );
        assert_eq!(AttachmentKind::detect("text/plain", "a.txt"), AttachmentKind::Other);
    }

    #[test]
    fn test_preview_lifecycle() {
        let mut att = Attachment::new("a.png", "image/png", vec![1, 2, 3]);
        assert!(att.preview_path().is_none());

        let path = att.ensure_preview().unwrap().to_path_buf();
        assert!(path.exists());
        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3]);

        att.release_preview();
        assert!(att.preview_path().is_none());
        assert!(!path.exists());
    }

    #[test]
    fn test_ensure_preview_is_idempotent() {
        let mut att = Attachment::new("a.png", "image/png", vec![0; 16]);
        let first = att.ensure_preview().unwrap().to_path_buf();
        let second = att.ensure_preview().unwrap().to_path_buf();
        assert_eq!(first, second);
    }

    #[test]
    fn test_message_constructors() {
        let msg = Message::user("hi", Vec::new());
        assert!(msg.is_user);
        assert!(msg.mode.is_none());

        let reply = Message::assistant("hello", AnswerMode::Full);
        assert!(!reply.is_user);
        assert_eq!(reply.mode, Some(AnswerMode::Full));
        assert_ne!(msg.id, reply.id);
    }
}
