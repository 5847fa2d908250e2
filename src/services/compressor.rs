//! Attachment compression against the upload size budget.
//!
//! Two passes. The first compresses every image over the threshold to a
//! bounded JPEG and applies the PDF strategy. If the total still exceeds
//! the budget, the second pass recompresses every image from its original
//! bytes at three quarters of the dimension cap and the retry quality. The
//! result is returned either way; the budget is a target, not a guarantee,
//! and the server has the final say.

use image::imageops::FilterType;
use image::codecs::jpeg::JpegEncoder;
use tracing::{debug, warn};

use crate::config::{PdfStrategy, WidgetConfig};
use crate::models::Attachment;
use crate::models::AttachmentKind;
use crate::services::pdf;

/// Images at or below this size are passed through untouched.
pub const COMPRESS_THRESHOLD_BYTES: usize = 800 * 1024;

const RETRY_DIM_FACTOR: f32 = 0.75;

/// A file ready to go on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFile {
    pub file_name: String,
    pub mime: String,
    pub data: Vec<u8>,
}

#[derive(Debug)]
pub struct FitResult {
    pub files: Vec<OutboundFile>,
    /// Whether the second pass ran.
    pub retry_pass_used: bool,
}

impl FitResult {
    pub fn total_bytes(&self) -> usize {
        self.files.iter().map(|f| f.data.len()).sum()
    }
}

/// Fit `attachments` to the configured upload budget.
pub fn fit(attachments: &[Attachment], config: &WidgetConfig) -> FitResult {
    let mut files: Vec<OutboundFile> = attachments
        .iter()
        .map(|att| first_pass(att, config))
        .collect();

    let total: usize = files.iter().map(|f| f.data.len()).sum();
    if total as u64 <= config.max_upload_bytes() {
        return FitResult {
            files,
            retry_pass_used: false,
        };
    }

    debug!(total, budget = config.max_upload_bytes(), "over budget, retrying images");
    let retry_dim = (config.max_image_dim as f32 * RETRY_DIM_FACTOR) as u32;
    for (att, file) in attachments.iter().zip(files.iter_mut()) {
        if att.kind != AttachmentKind::Image {
            continue;
        }
        // Recompress from the original bytes, but never let the retry make
        // a file larger than the first pass already did.
        match compress_image(&att.data, retry_dim, config.retry_image_quality) {
            Ok(data) if data.len() < file.data.len() => {
                file.file_name = jpeg_name(&att.file_name);
                file.mime = "image/jpeg".to_string();
                file.data = data;
            }
            Ok(_) => {}
            Err(err) => warn!(file = %att.file_name, error = %err, "retry compression failed"),
        }
    }

    FitResult {
        files,
        retry_pass_used: true,
    }
}

fn first_pass(att: &Attachment, config: &WidgetConfig) -> OutboundFile {
    match att.kind {
        AttachmentKind::Image if att.size() > COMPRESS_THRESHOLD_BYTES => {
            match compress_image(&att.data, config.max_image_dim, config.image_quality) {
                Ok(data) => OutboundFile {
                    file_name: jpeg_name(&att.file_name),
                    mime: "image/jpeg".to_string(),
                    data,
                },
                Err(err) => {
                    warn!(file = %att.file_name, error = %err, "image compression failed");
                    passthrough(att)
                }
            }
        }
        AttachmentKind::Pdf if config.pdf_strategy == PdfStrategy::Image => {
            match pdf::rasterize_first_page(&att.data, config.max_image_dim, config.image_quality)
            {
                Ok(data) => OutboundFile {
                    file_name: jpeg_name(&att.file_name),
                    mime: "image/jpeg".to_string(),
                    data,
                },
                Err(err) => {
                    warn!(file = %att.file_name, error = %err, "PDF rasterization failed");
                    passthrough(att)
                }
            }
        }
        _ => passthrough(att),
    }
}

fn passthrough(att: &Attachment) -> OutboundFile {
    OutboundFile {
        file_name: att.file_name.clone(),
        mime: att.mime.clone(),
        data: att.data.clone(),
    }
}

/// Decode, bound the longest edge to `max_dim`, and re-encode as JPEG.
fn compress_image(data: &[u8], max_dim: u32, quality: f32) -> anyhow::Result<Vec<u8>> {
    let img = image::load_from_memory(data)?;
    let img = if img.width().max(img.height()) > max_dim {
        img.resize(max_dim, max_dim, FilterType::Triangle)
    } else {
        img
    };
    let rgb = img.to_rgb8();
    let mut buf = Vec::new();
    let quality = (quality.clamp(0.3, 1.0) * 100.0) as u8;
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    rgb.write_with_encoder(encoder)?;
    Ok(buf)
}

fn jpeg_name(file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => format!("{stem}.jpg"),
        _ => format!("{file_name}.jpg"),
    }
}
