//! Attachment processing services.

pub mod compressor;
pub mod pdf;

pub use compressor::{COMPRESS_THRESHOLD_BYTES, FitResult, OutboundFile, fit};
