//! First-page PDF rasterization.
//!
//! Used when the upload strategy replaces a PDF attachment with a JPEG of
//! its first page. Requires the `pdf` feature and a Pdfium library on the
//! system; without it every call reports [`PdfRasterError::Unavailable`]
//! and callers fall back to sending the PDF bytes unchanged.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PdfRasterError {
    #[error("PDF rasterization is not available")]
    Unavailable,
    #[error("failed to load PDF: {0}")]
    Load(String),
    #[error("failed to render PDF page: {0}")]
    Render(String),
    #[error("failed to encode page image: {0}")]
    Encode(String),
}

/// Render the first page of `data` to a JPEG no wider than `target_width`.
#[cfg(feature = "pdf")]
pub fn rasterize_first_page(
    data: &[u8],
    target_width: u32,
    quality: f32,
) -> Result<Vec<u8>, PdfRasterError> {
    use image::codecs::jpeg::JpegEncoder;
    use pdfium_render::prelude::*;

    let bindings =
        Pdfium::bind_to_system_library().map_err(|_| PdfRasterError::Unavailable)?;
    let pdfium = Pdfium::new(bindings);
    let document = pdfium
        .load_pdf_from_byte_slice(data, None)
        .map_err(|e| PdfRasterError::Load(e.to_string()))?;
    let page = document
        .pages()
        .first()
        .map_err(|e| PdfRasterError::Load(e.to_string()))?;

    let config = PdfRenderConfig::new().set_target_width(target_width as i32);
    let bitmap = page
        .render_with_config(&config)
        .map_err(|e| PdfRasterError::Render(e.to_string()))?;
    let image = bitmap.as_image().to_rgb8();

    let mut buf = Vec::new();
    let quality = (quality.clamp(0.3, 1.0) * 100.0) as u8;
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    image
        .write_with_encoder(encoder)
        .map_err(|e| PdfRasterError::Encode(e.to_string()))?;
    Ok(buf)
}

#[cfg(not(feature = "pdf"))]
pub fn rasterize_first_page(
    _data: &[u8],
    _target_width: u32,
    _quality: f32,
) -> Result<Vec<u8>, PdfRasterError> {
    Err(PdfRasterError::Unavailable)
}

#[cfg(all(test, not(feature = "pdf")))]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_without_feature() {
        let result = rasterize_first_page(b"%PDF-1.4", 1600, 0.82);
        assert!(matches!(result, Err(PdfRasterError::Unavailable)));
    }
}
