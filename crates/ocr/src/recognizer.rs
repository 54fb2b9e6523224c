use thiserror::Error;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Image decode error: {0}")]
    ImageDecode(String),
    #[error("OCR engine error: {0}")]
    Engine(String),
    #[error("Tesseract not available; build with `tesseract` feature")]
    NotAvailable,
}

/// Abstraction over an OCR backend.
/// Implementations accept PNG image bytes and return recognized text fragments in the
/// order the engine reports them.
pub trait OcrBackend: Send + Sync {
    fn recognize(&self, image_bytes: &[u8]) -> Result<Vec<String>, OcrError>;
}

impl<T: OcrBackend + ?Sized> OcrBackend for std::sync::Arc<T> {
    fn recognize(&self, image_bytes: &[u8]) -> Result<Vec<String>, OcrError> {
        (**self).recognize(image_bytes)
    }
}

/// Run one OCR pass and join the fragments with single spaces.
///
/// Any engine failure is logged and yields an empty string, which callers treat as
/// "extraction failed".
pub fn extract_text<R: OcrBackend + ?Sized>(backend: &R, image_bytes: &[u8]) -> String {
    match backend.recognize(image_bytes) {
        Ok(fragments) => {
            let text = fragments.join(" ");
            tracing::debug!(fragments = fragments.len(), %text, "Extracted text");
            text
        }
        Err(e) => {
            tracing::error!("OCR error: {e}");
            String::new()
        }
    }
}

// ── Mock backend (always available, used for tests) ───────────────────────────

/// Returns pre-set fragments regardless of the image.
pub struct MockRecognizer {
    pub fragments: Vec<String>,
}

impl MockRecognizer {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let fragments = if text.is_empty() { vec![] } else { vec![text] };
        Self { fragments }
    }

    pub fn with_fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { fragments: fragments.into_iter().map(Into::into).collect() }
    }
}

impl OcrBackend for MockRecognizer {
    fn recognize(&self, _image_bytes: &[u8]) -> Result<Vec<String>, OcrError> {
        Ok(self.fragments.clone())
    }
}

/// Stand-in used when the binary was built without an OCR engine.
pub struct NoEngine;

impl OcrBackend for NoEngine {
    fn recognize(&self, _image_bytes: &[u8]) -> Result<Vec<String>, OcrError> {
        Err(OcrError::NotAvailable)
    }
}

// ── Tesseract backend (optional, gated behind `tesseract` feature) ─────────────

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    use super::{OcrBackend, OcrError};
    use leptess::LepTess;

    /// English only, CPU only, one pass per image.
    pub struct TesseractRecognizer {
        data_path: Option<String>,
    }

    impl TesseractRecognizer {
        pub const LANG: &'static str = "eng";

        pub fn new(data_path: Option<String>) -> Self {
            Self { data_path }
        }
    }

    impl OcrBackend for TesseractRecognizer {
        fn recognize(&self, image_bytes: &[u8]) -> Result<Vec<String>, OcrError> {
            let mut lt = LepTess::new(self.data_path.as_deref(), Self::LANG)
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            lt.set_image_from_mem(image_bytes)
                .map_err(|e| OcrError::ImageDecode(e.to_string()))?;
            let text = lt.get_utf8_text().map_err(|e| OcrError::Engine(e.to_string()))?;
            Ok(text
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect())
        }
    }
}
