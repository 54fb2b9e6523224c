use std::path::{Path, PathBuf};
use std::sync::Arc;

use carbon_core::{estimate, CropRegion, EmissionResult, EmissionsTable, Tariff, Vocabulary};
use thiserror::Error;

use crate::bill::{self, BillError};
use crate::preprocess::{self, PreprocessError};
use crate::receipt::parse_receipt;
use crate::recognizer::{extract_text, OcrBackend};
use crate::types::BillOutcome;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Preprocess(#[from] PreprocessError),
    #[error("Failed to extract text from image")]
    EmptyExtraction,
    #[error("No items detected in receipt")]
    NoItemsParsed,
}

/// Orchestrates: grayscale → OCR → parse → emission match.
pub struct ReceiptPipeline<R: OcrBackend> {
    recognizer: R,
    table: Arc<EmissionsTable>,
}

impl<R: OcrBackend> ReceiptPipeline<R> {
    pub fn new(recognizer: R, table: Arc<EmissionsTable>) -> Self {
        Self { recognizer, table }
    }

    pub fn table(&self) -> &EmissionsTable {
        &self.table
    }

    /// Process a receipt photo on disk. `hints` is the caller's comma-separated shopping list.
    pub fn process_file(
        &self,
        path: &Path,
        hints: &str,
    ) -> Result<Vec<EmissionResult>, PipelineError> {
        let gray = preprocess::prepare_receipt(path)?;
        self.process_image(&preprocess::encode_png(&gray)?, hints)
    }

    pub fn process_bytes(
        &self,
        data: &[u8],
        hints: &str,
    ) -> Result<Vec<EmissionResult>, PipelineError> {
        let gray = preprocess::prepare_receipt_from_bytes(data)?;
        self.process_image(&preprocess::encode_png(&gray)?, hints)
    }

    fn process_image(
        &self,
        png: &[u8],
        hints: &str,
    ) -> Result<Vec<EmissionResult>, PipelineError> {
        let text = extract_text(&self.recognizer, png);
        if text.is_empty() {
            return Err(PipelineError::EmptyExtraction);
        }

        let items = parse_receipt(&text);
        if items.is_empty() {
            return Err(PipelineError::NoItemsParsed);
        }

        let vocabulary = Vocabulary::from_hints(&self.table, hints);
        if !vocabulary.is_empty() {
            tracing::debug!(terms = ?vocabulary.terms(), "Request vocabulary");
        }
        Ok(estimate(&self.table, &vocabulary, &items))
    }
}

/// Orchestrates: crop → sharpen → upscale → OCR → digit correction → tariff.
pub struct BillPipeline<R: OcrBackend> {
    recognizer: R,
    region: CropRegion,
    tariff: Tariff,
}

impl<R: OcrBackend> BillPipeline<R> {
    pub fn new(recognizer: R, region: CropRegion, tariff: Tariff) -> Self {
        Self { recognizer, region, tariff }
    }

    pub fn process_file(&self, path: &Path) -> Result<BillOutcome, PipelineError> {
        let strip = preprocess::prepare_bill(path, &self.region)?;
        Ok(self.read_units(&preprocess::encode_png(&strip)?))
    }

    pub fn process_bytes(&self, data: &[u8]) -> Result<BillOutcome, PipelineError> {
        let strip = preprocess::prepare_bill_from_bytes(data, &self.region)?;
        Ok(self.read_units(&preprocess::encode_png(&strip)?))
    }

    fn read_units(&self, png: &[u8]) -> BillOutcome {
        let text = extract_text(&self.recognizer, png);
        let reading = bill::extract_units(&text)
            .and_then(|units| self.tariff.reading(units).map_err(BillError::from));
        match reading {
            Ok(reading) => BillOutcome::Detected(reading),
            Err(e) => {
                tracing::info!("{e}");
                BillOutcome::NotDetected(e)
            }
        }
    }
}

// ── Scratch uploads ───────────────────────────────────────────────────────────

/// Directory holding uploads for the lifetime of one request.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: PathBuf,
}

impl ScratchDir {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Write `data` under a fresh `upload_<uuid>.<ext>` name.
    pub async fn save(&self, data: &[u8], ext: &str) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.root).await?;
        let dest = self
            .root
            .join(format!("upload_{}.{ext}", uuid::Uuid::new_v4().simple()));
        tokio::fs::write(&dest, data).await?;
        tracing::debug!(path = %dest.display(), bytes = data.len(), "Saved upload");
        Ok(dest)
    }
}

/// Delete a processed upload. Failure is logged and otherwise ignored.
pub fn remove_best_effort(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed uploaded file"),
        Err(e) => tracing::warn!("Failed to remove uploaded file {}: {e}", path.display()),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognizer::MockRecognizer;
    use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
    use std::io::Cursor;

    fn tiny_png(width: u32, height: u32) -> Vec<u8> {
        let img: GrayImage = ImageBuffer::from_fn(width, height, |_, _| Luma([200u8]));
        let mut buf = Vec::new();
        DynamicImage::ImageLuma8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    fn receipts(text: &str) -> ReceiptPipeline<MockRecognizer> {
        ReceiptPipeline::new(MockRecognizer::new(text), Arc::new(EmissionsTable::default()))
    }

    fn bills(text: &str) -> BillPipeline<MockRecognizer> {
        BillPipeline::new(
            MockRecognizer::new(text),
            CropRegion { x: 0, y: 0, width: 8, height: 10 },
            Tariff::default(),
        )
    }

    #[test]
    fn receipt_bytes_produce_emissions() {
        let results = receipts("2 eggs 1.5l milk gadget")
            .process_bytes(&tiny_png(4, 4), "")
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].item, "eggs");
        assert!((results[0].emissions - 0.4).abs() < 1e-9);
        assert!((results[1].emissions - 2.25).abs() < 1e-9);
    }

    #[test]
    fn receipt_hints_extend_matching_for_one_call() {
        let pipeline = receipts("gadget");
        let with_hint = pipeline.process_bytes(&tiny_png(4, 4), "gadget").unwrap();
        assert_eq!(with_hint.len(), 1);
        assert_eq!(with_hint[0].emissions, 1.0);

        let without = pipeline.process_bytes(&tiny_png(4, 4), "").unwrap();
        assert!(without.is_empty());
        assert!(!pipeline.table().contains("gadget"));
    }

    #[test]
    fn empty_ocr_is_extraction_failure() {
        let err = receipts("").process_bytes(&tiny_png(4, 4), "").unwrap_err();
        assert!(matches!(err, PipelineError::EmptyExtraction));
    }

    #[test]
    fn text_without_items_is_no_items() {
        let err = receipts("$%^&").process_bytes(&tiny_png(4, 4), "").unwrap_err();
        assert!(matches!(err, PipelineError::NoItemsParsed));
    }

    #[test]
    fn undecodable_receipt_is_preprocess_error() {
        let err = receipts("milk").process_bytes(b"nope", "").unwrap_err();
        assert!(matches!(err, PipelineError::Preprocess(PreprocessError::Load(_))));
    }

    #[test]
    fn receipt_file_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("receipt.png");
        std::fs::write(&path, tiny_png(6, 6)).unwrap();
        let results = receipts("Fresh Eggs").process_file(&path, "").unwrap();
        assert_eq!(results[0].item, "fresh eggs");
    }

    #[test]
    fn bill_reading_goes_through_tariff() {
        let outcome = bills("25O").process_bytes(&tiny_png(20, 20)).unwrap();
        match outcome {
            BillOutcome::Detected(r) => {
                assert_eq!(r.units, 250.0);
                assert_eq!(r.bill_amount, 845.0);
                assert_eq!(r.co2_emissions, 205.0);
            }
            other => panic!("expected a reading, got {other:?}"),
        }
    }

    #[test]
    fn bill_without_digits_is_not_detected() {
        let outcome = bills("").process_bytes(&tiny_png(20, 20)).unwrap();
        assert!(!outcome.is_detected());
    }

    #[test]
    fn bill_reading_too_large_to_bill_is_not_detected() {
        let outcome = bills("12345678901234567890123456789012")
            .process_bytes(&tiny_png(20, 20))
            .unwrap();
        match outcome {
            BillOutcome::NotDetected(e) => assert_eq!(e.code(), "units_out_of_range"),
            other => panic!("expected no reading, got {other:?}"),
        }
    }

    #[test]
    fn bill_crop_outside_image_fails() {
        let pipeline = BillPipeline::new(
            MockRecognizer::new("100"),
            CropRegion::default(),
            Tariff::default(),
        );
        let err = pipeline.process_bytes(&tiny_png(20, 20)).unwrap_err();
        assert!(matches!(err, PipelineError::Preprocess(PreprocessError::EmptyCrop { .. })));
    }

    #[tokio::test]
    async fn scratch_save_then_remove() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::new(dir.path().join("scratch"));
        let path = scratch.save(b"bytes", "png").await.unwrap();
        assert!(path.exists());
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("upload_") && name.ends_with(".png"));

        remove_best_effort(&path);
        assert!(!path.exists());
        // Second removal only logs.
        remove_best_effort(&path);
    }

    #[tokio::test]
    async fn scratch_names_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::new(dir.path().to_path_buf());
        let a = scratch.save(b"a", "jpg").await.unwrap();
        let b = scratch.save(b"a", "jpg").await.unwrap();
        assert_ne!(a, b);
    }
}
