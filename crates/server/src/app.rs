use std::path::Path;
use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use carbon_core::{total_emissions, Config, EmissionResult, MeterReading};
use carbon_ocr::{
    remove_best_effort, BillOutcome, BillPipeline, BillResponse, OcrBackend, PipelineError,
    ReceiptPipeline, ScratchDir,
};
use carbon_storage::{HistoryLog, HistoryRecord, BILLS_LOG, RECEIPTS_LOG};
use serde::{Deserialize, Serialize};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;

/// What gets logged for each successfully processed receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptEntry {
    pub items: Vec<EmissionResult>,
    pub total_emissions: f64,
}

pub struct AppState {
    pub receipts: ReceiptPipeline<Arc<dyn OcrBackend>>,
    pub bills: BillPipeline<Arc<dyn OcrBackend>>,
    pub scratch: ScratchDir,
    pub receipt_log: HistoryLog<ReceiptEntry>,
    pub bill_log: HistoryLog<MeterReading>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn from_config(config: &Config, recognizer: Arc<dyn OcrBackend>) -> anyhow::Result<Self> {
        let table = Arc::new(config.emissions_table()?);
        tracing::info!(factors = table.len(), "Loaded emission factors");
        Ok(Self {
            receipts: ReceiptPipeline::new(recognizer.clone(), table),
            bills: BillPipeline::new(recognizer, config.bill.crop, config.bill.tariff.clone()),
            scratch: ScratchDir::new(config.paths.scratch_dir.clone()),
            receipt_log: HistoryLog::in_dir(&config.paths.history_dir, RECEIPTS_LOG),
            bill_log: HistoryLog::in_dir(&config.paths.history_dir, BILLS_LOG),
        })
    }
}

pub fn router(state: SharedState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/upload", post(upload_receipt))
        .route("/bill", post(upload_bill))
        .route("/history/receipts", get(receipt_history))
        .route("/history/bills", get(bill_history))
        .route("/health", get(|| async { "OK" }))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(panic_response))
        .with_state(state)
}

fn panic_response(_err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    ApiError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: "Unexpected server error".into(),
    }
    .into_response()
}

// ── Multipart ─────────────────────────────────────────────────────────────────

struct Upload {
    file_name: String,
    data: Vec<u8>,
}

impl Upload {
    fn extension(&self) -> String {
        Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("png")
            .to_lowercase()
    }
}

#[derive(Default)]
struct UploadForm {
    image: Option<Upload>,
    shopping_list: String,
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await?.to_vec();
                form.image = Some(Upload { file_name, data });
            }
            "shopping_list" => form.shopping_list = field.text().await?,
            _ => {}
        }
    }
    Ok(form)
}

fn require_image(form: &mut UploadForm) -> Result<Upload, ApiError> {
    let image = form
        .image
        .take()
        .ok_or_else(|| ApiError::bad_request("No image uploaded"))?;
    if image.file_name.is_empty() {
        return Err(ApiError::bad_request("No file selected"));
    }
    Ok(image)
}

/// Save the upload, run `job` on a blocking thread, then remove the upload whatever the outcome.
async fn with_scratch_upload<T, F>(
    state: &SharedState,
    upload: &Upload,
    job: F,
) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&AppState, &Path) -> Result<T, PipelineError> + Send + 'static,
{
    let path = state.scratch.save(&upload.data, &upload.extension()).await?;
    let worker_state = state.clone();
    let worker_path = path.clone();
    let outcome =
        tokio::task::spawn_blocking(move || job(&worker_state, &worker_path)).await;
    remove_best_effort(&path);
    Ok(outcome??)
}

// ── Handlers ──────────────────────────────────────────────────────────────────

async fn upload_receipt(
    State(state): State<SharedState>,
    multipart: Multipart,
) -> Result<Json<Vec<EmissionResult>>, ApiError> {
    let mut form = read_form(multipart).await?;
    let image = require_image(&mut form)?;
    tracing::debug!(shopping_list = %form.shopping_list, "Received upload request");

    let hints = form.shopping_list;
    let results = with_scratch_upload(&state, &image, move |s, path| {
        s.receipts.process_file(path, &hints)
    })
    .await?;

    let entry = ReceiptEntry {
        total_emissions: total_emissions(&results),
        items: results.clone(),
    };
    tracing::info!(items = entry.items.len(), total = entry.total_emissions, "Receipt processed");
    if let Err(e) = state.receipt_log.append(entry).await {
        tracing::warn!("Failed to record receipt history: {e}");
    }
    Ok(Json(results))
}

async fn upload_bill(
    State(state): State<SharedState>,
    multipart: Multipart,
) -> Result<Json<BillResponse>, ApiError> {
    let mut form = read_form(multipart).await?;
    let image = require_image(&mut form)?;

    let outcome =
        with_scratch_upload(&state, &image, |s, path| s.bills.process_file(path)).await?;

    if let BillOutcome::Detected(reading) = &outcome {
        tracing::info!(units = reading.units, amount = reading.bill_amount, "Bill processed");
        if let Err(e) = state.bill_log.append(*reading).await {
            tracing::warn!("Failed to record bill history: {e}");
        }
    }
    Ok(Json(outcome.to_response()))
}

async fn receipt_history(
    State(state): State<SharedState>,
) -> Result<Json<Vec<HistoryRecord<ReceiptEntry>>>, ApiError> {
    Ok(Json(state.receipt_log.list().await?))
}

async fn bill_history(
    State(state): State<SharedState>,
) -> Result<Json<Vec<HistoryRecord<MeterReading>>>, ApiError> {
    Ok(Json(state.bill_log.list().await?))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
