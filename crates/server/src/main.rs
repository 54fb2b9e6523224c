use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use carbon_core::Config;
use carbon_ocr::OcrBackend;
use tokio::net::TcpListener;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

mod app;
mod error;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var("CARBON_LOG_FORMAT").is_ok_and(|f| f == "json") {
        Registry::default()
            .with(filter)
            .with(JsonStorageLayer)
            .with(BunyanFormattingLayer::new("carbon-server".into(), std::io::stdout))
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[cfg(feature = "tesseract")]
fn recognizer(config: &Config) -> Arc<dyn OcrBackend> {
    use carbon_ocr::recognizer::tesseract_backend::TesseractRecognizer;
    Arc::new(TesseractRecognizer::new(config.ocr.tessdata.clone()))
}

#[cfg(not(feature = "tesseract"))]
fn recognizer(_config: &Config) -> Arc<dyn OcrBackend> {
    tracing::warn!("Built without an OCR engine; every upload will fail text extraction");
    Arc::new(carbon_ocr::NoEngine)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config_path = std::env::var("CARBON_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("carbon.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?
        .with_env_overrides();

    tokio::fs::create_dir_all(&config.paths.scratch_dir)
        .await
        .context("Failed to create scratch directory")?;
    tokio::fs::create_dir_all(&config.paths.history_dir)
        .await
        .context("Failed to create history directory")?;

    let state = Arc::new(app::AppState::from_config(&config, recognizer(&config))?);
    let router = app::router(state, config.server.max_upload_bytes);

    let listener = TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    tracing::info!("Carbon server listening on {}", config.server.bind);
    axum::serve(listener, router).await?;
    Ok(())
}
