use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::emissions::{EmissionsTable, TableError};
use crate::tariff::Tariff;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error(transparent)]
    Emissions(#[from] TableError),
}

/// Pixel rectangle holding the meter digits on the supported bill layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for CropRegion {
    fn default() -> Self {
        Self { x: 175, y: 430, width: 430, height: 115 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Upload size ceiling in bytes.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: "0.0.0.0:5000".into(), max_upload_bytes: 16 * 1024 * 1024 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Where uploads are written before processing.
    pub scratch_dir: PathBuf,
    pub history_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            scratch_dir: std::env::temp_dir().join("carbon-lens"),
            history_dir: PathBuf::from("history"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BillConfig {
    pub crop: CropRegion,
    pub tariff: Tariff,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Tesseract data directory; `None` uses the system default.
    pub tessdata: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub paths: PathsConfig,
    pub bill: BillConfig,
    pub ocr: OcrConfig,
    /// Extra curated factors appended after the built-in table.
    pub emissions: BTreeMap<String, f64>,
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read { path: path.to_path_buf(), source }),
        }
    }

    /// Apply `CARBON_BIND`, `CARBON_SCRATCH_DIR` and `CARBON_HISTORY_DIR` when set.
    pub fn with_env_overrides(mut self) -> Self {
        self.apply_overrides(|k| std::env::var(k).ok());
        self
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(bind) = lookup("CARBON_BIND") {
            self.server.bind = bind;
        }
        if let Some(dir) = lookup("CARBON_SCRATCH_DIR") {
            self.paths.scratch_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("CARBON_HISTORY_DIR") {
            self.paths.history_dir = PathBuf::from(dir);
        }
    }

    /// Built-in table extended with the `[emissions]` section.
    pub fn emissions_table(&self) -> Result<EmissionsTable, ConfigError> {
        let mut table = EmissionsTable::default();
        table.extend(self.emissions.iter().map(|(k, f)| (k.clone(), *f)))?;
        Ok(table)
    }
}
