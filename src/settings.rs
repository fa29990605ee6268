use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use config::Config;
use serde::Deserialize;

const DEFAULT_CONFIG_FILE: &str = "label_ocr.toml";
const ENV_PREFIX: &str = "LABEL_OCR";

/// Everything a run needs, passed explicitly into the pipeline.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub image_dir: PathBuf,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub batch_size: usize,
    pub image_width: u32,
    pub image_height: u32,
    pub http_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub tesseract_cmd: String,
    pub tesseract_lang: String,
    pub show_progress: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            image_dir: PathBuf::from("data/images"),
            input_path: PathBuf::from("data/train.csv"),
            output_path: PathBuf::from("data/extracted_text.csv"),
            batch_size: 1001,
            image_width: 800,
            image_height: 800,
            http_timeout_secs: 30,
            max_retries: 2,
            retry_backoff_ms: 500,
            tesseract_cmd: "tesseract".to_string(),
            tesseract_lang: "eng".to_string(),
            show_progress: true,
        }
    }
}

impl Settings {
    /// Defaults, then the config file (explicit path must exist, the default
    /// one is optional), then `LABEL_OCR_*` environment variables.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let file_source = match file {
            Some(p) => config::File::from(p).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };
        let settings: Settings = Config::builder()
            .add_source(file_source)
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.batch_size > 0, "batch_size must be at least 1");
        ensure!(
            self.image_width > 0 && self.image_height > 0,
            "image resolution must be non-zero, got {}x{}",
            self.image_width,
            self.image_height
        );
        Ok(())
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.image_width, self.image_height)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}
