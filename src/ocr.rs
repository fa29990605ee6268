use std::process::Command;

use anyhow::{bail, Context, Result};
use image::{GrayImage, ImageFormat};
use tracing::warn;

use crate::settings::Settings;

/// An OCR engine: normalized image in, raw text out.
pub trait TextRecognizer {
    fn recognize(&self, image: &GrayImage) -> Result<String>;
}

/// Runs the `tesseract` executable against a temporary PNG.
pub struct TesseractCli {
    program: String,
    lang: String,
}

impl TesseractCli {
    pub fn new(program: impl Into<String>, lang: impl Into<String>) -> Self {
        TesseractCli {
            program: program.into(),
            lang: lang.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.tesseract_cmd, &settings.tesseract_lang)
    }
}

impl TextRecognizer for TesseractCli {
    fn recognize(&self, image: &GrayImage) -> Result<String> {
        let input = tempfile::Builder::new()
            .prefix("label_ocr")
            .suffix(".png")
            .tempfile()
            .context("cannot create tesseract input file")?;
        image
            .save_with_format(input.path(), ImageFormat::Png)
            .context("cannot write tesseract input file")?;

        let output = Command::new(&self.program)
            .arg(input.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.lang)
            .output()
            .with_context(|| format!("cannot run {}", self.program))?;
        if !output.status.success() {
            bail!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// OCR that never fails: engine errors are logged and read as no text.
pub fn extract_text(recognizer: &dyn TextRecognizer, image: &GrayImage) -> String {
    match recognizer.recognize(image) {
        Ok(text) => text.trim().to_string(),
        Err(e) => {
            warn!(error = %e, "Error extracting text");
            String::new()
        }
    }
}
