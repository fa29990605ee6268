use std::fs;
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, info_span, warn};

use crate::acquire::{AcquireOutcome, Acquirer, ImageFetcher};
use crate::clean::clean;
use crate::dataset::DatasetRow;
use crate::normalize::normalize;
use crate::ocr::{extract_text, TextRecognizer};
use crate::results::{BatchWriter, ExtractionResult, ResultTable};
use crate::settings::Settings;

/// What happened to one dataset row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Extracted(ExtractionResult),
    /// Image present but could not be decoded.
    Skipped,
    Unavailable,
}

impl RowOutcome {
    fn label(&self) -> &'static str {
        match self {
            RowOutcome::Extracted(_) => "extracted",
            RowOutcome::Skipped => "skipped",
            RowOutcome::Unavailable => "unavailable",
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub rows: usize,
    pub downloaded: usize,
    pub already_present: usize,
    pub unavailable: usize,
    pub skipped: usize,
    pub extracted: usize,
    pub empty_tokens: usize,
    pub rows_persisted: usize,
}

impl RunStats {
    pub fn print(&self) {
        println!(
            "Rows: {} | downloaded {} | already present {} | unavailable {}",
            self.rows, self.downloaded, self.already_present, self.unavailable
        );
        println!(
            "Extracted {} ({} without a token), skipped {}, saved {} rows.",
            self.extracted, self.empty_tokens, self.skipped, self.rows_persisted
        );
    }
}

pub struct Pipeline {
    settings: Settings,
    acquirer: Acquirer,
    recognizer: Box<dyn TextRecognizer>,
}

impl Pipeline {
    pub fn new(
        settings: Settings,
        fetcher: Box<dyn ImageFetcher>,
        recognizer: Box<dyn TextRecognizer>,
    ) -> Self {
        let acquirer = Acquirer::from_settings(fetcher, &settings);
        Pipeline {
            settings,
            acquirer,
            recognizer,
        }
    }

    /// Create the image directory and load (or create) the results table.
    pub fn prepare(&self) -> Result<ResultTable> {
        let image_dir = &self.settings.image_dir;
        if image_dir.is_dir() {
            info!(dir = ?image_dir, "Image directory already exists");
        } else {
            fs::create_dir_all(image_dir)
                .with_context(|| format!("Failed to create {:?}", image_dir))?;
            info!(dir = ?image_dir, "Image directory created");
        }

        let output = &self.settings.output_path;
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }
        ResultTable::open(output)
    }

    pub fn run(&self, rows: &[DatasetRow]) -> Result<RunStats> {
        let run_id = format!("run-{}", chrono::Utc::now().format("%Y%m%dT%H%M%S"));
        let span = info_span!("run", run_id = %run_id);
        let _guard = span.enter();

        let table = self.prepare()?;
        let mut writer = BatchWriter::new(table, self.settings.batch_size);
        let mut stats = RunStats::default();

        let pb = self.progress_bar(rows.len());
        for row in rows {
            let outcome = self.process_row(row, &mut stats);
            match outcome {
                RowOutcome::Extracted(result) => {
                    stats.extracted += 1;
                    if result.extracted_text.is_empty() {
                        stats.empty_tokens += 1;
                    }
                    writer.push(result)?;
                }
                RowOutcome::Skipped => stats.skipped += 1,
                RowOutcome::Unavailable => stats.unavailable += 1,
            }
            stats.rows += 1;
            pb.inc(1);
        }
        pb.finish_and_clear();

        if writer.pending() > 0 {
            info!(rows = writer.pending(), "Saving final batch");
        }
        writer.flush()?;
        stats.rows_persisted = writer.persisted();

        info!(
            rows = stats.rows,
            extracted = stats.extracted,
            skipped = stats.skipped,
            unavailable = stats.unavailable,
            "Run finished"
        );
        Ok(stats)
    }

    /// Acquire, normalize, OCR and clean one row. Never fails: per-row problems
    /// become `Skipped` or `Unavailable`.
    pub fn process_row(&self, row: &DatasetRow, stats: &mut RunStats) -> RowOutcome {
        let started = Instant::now();
        let image_name = row.image_name();
        let image_path = self.settings.image_dir.join(&image_name);

        match self.acquirer.ensure(&row.image_link, &image_path) {
            AcquireOutcome::Downloaded => stats.downloaded += 1,
            AcquireOutcome::AlreadyPresent => stats.already_present += 1,
            AcquireOutcome::Unavailable => {}
        }

        let outcome = self.extract(&image_name, &image_path);
        let text = match &outcome {
            RowOutcome::Extracted(r) => r.extracted_text.as_str(),
            _ => "",
        };
        info!(
            row = row.row_index,
            image = %image_name,
            outcome = outcome.label(),
            text,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Row processed"
        );
        outcome
    }

    fn extract(&self, image_name: &str, image_path: &Path) -> RowOutcome {
        if !image_path.exists() {
            return RowOutcome::Unavailable;
        }
        let image = match normalize(image_path, self.settings.resolution()) {
            Ok(img) => img,
            Err(e) => {
                warn!(image = %image_name, error = %e, "Skipping image due to processing issues");
                return RowOutcome::Skipped;
            }
        };
        let raw = extract_text(self.recognizer.as_ref(), &image);
        RowOutcome::Extracted(ExtractionResult {
            image_name: image_name.to_string(),
            extracted_text: clean(&raw),
        })
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.settings.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")
        {
            pb.set_style(style.progress_chars("=> "));
        }
        pb
    }
}
