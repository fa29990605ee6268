//! Product label OCR - sequential, resumable batch job.
//!
//! For every row of the input CSV:
//!   1. download `image_link` to `{row}.jpg` unless it is already on disk
//!   2. grayscale + resize to a fixed resolution
//!   3. OCR
//!   4. keep the first "number + unit" token
//! Results are merged into the output CSV every `batch_size` rows and once more
//! at the end, so a killed run can simply be restarted.

mod acquire;
mod clean;
mod dataset;
mod error;
mod normalize;
mod ocr;
mod pipeline;
mod results;
mod settings;
mod stats;
mod utils;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use acquire::HttpFetcher;
use ocr::TesseractCli;
use pipeline::Pipeline;
use settings::Settings;

#[derive(Parser)]
#[command(name = "label_ocr", about = "Download product images, OCR them, keep the value+unit token")]
struct Cli {
    /// Config file (default: ./label_ocr.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process the input dataset, resuming from what is already on disk
    Run,
    /// Summarize the output table
    Stats {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run the text cleaner on a string
    Clean { text: String },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run => {
            let settings = Settings::load(cli.config.as_deref())?;
            info!(settings = ?settings, "Starting label OCR");

            let rows = dataset::load(&settings.input_path)?;
            println!("Loaded {} rows from {:?}", rows.len(), settings.input_path);

            // an empty dataset still sets up the image directory and output table
            let fetcher = HttpFetcher::new(settings.http_timeout())?;
            let recognizer = TesseractCli::from_settings(&settings);
            let pipeline = Pipeline::new(settings, Box::new(fetcher), Box::new(recognizer));
            let stats = pipeline.run(&rows)?;
            stats.print();
        }
        Commands::Stats { json } => {
            let settings = Settings::load(cli.config.as_deref())?;
            let s = stats::collect(&settings.output_path, &settings.image_dir)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&s)?);
            } else {
                s.print();
            }
        }
        Commands::Clean { text } => {
            println!("{}", clean::clean(&text));
        }
    }

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }
    Ok(())
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
