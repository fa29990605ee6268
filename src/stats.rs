use std::path::Path;

use anyhow::{Context, Result};
use itertools::Itertools;
use serde::Serialize;

use crate::results::{ExtractionResult, ResultTable};

/// Summary of an output table, as reported by `label_ocr stats`.
#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct TableStats {
    pub rows: usize,
    pub distinct_images: usize,
    /// Images that appear more than once (e.g. after a re-run).
    pub duplicated_images: usize,
    pub duplicate_rows: usize,
    pub empty_tokens: usize,
    pub images_on_disk: usize,
}

impl TableStats {
    pub fn print(&self) {
        println!("Rows:            {}", self.rows);
        println!("Distinct images: {}", self.distinct_images);
        println!(
            "Duplicated:      {} images ({} extra rows)",
            self.duplicated_images, self.duplicate_rows
        );
        println!("Empty tokens:    {}", self.empty_tokens);
        println!("Images on disk:  {}", self.images_on_disk);
    }
}

pub fn collect(output_path: &Path, image_dir: &Path) -> Result<TableStats> {
    let rows = if output_path.exists() {
        ResultTable::open(output_path)?.read_all()?
    } else {
        Vec::new()
    };
    let mut stats = summarize(&rows);
    if image_dir.is_dir() {
        stats.images_on_disk = std::fs::read_dir(image_dir)
            .with_context(|| format!("Failed to list {:?}", image_dir))?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "jpg"))
            .count();
    }
    Ok(stats)
}

fn summarize(rows: &[ExtractionResult]) -> TableStats {
    let counts = rows.iter().map(|r| r.image_name.as_str()).counts();
    let duplicated: Vec<usize> = counts.values().copied().filter(|&c| c > 1).collect();
    TableStats {
        rows: rows.len(),
        distinct_images: counts.len(),
        duplicated_images: duplicated.len(),
        duplicate_rows: duplicated.iter().map(|c| c - 1).sum(),
        empty_tokens: rows.iter().filter(|r| r.extracted_text.is_empty()).count(),
        images_on_disk: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_duplicates_and_empty_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.csv");
        let images = dir.path().join("images");
        std::fs::create_dir(&images).unwrap();
        for name in ["0.jpg", "1.jpg", "notes.txt"] {
            std::fs::write(images.join(name), b"x").unwrap();
        }
        std::fs::write(
            &out,
            "image_name,extracted_text\n0.jpg,5 g\n1.jpg,\n0.jpg,5 g\n0.jpg,5 g\n",
        )
        .unwrap();

        let stats = collect(&out, &images).unwrap();
        assert_eq!(
            stats,
            TableStats {
                rows: 4,
                distinct_images: 2,
                duplicated_images: 1,
                duplicate_rows: 2,
                empty_tokens: 1,
                images_on_disk: 2,
            }
        );
    }

    #[test]
    fn missing_output_is_all_zero() {
        let dir = tempfile::tempdir().unwrap();
        let stats = collect(&dir.path().join("none.csv"), &dir.path().join("none")).unwrap();
        assert_eq!(stats, TableStats::default());
        // nothing gets created by a read-only command
        assert!(!dir.path().join("none.csv").exists());
    }
}
