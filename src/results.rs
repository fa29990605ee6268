use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::utils::temp_file_beside;

const HEADER: [&str; 2] = ["image_name", "extracted_text"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub image_name: String,
    #[serde(default)]
    pub extracted_text: String,
}

/// The CSV output. Every write replaces the whole file via temp file + rename.
#[derive(Debug, Clone)]
pub struct ResultTable {
    path: PathBuf,
}

impl ResultTable {
    /// Use the existing table at `path`, or create a header-only one.
    pub fn open(path: &Path) -> Result<Self> {
        let table = ResultTable {
            path: path.to_path_buf(),
        };
        if path.exists() {
            info!(path = ?path, "Results loaded");
        } else {
            table.write_all(&[])?;
            info!(path = ?path, "Created a new results table");
        }
        Ok(table)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_all(&self) -> Result<Vec<ExtractionResult>> {
        let mut rdr = csv::Reader::from_path(&self.path)
            .with_context(|| format!("Failed to open {:?}", self.path))?;
        let rows = rdr
            .deserialize()
            .collect::<Result<Vec<ExtractionResult>, _>>()
            .with_context(|| format!("Failed to read {:?}", self.path))?;
        Ok(rows)
    }

    /// Re-read what is on disk, add `rows` after it, write it all back.
    /// Returns the total row count now on disk.
    pub fn append(&self, rows: &[ExtractionResult]) -> Result<usize> {
        let mut all = if self.path.exists() {
            self.read_all()?
        } else {
            Vec::new()
        };
        all.extend_from_slice(rows);
        self.write_all(&all)?;
        Ok(all.len())
    }

    fn write_all(&self, rows: &[ExtractionResult]) -> Result<()> {
        let tmp = temp_file_beside(&self.path)
            .with_context(|| format!("Failed to create temp file for {:?}", self.path))?;

        let mut wtr = csv::Writer::from_writer(tmp);
        wtr.write_record(HEADER)?;
        for row in rows {
            wtr.write_record([row.image_name.as_str(), row.extracted_text.as_str()])?;
        }
        let mut tmp = wtr
            .into_inner()
            .map_err(|e| e.into_error())
            .with_context(|| format!("Failed to write {:?}", self.path))?;
        tmp.flush()?;
        tmp.persist(&self.path)
            .map_err(|e| e.error)
            .with_context(|| format!("Failed to replace {:?}", self.path))?;
        Ok(())
    }
}

/// Buffers results and merges them into the table every `batch_size` rows.
pub struct BatchWriter {
    table: ResultTable,
    pending: Vec<ExtractionResult>,
    batch_size: usize,
    persisted: usize,
}

impl BatchWriter {
    pub fn new(table: ResultTable, batch_size: usize) -> Self {
        BatchWriter {
            table,
            pending: Vec::with_capacity(batch_size.min(4096)),
            batch_size: batch_size.max(1),
            persisted: 0,
        }
    }

    /// Buffer one result, flushing when the batch is full.
    pub fn push(&mut self, row: ExtractionResult) -> Result<()> {
        self.pending.push(row);
        if self.pending.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Write out whatever is buffered. Returns how many rows were written.
    pub fn flush(&mut self) -> Result<usize> {
        if self.pending.is_empty() {
            return Ok(0);
        }
        let n = self.pending.len();
        let total = self.table.append(&self.pending)?;
        self.pending.clear();
        self.persisted += n;
        info!(rows = n, total, path = ?self.table.path(), "Saved batch");
        Ok(n)
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Rows this writer has put on disk.
    pub fn persisted(&self) -> usize {
        self.persisted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str, text: &str) -> ExtractionResult {
        ExtractionResult {
            image_name: name.to_string(),
            extracted_text: text.to_string(),
        }
    }

    #[test]
    fn open_creates_header_only_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let table = ResultTable::open(&path).unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "image_name,extracted_text\n"
        );
        assert!(table.read_all().unwrap().is_empty());
    }

    #[test]
    fn open_keeps_existing_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        std::fs::write(&path, "image_name,extracted_text\n0.jpg,250 g\n1.jpg,\n").unwrap();

        let table = ResultTable::open(&path).unwrap();
        assert_eq!(
            table.read_all().unwrap(),
            vec![result("0.jpg", "250 g"), result("1.jpg", "")]
        );
    }

    #[test]
    fn append_merges_with_disk_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let table = ResultTable::open(&path).unwrap();
        table.append(&[result("0.jpg", "1 kg")]).unwrap();

        // someone else added a row between flushes
        let mut text = std::fs::read_to_string(&path).unwrap();
        text.push_str("9.jpg,3 cm\n");
        std::fs::write(&path, text).unwrap();

        let total = table
            .append(&[result("1.jpg", ""), result("2.jpg", "12.5 oz")])
            .unwrap();
        assert_eq!(total, 4);
        let names: Vec<String> = table
            .read_all()
            .unwrap()
            .into_iter()
            .map(|r| r.image_name)
            .collect();
        assert_eq!(names, ["0.jpg", "9.jpg", "1.jpg", "2.jpg"]);
    }

    #[test]
    fn text_with_commas_and_newlines_survives() {
        let dir = tempfile::tempdir().unwrap();
        let table = ResultTable::open(&dir.path().join("out.csv")).unwrap();
        table.append(&[result("0.jpg", "330\nml")]).unwrap();
        assert_eq!(table.read_all().unwrap(), vec![result("0.jpg", "330\nml")]);
    }

    #[test]
    fn flushes_exactly_at_batch_size() {
        let dir = tempfile::tempdir().unwrap();
        let table = ResultTable::open(&dir.path().join("out.csv")).unwrap();
        let mut writer = BatchWriter::new(table.clone(), 3);

        for i in 0..3 {
            writer.push(result(&format!("{i}.jpg"), "")).unwrap();
        }
        assert_eq!(table.read_all().unwrap().len(), 3);
        assert_eq!(writer.pending(), 0);

        writer.push(result("3.jpg", "5 mm")).unwrap();
        assert_eq!(table.read_all().unwrap().len(), 3);
        assert_eq!(writer.pending(), 1);

        assert_eq!(writer.flush().unwrap(), 1);
        assert_eq!(table.read_all().unwrap().len(), 4);
        assert_eq!(writer.pending(), 0);
        assert_eq!(writer.persisted(), 4);
    }

    #[test]
    fn failed_flush_keeps_buffer() {
        let dir = tempfile::tempdir().unwrap();
        // a directory where the table should be makes every write fail
        let path = dir.path().join("out.csv");
        std::fs::create_dir(&path).unwrap();
        let table = ResultTable::open(&path).unwrap();
        let mut writer = BatchWriter::new(table, 10);

        writer.push(result("0.jpg", "2 kg")).unwrap();
        assert!(writer.flush().is_err());
        assert_eq!(writer.pending(), 1);
        assert_eq!(writer.persisted(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn rewrite_keeps_table_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        std::fs::write(&path, "image_name,extracted_text\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let table = ResultTable::open(&path).unwrap();
        table.append(&[result("0.jpg", "1 l")]).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
    }

    #[test]
    fn empty_flush_leaves_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let table = ResultTable::open(&path).unwrap();
        let mut writer = BatchWriter::new(table, 10);
        assert_eq!(writer.flush().unwrap(), 0);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "image_name,extracted_text\n"
        );
    }
}
