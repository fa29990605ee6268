use std::path::Path;

use anyhow::{anyhow, Context, Result};

const LINK_COLUMN: &str = "image_link";

/// One input row. `row_index` is the 0-based data-row ordinal and names the image file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetRow {
    pub row_index: usize,
    pub image_link: String,
}

impl DatasetRow {
    pub fn image_name(&self) -> String {
        format!("{}.jpg", self.row_index)
    }
}

pub fn load(path: &Path) -> Result<Vec<DatasetRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open dataset {:?}", path))?;

    let link_idx = rdr
        .headers()?
        .iter()
        .position(|h| h.trim() == LINK_COLUMN)
        .ok_or_else(|| anyhow!("Dataset {:?} has no '{}' column", path, LINK_COLUMN))?;

    let mut rows = Vec::new();
    for (row_index, record) in rdr.records().enumerate() {
        let record = record.with_context(|| format!("Bad record {} in {:?}", row_index, path))?;
        rows.push(DatasetRow {
            row_index,
            image_link: record.get(link_idx).unwrap_or_default().trim().to_string(),
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_links_by_ordinal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.csv");
        std::fs::write(
            &path,
            "group_id,image_link,entity_name\n\
             99,https://img.example/a.jpg,item_weight\n\
             17,https://img.example/b.jpg,width\n",
        )
        .unwrap();

        let rows = load(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].row_index, 0);
        assert_eq!(rows[0].image_link, "https://img.example/a.jpg");
        assert_eq!(rows[1].image_name(), "1.jpg");
    }

    #[test]
    fn short_rows_get_empty_link() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.csv");
        std::fs::write(&path, "id,image_link\n1\n2,https://img.example/c.jpg\n").unwrap();

        let rows = load(&path).unwrap();
        assert_eq!(rows[0].image_link, "");
        assert_eq!(rows[1].image_link, "https://img.example/c.jpg");
    }

    #[test]
    fn missing_link_column_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.csv");
        std::fs::write(&path, "id,url\n1,https://img.example/a.jpg\n").unwrap();
        assert!(load(&path).is_err());
    }
}
