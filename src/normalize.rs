use std::path::Path;

use image::imageops::{self, FilterType};
use image::{GrayImage, ImageReader};

use crate::error::NormalizeError;

/// Load `path`, convert to 8-bit grayscale and stretch to exactly `width` x `height`.
///
/// The format is sniffed from the content, not the extension, since every
/// download is stored as `{n}.jpg` whatever the server sent.
pub fn normalize(path: &Path, (width, height): (u32, u32)) -> Result<GrayImage, NormalizeError> {
    let decoded = ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|source| NormalizeError::Open {
            path: path.to_path_buf(),
            source,
        })?
        .decode()
        .map_err(|source| NormalizeError::Decode {
            path: path.to_path_buf(),
            source,
        })?;

    let gray = decoded.to_luma8();
    Ok(imageops::resize(&gray, width, height, FilterType::CatmullRom))
}
