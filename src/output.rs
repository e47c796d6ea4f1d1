//! Saving snapshots to disk.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use image::codecs::jpeg::JpegEncoder;
use image::{ImageError, ImageFormat};
use thiserror::Error;

use crate::camera::{ConvertError, Frame};

/// Extension of automatically named snapshots.
pub const SNAPSHOT_EXTENSION: &str = "jpg";

/// JPEG quality used for every saved snapshot.
pub const JPEG_QUALITY: u8 = 100;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Couldn't create folder '{}': {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Couldn't save image '{}': unsupported format (use .jpg, .png or .bmp)", .path.display())]
    UnsupportedFormat { path: PathBuf },
    #[error("Couldn't save image '{}': {source}", .path.display())]
    InvalidFrame {
        path: PathBuf,
        source: ConvertError,
    },
    #[error("Couldn't save image '{}': {source}", .path.display())]
    Save { path: PathBuf, source: ImageError },
}

/// Milliseconds since the Unix epoch, used as the snapshot file name.
pub fn timestamp_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// `<output_dir>/<folder>/<millis>.jpg`, creating the folder when missing.
pub fn snapshot_path(output_dir: &Path, folder: &str, millis: u128) -> Result<PathBuf, OutputError> {
    let dir = output_dir.join(folder.trim());
    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|source| OutputError::CreateDir {
            path: dir.clone(),
            source,
        })?;
    }
    Ok(dir.join(format!("{}.{}", millis, SNAPSHOT_EXTENSION)))
}

/// Image format for `path`, picked from its extension.
fn format_for(path: &Path) -> Result<ImageFormat, OutputError> {
    match ImageFormat::from_path(path) {
        Ok(format @ (ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::Bmp)) => Ok(format),
        _ => Err(OutputError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}

/// Write `frame` to `path`, flipped as configured.
///
/// The extension picks the format; JPEG is written at full quality.
pub fn save_snapshot(
    frame: &Frame,
    path: &Path,
    flip_horizontal: bool,
    flip_vertical: bool,
) -> Result<(), OutputError> {
    let format = format_for(path)?;
    let image = frame
        .mirrored(flip_horizontal, flip_vertical)
        .map_err(|source| OutputError::InvalidFrame {
            path: path.to_path_buf(),
            source,
        })?;

    log::debug!("saving '{}' as {:?}", path.display(), format);
    let result = match format {
        ImageFormat::Jpeg => File::create(path)
            .map_err(ImageError::from)
            .and_then(|file| {
                JpegEncoder::new_with_quality(BufWriter::new(file), JPEG_QUALITY).encode_image(&image)
            }),
        other => image.save_with_format(path, other),
    };
    result.map_err(|source| OutputError::Save {
        path: path.to_path_buf(),
        source,
    })
}
