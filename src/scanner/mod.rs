pub mod discovery;
pub mod exiftool;
pub mod hashing;
pub mod metadata;
pub mod thumbnails;

use anyhow::Result;
use std::path::Path;

use crate::model::{MediaMetadata, MediaRecord, Thumbnails};

pub use discovery::{discover_files, has_extension};
pub use exiftool::ExiftoolExtractor;
pub use hashing::content_digest;
pub use metadata::ExifExtractor;
pub use thumbnails::ImageResizer;

/// Reads capture time, coordinates and descriptive fields from a staged file.
pub trait MetadataExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<MediaMetadata>;
}

/// Produces the small/medium/large raster variants of a staged file.
///
/// `Ok(None)` means the media type has no raster variants (video).
pub trait Resizer: Send + Sync {
    fn resize(&self, source: &Path, record: &MediaRecord) -> Result<Option<Thumbnails>>;
}
