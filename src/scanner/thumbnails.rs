use anyhow::Result;
use image::imageops::FilterType;
use image::{DynamicImage, ImageDecoder};
use std::fs;
use std::path::{Path, PathBuf};

use super::Resizer;
use crate::model::{base_name, MediaRecord, Thumbnails};

const SMALL_PREFIX: &str = "sqsm";
const MEDIUM_PREFIX: &str = "sqmd";
const LARGE_PREFIX: &str = "lg";

const SMALL_SIZE: u32 = 92;
const MEDIUM_SIZE: u32 = 420;
const LARGE_SIZE: u32 = 1080;

/// Writes the three raster variants into a flat thumbnail directory.
pub struct ImageResizer {
    thumbnails_dir: PathBuf,
}

impl ImageResizer {
    pub fn new(thumbnails_dir: &Path) -> Result<Self> {
        fs::create_dir_all(thumbnails_dir)?;
        Ok(Self {
            thumbnails_dir: thumbnails_dir.to_path_buf(),
        })
    }

    /// Thumbnail directory path
    pub fn thumbnails_dir(&self) -> &Path {
        &self.thumbnails_dir
    }
}

/// `<prefix>_<YYYYMMDD_HHMMSS>_<id>.jpg`
pub fn thumbnail_keys(record: &MediaRecord) -> Thumbnails {
    let base = base_name(&record.capture_time(), &record.id);
    Thumbnails {
        small: format!("{}_{}.jpg", SMALL_PREFIX, base),
        medium: format!("{}_{}.jpg", MEDIUM_PREFIX, base),
        large: format!("{}_{}.jpg", LARGE_PREFIX, base),
    }
}

impl Resizer for ImageResizer {
    fn resize(&self, source: &Path, record: &MediaRecord) -> Result<Option<Thumbnails>> {
        if record.metadata.is_video() {
            tracing::debug!(id = %record.id, "No thumbnails for video");
            return Ok(None);
        }

        let keys = thumbnail_keys(record);
        let targets = [
            (&keys.large, LARGE_SIZE, false),
            (&keys.medium, MEDIUM_SIZE, true),
            (&keys.small, SMALL_SIZE, true),
        ];

        if targets
            .iter()
            .all(|(key, _, _)| self.thumbnails_dir.join(key).exists())
        {
            return Ok(Some(keys));
        }

        let img = open_oriented(source)?;

        for (key, size, square) in targets {
            let resized = if square {
                img.resize_to_fill(size, size, FilterType::Lanczos3)
            } else {
                img.resize(size, size, FilterType::Lanczos3)
            };
            // JPEG has no alpha channel
            resized.to_rgb8().save(self.thumbnails_dir.join(key))?;
        }

        Ok(Some(keys))
    }
}

fn open_oriented(path: &Path) -> Result<DynamicImage> {
    let mut decoder = image::ImageReader::open(path)?
        .with_guessed_format()?
        .into_decoder()?;
    let orientation = decoder.orientation()?;
    let mut img = DynamicImage::from_decoder(decoder)?;
    img.apply_orientation(orientation);
    Ok(img)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MediaMetadata;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    fn record(mime: &str) -> MediaRecord {
        let t = Utc.with_ymd_and_hms(2014, 3, 21, 8, 1, 18).unwrap();
        let mut meta = MediaMetadata::new(t, "jpg");
        meta.mime_type = Some(mime.to_string());
        MediaRecord::new("caf73e9785fa54300a051df95cfa2db9", meta)
    }

    #[test]
    fn test_keys_are_size_prefixed() {
        let keys = thumbnail_keys(&record("image/jpeg"));
        assert_eq!(keys.small, "sqsm_20140321_080118_caf73e9785fa54300a051df95cfa2db9.jpg");
        assert_eq!(keys.medium, "sqmd_20140321_080118_caf73e9785fa54300a051df95cfa2db9.jpg");
        assert_eq!(keys.large, "lg_20140321_080118_caf73e9785fa54300a051df95cfa2db9.jpg");
    }

    #[test]
    fn test_resize_writes_three_variants() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("source.png");
        image::RgbImage::new(200, 100).save(&source).unwrap();

        let resizer = ImageResizer::new(&dir.path().join("thumbs")).unwrap();
        let keys = resizer.resize(&source, &record("image/jpeg")).unwrap().unwrap();

        let large = image::open(resizer.thumbnails_dir().join(&keys.large)).unwrap();
        assert_eq!((large.width(), large.height()), (1080, 540));
        let medium = image::open(resizer.thumbnails_dir().join(&keys.medium)).unwrap();
        assert_eq!((medium.width(), medium.height()), (420, 420));
        let small = image::open(resizer.thumbnails_dir().join(&keys.small)).unwrap();
        assert_eq!((small.width(), small.height()), (92, 92));
    }

    #[test]
    fn test_video_gets_no_thumbnails() {
        let dir = tempdir().unwrap();
        let resizer = ImageResizer::new(dir.path()).unwrap();
        let result = resizer
            .resize(&dir.path().join("clip.mov"), &record("video/quicktime"))
            .unwrap();
        assert!(result.is_none());
    }
}
