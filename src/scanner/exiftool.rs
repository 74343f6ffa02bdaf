use anyhow::{anyhow, bail, Context, Result};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::process::Command;

use super::metadata::{mime_for_extension, normalized_extension, parse_exif_datetime};
use super::MetadataExtractor;
use crate::model::{Coordinates, MediaMetadata};

/// Shells out to `exiftool -j -n`, which understands video containers too.
pub struct ExiftoolExtractor {
    binary: PathBuf,
}

impl ExiftoolExtractor {
    pub fn new(binary: &Path) -> Self {
        Self {
            binary: binary.to_path_buf(),
        }
    }
}

impl MetadataExtractor for ExiftoolExtractor {
    fn extract(&self, path: &Path) -> Result<MediaMetadata> {
        let output = Command::new(&self.binary)
            .arg("-j")
            .arg("-n")
            .arg(path)
            .output()
            .with_context(|| format!("running {}", self.binary.display()))?;

        if !output.status.success() {
            bail!(
                "exiftool exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let parsed: Vec<Map<String, Value>> = serde_json::from_slice(&output.stdout)?;
        let fields = parsed
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("exiftool returned no metadata"))?;

        metadata_from_fields(&fields, path)
    }
}

fn metadata_from_fields(fields: &Map<String, Value>, path: &Path) -> Result<MediaMetadata> {
    let capture_time = ["DateTimeOriginal", "CreateDate"]
        .into_iter()
        .filter_map(|key| string_field(fields, key))
        .find_map(|s| parse_exif_datetime(&s))
        .ok_or_else(|| anyhow!("file does not contain a valid capture date"))?;

    let ext = string_field(fields, "FileTypeExtension")
        .map(|e| e.to_lowercase())
        .unwrap_or_else(|| normalized_extension(path));

    let mut metadata = MediaMetadata::new(capture_time, &ext);
    metadata.mime_type = string_field(fields, "MIMEType")
        .or_else(|| mime_for_extension(&ext).map(str::to_string));
    metadata.width = fields.get("ImageWidth").and_then(Value::as_u64).map(|w| w as u32);
    metadata.height = fields.get("ImageHeight").and_then(Value::as_u64).map(|h| h as u32);
    metadata.camera_make = string_field(fields, "Make");
    metadata.camera_model = string_field(fields, "Model");
    metadata.keywords = string_field(fields, "Keywords");
    metadata.title = string_field(fields, "Title");

    if let (Some(lat), Some(lng)) = (
        fields.get("GPSLatitude").and_then(Value::as_f64),
        fields.get("GPSLongitude").and_then(Value::as_f64),
    ) {
        let coordinates = Coordinates::new(lat, lng);
        if !coordinates.is_zero() {
            metadata.coordinates = Some(coordinates);
        }
    }

    Ok(metadata)
}

/// Strings, numbers and lists (exiftool emits multi-valued keywords as arrays).
fn string_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    let s = match fields.get(key)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(|i| match i {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(", "),
        _ => return None,
    };
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}
