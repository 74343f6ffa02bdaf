use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use super::MetadataExtractor;
use crate::model::{Coordinates, MediaMetadata};

/// Reads EXIF with kamadak-exif and dimensions with `image`.
///
/// Videos carry no EXIF container, so this extractor only handles stills; use
/// the exiftool extractor for archives with video.
pub struct ExifExtractor;

impl MetadataExtractor for ExifExtractor {
    fn extract(&self, path: &Path) -> Result<MediaMetadata> {
        let file = File::open(path)?;
        let mut bufreader = BufReader::new(file);
        let exif = exif::Reader::new()
            .read_from_container(&mut bufreader)
            .map_err(|e| anyhow!("no readable EXIF in {}: {}", path.display(), e))?;

        let capture_time = [exif::Tag::DateTimeOriginal, exif::Tag::DateTime]
            .into_iter()
            .filter_map(|tag| ascii_field(&exif, tag))
            .find_map(|s| parse_exif_datetime(&s))
            .ok_or_else(|| anyhow!("file does not contain a valid capture date"))?;

        let ext = normalized_extension(path);
        let mut metadata = MediaMetadata::new(capture_time, &ext);
        metadata.mime_type = mime_for_extension(&ext).map(str::to_string);
        metadata.camera_make = ascii_field(&exif, exif::Tag::Make);
        metadata.camera_model = ascii_field(&exif, exif::Tag::Model);
        metadata.title = ascii_field(&exif, exif::Tag::ImageDescription);
        metadata.coordinates = gps_coordinates(&exif);

        // Get image dimensions
        if let Ok(reader) = image::ImageReader::open(path) {
            if let Ok(dims) = reader.into_dimensions() {
                metadata.width = Some(dims.0);
                metadata.height = Some(dims.1);
            }
        }
        if metadata.width.is_none() {
            metadata.width = uint_field(&exif, exif::Tag::PixelXDimension);
            metadata.height = uint_field(&exif, exif::Tag::PixelYDimension);
        }

        Ok(metadata)
    }
}

fn ascii_field(exif: &exif::Exif, tag: exif::Tag) -> Option<String> {
    let field = exif.get_field(tag, exif::In::PRIMARY)?;
    match field.value {
        exif::Value::Ascii(ref values) => {
            let joined = values
                .iter()
                .map(|v| String::from_utf8_lossy(v).trim_matches(char::from(0)).trim().to_string())
                .collect::<Vec<_>>()
                .join(" ");
            let joined = joined.trim().to_string();
            if joined.is_empty() {
                None
            } else {
                Some(joined)
            }
        }
        _ => None,
    }
}

fn uint_field(exif: &exif::Exif, tag: exif::Tag) -> Option<u32> {
    exif.get_field(tag, exif::In::PRIMARY)?.value.get_uint(0)
}

fn gps_coordinates(exif: &exif::Exif) -> Option<Coordinates> {
    let (lat_field, lat_ref, lon_field, lon_ref) = (
        exif.get_field(exif::Tag::GPSLatitude, exif::In::PRIMARY)?,
        exif.get_field(exif::Tag::GPSLatitudeRef, exif::In::PRIMARY)?,
        exif.get_field(exif::Tag::GPSLongitude, exif::In::PRIMARY)?,
        exif.get_field(exif::Tag::GPSLongitudeRef, exif::In::PRIMARY)?,
    );

    let (exif::Value::Rational(lat_vals), exif::Value::Rational(lon_vals)) =
        (&lat_field.value, &lon_field.value)
    else {
        return None;
    };
    if lat_vals.len() < 3 || lon_vals.len() < 3 {
        return None;
    }

    let lat = dms_to_decimal(lat_vals[0].to_f64(), lat_vals[1].to_f64(), lat_vals[2].to_f64());
    let lng = dms_to_decimal(lon_vals[0].to_f64(), lon_vals[1].to_f64(), lon_vals[2].to_f64());

    let lat_ref_str = lat_ref.display_value().to_string();
    let lon_ref_str = lon_ref.display_value().to_string();

    let coordinates = Coordinates::new(
        if lat_ref_str.contains('S') { -lat } else { lat },
        if lon_ref_str.contains('W') { -lng } else { lng },
    );
    if coordinates.is_zero() || !coordinates.lat.is_finite() || !coordinates.lng.is_finite() {
        return None;
    }
    Some(coordinates)
}

fn dms_to_decimal(degrees: f64, minutes: f64, seconds: f64) -> f64 {
    degrees + minutes / 60.0 + seconds / 3600.0
}

/// Parse an EXIF-style `2019:02:02 15:12:47` timestamp, taken as UTC.
///
/// Camera clocks are local wall-clock time; storing that clock value as UTC
/// is the same convention normalized GPX points follow.
pub fn parse_exif_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    // Sub-second or offset suffixes ("…:47.123", "…:47+01:00") are dropped
    let s = s.get(..19)?;
    NaiveDateTime::parse_from_str(s, "%Y:%m:%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
        .ok()
        .map(|naive| naive.and_utc())
}

/// Lowercase extension with `jpeg` folded into `jpg`.
pub fn normalized_extension(path: &Path) -> String {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpeg" => "jpg".to_string(),
        _ => ext,
    }
}

pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    match ext {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "heic" | "heif" => Some("image/heic"),
        "tif" | "tiff" => Some("image/tiff"),
        "mov" => Some("video/quicktime"),
        "mp4" => Some("video/mp4"),
        "avi" => Some("video/x-msvideo"),
        _ => None,
    }
}
