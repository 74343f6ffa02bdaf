//! Records persisted in the archive.
//!
//! Everything here is plain serde data. `MediaRecord` is stored whole as JSON
//! in the media keyspace; collections and GPX points get their own tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// (0, 0) is what extractors and track points report when they have nothing.
    pub fn is_zero(&self) -> bool {
        self.lat == 0.0 && self.lng == 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Country {
    pub short: String,
    pub long: String,
}

/// A resolved place plus the coordinates that were used to resolve it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Location {
    #[serde(default)]
    pub country: Country,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub locality: String,
    #[serde(default)]
    pub timezone: String,
    pub coordinates: Coordinates,
}

/// What a metadata extractor reads out of a staged file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub capture_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    pub ext: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub camera_make: Option<String>,
    #[serde(default)]
    pub camera_model: Option<String>,
    #[serde(default)]
    pub keywords: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

impl MediaMetadata {
    pub fn new(capture_time: DateTime<Utc>, ext: &str) -> Self {
        Self {
            capture_time,
            coordinates: None,
            ext: ext.to_string(),
            mime_type: None,
            width: None,
            height: None,
            camera_make: None,
            camera_model: None,
            keywords: None,
            title: None,
        }
    }

    pub fn is_video(&self) -> bool {
        self.mime_type
            .as_deref()
            .map(|m| m.starts_with("video/"))
            .unwrap_or(false)
    }
}

/// Canonical location of a media file in durable storage:
/// `YYYY/YYYYMMDD_HHMMSS_<id>.<ext>`.
pub fn storage_path(capture_time: &DateTime<Utc>, id: &str, ext: &str) -> String {
    format!(
        "{}/{}.{}",
        capture_time.format("%Y"),
        base_name(capture_time, id),
        ext
    )
}

/// `YYYYMMDD_HHMMSS_<id>`, shared by the storage path and thumbnail keys.
pub fn base_name(capture_time: &DateTime<Utc>, id: &str) -> String {
    format!("{}_{}", capture_time.format("%Y%m%d_%H%M%S"), id)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thumbnails {
    pub small: String,
    pub medium: String,
    pub large: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    Inbox,
    Camera,
    TimelineMonth,
    TimelineDay,
    PlacesCountry,
    PlacesRegion,
    Hashtag,
}

impl CollectionKind {
    pub const ALL: [CollectionKind; 7] = [
        CollectionKind::Inbox,
        CollectionKind::Camera,
        CollectionKind::TimelineMonth,
        CollectionKind::TimelineDay,
        CollectionKind::PlacesCountry,
        CollectionKind::PlacesRegion,
        CollectionKind::Hashtag,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionKind::Inbox => "inbox",
            CollectionKind::Camera => "camera",
            CollectionKind::TimelineMonth => "timeline_month",
            CollectionKind::TimelineDay => "timeline_day",
            CollectionKind::PlacesCountry => "places_country",
            CollectionKind::PlacesRegion => "places_region",
            CollectionKind::Hashtag => "hashtag",
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CollectionKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CollectionKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("unknown collection type: {}", s))
    }
}

/// A stored collection row. `media_count` counts active (non-deleted) members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: CollectionKind,
    pub title: String,
    pub media_count: u64,
}

/// The copy of a collection kept on the media record itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionRef {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: CollectionKind,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionDetail {
    pub meta: Collection,
    pub media: Vec<MediaRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    /// Content digest, hex.
    pub id: String,
    pub storage_path: String,
    #[serde(flatten)]
    pub metadata: MediaMetadata,
    #[serde(default)]
    pub thumbnails: Option<Thumbnails>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub collections: Vec<CollectionRef>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl MediaRecord {
    pub fn new(id: &str, metadata: MediaMetadata) -> Self {
        Self {
            id: id.to_string(),
            storage_path: storage_path(&metadata.capture_time, id, &metadata.ext),
            caption: metadata.title.clone(),
            metadata,
            thumbnails: None,
            location: None,
            collections: Vec::new(),
            deleted_at: None,
        }
    }

    pub fn capture_time(&self) -> DateTime<Utc> {
        self.metadata.capture_time
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn in_collection(&self, collection_id: &str) -> bool {
        self.collections.iter().any(|c| c.id == collection_id)
    }
}

/// A GPS track sample. After normalization the timestamp's clock value is
/// local wall-clock time even though it is tagged UTC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpxPoint {
    pub timestamp: DateTime<Utc>,
    pub coordinates: Coordinates,
    #[serde(default)]
    pub timezone: Option<String>,
}

impl GpxPoint {
    pub fn new(timestamp: DateTime<Utc>, lat: f64, lng: f64) -> Self {
        Self {
            timestamp,
            coordinates: Coordinates::new(lat, lng),
            timezone: None,
        }
    }
}
