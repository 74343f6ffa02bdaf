//! GPX track import.

pub mod nearest;
pub mod normalize;

use anyhow::Result;
use chrono::DateTime;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::db::ArchiveStore;
use crate::error::ImportError;
use crate::scanner::has_extension;
use crate::model::GpxPoint;

pub use nearest::{NearestPointQuery, NearestPointResolver};
pub use normalize::TrackNormalizer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    /// Not a track file
    Skipped,
    /// `points` read from the file, `inserted` of them new to the store
    Imported { points: usize, inserted: usize },
}

pub struct TrackImporter {
    extensions: Vec<String>,
    normalizer: TrackNormalizer,
    db: Arc<dyn ArchiveStore>,
}

/// Timestamped points of every track segment, in time order. Points without
/// a time are dropped.
pub fn read_track(path: &Path) -> Result<Vec<GpxPoint>> {
    let reader = BufReader::new(File::open(path)?);
    let gpx = gpx::read(reader)?;

    let mut points = Vec::new();
    for track in &gpx.tracks {
        for segment in &track.segments {
            for waypoint in &segment.points {
                let Some(time) = waypoint.time else {
                    continue;
                };
                let time = time::OffsetDateTime::from(time);
                let Some(timestamp) =
                    DateTime::from_timestamp(time.unix_timestamp(), time.nanosecond())
                else {
                    continue;
                };
                let p = waypoint.point();
                points.push(GpxPoint::new(timestamp, p.y(), p.x()));
            }
        }
    }

    points.sort_by_key(|p| p.timestamp);
    Ok(points)
}

impl TrackImporter {
    pub fn new(
        extensions: Vec<String>,
        normalizer: TrackNormalizer,
        db: Arc<dyn ArchiveStore>,
    ) -> Self {
        Self {
            extensions,
            normalizer,
            db,
        }
    }

    pub fn import_track(&self, path: &Path) -> Result<TrackOutcome, ImportError> {
        if !has_extension(path, &self.extensions) {
            return Ok(TrackOutcome::Skipped);
        }
        let start = Instant::now();

        let points = read_track(path).map_err(ImportError::ReadTrack)?;
        let count = points.len();
        let points = self
            .normalizer
            .normalize(points)
            .map_err(ImportError::Timezone)?;
        let inserted = self
            .db
            .insert_gpx_points(&points)
            .map_err(ImportError::SaveTrack)?;

        tracing::info!(
            path = %path.display(),
            points = count,
            inserted,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Imported track"
        );
        Ok(TrackOutcome::Imported {
            points: count,
            inserted,
        })
    }
}
