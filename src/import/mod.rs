//! Per-file media import pipeline.

pub mod batch;

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::error::ImportError;
use crate::geocode::Geocoder;
use crate::index::{Indexer, MediaLookup};
use crate::model::MediaRecord;
use crate::notify::Notifier;
use crate::scanner::{content_digest, has_extension, MetadataExtractor, Resizer};
use crate::storage::{Downloader, StagedFile, Uploader};
use crate::track::{TrackImporter, TrackOutcome};

pub use batch::{BatchRunner, BatchSummary};

#[derive(Debug, Clone, PartialEq)]
pub enum ImportOutcome {
    /// Extension not on the allow-list
    Skipped,
    /// Content already in the archive; nothing was redone
    Existing(MediaRecord),
    Imported(MediaRecord),
}

impl ImportOutcome {
    pub fn record(&self) -> Option<&MediaRecord> {
        match self {
            ImportOutcome::Skipped => None,
            ImportOutcome::Existing(r) | ImportOutcome::Imported(r) => Some(r),
        }
    }
}

/// What one file contributed to a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    Skipped,
    Existing,
    Imported,
}

/// A single-file importer the batch runner can drive.
pub trait ImportFile: Send + Sync {
    fn import_file(&self, path: &Path) -> Result<FileOutcome, ImportError>;
}

/// Everything the media pipeline calls out to.
pub struct ImportServices {
    pub lookup: Arc<dyn MediaLookup>,
    pub downloader: Arc<dyn Downloader>,
    pub extractor: Arc<dyn MetadataExtractor>,
    pub uploader: Arc<dyn Uploader>,
    pub resizer: Arc<dyn Resizer>,
    pub geocoder: Arc<dyn Geocoder>,
    pub indexer: Arc<dyn Indexer>,
    pub notifier: Arc<dyn Notifier>,
}

pub struct MediaImporter {
    extensions: Vec<String>,
    services: ImportServices,
}

impl MediaImporter {
    pub fn new(extensions: Vec<String>, services: ImportServices) -> Self {
        Self {
            extensions,
            services,
        }
    }

    pub fn import(&self, path: &Path) -> Result<ImportOutcome, ImportError> {
        if !has_extension(path, &self.extensions) {
            tracing::debug!(path = %path.display(), "Skipping unsupported file");
            return Ok(ImportOutcome::Skipped);
        }

        let start = Instant::now();
        let s = &self.services;

        let id = content_digest(path).map_err(ImportError::Hash)?;

        if let Some(existing) = s.lookup.find_media(&id).map_err(ImportError::Lookup)? {
            tracing::info!(path = %path.display(), id = %id, "Media already imported");
            return Ok(ImportOutcome::Existing(existing));
        }

        let staged = StagedFile::new(s.downloader.download(path).map_err(ImportError::Download)?);

        let metadata = s
            .extractor
            .extract(staged.path())
            .map_err(ImportError::Extract)?;
        let mut record = MediaRecord::new(&id, metadata);

        let uploaded = s
            .uploader
            .upload(staged.path(), &record.storage_path)
            .map_err(ImportError::Upload)?;
        if !uploaded {
            tracing::debug!(key = %record.storage_path, "Media store already holds object");
        }

        record.thumbnails = s
            .resizer
            .resize(staged.path(), &record)
            .map_err(ImportError::Thumbnail)?;

        record.location = s
            .geocoder
            .geocode(record.metadata.coordinates, record.capture_time())
            .map_err(ImportError::Geocode)?;

        let record = s.indexer.index(record).map_err(ImportError::Index)?;
        drop(staged);

        if let Err(e) = s.notifier.notify(&record) {
            tracing::warn!(id = %record.id, error = %e, "Failed to send import notification");
        }

        tracing::info!(
            path = %path.display(),
            id = %record.id,
            storage_path = %record.storage_path,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Imported media"
        );
        Ok(ImportOutcome::Imported(record))
    }
}

impl ImportFile for MediaImporter {
    fn import_file(&self, path: &Path) -> Result<FileOutcome, ImportError> {
        Ok(match self.import(path)? {
            ImportOutcome::Skipped => FileOutcome::Skipped,
            ImportOutcome::Existing(_) => FileOutcome::Existing,
            ImportOutcome::Imported(_) => FileOutcome::Imported,
        })
    }
}

impl ImportFile for TrackImporter {
    fn import_file(&self, path: &Path) -> Result<FileOutcome, ImportError> {
        Ok(match self.import_track(path)? {
            TrackOutcome::Skipped => FileOutcome::Skipped,
            // No timed points, nothing to contribute
            TrackOutcome::Imported { points: 0, .. } => FileOutcome::Skipped,
            TrackOutcome::Imported { inserted: 0, .. } => FileOutcome::Existing,
            TrackOutcome::Imported { .. } => FileOutcome::Imported,
        })
    }
}
