//! The archive: every component built from one `Config`.

use anyhow::{anyhow, Result};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, ExtractorType, GeocoderType, TimezoneProviderType};
use crate::db::{ArchiveStore, Database};
use crate::geocode::{
    CoordinatesOnly, Geo2TzLookup, GoogleGeocoder, LookupTimezone, MediaGeocoder,
    ReverseGeocoder, TzfLookup,
};
use crate::import::{BatchRunner, BatchSummary, ImportServices, MediaImporter};
use crate::index::{CollectionIndex, CollectionLister};
use crate::model::{Collection, CollectionDetail, CollectionKind, MediaRecord};
use crate::notify::{NoopNotifier, Notifier, WebhookNotifier};
use crate::scanner::{ExifExtractor, ExiftoolExtractor, ImageResizer, MetadataExtractor};
use crate::storage::{LocalFsDownloader, LocalFsUploader};
use crate::track::{NearestPointResolver, TrackImporter, TrackNormalizer};

pub struct Archive {
    db: Arc<Database>,
    index: Arc<CollectionIndex>,
    media: MediaImporter,
    tracks: TrackImporter,
    workers: usize,
    cancel: Arc<AtomicBool>,
}

impl Archive {
    /// Open the store and build the import pipeline. Any failure here is a
    /// setup error: bad config, unusable directories, or an unopenable store.
    pub fn open(config: &Config) -> Result<Self> {
        let db = Arc::new(Database::open(&config.database)?);
        db.initialize()?;
        let store: Arc<dyn ArchiveStore> = db.clone();
        let index = Arc::new(CollectionIndex::new(store.clone()));

        let geo = &config.geocoding;
        let timeout = Duration::from_secs(geo.timeout_secs);

        let timezone: Arc<dyn LookupTimezone> = match geo.timezone_provider {
            TimezoneProviderType::Tzf => Arc::new(TzfLookup),
            TimezoneProviderType::Geo2tz => {
                Arc::new(Geo2TzLookup::new(&geo.timezone_endpoint, timeout))
            }
        };

        let reverse: Arc<dyn ReverseGeocoder> = match geo.provider {
            GeocoderType::Google => {
                let key = geo.api_key().ok_or_else(|| {
                    anyhow!("Google geocoding needs geocoding.api_key or GOOGLE_API_KEY")
                })?;
                Arc::new(GoogleGeocoder::new(&geo.endpoint, &key, timeout))
            }
            GeocoderType::None => Arc::new(CoordinatesOnly),
        };

        let nearest = Arc::new(NearestPointResolver::new(store.clone(), geo.hours_boundary));
        let geocoder = Arc::new(MediaGeocoder::new(nearest, reverse, timezone.clone()));

        let extractor: Arc<dyn MetadataExtractor> = match config.import.extractor {
            ExtractorType::Exif => Arc::new(ExifExtractor),
            ExtractorType::Exiftool => Arc::new(ExiftoolExtractor::new(&config.import.exiftool_path)),
        };

        let notifier: Arc<dyn Notifier> = match &config.notify.webhook_url {
            Some(url) => Arc::new(WebhookNotifier::new(url, timeout)),
            None => Arc::new(NoopNotifier),
        };

        let services = ImportServices {
            lookup: index.clone(),
            downloader: Arc::new(LocalFsDownloader::new(&config.storage.staging_path)?),
            extractor,
            uploader: Arc::new(LocalFsUploader::new(&config.storage.media_path)?),
            resizer: Arc::new(ImageResizer::new(&config.storage.thumbnails_path)?),
            geocoder,
            indexer: index.clone(),
            notifier,
        };
        let media = MediaImporter::new(config.import.media_extensions.clone(), services);

        let tracks = TrackImporter::new(
            config.import.track_extensions.clone(),
            TrackNormalizer::new(timezone),
            store,
        );

        tracing::debug!(backend = db.backend_name(), workers = config.import.workers, "Archive opened");

        Ok(Self {
            db,
            index,
            media,
            tracks,
            workers: config.import.workers,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Setting this flag stops running batches from starting more files.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    fn runner(&self) -> BatchRunner {
        BatchRunner::new(self.workers).with_cancel_flag(self.cancel_flag())
    }

    /// Import one media file or every media file below a directory.
    pub fn import_path(&self, path: &Path) -> Result<BatchSummary> {
        self.runner().run(path, &self.media)
    }

    /// Import one GPX file or every GPX file below a directory.
    pub fn import_tracks(&self, path: &Path) -> Result<BatchSummary> {
        self.runner().run(path, &self.tracks)
    }

    pub fn list_collections(&self, kind: CollectionKind) -> Result<Vec<Collection>> {
        self.index.list_collections(kind)
    }

    pub fn collection_detail(&self, id: &str) -> Result<Option<CollectionDetail>> {
        self.index.collection_detail(id)
    }

    pub fn get_media(&self, id: &str) -> Result<Option<MediaRecord>> {
        self.index.get_media(id)
    }

    pub fn delete_media(&self, id: &str) -> Result<bool> {
        self.index.delete_media(id)
    }

    pub fn set_caption(&self, id: &str, caption: &str) -> Result<MediaRecord> {
        self.index.set_caption(id, caption)
    }

    pub fn add_tag(&self, id: &str, tag: &str) -> Result<MediaRecord> {
        self.index.add_tag(id, tag)
    }

    pub fn store(&self) -> &Database {
        &self.db
    }
}
