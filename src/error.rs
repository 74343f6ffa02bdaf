use thiserror::Error;

/// A file-scoped import failure, tagged with the pipeline stage that failed.
///
/// The batch runner logs these and moves on; they never abort a batch.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("failed to hash media: {0:#}")]
    Hash(anyhow::Error),

    #[error("failed to look up existing media: {0:#}")]
    Lookup(anyhow::Error),

    #[error("failed to download media from backup: {0:#}")]
    Download(anyhow::Error),

    #[error("failed to extract media metadata: {0:#}")]
    Extract(anyhow::Error),

    #[error("failed to upload to media store: {0:#}")]
    Upload(anyhow::Error),

    #[error("failed to create thumbnails: {0:#}")]
    Thumbnail(anyhow::Error),

    #[error("failed to geocode: {0:#}")]
    Geocode(anyhow::Error),

    #[error("failed to index media metadata: {0:#}")]
    Index(anyhow::Error),

    #[error("failed to read track: {0:#}")]
    ReadTrack(anyhow::Error),

    #[error("failed to resolve track timezone: {0:#}")]
    Timezone(anyhow::Error),

    #[error("failed to save track points: {0:#}")]
    SaveTrack(anyhow::Error),
}

impl ImportError {
    pub fn stage(&self) -> &'static str {
        match self {
            ImportError::Hash(_) => "hash",
            ImportError::Lookup(_) => "lookup",
            ImportError::Download(_) => "download",
            ImportError::Extract(_) => "extract",
            ImportError::Upload(_) => "upload",
            ImportError::Thumbnail(_) => "thumbnail",
            ImportError::Geocode(_) => "geocode",
            ImportError::Index(_) => "index",
            ImportError::ReadTrack(_) => "read_track",
            ImportError::Timezone(_) => "timezone",
            ImportError::SaveTrack(_) => "save_track",
        }
    }
}
