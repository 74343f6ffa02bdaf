mod schema;
pub mod backend;
pub mod memory;
pub mod sqlite;

use anyhow::Result;
use chrono::{DateTime, Utc};

pub use backend::ArchiveStore;

use crate::config::{DatabaseConfig, DatabaseType};
use crate::model::{Collection, CollectionKind, CollectionRef, GpxPoint, MediaRecord};

/// Macro to dispatch a method call to the active backend variant.
macro_rules! dispatch {
    // No arguments beyond self
    ($self:expr, $method:ident()) => {
        match &$self.inner {
            DatabaseInner::Sqlite(db) => db.$method(),
            DatabaseInner::Memory(db) => db.$method(),
        }
    };
    // With arguments
    ($self:expr, $method:ident($($arg:expr),+ $(,)?)) => {
        match &$self.inner {
            DatabaseInner::Sqlite(db) => db.$method($($arg),+),
            DatabaseInner::Memory(db) => db.$method($($arg),+),
        }
    };
}

enum DatabaseInner {
    Sqlite(sqlite::SqliteDb),
    Memory(memory::MemoryDb),
}

pub struct Database {
    inner: DatabaseInner,
}

impl Database {
    /// Open the configured backend. The schema is not created until `initialize`.
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        let inner = match config.backend {
            DatabaseType::Sqlite => {
                DatabaseInner::Sqlite(sqlite::SqliteDb::open(&config.sqlite_path)?)
            }
            DatabaseType::Memory => DatabaseInner::Memory(memory::MemoryDb::new()),
        };
        Ok(Self { inner })
    }

    /// Initialized in-process store
    pub fn in_memory() -> Self {
        Self {
            inner: DatabaseInner::Memory(memory::MemoryDb::new()),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self.inner {
            DatabaseInner::Sqlite(_) => "sqlite",
            DatabaseInner::Memory(_) => "memory",
        }
    }
}

impl ArchiveStore for Database {
    fn initialize(&self) -> Result<()> {
        dispatch!(self, initialize())
    }

    // ========================================================================
    // Media operations
    // ========================================================================

    fn get_media(&self, id: &str) -> Result<Option<MediaRecord>> {
        dispatch!(self, get_media(id))
    }

    fn insert_media(&self, record: &MediaRecord) -> Result<bool> {
        dispatch!(self, insert_media(record))
    }

    fn append_collections(
        &self,
        media_id: &str,
        collections: &[CollectionRef],
    ) -> Result<Option<MediaRecord>> {
        dispatch!(self, append_collections(media_id, collections))
    }

    fn set_caption(&self, id: &str, caption: &str) -> Result<Option<MediaRecord>> {
        dispatch!(self, set_caption(id, caption))
    }

    fn mark_media_deleted(&self, id: &str, at: DateTime<Utc>) -> Result<bool> {
        dispatch!(self, mark_media_deleted(id, at))
    }

    // ========================================================================
    // Collection operations
    // ========================================================================

    fn add_membership(&self, media_id: &str, collection: &CollectionRef) -> Result<bool> {
        dispatch!(self, add_membership(media_id, collection))
    }

    fn get_collection(&self, id: &str) -> Result<Option<Collection>> {
        dispatch!(self, get_collection(id))
    }

    fn list_collections(&self, kind: CollectionKind) -> Result<Vec<Collection>> {
        dispatch!(self, list_collections(kind))
    }

    fn collection_media(&self, id: &str) -> Result<Vec<MediaRecord>> {
        dispatch!(self, collection_media(id))
    }

    // ========================================================================
    // GPX operations
    // ========================================================================

    fn insert_gpx_points(&self, points: &[GpxPoint]) -> Result<usize> {
        dispatch!(self, insert_gpx_points(points))
    }

    fn first_gpx_point_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Option<GpxPoint>> {
        dispatch!(self, first_gpx_point_between(from, to))
    }

    fn last_gpx_point_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Option<GpxPoint>> {
        dispatch!(self, last_gpx_point_between(from, to))
    }
}
