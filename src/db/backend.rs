//! Storage capability interface.
//!
//! The collection index needs a small set of primitives: point reads, insert-if-absent
//! writes, and a membership write that reports whether the link is new. SQLite
//! satisfies them with unique constraints and aggregate counts; the in-memory
//! store with conditional inserts and atomic counters.

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::model::{Collection, CollectionKind, CollectionRef, GpxPoint, MediaRecord};

pub trait ArchiveStore: Send + Sync {
    /// Create tables/structures; safe to call on every start.
    fn initialize(&self) -> Result<()>;

    // === Media ===

    /// Fetch a record by id, deleted or not
    fn get_media(&self, id: &str) -> Result<Option<MediaRecord>>;

    /// Insert unless a record with this id exists. Returns true if inserted.
    fn insert_media(&self, record: &MediaRecord) -> Result<bool>;

    /// Append the refs the stored record does not hold yet, as one step.
    /// Returns the updated record, or None if there is no record with this id.
    fn append_collections(
        &self,
        media_id: &str,
        collections: &[CollectionRef],
    ) -> Result<Option<MediaRecord>>;

    /// Set the caption of an active record as one step. None if missing or deleted.
    fn set_caption(&self, id: &str, caption: &str) -> Result<Option<MediaRecord>>;

    /// Soft-delete. Returns false if missing or already deleted.
    fn mark_media_deleted(&self, id: &str, at: DateTime<Utc>) -> Result<bool>;

    // === Collections ===

    /// Create the collection if absent, link the media if not already linked.
    /// Returns true only when the link is new; only then does the count move.
    fn add_membership(&self, media_id: &str, collection: &CollectionRef) -> Result<bool>;

    /// Collection row with its active member count (possibly zero)
    fn get_collection(&self, id: &str) -> Result<Option<Collection>>;

    /// Collections of one type with at least one active member, id descending
    fn list_collections(&self, kind: CollectionKind) -> Result<Vec<Collection>>;

    /// Active members, capture time descending
    fn collection_media(&self, id: &str) -> Result<Vec<MediaRecord>>;

    // === GPX ===

    /// Insert points, ignoring ones whose (timestamp, lat, lng) is stored already.
    /// Returns the number inserted.
    fn insert_gpx_points(&self, points: &[GpxPoint]) -> Result<usize>;

    /// Earliest point with `from <= timestamp <= to`
    fn first_gpx_point_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Option<GpxPoint>>;

    /// Latest point with `from <= timestamp <= to`
    fn last_gpx_point_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Option<GpxPoint>>;
}
