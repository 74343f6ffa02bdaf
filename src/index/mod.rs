//! Collection index over the archive store.

pub mod rules;

use anyhow::{bail, Result};
use chrono::Utc;
use std::sync::Arc;

use crate::db::ArchiveStore;
use crate::model::{Collection, CollectionDetail, CollectionKind, MediaRecord};

pub use rules::{collection_id, memberships, slugify};

/// Persists a fully enriched record and links its derived collections.
pub trait Indexer: Send + Sync {
    fn index(&self, record: MediaRecord) -> Result<MediaRecord>;
}

/// Dedup lookup by content digest. Sees soft-deleted records too.
pub trait MediaLookup: Send + Sync {
    fn find_media(&self, id: &str) -> Result<Option<MediaRecord>>;
}

pub trait CollectionLister: Send + Sync {
    fn list_collections(&self, kind: CollectionKind) -> Result<Vec<Collection>>;
}

pub struct CollectionIndex {
    db: Arc<dyn ArchiveStore>,
}

impl CollectionIndex {
    pub fn new(db: Arc<dyn ArchiveStore>) -> Self {
        Self { db }
    }

    pub fn collection_detail(&self, id: &str) -> Result<Option<CollectionDetail>> {
        let Some(meta) = self.db.get_collection(id)? else {
            return Ok(None);
        };
        let media = self.db.collection_media(id)?;
        Ok(Some(CollectionDetail { meta, media }))
    }

    pub fn get_media(&self, id: &str) -> Result<Option<MediaRecord>> {
        self.db.get_media(id)
    }

    /// Soft-delete. Returns false when the record was already deleted.
    pub fn delete_media(&self, id: &str) -> Result<bool> {
        if self.db.get_media(id)?.is_none() {
            bail!("media not found: {}", id);
        }
        let deleted = self.db.mark_media_deleted(id, Utc::now())?;
        if deleted {
            tracing::info!(id = %id, "Deleted media");
        }
        Ok(deleted)
    }

    pub fn set_caption(&self, id: &str, caption: &str) -> Result<MediaRecord> {
        match self.db.set_caption(id, caption)? {
            Some(record) => Ok(record),
            None => bail!("media not found: {}", id),
        }
    }

    /// Add the record to the `hashtag` collection for `tag`. Tags that slug
    /// the same way share one collection, and re-applying is a no-op.
    pub fn add_tag(&self, id: &str, tag: &str) -> Result<MediaRecord> {
        let tag = tag.trim();
        if slugify(tag).is_empty() {
            bail!("tag has no usable characters: {:?}", tag);
        }

        match self.db.get_media(id)? {
            Some(record) if !record.is_deleted() => {}
            _ => bail!("media not found: {}", id),
        }
        let collection = rules::collection_ref(CollectionKind::Hashtag, tag, tag);
        let linked = self.db.add_membership(id, &collection)?;
        let appended = self
            .db
            .append_collections(id, std::slice::from_ref(&collection))?;
        let Some(record) = appended else {
            bail!("media not found: {}", id);
        };
        tracing::debug!(id = %id, tag = %tag, linked, "Tagged media");
        Ok(record)
    }
}

impl Indexer for CollectionIndex {
    fn index(&self, mut record: MediaRecord) -> Result<MediaRecord> {
        for collection in memberships(&record) {
            let linked = self.db.add_membership(&record.id, &collection)?;
            if !linked {
                tracing::debug!(id = %record.id, collection = %collection.id, "Already linked");
            }
            // A link made by a concurrent import of the same content still
            // belongs on this record
            if !record.in_collection(&collection.id) {
                record.collections.push(collection);
            }
        }

        if self.db.insert_media(&record)? {
            return Ok(record);
        }

        // Lost the race to a concurrent import of the same content; keep the
        // stored record and merge in any collections it is missing
        match self.db.append_collections(&record.id, &record.collections)? {
            Some(stored) => Ok(stored),
            None => bail!("media {} vanished during indexing", record.id),
        }
    }
}

impl MediaLookup for CollectionIndex {
    fn find_media(&self, id: &str) -> Result<Option<MediaRecord>> {
        self.db.get_media(id)
    }
}

impl CollectionLister for CollectionIndex {
    fn list_collections(&self, kind: CollectionKind) -> Result<Vec<Collection>> {
        self.db.list_collections(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::SqliteDb;
    use crate::db::Database;
    use crate::model::MediaMetadata;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn record(id: &str) -> MediaRecord {
        let t = Utc.with_ymd_and_hms(2014, 3, 21, 8, 1, 18).unwrap();
        MediaRecord::new(id, MediaMetadata::new(t, "jpg"))
    }

    fn sqlite_index(dir: &std::path::Path) -> CollectionIndex {
        let db = SqliteDb::open(&dir.join("kura.db")).unwrap();
        db.initialize().unwrap();
        CollectionIndex::new(Arc::new(db))
    }

    #[test]
    fn test_index_links_and_persists() {
        let dir = tempdir().unwrap();
        let index = sqlite_index(dir.path());

        let stored = index.index(record("abc")).unwrap();
        let ids: Vec<_> = stored.collections.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["inbox__2014-03", "timeline-month__2014-03", "timeline-day__2014-03-21"]
        );
        assert_eq!(index.find_media("abc").unwrap().unwrap(), stored);

        let months = index.list_collections(CollectionKind::TimelineMonth).unwrap();
        assert_eq!(months.len(), 1);
        assert_eq!(months[0].media_count, 1);
    }

    #[test]
    fn test_reindexing_same_content_keeps_counts() {
        let index = CollectionIndex::new(Arc::new(Database::in_memory()));

        let first = index.index(record("abc")).unwrap();
        let second = index.index(record("abc")).unwrap();
        assert_eq!(first.collections, second.collections);

        let detail = index.collection_detail("inbox__2014-03").unwrap().unwrap();
        assert_eq!(detail.meta.media_count, 1);
        assert_eq!(detail.media.len(), 1);
    }

    #[test]
    fn test_tag_twice_makes_one_membership() {
        let dir = tempdir().unwrap();
        let index = sqlite_index(dir.path());
        index.index(record("abc")).unwrap();

        index.add_tag("abc", "tEst tag 1").unwrap();
        index.add_tag("abc", "tEst tag 1").unwrap();
        let tagged = index.add_tag("abc", "tesTtag*2").unwrap();

        let tags: Vec<_> = tagged
            .collections
            .iter()
            .filter(|c| c.kind == CollectionKind::Hashtag)
            .map(|c| (c.id.as_str(), c.title.as_str()))
            .collect();
        assert_eq!(
            tags,
            vec![("hashtag__test-tag-1", "tEst tag 1"), ("hashtag__testtag-2", "tesTtag*2")]
        );

        let listed = index.list_collections(CollectionKind::Hashtag).unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|c| c.media_count == 1));
    }

    #[test]
    fn test_caption_and_delete() {
        let index = CollectionIndex::new(Arc::new(Database::in_memory()));
        index.index(record("abc")).unwrap();

        let captioned = index.set_caption("abc", "Harbour at dawn").unwrap();
        assert_eq!(captioned.caption.as_deref(), Some("Harbour at dawn"));
        assert_eq!(
            index.get_media("abc").unwrap().unwrap().caption.as_deref(),
            Some("Harbour at dawn")
        );

        assert!(index.delete_media("abc").unwrap());
        assert!(!index.delete_media("abc").unwrap());
        assert!(index.list_collections(CollectionKind::Inbox).unwrap().is_empty());
        assert!(index.set_caption("abc", "again").is_err());

        // Still visible to dedup
        assert!(index.find_media("abc").unwrap().unwrap().is_deleted());
    }

    fn concurrent_tagging(index: Arc<CollectionIndex>) {
        index.index(record("abc")).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let index = Arc::clone(&index);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        index.add_tag("abc", &format!("w{} tag {}", worker, i)).unwrap();
                        if i % 10 == 0 {
                            index.set_caption("abc", &format!("caption {}", worker)).unwrap();
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let stored = index.get_media("abc").unwrap().unwrap();
        let tags = stored
            .collections
            .iter()
            .filter(|c| c.kind == CollectionKind::Hashtag)
            .count();
        assert_eq!(tags, 200);
        assert_eq!(index.list_collections(CollectionKind::Hashtag).unwrap().len(), 200);
        assert!(stored.caption.as_ref().unwrap().starts_with("caption "));
        assert!(stored.in_collection("inbox__2014-03"));
    }

    #[test]
    fn test_concurrent_tags_all_land_on_record_sqlite() {
        let dir = tempdir().unwrap();
        concurrent_tagging(Arc::new(sqlite_index(dir.path())));
    }

    #[test]
    fn test_concurrent_tags_all_land_on_record_memory() {
        concurrent_tagging(Arc::new(CollectionIndex::new(Arc::new(Database::in_memory()))));
    }

    #[test]
    fn test_mutations_on_unknown_media_fail() {
        let index = CollectionIndex::new(Arc::new(Database::in_memory()));
        assert!(index.delete_media("nope").is_err());
        assert!(index.add_tag("nope", "tag").is_err());
        assert!(index.collection_detail("inbox__1999-01").unwrap().is_none());
    }
}
