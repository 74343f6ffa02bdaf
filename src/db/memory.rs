//! In-process backend.
//!
//! Unlike SQLite, counts are not aggregated at read time: each collection
//! carries an atomic counter bumped only by the writer whose link insert was
//! new, and lowered once per member when the member is soft-deleted.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, RwLock};

use super::backend::ArchiveStore;
use crate::model::{Collection, CollectionKind, CollectionRef, GpxPoint, MediaRecord};

struct CollectionEntry {
    kind: CollectionKind,
    title: String,
    count: AtomicI64,
}

impl CollectionEntry {
    fn snapshot(&self, id: &str) -> Collection {
        Collection {
            id: id.to_string(),
            kind: self.kind,
            title: self.title.clone(),
            media_count: self.count.load(Ordering::SeqCst).max(0) as u64,
        }
    }
}

/// (unix seconds, lat bits, lng bits)
type GpxKey = (i64, u64, u64);

fn gpx_key(point: &GpxPoint) -> GpxKey {
    (
        point.timestamp.timestamp(),
        point.coordinates.lat.to_bits(),
        point.coordinates.lng.to_bits(),
    )
}

#[derive(Default)]
pub struct MemoryDb {
    media: RwLock<HashMap<String, MediaRecord>>,
    collections: RwLock<HashMap<String, CollectionEntry>>,
    /// (media id, collection id)
    links: Mutex<HashSet<(String, String)>>,
    gpx: RwLock<BTreeMap<GpxKey, GpxPoint>>,
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow::anyhow!("memory store lock poisoned")
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_deleted(&self, media_id: &str) -> Result<bool> {
        let media = self.media.read().map_err(poisoned)?;
        Ok(media.get(media_id).map(|r| r.is_deleted()).unwrap_or(false))
    }

    fn bump(&self, collection_id: &str, delta: i64) -> Result<()> {
        let collections = self.collections.read().map_err(poisoned)?;
        if let Some(entry) = collections.get(collection_id) {
            entry.count.fetch_add(delta, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl ArchiveStore for MemoryDb {
    fn initialize(&self) -> Result<()> {
        Ok(())
    }

    fn get_media(&self, id: &str) -> Result<Option<MediaRecord>> {
        let media = self.media.read().map_err(poisoned)?;
        Ok(media.get(id).cloned())
    }

    fn insert_media(&self, record: &MediaRecord) -> Result<bool> {
        let mut media = self.media.write().map_err(poisoned)?;
        if media.contains_key(&record.id) {
            return Ok(false);
        }
        media.insert(record.id.clone(), record.clone());
        Ok(true)
    }

    fn append_collections(
        &self,
        media_id: &str,
        collections: &[CollectionRef],
    ) -> Result<Option<MediaRecord>> {
        let mut media = self.media.write().map_err(poisoned)?;
        let Some(record) = media.get_mut(media_id) else {
            return Ok(None);
        };
        for collection in collections {
            if !record.in_collection(&collection.id) {
                record.collections.push(collection.clone());
            }
        }
        Ok(Some(record.clone()))
    }

    fn set_caption(&self, id: &str, caption: &str) -> Result<Option<MediaRecord>> {
        let mut media = self.media.write().map_err(poisoned)?;
        match media.get_mut(id) {
            Some(record) if !record.is_deleted() => {
                record.caption = Some(caption.to_string());
                Ok(Some(record.clone()))
            }
            _ => Ok(None),
        }
    }

    fn mark_media_deleted(&self, id: &str, at: DateTime<Utc>) -> Result<bool> {
        {
            let mut media = self.media.write().map_err(poisoned)?;
            match media.get_mut(id) {
                Some(record) if !record.is_deleted() => record.deleted_at = Some(at),
                _ => return Ok(false),
            }
        }

        let member_of: Vec<String> = {
            let links = self.links.lock().map_err(poisoned)?;
            links
                .iter()
                .filter(|(media_id, _)| media_id == id)
                .map(|(_, collection_id)| collection_id.clone())
                .collect()
        };
        for collection_id in member_of {
            self.bump(&collection_id, -1)?;
        }
        Ok(true)
    }

    fn add_membership(&self, media_id: &str, collection: &CollectionRef) -> Result<bool> {
        let exists = self
            .collections
            .read()
            .map_err(poisoned)?
            .contains_key(&collection.id);
        if !exists {
            let mut collections = self.collections.write().map_err(poisoned)?;
            collections
                .entry(collection.id.clone())
                .or_insert_with(|| CollectionEntry {
                    kind: collection.kind,
                    title: collection.title.clone(),
                    count: AtomicI64::new(0),
                });
        }

        let linked = self
            .links
            .lock()
            .map_err(poisoned)?
            .insert((media_id.to_string(), collection.id.clone()));

        if linked && !self.is_deleted(media_id)? {
            self.bump(&collection.id, 1)?;
        }
        Ok(linked)
    }

    fn get_collection(&self, id: &str) -> Result<Option<Collection>> {
        let collections = self.collections.read().map_err(poisoned)?;
        Ok(collections.get(id).map(|entry| entry.snapshot(id)))
    }

    fn list_collections(&self, kind: CollectionKind) -> Result<Vec<Collection>> {
        let collections = self.collections.read().map_err(poisoned)?;
        let mut listed: Vec<Collection> = collections
            .iter()
            .filter(|(_, entry)| entry.kind == kind)
            .map(|(id, entry)| entry.snapshot(id))
            .filter(|c| c.media_count > 0)
            .collect();
        listed.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(listed)
    }

    fn collection_media(&self, id: &str) -> Result<Vec<MediaRecord>> {
        let member_ids: Vec<String> = {
            let links = self.links.lock().map_err(poisoned)?;
            links
                .iter()
                .filter(|(_, collection_id)| collection_id == id)
                .map(|(media_id, _)| media_id.clone())
                .collect()
        };

        let media = self.media.read().map_err(poisoned)?;
        let mut records: Vec<MediaRecord> = member_ids
            .iter()
            .filter_map(|media_id| media.get(media_id))
            .filter(|r| !r.is_deleted())
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            b.capture_time()
                .cmp(&a.capture_time())
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(records)
    }

    fn insert_gpx_points(&self, points: &[GpxPoint]) -> Result<usize> {
        let mut gpx = self.gpx.write().map_err(poisoned)?;
        let mut inserted = 0;
        for point in points {
            let key = gpx_key(point);
            if !gpx.contains_key(&key) {
                // Stored at second resolution, same as the SQLite table
                let mut stored = point.clone();
                stored.timestamp = DateTime::from_timestamp(key.0, 0).unwrap_or(point.timestamp);
                gpx.insert(key, stored);
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    fn first_gpx_point_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Option<GpxPoint>> {
        let gpx = self.gpx.read().map_err(poisoned)?;
        Ok(gpx
            .range((from.timestamp(), 0, 0)..=(to.timestamp(), u64::MAX, u64::MAX))
            .next()
            .map(|(_, p)| p.clone()))
    }

    fn last_gpx_point_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Option<GpxPoint>> {
        let gpx = self.gpx.read().map_err(poisoned)?;
        Ok(gpx
            .range((from.timestamp(), 0, 0)..=(to.timestamp(), u64::MAX, u64::MAX))
            .next_back()
            .map(|(_, p)| p.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MediaMetadata;
    use chrono::TimeZone;
    use std::sync::Arc;
    use std::thread;

    fn record(id: &str) -> MediaRecord {
        let t = Utc.with_ymd_and_hms(2022, 1, 3, 12, 0, 0).unwrap();
        MediaRecord::new(id, MediaMetadata::new(t, "jpg"))
    }

    fn inbox() -> CollectionRef {
        CollectionRef {
            id: "inbox__2022-01".to_string(),
            kind: CollectionKind::Inbox,
            title: "inbox Jan 2022".to_string(),
        }
    }

    #[test]
    fn test_concurrent_links_count_each_member_once() {
        let db = Arc::new(MemoryDb::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let db = Arc::clone(&db);
                thread::spawn(move || {
                    // Two workers race for every media id
                    let id = format!("m{}", i % 4);
                    db.insert_media(&record(&id)).unwrap();
                    db.add_membership(&id, &inbox()).unwrap()
                })
            })
            .collect();
        let new_links = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|linked| *linked)
            .count();

        assert_eq!(new_links, 4);
        let collection = db.get_collection(&inbox().id).unwrap().unwrap();
        assert_eq!(collection.media_count, 4);
    }

    #[test]
    fn test_delete_lowers_count_once() {
        let db = MemoryDb::new();
        for id in ["a", "b"] {
            db.insert_media(&record(id)).unwrap();
            db.add_membership(id, &inbox()).unwrap();
        }

        let at = Utc::now();
        assert!(db.mark_media_deleted("a", at).unwrap());
        assert!(!db.mark_media_deleted("a", at).unwrap());
        assert_eq!(db.get_collection(&inbox().id).unwrap().unwrap().media_count, 1);

        let media = db.collection_media(&inbox().id).unwrap();
        assert_eq!(media.len(), 1);
        assert_eq!(media[0].id, "b");

        db.mark_media_deleted("b", at).unwrap();
        assert!(db.list_collections(CollectionKind::Inbox).unwrap().is_empty());
    }

    #[test]
    fn test_gpx_range_bounds_are_inclusive() {
        let db = MemoryDb::new();
        let t = Utc.with_ymd_and_hms(2022, 1, 3, 12, 0, 0).unwrap();
        db.insert_gpx_points(&[GpxPoint::new(t, 1.0, 2.0)]).unwrap();

        assert!(db.first_gpx_point_between(t, t).unwrap().is_some());
        assert!(db.last_gpx_point_between(t, t).unwrap().is_some());
        assert!(db
            .first_gpx_point_between(t + chrono::Duration::seconds(1), t + chrono::Duration::hours(1))
            .unwrap()
            .is_none());
    }
}
