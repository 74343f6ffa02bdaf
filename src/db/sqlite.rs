//! SQLite backend implementation.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use super::backend::ArchiveStore;
use super::schema::SCHEMA;
use crate::model::{Collection, CollectionKind, CollectionRef, Coordinates, GpxPoint, MediaRecord};

pub struct SqliteDb {
    conn: Mutex<Connection>,
}

impl SqliteDb {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("opening database {}", path.display()))?;
        conn.busy_timeout(Duration::from_secs(5))?;
        let _mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("database connection lock poisoned"))
    }
}

fn fetch_media(conn: &Connection, id: &str) -> Result<Option<MediaRecord>> {
    let data: Option<String> = conn
        .query_row(
            "SELECT media_data FROM media WHERE id = ?",
            [id],
            |row| row.get(0),
        )
        .optional()?;

    match data {
        Some(json) => Ok(Some(serde_json::from_str(&json).with_context(|| {
            format!("decoding media record {}", id)
        })?)),
        None => Ok(None),
    }
}

fn write_media(conn: &Connection, record: &MediaRecord) -> Result<()> {
    let json = serde_json::to_string(record)?;
    conn.execute(
        "UPDATE media SET media_data = ?, date_deleted = ? WHERE id = ?",
        params![json, record.deleted_at.map(|t| t.to_rfc3339()), record.id],
    )?;
    Ok(())
}

fn collection_from_row(id: String, kind: String, title: String, count: i64) -> Result<Collection> {
    Ok(Collection {
        id,
        kind: kind.parse()?,
        title,
        media_count: count.max(0) as u64,
    })
}

fn gpx_from_row(timestamp: i64, lat: f64, lng: f64, timezone: Option<String>) -> Result<GpxPoint> {
    let timestamp = DateTime::from_timestamp(timestamp, 0)
        .ok_or_else(|| anyhow::anyhow!("gpx timestamp out of range: {}", timestamp))?;
    Ok(GpxPoint {
        timestamp,
        coordinates: Coordinates::new(lat, lng),
        timezone,
    })
}

type GpxRow = (i64, f64, f64, Option<String>);

impl ArchiveStore for SqliteDb {
    fn initialize(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    fn get_media(&self, id: &str) -> Result<Option<MediaRecord>> {
        let conn = self.conn()?;
        fetch_media(&conn, id)
    }

    fn insert_media(&self, record: &MediaRecord) -> Result<bool> {
        let json = serde_json::to_string(record)?;
        let conn = self.conn()?;
        let inserted = conn.execute(
            r#"
            INSERT OR IGNORE INTO media (id, capture_ts, date_deleted, media_data)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                record.id,
                record.capture_time().timestamp(),
                record.deleted_at.map(|t| t.to_rfc3339()),
                json,
            ],
        )?;
        Ok(inserted == 1)
    }

    fn append_collections(
        &self,
        media_id: &str,
        collections: &[CollectionRef],
    ) -> Result<Option<MediaRecord>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let Some(mut record) = fetch_media(&tx, media_id)? else {
            return Ok(None);
        };
        let before = record.collections.len();
        for collection in collections {
            if !record.in_collection(&collection.id) {
                record.collections.push(collection.clone());
            }
        }
        if record.collections.len() != before {
            write_media(&tx, &record)?;
        }
        tx.commit()?;
        Ok(Some(record))
    }

    fn set_caption(&self, id: &str, caption: &str) -> Result<Option<MediaRecord>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut record = match fetch_media(&tx, id)? {
            Some(record) if !record.is_deleted() => record,
            _ => return Ok(None),
        };
        record.caption = Some(caption.to_string());
        write_media(&tx, &record)?;
        tx.commit()?;
        Ok(Some(record))
    }

    fn mark_media_deleted(&self, id: &str, at: DateTime<Utc>) -> Result<bool> {
        let conn = self.conn()?;
        let mut record = match fetch_media(&conn, id)? {
            Some(record) if !record.is_deleted() => record,
            _ => return Ok(false),
        };
        record.deleted_at = Some(at);
        write_media(&conn, &record)?;
        Ok(true)
    }

    fn add_membership(&self, media_id: &str, collection: &CollectionRef) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR IGNORE INTO collection (id, collection_type, title) VALUES (?1, ?2, ?3)",
            params![collection.id, collection.kind.as_str(), collection.title],
        )?;
        let linked = tx.execute(
            "INSERT OR IGNORE INTO media_collection (media_id, collection_id) VALUES (?1, ?2)",
            params![media_id, collection.id],
        )?;
        tx.commit()?;
        Ok(linked == 1)
    }

    fn get_collection(&self, id: &str) -> Result<Option<Collection>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                r#"
                SELECT c.id, c.collection_type, c.title,
                       (SELECT COUNT(*)
                        FROM media_collection AS mc
                        JOIN media AS m ON m.id = mc.media_id
                        WHERE mc.collection_id = c.id AND m.date_deleted IS NULL)
                FROM collection AS c
                WHERE c.id = ?
                "#,
                [id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(id, kind, title, count)| collection_from_row(id, kind, title, count))
            .transpose()
    }

    fn list_collections(&self, kind: CollectionKind) -> Result<Vec<Collection>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT c.id, c.collection_type, c.title, COUNT(m.id) AS media_count
            FROM collection AS c
            JOIN media_collection AS mc ON mc.collection_id = c.id
            JOIN media AS m ON m.id = mc.media_id
            WHERE c.collection_type = ? AND m.date_deleted IS NULL
            GROUP BY c.id, c.collection_type, c.title
            ORDER BY c.id DESC
            "#,
        )?;
        let rows = stmt
            .query_map([kind.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, kind, title, count)| collection_from_row(id, kind, title, count))
            .collect()
    }

    fn collection_media(&self, id: &str) -> Result<Vec<MediaRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT m.media_data
            FROM media_collection AS mc
            JOIN media AS m ON m.id = mc.media_id
            WHERE mc.collection_id = ? AND m.date_deleted IS NULL
            ORDER BY m.capture_ts DESC, m.id DESC
            "#,
        )?;
        let rows = stmt
            .query_map([id], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.iter()
            .map(|json| serde_json::from_str(json).map_err(Into::into))
            .collect()
    }

    fn insert_gpx_points(&self, points: &[GpxPoint]) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO gpx (timestamp, lat, lng, timezone) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for point in points {
                inserted += stmt.execute(params![
                    point.timestamp.timestamp(),
                    point.coordinates.lat,
                    point.coordinates.lng,
                    point.timezone,
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn first_gpx_point_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Option<GpxPoint>> {
        let conn = self.conn()?;
        let row: Option<GpxRow> = conn
            .query_row(
                r#"
                SELECT timestamp, lat, lng, timezone FROM gpx
                WHERE timestamp >= ?1 AND timestamp <= ?2
                ORDER BY timestamp ASC
                LIMIT 1
                "#,
                params![from.timestamp(), to.timestamp()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;
        row.map(|(ts, lat, lng, tz)| gpx_from_row(ts, lat, lng, tz))
            .transpose()
    }

    fn last_gpx_point_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Option<GpxPoint>> {
        let conn = self.conn()?;
        let row: Option<GpxRow> = conn
            .query_row(
                r#"
                SELECT timestamp, lat, lng, timezone FROM gpx
                WHERE timestamp >= ?1 AND timestamp <= ?2
                ORDER BY timestamp DESC
                LIMIT 1
                "#,
                params![from.timestamp(), to.timestamp()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;
        row.map(|(ts, lat, lng, tz)| gpx_from_row(ts, lat, lng, tz))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MediaMetadata;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn open_db(dir: &Path) -> SqliteDb {
        let db = SqliteDb::open(&dir.join("kura.db")).unwrap();
        db.initialize().unwrap();
        db
    }

    fn record(id: &str, day: u32) -> MediaRecord {
        let t = Utc.with_ymd_and_hms(2022, 1, day, 12, 0, 0).unwrap();
        MediaRecord::new(id, MediaMetadata::new(t, "jpg"))
    }

    fn month() -> CollectionRef {
        CollectionRef {
            id: "timeline-month__2022-01".to_string(),
            kind: CollectionKind::TimelineMonth,
            title: "2022 January".to_string(),
        }
    }

    #[test]
    fn test_insert_media_is_idempotent() {
        let dir = tempdir().unwrap();
        let db = open_db(dir.path());

        assert!(db.insert_media(&record("a", 1)).unwrap());
        assert!(!db.insert_media(&record("a", 2)).unwrap());

        let stored = db.get_media("a").unwrap().unwrap();
        assert_eq!(stored.capture_time().format("%d").to_string(), "01");
        assert!(db.get_media("missing").unwrap().is_none());
    }

    #[test]
    fn test_membership_links_once() {
        let dir = tempdir().unwrap();
        let db = open_db(dir.path());
        db.insert_media(&record("a", 1)).unwrap();

        assert!(db.add_membership("a", &month()).unwrap());
        assert!(!db.add_membership("a", &month()).unwrap());

        let listed = db.list_collections(CollectionKind::TimelineMonth).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].media_count, 1);
        assert_eq!(listed[0].title, "2022 January");
    }

    #[test]
    fn test_deleted_media_leave_counts_and_listings() {
        let dir = tempdir().unwrap();
        let db = open_db(dir.path());
        for (id, day) in [("a", 1), ("b", 2)] {
            db.insert_media(&record(id, day)).unwrap();
            db.add_membership(id, &month()).unwrap();
        }

        let at = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        assert!(db.mark_media_deleted("b", at).unwrap());
        assert!(!db.mark_media_deleted("b", at).unwrap());

        let collection = db.get_collection(&month().id).unwrap().unwrap();
        assert_eq!(collection.media_count, 1);
        let media = db.collection_media(&month().id).unwrap();
        assert_eq!(media.len(), 1);
        assert_eq!(media[0].id, "a");

        assert!(db.mark_media_deleted("a", at).unwrap());
        assert!(db.list_collections(CollectionKind::TimelineMonth).unwrap().is_empty());
        assert_eq!(db.get_collection(&month().id).unwrap().unwrap().media_count, 0);
    }

    #[test]
    fn test_collection_media_newest_first() {
        let dir = tempdir().unwrap();
        let db = open_db(dir.path());
        for (id, day) in [("a", 3), ("b", 1), ("c", 2)] {
            db.insert_media(&record(id, day)).unwrap();
            db.add_membership(id, &month()).unwrap();
        }

        let ids: Vec<_> = db
            .collection_media(&month().id)
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["a", "c", "b"]);
    }

    #[test]
    fn test_gpx_points_dedupe_and_range_queries() {
        let dir = tempdir().unwrap();
        let db = open_db(dir.path());
        let base = Utc.with_ymd_and_hms(2022, 1, 3, 12, 0, 0).unwrap();
        let points: Vec<_> = (0..3)
            .map(|i| GpxPoint::new(base + chrono::Duration::hours(i), 51.5, -0.1))
            .collect();

        assert_eq!(db.insert_gpx_points(&points).unwrap(), 3);
        assert_eq!(db.insert_gpx_points(&points).unwrap(), 0);

        let from = base + chrono::Duration::minutes(30);
        let to = base + chrono::Duration::hours(5);
        let first = db.first_gpx_point_between(from, to).unwrap().unwrap();
        assert_eq!(first.timestamp, base + chrono::Duration::hours(1));
        let last = db.last_gpx_point_between(from, to).unwrap().unwrap();
        assert_eq!(last.timestamp, base + chrono::Duration::hours(2));

        let later = base + chrono::Duration::days(1);
        assert!(db
            .first_gpx_point_between(later, later + chrono::Duration::hours(1))
            .unwrap()
            .is_none());
    }
}
