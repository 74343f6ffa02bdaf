pub const SCHEMA: &str = r#"
-- Media: one row per content digest, full record as JSON
CREATE TABLE IF NOT EXISTS media (
    id TEXT NOT NULL PRIMARY KEY,
    capture_ts INTEGER NOT NULL,
    date_created TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    date_deleted TEXT,
    media_data TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_media_capture_ts ON media(capture_ts);

-- Collections: derived groupings keyed by slug(type) + '__' + slug(natural key)
CREATE TABLE IF NOT EXISTS collection (
    id TEXT NOT NULL PRIMARY KEY,
    collection_type TEXT NOT NULL,
    title TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_collection_type ON collection(collection_type);

-- Membership; counts are aggregated from here at read time
CREATE TABLE IF NOT EXISTS media_collection (
    media_id TEXT NOT NULL,
    collection_id TEXT NOT NULL,
    PRIMARY KEY (media_id, collection_id)
);

CREATE INDEX IF NOT EXISTS idx_media_collection_collection ON media_collection(collection_id);

-- GPX track points, timestamps in normalized local-as-UTC seconds
CREATE TABLE IF NOT EXISTS gpx (
    timestamp INTEGER NOT NULL,
    lat REAL NOT NULL,
    lng REAL NOT NULL,
    timezone TEXT,
    UNIQUE (timestamp, lat, lng)
);

CREATE INDEX IF NOT EXISTS idx_gpx_timestamp ON gpx(timestamp);
"#;
