use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub import: ImportConfig,

    #[serde(default)]
    pub geocoding: GeocodingConfig,

    #[serde(default)]
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub backend: DatabaseType,

    #[serde(default = "default_db_path")]
    pub sqlite_path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: DatabaseType::default(),
            sqlite_path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root of durable media storage; objects land at their canonical key below it.
    #[serde(default = "default_media_path")]
    pub media_path: PathBuf,

    #[serde(default = "default_thumbnails_path")]
    pub thumbnails_path: PathBuf,

    /// Per-import staging copies. Always emptied as imports finish.
    #[serde(default = "default_staging_path")]
    pub staging_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            media_path: default_media_path(),
            thumbnails_path: default_thumbnails_path(),
            staging_path: default_staging_path(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorType {
    #[default]
    Exif,
    Exiftool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    #[serde(default = "default_media_extensions")]
    pub media_extensions: Vec<String>,

    #[serde(default = "default_track_extensions")]
    pub track_extensions: Vec<String>,

    /// Concurrent workers for directory imports.
    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default)]
    pub extractor: ExtractorType,

    #[serde(default = "default_exiftool_path")]
    pub exiftool_path: PathBuf,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            media_extensions: default_media_extensions(),
            track_extensions: default_track_extensions(),
            workers: default_workers(),
            extractor: ExtractorType::default(),
            exiftool_path: default_exiftool_path(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GeocoderType {
    Google,
    #[default]
    None,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TimezoneProviderType {
    #[default]
    Tzf,
    Geo2tz,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodingConfig {
    #[serde(default)]
    pub provider: GeocoderType,

    #[serde(default = "default_geocode_endpoint")]
    pub endpoint: String,

    /// Falls back to `GOOGLE_API_KEY` from the environment.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub timezone_provider: TimezoneProviderType,

    #[serde(default = "default_timezone_endpoint")]
    pub timezone_endpoint: String,

    /// How far either side of a capture time a track point may be and still count.
    #[serde(default = "default_hours_boundary")]
    pub hours_boundary: i64,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            provider: GeocoderType::default(),
            endpoint: default_geocode_endpoint(),
            api_key: None,
            timezone_provider: TimezoneProviderType::default(),
            timezone_endpoint: default_timezone_endpoint(),
            hours_boundary: default_hours_boundary(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl GeocodingConfig {
    pub fn api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var("GOOGLE_API_KEY").ok())
            .filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NotifyConfig {
    /// POSTed `{"id": ...}` after every successful import. Unset disables notifications.
    #[serde(default)]
    pub webhook_url: Option<String>,
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("kura")
}

fn default_db_path() -> PathBuf {
    data_dir().join("kura.db")
}

fn default_media_path() -> PathBuf {
    data_dir().join("media")
}

fn default_thumbnails_path() -> PathBuf {
    data_dir().join("thumbnails")
}

fn default_staging_path() -> PathBuf {
    std::env::temp_dir().join("kura-staging")
}

fn default_media_extensions() -> Vec<String> {
    vec![
        "jpg".to_string(),
        "jpeg".to_string(),
        "mov".to_string(),
        "mp4".to_string(),
        "avi".to_string(),
    ]
}

fn default_track_extensions() -> Vec<String> {
    vec!["gpx".to_string()]
}

fn default_workers() -> usize {
    50
}

fn default_exiftool_path() -> PathBuf {
    PathBuf::from("exiftool")
}

fn default_geocode_endpoint() -> String {
    "https://maps.googleapis.com/maps/api/geocode/json".to_string()
}

fn default_timezone_endpoint() -> String {
    "http://localhost:2004".to_string()
}

fn default_hours_boundary() -> i64 {
    8
}

fn default_timeout_secs() -> u64 {
    30
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            // Create default config
            let config = Config::default();
            config.save_to(&config_path)?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Default config with every path rooted under `base`.
    pub fn with_base_dir(base: &Path) -> Self {
        let mut config = Config::default();
        config.database.sqlite_path = base.join("kura.db");
        config.storage.media_path = base.join("media");
        config.storage.thumbnails_path = base.join("thumbnails");
        config.storage.staging_path = base.join("staging");
        config
    }

    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("KURA_CONFIG") {
            return PathBuf::from(path);
        }

        Self::config_dir().join("config.toml")
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("kura")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_partial_file_falls_back_to_defaults() {
        let config: Config = toml::from_str(
            r#"
            [import]
            workers = 4

            [geocoding]
            provider = "google"
            hours_boundary = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.import.workers, 4);
        assert_eq!(config.import.media_extensions, default_media_extensions());
        assert_eq!(config.geocoding.provider, GeocoderType::Google);
        assert_eq!(config.geocoding.hours_boundary, 5);
        assert_eq!(config.database.backend, DatabaseType::Sqlite);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");

        let mut config = Config::with_base_dir(dir.path());
        config.notify.webhook_url = Some("http://localhost:9000/hook".to_string());
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.database.sqlite_path, dir.path().join("kura.db"));
        assert_eq!(loaded.storage.staging_path, dir.path().join("staging"));
        assert_eq!(
            loaded.notify.webhook_url.as_deref(),
            Some("http://localhost:9000/hook")
        );
    }

    #[test]
    fn test_blank_api_key_falls_back_to_environment() {
        let mut geocoding = GeocodingConfig {
            api_key: Some(String::new()),
            ..Default::default()
        };
        let from_env = std::env::var("GOOGLE_API_KEY").ok().filter(|k| !k.is_empty());
        assert_eq!(geocoding.api_key(), from_env);

        geocoding.api_key = Some("configured".to_string());
        assert_eq!(geocoding.api_key().as_deref(), Some("configured"));
    }
}
