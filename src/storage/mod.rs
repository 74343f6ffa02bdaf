//! Backup and media-store access.
//!
//! A download stages a private copy of a backup file; an upload writes a
//! staged file to its canonical key unless something is already there.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

pub trait Downloader: Send + Sync {
    /// Copy `source` into the staging area and return the staged path.
    fn download(&self, source: &Path) -> Result<PathBuf>;
}

pub trait Uploader: Send + Sync {
    /// Store `local` at `key`. Returns `false` when the key already existed
    /// and nothing was written.
    fn upload(&self, local: &Path, key: &str) -> Result<bool>;
}

/// A staged file, removed when dropped.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
}

impl StagedFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove staged file");
            }
        }
    }
}

/// Stages files from a locally mounted backup.
pub struct LocalFsDownloader {
    staging_dir: PathBuf,
}

impl LocalFsDownloader {
    pub fn new(staging_dir: &Path) -> Result<Self> {
        fs::create_dir_all(staging_dir)
            .with_context(|| format!("creating staging dir {}", staging_dir.display()))?;
        Ok(Self {
            staging_dir: staging_dir.to_path_buf(),
        })
    }
}

impl Downloader for LocalFsDownloader {
    fn download(&self, source: &Path) -> Result<PathBuf> {
        let mut src = File::open(source)?;

        // Unique name so concurrent workers never share a staging file
        let suffix = source
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let (mut dst, staged_path) = tempfile::Builder::new()
            .prefix("staged-")
            .suffix(&suffix)
            .tempfile_in(&self.staging_dir)?
            .keep()?;

        if let Err(e) = io::copy(&mut src, &mut dst) {
            let _ = fs::remove_file(&staged_path);
            return Err(e.into());
        }

        Ok(staged_path)
    }
}

/// Media store on a local filesystem root.
pub struct LocalFsUploader {
    root: PathBuf,
}

impl LocalFsUploader {
    pub fn new(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)
            .with_context(|| format!("creating media store {}", root.display()))?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn object_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

impl Uploader for LocalFsUploader {
    fn upload(&self, local: &Path, key: &str) -> Result<bool> {
        let destination = self.object_path(key);

        if destination.exists() {
            return Ok(false);
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write under a temporary name in the same directory, then rename, so a
        // half-written object never sits at the canonical key
        let parent = destination.parent().unwrap_or(&self.root);
        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        io::copy(&mut File::open(local)?, tmp.as_file_mut())?;
        match tmp.persist_noclobber(&destination) {
            Ok(_) => Ok(true),
            // Another writer stored the same key first
            Err(_) if destination.exists() => Ok(false),
            Err(e) => Err(e.error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_staged_file_is_removed_on_drop() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("IMG_0001.jpg");
        fs::write(&source, b"pixels").unwrap();

        let downloader = LocalFsDownloader::new(&dir.path().join("staging")).unwrap();
        let staged_path = downloader.download(&source).unwrap();
        assert_eq!(fs::read(&staged_path).unwrap(), b"pixels");
        assert_eq!(staged_path.extension().unwrap(), "jpg");

        {
            let _staged = StagedFile::new(staged_path.clone());
        }
        assert!(!staged_path.exists());
    }

    #[test]
    fn test_concurrent_downloads_get_distinct_paths() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("IMG_0001.jpg");
        fs::write(&source, b"pixels").unwrap();

        let downloader = LocalFsDownloader::new(&dir.path().join("staging")).unwrap();
        let a = downloader.download(&source).unwrap();
        let b = downloader.download(&source).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_upload_skips_existing_key() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("first.jpg");
        let second = dir.path().join("second.jpg");
        fs::write(&first, b"first").unwrap();
        fs::write(&second, b"second").unwrap();

        let uploader = LocalFsUploader::new(&dir.path().join("media")).unwrap();
        let key = "2014/20140321_080118_abc.jpg";

        assert!(uploader.upload(&first, key).unwrap());
        assert!(!uploader.upload(&second, key).unwrap());
        assert_eq!(fs::read(uploader.object_path(key)).unwrap(), b"first");
    }
}
