//! Directory-level import over a bounded worker pool.

use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, unbounded};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use super::{FileOutcome, ImportFile};
use crate::error::ImportError;
use crate::scanner::discover_files;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Files found under the root
    pub total: usize,
    pub imported: usize,
    pub existing: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: bool,
}

impl BatchSummary {
    fn record(&mut self, path: &Path, result: Result<FileOutcome, ImportError>) {
        match result {
            Ok(FileOutcome::Imported) => self.imported += 1,
            Ok(FileOutcome::Existing) => self.existing += 1,
            Ok(FileOutcome::Skipped) => self.skipped += 1,
            Err(e) => {
                self.failed += 1;
                tracing::error!(path = %path.display(), stage = e.stage(), error = %e, "Failed to import file");
            }
        }
    }

    pub fn processed(&self) -> usize {
        self.imported + self.existing + self.skipped + self.failed
    }
}

pub struct BatchRunner {
    workers: usize,
    cancel: Option<Arc<AtomicBool>>,
}

impl BatchRunner {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            cancel: None,
        }
    }

    /// Stop handing out files once `flag` is set. Files already in a worker's
    /// hands run to completion.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Import `root`. A single file's failure is returned as the error; under a
    /// directory, failures are logged and counted and the batch still succeeds.
    pub fn run(&self, root: &Path, importer: &dyn ImportFile) -> Result<BatchSummary> {
        if !root.is_dir() {
            let mut summary = BatchSummary {
                total: 1,
                ..Default::default()
            };
            match importer.import_file(root)? {
                FileOutcome::Imported => summary.imported = 1,
                FileOutcome::Existing => summary.existing = 1,
                FileOutcome::Skipped => summary.skipped = 1,
            }
            return Ok(summary);
        }

        let start = Instant::now();
        let files = discover_files(root)?;
        let total = files.len();
        tracing::info!(root = %root.display(), files = total, workers = self.workers, "Starting batch import");

        let (job_tx, job_rx) = bounded::<PathBuf>(self.workers);
        let (result_tx, result_rx) = unbounded::<(PathBuf, Result<FileOutcome, ImportError>)>();

        let mut summary = thread::scope(|s| {
            for _ in 0..self.workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                s.spawn(move || {
                    for path in job_rx.iter() {
                        if self.is_cancelled() {
                            break;
                        }
                        let result = importer.import_file(&path);
                        if result_tx.send((path, result)).is_err() {
                            break;
                        }
                    }
                });
            }
            // Workers hold the only remaining handles
            drop(job_rx);
            drop(result_tx);

            let collector = s.spawn(move || {
                let mut summary = BatchSummary::default();
                for (path, result) in result_rx.iter() {
                    summary.record(&path, result);
                }
                summary
            });

            for path in files {
                if self.is_cancelled() {
                    tracing::info!("Batch import cancelled");
                    break;
                }
                if job_tx.send(path).is_err() {
                    break;
                }
            }
            drop(job_tx);

            collector
                .join()
                .map_err(|_| anyhow!("import result collector panicked"))
        })?;

        summary.total = total;
        summary.cancelled = self.is_cancelled();
        tracing::info!(
            root = %root.display(),
            total,
            imported = summary.imported,
            existing = summary.existing,
            skipped = summary.skipped,
            failed = summary.failed,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Finished batch import"
        );
        Ok(summary)
    }
}
