use crate::config::AppConfig;
use crate::error::AppError;
use crate::manifest::Manifest;
use crate::photo::PhotoRecord;
use crate::pool::WorkerPool;
use crate::thumbnails::ThumbnailStore;
use crate::walker::{self, WalkedFile};
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanPhase {
    Idle,
    Counting,
    Collecting,
    Processing,
    Persisting,
    Done,
    Error,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ProgressEvent {
    pub phase: ScanPhase,
    pub percent: u8,
    pub completed: usize,
    pub total: usize,
}

#[derive(Debug, Clone)]
pub struct ScanFailure {
    pub relative_path: String,
    pub error: String,
}

#[derive(Debug)]
pub struct ScanOutcome {
    /// Full merged collection, capture time descending.
    pub photos: Vec<PhotoRecord>,
    pub extracted: usize,
    pub skipped_no_gps: usize,
    pub failures: Vec<ScanFailure>,
}

/// Orchestrates one scan: walk, diff against the manifest, extract pending
/// files on a worker pool, merge, persist. Callers interact with this
/// component only; everything below it is stateless or single-owner.
pub struct Scanner {
    config: AppConfig,
    in_flight: AtomicBool,
}

struct FlightGuard<'a>(&'a AtomicBool);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Scanner {
    pub fn new(config: AppConfig) -> Self {
        Scanner {
            config,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn scan(&self, root: &Path) -> Result<ScanOutcome, AppError> {
        self.scan_with_progress(root, |_| {})
    }

    /// Runs the scan state machine, emitting a progress event at each phase
    /// boundary and after every processed file. A second call while one is
    /// in flight on this coordinator gets a conflict error immediately.
    pub fn scan_with_progress<F>(&self, root: &Path, mut progress: F) -> Result<ScanOutcome, AppError>
    where
        F: FnMut(ProgressEvent),
    {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log::warn!("Rejecting scan of {:?}: another scan is in flight", root);
            return Err(AppError::ScanInProgress);
        }
        let _guard = FlightGuard(&self.in_flight);

        let result = self.run(root, &mut progress);
        if let Err(e) = &result {
            log::error!("Scan of {:?} failed: {}", root, e);
            progress(ProgressEvent {
                phase: ScanPhase::Error,
                percent: 0,
                completed: 0,
                total: 0,
            });
        }
        result
    }

    fn run(
        &self,
        root: &Path,
        progress: &mut dyn FnMut(ProgressEvent),
    ) -> Result<ScanOutcome, AppError> {
        log::info!("Starting scan of {:?}", root);

        // Counting: one full walk establishes the total for progress math.
        let mut files = walker::walk(root, &self.config.allowed_extensions)?;
        let total_files = files.len();
        progress(event(ScanPhase::Counting, 0, total_files));

        // Collecting: load the cache and partition into current vs pending.
        let mut manifest = Manifest::load(root)?.unwrap_or_else(Manifest::empty);
        files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        let pending: Vec<&WalkedFile> = manifest.diff(&files);
        let current = total_files - pending.len();
        log::info!(
            "{} files walked, {} already current, {} pending extraction",
            total_files,
            current,
            pending.len()
        );
        progress(event(ScanPhase::Collecting, current, total_files));

        let walked_paths: HashSet<String> =
            files.iter().map(|f| f.relative_path.clone()).collect();

        if pending.is_empty() {
            // Nothing to extract; surface the cached records. The sidecar is
            // only rewritten if pruning actually removed something.
            let pruned = if self.config.prune_missing {
                manifest.prune(&walked_paths)
            } else {
                0
            };
            manifest.merge(Vec::new());
            if pruned > 0 {
                progress(event(ScanPhase::Persisting, total_files, total_files));
                manifest.persist(root)?;
            }
            progress(event(ScanPhase::Done, total_files, total_files));
            return Ok(ScanOutcome {
                photos: manifest.photos,
                extracted: 0,
                skipped_no_gps: 0,
                failures: Vec::new(),
            });
        }

        // Processing: bounded pool over the path-sorted pending list. The
        // pool lives exactly as long as this phase.
        let pool = WorkerPool::new(
            self.config.effective_workers(),
            self.config.max_in_flight,
            self.config.thumbnail_max_size,
            self.config.thumbnail_quality,
        );
        let results = pool.process(&pending, |completed, total| {
            progress(event(ScanPhase::Processing, completed, total));
        })?;
        drop(pool);

        let store = ThumbnailStore::new(root);
        let mut new_records = Vec::new();
        let mut skipped_no_gps = 0usize;
        let mut failures = Vec::new();

        for (file, result) in pending.iter().zip(results) {
            match result {
                Ok(extraction) => {
                    let (latitude, longitude) = match extraction.coordinates {
                        Some(coords) => coords,
                        None => {
                            log::debug!("No GPS data in {}", file.relative_path);
                            skipped_no_gps += 1;
                            continue;
                        }
                    };
                    match store.write(&file.relative_path, &extraction.thumbnail) {
                        Ok(thumbnail_path) => new_records.push(PhotoRecord {
                            relative_path: file.relative_path.clone(),
                            name: PhotoRecord::name_from_path(&file.relative_path),
                            latitude,
                            longitude,
                            captured_at: extraction.captured_at,
                            last_modified: file.last_modified,
                            thumbnail_path,
                        }),
                        Err(e) => failures.push(ScanFailure {
                            relative_path: file.relative_path.clone(),
                            error: e.to_string(),
                        }),
                    }
                }
                Err(e) => failures.push(ScanFailure {
                    relative_path: file.relative_path.clone(),
                    error: e.to_string(),
                }),
            }
        }

        // Per-file failures never abort the scan; report them in one place
        // once the batch is done.
        for failure in &failures {
            log::warn!(
                "Failed to process {}: {}",
                failure.relative_path,
                failure.error
            );
        }
        log::info!(
            "Processing complete: {} extracted, {} without GPS, {} failed",
            new_records.len(),
            skipped_no_gps,
            failures.len()
        );

        let extracted = new_records.len();
        manifest.merge(new_records);
        if self.config.prune_missing {
            manifest.prune(&walked_paths);
        }

        progress(event(ScanPhase::Persisting, total_files, total_files));
        manifest.persist(root)?;

        progress(event(ScanPhase::Done, total_files, total_files));
        log::info!("Scan of {:?} done: {} records", root, manifest.photos.len());
        Ok(ScanOutcome {
            photos: manifest.photos,
            extracted,
            skipped_no_gps,
            failures,
        })
    }
}

fn event(phase: ScanPhase, completed: usize, total: usize) -> ProgressEvent {
    let percent = if total == 0 {
        100
    } else {
        ((completed as f64 / total as f64) * 100.0).round() as u8
    };
    ProgressEvent {
        phase,
        percent,
        completed,
        total,
    }
}
