use crate::error::AppError;
use crate::photo::{timestamp, PhotoRecord};
use crate::walker::WalkedFile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::Path;

/// Fixed sidecar filename inside the scanned root.
pub const MANIFEST_FILE_NAME: &str = "photos-metadata.json";

/// The persisted scan cache: every previously indexed record plus the time
/// of the last scan. Rewritten wholesale at the end of a successful scan.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub photos: Vec<PhotoRecord>,
    #[serde(with = "timestamp::iso")]
    pub last_scanned: DateTime<Utc>,
}

impl Manifest {
    pub fn empty() -> Self {
        Manifest {
            photos: Vec::new(),
            last_scanned: Utc::now(),
        }
    }

    /// Reads the sidecar. A missing file means "no cache yet"; an unreadable
    /// or unparseable one is a hard error, never a silent empty cache.
    pub fn load(root: &Path) -> Result<Option<Manifest>, AppError> {
        let path = root.join(MANIFEST_FILE_NAME);
        if !path.exists() {
            log::debug!("No manifest at {:?}", path);
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        let manifest: Manifest = serde_json::from_str(&content).map_err(|e| {
            AppError::ManifestCorrupt(path.to_string_lossy().to_string(), e.to_string())
        })?;
        log::info!(
            "Loaded manifest with {} cached records (last scanned {})",
            manifest.photos.len(),
            manifest.last_scanned
        );
        Ok(Some(manifest))
    }

    /// Walked files that need (re-)extraction: no entry for their path, or a
    /// modification time that differs from the stored one.
    pub fn diff<'a>(&self, walked: &'a [WalkedFile]) -> Vec<&'a WalkedFile> {
        let known: HashMap<&str, DateTime<Utc>> = self
            .photos
            .iter()
            .map(|p| (p.relative_path.as_str(), p.last_modified))
            .collect();

        walked
            .iter()
            .filter(|file| match known.get(file.relative_path.as_str()) {
                Some(stored) if *stored == file.last_modified => {
                    log::trace!("Unchanged, skipping: {}", file.relative_path);
                    false
                }
                Some(_) => {
                    log::debug!("Modified since last scan: {}", file.relative_path);
                    true
                }
                None => {
                    log::debug!("New file: {}", file.relative_path);
                    true
                }
            })
            .collect()
    }

    /// Upserts records by path and re-sorts the collection by capture time
    /// descending (path ascending on ties, for determinism).
    pub fn merge(&mut self, new_records: Vec<PhotoRecord>) {
        let mut by_path: HashMap<String, PhotoRecord> = self
            .photos
            .drain(..)
            .map(|p| (p.relative_path.clone(), p))
            .collect();
        for record in new_records {
            by_path.insert(record.relative_path.clone(), record);
        }
        self.photos = by_path.into_values().collect();
        self.photos.sort_by(|a, b| {
            b.captured_at
                .cmp(&a.captured_at)
                .then_with(|| a.relative_path.cmp(&b.relative_path))
        });
    }

    /// Drops entries whose files were not observed in the latest full walk.
    /// Returns how many were removed.
    pub fn prune(&mut self, walked_paths: &HashSet<String>) -> usize {
        let before = self.photos.len();
        self.photos
            .retain(|p| walked_paths.contains(&p.relative_path));
        let removed = before - self.photos.len();
        if removed > 0 {
            log::info!("Pruned {} manifest entries for removed files", removed);
        }
        removed
    }

    /// Atomically replaces the sidecar: the JSON is staged to a temp file in
    /// the same directory and renamed over the old manifest, so a crash
    /// mid-write cannot corrupt the previous cache.
    pub fn persist(&mut self, root: &Path) -> Result<(), AppError> {
        self.last_scanned = Utc::now();
        let path = root.join(MANIFEST_FILE_NAME);
        let mut staged = tempfile::NamedTempFile::new_in(root)?;
        serde_json::to_writer_pretty(&mut staged, self)?;
        staged.flush()?;
        staged.persist(&path).map_err(|e| AppError::Io(e.error))?;
        log::info!("Persisted manifest with {} records to {:?}", self.photos.len(), path);
        Ok(())
    }
}
