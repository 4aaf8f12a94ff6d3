use crate::error::AppError;
use std::path::{Component, Path, PathBuf};

pub const THUMBNAIL_DIR: &str = "thumbnails";
pub const THUMBNAIL_SUFFIX: &str = ".thumb.jpg";

/// Pre-rendered thumbnails live in a tree under `<root>/thumbnails/`
/// mirroring the source hierarchy, one `<name>.thumb.jpg` per image.
/// Written once per extraction, read lazily on demand.
pub struct ThumbnailStore {
    root: PathBuf,
}

impl ThumbnailStore {
    pub fn new(root: &Path) -> Self {
        ThumbnailStore {
            root: root.to_path_buf(),
        }
    }

    /// The sidecar-relative reference under which a photo's thumbnail is
    /// stored, e.g. `a/b/c.jpg` -> `thumbnails/a/b/c.jpg.thumb.jpg`.
    pub fn reference_for(relative_path: &str) -> String {
        format!("{}/{}{}", THUMBNAIL_DIR, relative_path, THUMBNAIL_SUFFIX)
    }

    pub fn write(&self, relative_path: &str, bytes: &[u8]) -> Result<String, AppError> {
        let reference = Self::reference_for(relative_path);
        let target = self.resolve(&reference)?;
        if let Some(parent) = target.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
                log::debug!("Created thumbnail directory: {:?}", parent);
            }
        }
        std::fs::write(&target, bytes)?;
        log::debug!("Thumbnail saved to: {:?}", target);
        Ok(reference)
    }

    pub fn read(&self, reference: &str) -> Result<Vec<u8>, AppError> {
        let target = self.resolve(reference)?;
        Ok(std::fs::read(target)?)
    }

    /// Maps a stored reference back to a filesystem path, refusing anything
    /// that would escape the thumbnail tree.
    pub fn resolve(&self, reference: &str) -> Result<PathBuf, AppError> {
        let rel = Path::new(reference);
        let mut components = rel.components();
        if components.next() != Some(Component::Normal(THUMBNAIL_DIR.as_ref())) {
            return Err(AppError::NotFound(reference.to_string()));
        }
        for component in components {
            match component {
                Component::Normal(_) => {}
                _ => return Err(AppError::NotFound(reference.to_string())),
            }
        }
        Ok(self.root.join(rel))
    }
}
