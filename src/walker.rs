use crate::error::AppError;
use crate::manifest::MANIFEST_FILE_NAME;
use crate::thumbnails::THUMBNAIL_DIR;
use crate::photo::timestamp;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A candidate file discovered under the scan root. `relative_path` joins
/// segments with `/` regardless of platform and is the identity key shared
/// with the manifest.
#[derive(Debug, Clone)]
pub struct WalkedFile {
    pub absolute_path: PathBuf,
    pub relative_path: String,
    pub last_modified: DateTime<Utc>,
}

/// Recursively lists eligible files under `root`. An unreadable root aborts
/// the walk; errors deeper in the tree only skip the affected entry. The
/// reserved thumbnail tree and the manifest sidecar are never eligible.
pub fn walk(
    root: &Path,
    allowed_extensions: &HashSet<String>,
) -> Result<Vec<WalkedFile>, AppError> {
    log::info!("Starting file discovery in {:?}", root);
    log::debug!("Configured allowed extensions: {:?}", allowed_extensions);

    let mut files = Vec::new();

    let entries = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| !is_reserved(e));
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                log::error!("Cannot open scan root {:?}: {}", root, e);
                return Err(e.into());
            }
            Err(e) => {
                log::warn!("Skipping unreadable entry under {:?}: {}", root, e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            log::trace!("Skipping non-file entry: {:?}", entry.path());
            continue;
        }
        let path = entry.path();
        log::trace!("Discovered file: {:?}", path);
        match path.extension().and_then(|s| s.to_str()) {
            Some(ext) if allowed_extensions.contains(&ext.to_lowercase()) => {}
            Some(_) => {
                log::trace!("Skipping file due to unsupported extension: {:?}", path);
                continue;
            }
            None => {
                log::trace!("Skipping file with no extension: {:?}", path);
                continue;
            }
        }
        let relative_path = match relative_key(root, path) {
            Some(rel) => rel,
            None => {
                log::warn!("Skipping file with non-UTF-8 path: {:?}", path);
                continue;
            }
        };
        let modified = match entry.metadata().map_err(AppError::from).and_then(|m| {
            m.modified().map_err(AppError::from)
        }) {
            Ok(t) => timestamp::from_system_time(t),
            Err(e) => {
                log::warn!("Skipping {:?}, cannot read modification time: {}", path, e);
                continue;
            }
        };
        files.push(WalkedFile {
            absolute_path: path.to_path_buf(),
            relative_path,
            last_modified: modified,
        });
    }

    log::info!("File discovery complete, {} eligible files.", files.len());
    Ok(files)
}

fn is_reserved(entry: &walkdir::DirEntry) -> bool {
    if entry.depth() != 1 {
        return false;
    }
    let name = entry.file_name();
    (entry.file_type().is_dir() && name == THUMBNAIL_DIR)
        || (entry.file_type().is_file() && name == MANIFEST_FILE_NAME)
}

fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let mut segments = Vec::new();
    for component in rel.components() {
        segments.push(component.as_os_str().to_str()?);
    }
    Some(segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn extensions() -> HashSet<String> {
        ["jpg", "jpeg", "png"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn finds_nested_files_with_slash_joined_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::write(dir.path().join("top.JPG"), b"x").unwrap();
        fs::write(dir.path().join("a/b/deep.png"), b"x").unwrap();
        fs::write(dir.path().join("a/notes.txt"), b"x").unwrap();

        let mut rels: Vec<String> = walk(dir.path(), &extensions())
            .unwrap()
            .into_iter()
            .map(|f| f.relative_path)
            .collect();
        rels.sort();
        assert_eq!(rels, vec!["a/b/deep.png".to_string(), "top.JPG".to_string()]);
    }

    #[test]
    fn skips_thumbnail_tree_and_manifest_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(THUMBNAIL_DIR).join("a")).unwrap();
        fs::write(
            dir.path().join(THUMBNAIL_DIR).join("a/x.jpg.thumb.jpg"),
            b"x",
        )
        .unwrap();
        fs::write(dir.path().join(MANIFEST_FILE_NAME), b"{}").unwrap();
        fs::write(dir.path().join("real.jpg"), b"x").unwrap();

        let files = walk(dir.path(), &extensions()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative_path, "real.jpg");
    }

    #[test]
    fn missing_root_is_a_hard_error() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("nope");
        assert!(walk(&gone, &extensions()).is_err());
    }
}
