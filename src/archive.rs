use crate::error::AppError;
use crate::photo::PhotoRecord;
use std::io::{Read, Seek, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::ZipWriter;

/// What an export actually bundled: entries written, plus the relative paths
/// of originals that could not be re-opened and were skipped.
#[derive(Debug)]
pub struct ExportSummary {
    pub archived: usize,
    pub skipped: Vec<String>,
}

/// Streams the selected records' original files into a single zip, entry
/// names preserving the relative paths. Entries are stored uncompressed;
/// the payloads are already compressed rasters. A missing original is
/// skipped with a warning; an export that would produce an empty archive is
/// refused instead.
pub fn export_archive<W: Write + Seek>(
    root: &Path,
    records: &[PhotoRecord],
    writer: W,
) -> Result<ExportSummary, AppError> {
    if records.is_empty() {
        return Err(AppError::NothingToExport);
    }

    let mut zip = ZipWriter::new(writer);
    let options = FileOptions::default()
        .compression_method(zip::CompressionMethod::Stored)
        .unix_permissions(0o644);

    let mut archived = 0usize;
    let mut skipped = Vec::new();

    for record in records {
        let source = root.join(&record.relative_path);
        let mut file = match std::fs::File::open(&source) {
            Ok(file) => file,
            Err(e) => {
                log::warn!(
                    "Skipping {}, original cannot be re-opened: {}",
                    record.relative_path,
                    e
                );
                skipped.push(record.relative_path.clone());
                continue;
            }
        };
        zip.start_file(record.relative_path.clone(), options)?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        zip.write_all(&buf)?;
        archived += 1;
        log::debug!("Archived {}", record.relative_path);
    }

    if archived == 0 {
        return Err(AppError::NothingToExport);
    }
    zip.finish()?;
    log::info!("Archive complete: {} entries, {} skipped", archived, skipped.len());

    Ok(ExportSummary { archived, skipped })
}
