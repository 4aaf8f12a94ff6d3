mod common;

use chrono::{TimeZone, Utc};
use common::{degrees, degrees_minutes, write_jpeg_with_gps, write_plain_jpeg, GpsTags};
use photo_atlas::archive;
use photo_atlas::config::AppConfig;
use photo_atlas::error::AppError;
use photo_atlas::manifest::MANIFEST_FILE_NAME;
use photo_atlas::scanner::{ScanPhase, Scanner};
use photo_atlas::spatial::{self, BoundingBox};
use std::io::Cursor;
use std::path::Path;

fn test_config() -> AppConfig {
    AppConfig {
        num_workers: 2,
        ..AppConfig::default()
    }
}

fn photo_a() -> GpsTags<'static> {
    // (10, 20), the newer capture
    GpsTags {
        lat_dms: degrees(10),
        lat_ref: 'N',
        lon_dms: degrees(20),
        lon_ref: 'E',
        datetime: "2021:06:02 10:00:00",
    }
}

fn photo_b() -> GpsTags<'static> {
    // (10.5, 20.5), the older capture
    GpsTags {
        lat_dms: degrees_minutes(10, 30),
        lat_ref: 'N',
        lon_dms: degrees_minutes(20, 30),
        lon_ref: 'E',
        datetime: "2021:06:01 10:00:00",
    }
}

fn seed_library(root: &Path) {
    std::fs::create_dir_all(root.join("sub")).unwrap();
    write_jpeg_with_gps(&root.join("a.jpg"), 320, 240, &photo_a());
    write_jpeg_with_gps(&root.join("sub/b.jpg"), 64, 64, &photo_b());
    write_plain_jpeg(&root.join("no_gps.jpg"), 32, 32);
}

#[test]
fn end_to_end_scan_filter_export() {
    let dir = tempfile::tempdir().unwrap();
    seed_library(dir.path());

    let scanner = Scanner::new(test_config());
    let outcome = scanner.scan(dir.path()).unwrap();

    // 3 images walked, 2 with GPS, sorted by capture time descending
    assert_eq!(outcome.photos.len(), 2);
    assert_eq!(outcome.skipped_no_gps, 1);
    assert!(outcome.failures.is_empty());
    assert_eq!(outcome.photos[0].relative_path, "a.jpg");
    assert_eq!(outcome.photos[1].relative_path, "sub/b.jpg");

    let a = &outcome.photos[0];
    assert!((a.latitude - 10.0).abs() < 1e-9);
    assert!((a.longitude - 20.0).abs() < 1e-9);
    assert_eq!(
        a.captured_at,
        Utc.with_ymd_and_hms(2021, 6, 2, 10, 0, 0).unwrap()
    );
    let b = &outcome.photos[1];
    assert!((b.latitude - 10.5).abs() < 1e-9);
    assert!((b.longitude - 20.5).abs() < 1e-9);

    // thumbnails mirror the source tree and stay within the bound
    let thumb_path = dir.path().join("thumbnails/sub/b.jpg.thumb.jpg");
    assert!(thumb_path.exists());
    let a_thumb =
        image::open(dir.path().join("thumbnails/a.jpg.thumb.jpg")).unwrap();
    assert_eq!((a_thumb.width(), a_thumb.height()), (200, 150));

    // sidecar shape: photos array plus ISO lastScanned, camelCase keys
    let sidecar: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join(MANIFEST_FILE_NAME)).unwrap(),
    )
    .unwrap();
    assert_eq!(sidecar["photos"].as_array().unwrap().len(), 2);
    assert!(sidecar["lastScanned"].is_string());
    assert!(sidecar["photos"][0]["date"].is_string());
    assert!(sidecar["photos"][0]["lastModified"].is_i64());

    // area selection covering only A
    let bounds = BoundingBox {
        min_latitude: 9.9,
        max_latitude: 10.1,
        min_longitude: 19.9,
        max_longitude: 20.1,
    };
    let selected: Vec<_> = spatial::photos_within(&outcome.photos, &bounds)
        .into_iter()
        .cloned()
        .collect();
    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].relative_path, "a.jpg");

    // export of that selection yields a single-entry archive named for it
    let mut buf = Cursor::new(Vec::new());
    let summary = archive::export_archive(dir.path(), &selected, &mut buf).unwrap();
    assert_eq!(summary.archived, 1);
    let mut zip = zip::ZipArchive::new(Cursor::new(buf.into_inner())).unwrap();
    assert_eq!(zip.len(), 1);
    assert_eq!(zip.by_index(0).unwrap().name(), "a.jpg");
}

#[test]
fn rescan_of_unchanged_directory_extracts_nothing() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("sub")).unwrap();
    write_jpeg_with_gps(&dir.path().join("a.jpg"), 320, 240, &photo_a());
    write_jpeg_with_gps(&dir.path().join("sub/b.jpg"), 64, 64, &photo_b());

    let scanner = Scanner::new(test_config());
    let first = scanner.scan(dir.path()).unwrap();

    let mut phases = Vec::new();
    let second = scanner
        .scan_with_progress(dir.path(), |event| phases.push(event.phase))
        .unwrap();

    assert_eq!(second.extracted, 0);
    assert!(
        !phases.contains(&ScanPhase::Processing),
        "no file should have been re-extracted"
    );
    assert_eq!(second.photos, first.photos);
}

#[test]
fn touched_file_is_reextracted_alone() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("sub")).unwrap();
    write_jpeg_with_gps(&dir.path().join("a.jpg"), 320, 240, &photo_a());
    write_jpeg_with_gps(&dir.path().join("sub/b.jpg"), 64, 64, &photo_b());

    let scanner = Scanner::new(test_config());
    let first = scanner.scan(dir.path()).unwrap();
    let a_before = first
        .photos
        .iter()
        .find(|p| p.relative_path == "a.jpg")
        .unwrap()
        .clone();

    let touched = filetime::FileTime::from_unix_time(1_700_000_000, 0);
    filetime::set_file_mtime(dir.path().join("sub/b.jpg"), touched).unwrap();

    let second = scanner.scan(dir.path()).unwrap();
    assert_eq!(second.extracted, 1);

    let a_after = second
        .photos
        .iter()
        .find(|p| p.relative_path == "a.jpg")
        .unwrap();
    let b_after = second
        .photos
        .iter()
        .find(|p| p.relative_path == "sub/b.jpg")
        .unwrap();
    assert_eq!(*a_after, a_before);
    assert_eq!(b_after.last_modified.timestamp_millis(), 1_700_000_000_000);
}

#[test]
fn pruning_drops_records_for_deleted_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("sub")).unwrap();
    write_jpeg_with_gps(&dir.path().join("a.jpg"), 320, 240, &photo_a());
    write_jpeg_with_gps(&dir.path().join("sub/b.jpg"), 64, 64, &photo_b());

    let scanner = Scanner::new(test_config());
    assert_eq!(scanner.scan(dir.path()).unwrap().photos.len(), 2);

    std::fs::remove_file(dir.path().join("a.jpg")).unwrap();
    let after = scanner.scan(dir.path()).unwrap();
    assert_eq!(after.photos.len(), 1);
    assert_eq!(after.photos[0].relative_path, "sub/b.jpg");

    // the sidecar was rewritten without the stale entry
    let sidecar: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join(MANIFEST_FILE_NAME)).unwrap(),
    )
    .unwrap();
    assert_eq!(sidecar["photos"].as_array().unwrap().len(), 1);
}

#[test]
fn stale_entries_survive_when_pruning_is_off() {
    let dir = tempfile::tempdir().unwrap();
    write_jpeg_with_gps(&dir.path().join("a.jpg"), 64, 64, &photo_a());
    write_jpeg_with_gps(&dir.path().join("b.jpg"), 64, 64, &photo_b());

    let config = AppConfig {
        prune_missing: false,
        ..test_config()
    };
    let scanner = Scanner::new(config);
    assert_eq!(scanner.scan(dir.path()).unwrap().photos.len(), 2);

    std::fs::remove_file(dir.path().join("a.jpg")).unwrap();
    let after = scanner.scan(dir.path()).unwrap();
    assert_eq!(after.photos.len(), 2);
}

#[test]
fn corrupt_manifest_aborts_the_scan() {
    let dir = tempfile::tempdir().unwrap();
    write_jpeg_with_gps(&dir.path().join("a.jpg"), 64, 64, &photo_a());
    std::fs::write(dir.path().join(MANIFEST_FILE_NAME), b"not json at all").unwrap();

    let scanner = Scanner::new(test_config());
    assert!(matches!(
        scanner.scan(dir.path()),
        Err(AppError::ManifestCorrupt(_, _))
    ));
}

#[test]
fn missing_root_aborts_the_scan() {
    let dir = tempfile::tempdir().unwrap();
    let scanner = Scanner::new(test_config());
    assert!(scanner.scan(&dir.path().join("does-not-exist")).is_err());
}

#[test]
fn concurrent_scan_request_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_jpeg_with_gps(&dir.path().join("a.jpg"), 64, 64, &photo_a());

    let scanner = Scanner::new(test_config());
    let mut reentrant: Option<Result<_, AppError>> = None;
    scanner
        .scan_with_progress(dir.path(), |_| {
            if reentrant.is_none() {
                reentrant = Some(scanner.scan(dir.path()));
            }
        })
        .unwrap();

    assert!(matches!(
        reentrant,
        Some(Err(AppError::ScanInProgress))
    ));
}

#[test]
fn corrupted_input_is_reported_but_does_not_stop_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    write_jpeg_with_gps(&dir.path().join("good.jpg"), 64, 64, &photo_a());
    std::fs::write(dir.path().join("bad.jpg"), b"truncated garbage").unwrap();

    let scanner = Scanner::new(test_config());
    let outcome = scanner.scan(dir.path()).unwrap();
    assert_eq!(outcome.photos.len(), 1);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].relative_path, "bad.jpg");
}
