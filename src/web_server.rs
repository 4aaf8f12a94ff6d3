use crate::archive;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::photo::PhotoRecord;
use crate::scanner::Scanner;
use crate::thumbnails::ThumbnailStore;
use actix_files::NamedFile;
use actix_web::{web, App, HttpResponse, HttpServer};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use uuid::Uuid;

/// The remote-scan deployment: scanning runs server-side and the UI talks
/// to these four endpoints. The most recently scanned root is remembered so
/// thumbnails and archives can be resolved against it.
pub struct AppState {
    scanner: Arc<Scanner>,
    library: Mutex<Library>,
    archives: Mutex<HashMap<String, PathBuf>>,
    staging: TempDir,
}

#[derive(Default)]
struct Library {
    root: Option<PathBuf>,
    photos: Vec<PhotoRecord>,
}

#[derive(Deserialize)]
struct ScanRequest {
    directory: String,
}

#[derive(Serialize)]
struct ScanResponse {
    total: usize,
    photos: Vec<PhotoRecord>,
}

#[derive(Deserialize)]
struct CreateArchiveRequest {
    photos: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateArchiveResponse {
    archive_id: String,
}

fn lock<'a, T>(mutex: &'a Mutex<T>) -> Result<std::sync::MutexGuard<'a, T>, AppError> {
    mutex
        .lock()
        .map_err(|_| AppError::Generic("state lock poisoned".into()))
}

async fn scan(
    state: web::Data<AppState>,
    body: web::Json<ScanRequest>,
) -> Result<HttpResponse, AppError> {
    let directory = PathBuf::from(&body.directory);
    log::info!("Scan requested for {:?}", directory);

    let scanner = state.scanner.clone();
    let scan_root = directory.clone();
    let outcome =
        tokio::task::spawn_blocking(move || scanner.scan(&scan_root)).await??;

    let mut library = lock(&state.library)?;
    library.root = Some(directory);
    library.photos = outcome.photos.clone();

    Ok(HttpResponse::Ok().json(ScanResponse {
        total: outcome.photos.len(),
        photos: outcome.photos,
    }))
}

async fn get_thumbnail(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<NamedFile, AppError> {
    let relative_path = path.into_inner();
    log::debug!("Thumbnail requested for {}", relative_path);

    let root = lock(&state.library)?
        .root
        .clone()
        .ok_or_else(|| AppError::NotFound("no directory scanned yet".into()))?;

    let store = ThumbnailStore::new(&root);
    let target = store.resolve(&ThumbnailStore::reference_for(&relative_path))?;
    NamedFile::open_async(&target).await.map_err(|e| {
        log::debug!("No thumbnail at {:?}: {}", target, e);
        AppError::NotFound(relative_path)
    })
}

async fn create_archive(
    state: web::Data<AppState>,
    body: web::Json<CreateArchiveRequest>,
) -> Result<HttpResponse, AppError> {
    let requested: HashSet<&str> = body.photos.iter().map(String::as_str).collect();
    let (root, selected) = {
        let library = lock(&state.library)?;
        let root = library
            .root
            .clone()
            .ok_or_else(|| AppError::NotFound("no directory scanned yet".into()))?;
        let selected: Vec<PhotoRecord> = library
            .photos
            .iter()
            .filter(|p| requested.contains(p.relative_path.as_str()))
            .cloned()
            .collect();
        (root, selected)
    };
    log::info!("Archive requested for {} photos", selected.len());

    let archive_id = Uuid::new_v4().to_string();
    let archive_path = state.staging.path().join(format!("{}.zip", archive_id));
    let staged = archive_path.clone();
    tokio::task::spawn_blocking(move || -> Result<_, AppError> {
        let file = std::fs::File::create(&staged)?;
        archive::export_archive(&root, &selected, file)
    })
    .await??;

    lock(&state.archives)?.insert(archive_id.clone(), archive_path);
    Ok(HttpResponse::Ok().json(CreateArchiveResponse { archive_id }))
}

async fn download_archive(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let archive_id = path.into_inner();
    let archive_path = lock(&state.archives)?
        .remove(&archive_id)
        .ok_or_else(|| AppError::NotFound(archive_id.clone()))?;

    let bytes = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, AppError> {
        let bytes = std::fs::read(&archive_path)?;
        // the archive is a one-shot artifact
        if let Err(e) = std::fs::remove_file(&archive_path) {
            log::warn!("Could not delete archive {:?}: {}", archive_path, e);
        }
        Ok(bytes)
    })
    .await??;

    Ok(HttpResponse::Ok()
        .content_type("application/zip")
        .insert_header((
            "Content-Disposition",
            "attachment; filename=\"selected-photos.zip\"",
        ))
        .body(bytes))
}

pub async fn start_web_server(
    config: Arc<AppConfig>,
    scanner: Arc<Scanner>,
) -> std::io::Result<()> {
    let port = config.web_port;
    let staging = tempfile::tempdir()?;
    let state = web::Data::new(AppState {
        scanner,
        library: Mutex::new(Library::default()),
        archives: Mutex::new(HashMap::new()),
        staging,
    });

    log::info!("Starting web server on port: {}", port);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .service(web::resource("/api/scan").route(web::post().to(scan)))
            .service(
                web::resource("/api/thumbnails/{path:.*}").route(web::get().to(get_thumbnail)),
            )
            .service(web::resource("/api/create-archive").route(web::post().to(create_archive)))
            .service(
                web::resource("/api/download-archive/{id}")
                    .route(web::get().to(download_archive)),
            )
    })
    .bind(format!("0.0.0.0:{}", port))?
    .run()
    .await
}
