use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;
use photo_atlas::archive;
use photo_atlas::config::AppConfig;
use photo_atlas::scanner::{ScanOutcome, ScanPhase, Scanner};
use photo_atlas::spatial::{self, BoundingBox};
use photo_atlas::web_server;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "photo_atlas", about = "Index geotagged photos and export by map area")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan a directory tree and refresh its photo manifest
    Scan {
        /// Directory to scan; defaults to the configured scan directory
        directory: Option<PathBuf>,
    },
    /// Export the photos inside a bounding box as a zip archive
    Export {
        /// Directory to export from; defaults to the configured scan directory
        directory: Option<PathBuf>,
        #[arg(long)]
        min_lat: f64,
        #[arg(long)]
        max_lat: f64,
        #[arg(long)]
        min_lon: f64,
        #[arg(long)]
        max_lon: f64,
        #[arg(long, default_value = "selected-photos.zip")]
        output: PathBuf,
    },
    /// Serve the remote-scan HTTP API
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::new()?;

    env_logger::Builder::new()
        .filter_level(config.log_level.parse().unwrap_or(log::LevelFilter::Info))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Scan { directory } => {
            let root = resolve_root(&config, directory);
            let scanner = Scanner::new(config);
            let outcome = run_scan(&scanner, &root)?;
            info!(
                "Scan of {:?} finished: {} photos with GPS data ({} newly extracted, {} without GPS, {} failed)",
                root,
                outcome.photos.len(),
                outcome.extracted,
                outcome.skipped_no_gps,
                outcome.failures.len()
            );
        }
        Command::Export {
            directory,
            min_lat,
            max_lat,
            min_lon,
            max_lon,
            output,
        } => {
            let root = resolve_root(&config, directory);
            let scanner = Scanner::new(config);
            let outcome = run_scan(&scanner, &root)?;

            let bounds = BoundingBox {
                min_latitude: min_lat,
                max_latitude: max_lat,
                min_longitude: min_lon,
                max_longitude: max_lon,
            };
            let selected: Vec<_> = spatial::photos_within(&outcome.photos, &bounds)
                .into_iter()
                .cloned()
                .collect();
            if selected.is_empty() {
                anyhow::bail!("No photos found in the selected area");
            }

            let file = std::fs::File::create(&output)?;
            let summary = archive::export_archive(&root, &selected, file)?;
            info!(
                "Exported {} photos to {:?} ({} skipped)",
                summary.archived,
                output,
                summary.skipped.len()
            );
        }
        Command::Serve => {
            info!("Starting photo_atlas in server mode");
            let config = Arc::new(config);
            let scanner = Arc::new(Scanner::new((*config).clone()));
            web_server::start_web_server(config, scanner).await?;
        }
    }

    Ok(())
}

fn resolve_root(config: &AppConfig, directory: Option<PathBuf>) -> PathBuf {
    directory.unwrap_or_else(|| PathBuf::from(&config.scan_directory))
}

fn run_scan(scanner: &Scanner, root: &PathBuf) -> Result<ScanOutcome> {
    let mut last_phase = None;
    let outcome = scanner.scan_with_progress(root, |event| {
        if last_phase != Some(event.phase) {
            last_phase = Some(event.phase);
            info!("Phase: {:?}", event.phase);
        }
        if event.phase == ScanPhase::Processing {
            info!(
                "Processed {}/{} ({}%)",
                event.completed, event.total, event.percent
            );
        }
    })?;
    Ok(outcome)
}
