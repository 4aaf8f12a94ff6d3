use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::collections::HashSet;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub scan_directory: String,
    pub thumbnail_max_size: u32,
    pub thumbnail_quality: u8,
    pub num_workers: usize,
    pub max_in_flight: usize,
    pub allowed_extensions: HashSet<String>,
    pub prune_missing: bool,
    pub web_port: u16,
    pub log_level: String,
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default"))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(File::with_name("config/local").required(false))
            .build()?;

        s.try_deserialize()
    }

    /// Pool size actually used: the configured value, or the hardware
    /// parallelism hint when set to 0.
    pub fn effective_workers(&self) -> usize {
        if self.num_workers > 0 {
            self.num_workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            scan_directory: "./photos".into(),
            thumbnail_max_size: 200,
            thumbnail_quality: 70,
            num_workers: 0,
            max_in_flight: 4,
            allowed_extensions: ["jpg", "jpeg", "png", "gif"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            prune_missing: true,
            web_port: 34567,
            log_level: "info".into(),
        }
    }
}
