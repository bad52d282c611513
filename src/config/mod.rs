mod file_config;

pub use file_config::{FileConfig, SessionConfig};

use anyhow::{bail, Result};
use std::path::PathBuf;
use std::time::Duration;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub catalog_db: Option<PathBuf>,
    pub library_dir: Option<PathBuf>,
    pub downloads_dir: Option<PathBuf>,
    pub import_timeout_sec: u64,
    pub http_timeout_sec: u64,
    pub progression_flush_interval_ms: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub catalog_db: PathBuf,
    pub library_dir: PathBuf,
    pub downloads_dir: PathBuf,
    pub import_timeout: Duration,
    pub http_timeout: Duration,
    pub progression_flush_interval: Duration,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        // TOML overrides CLI for each field
        let library_dir = file
            .library_dir
            .map(PathBuf::from)
            .or_else(|| cli.library_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("library_dir must be specified via --library-dir or in config file")
            })?;

        if library_dir.exists() && !library_dir.is_dir() {
            bail!("library_dir is not a directory: {:?}", library_dir);
        }

        let catalog_db = file
            .catalog_db
            .map(PathBuf::from)
            .or_else(|| cli.catalog_db.clone())
            .unwrap_or_else(|| library_dir.join("catalog.db"));

        let downloads_dir = file
            .downloads_dir
            .map(PathBuf::from)
            .or_else(|| cli.downloads_dir.clone())
            .unwrap_or_else(|| library_dir.join("downloads"));

        let import_timeout_sec = file.import_timeout_sec.unwrap_or(cli.import_timeout_sec);
        if import_timeout_sec == 0 {
            bail!("import_timeout_sec must be greater than zero");
        }

        let http_timeout_sec = file.http_timeout_sec.unwrap_or(cli.http_timeout_sec);
        if http_timeout_sec == 0 {
            bail!("http_timeout_sec must be greater than zero");
        }

        let session = file.session.unwrap_or_default();
        let progression_flush_interval_ms = session
            .progression_flush_interval_ms
            .unwrap_or(cli.progression_flush_interval_ms);

        Ok(Self {
            catalog_db,
            library_dir,
            downloads_dir,
            import_timeout: Duration::from_secs(import_timeout_sec),
            http_timeout: Duration::from_secs(http_timeout_sec),
            progression_flush_interval: Duration::from_millis(progression_flush_interval_ms),
        })
    }
}
