use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use folio_reader_host::bookshelf::Bookshelf;
use folio_reader_host::catalog_store::SqliteCatalogStore;
use folio_reader_host::config::{AppConfig, CliConfig, FileConfig};
use folio_reader_host::fetcher::PublicationRetriever;
use folio_reader_host::host::{HostCommand, HostReply, ReaderHost, DEFAULT_IMPORT_TIMEOUT};
use folio_reader_host::session::{FsAssetOpener, SessionRepository};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to a TOML config file. Values set there override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory holding imported publication assets.
    #[clap(long, value_parser = parse_path)]
    pub library_dir: Option<PathBuf>,

    /// Path to the SQLite catalog database file. Defaults to
    /// <library_dir>/catalog.db.
    #[clap(long, value_parser = parse_path)]
    pub catalog_db: Option<PathBuf>,

    /// Staging directory for in-flight remote downloads. Defaults to
    /// <library_dir>/downloads.
    #[clap(long, value_parser = parse_path)]
    pub downloads_dir: Option<PathBuf>,

    /// Maximum time in seconds to wait for an import to complete.
    #[clap(long, default_value_t = DEFAULT_IMPORT_TIMEOUT.as_secs())]
    pub import_timeout_sec: u64,

    /// Timeout in seconds for remote fetch requests.
    #[clap(long, default_value_t = 60)]
    pub http_timeout_sec: u64,

    /// Minimum interval in milliseconds between reading-progression writes.
    #[clap(long, default_value_t = 1000)]
    pub progression_flush_interval_ms: u64,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import (if needed) and open a publication from a local file.
    OpenLocal {
        #[clap(value_parser = parse_path)]
        path: PathBuf,

        /// Stable identity for deduplication. Defaults to "local:<path>".
        #[clap(long)]
        source_key: Option<String>,
    },
    /// Import (if needed) and open a publication from an http(s) URL.
    OpenRemote {
        url: String,

        /// Stable identity for deduplication. Defaults to "remote:<url>".
        #[clap(long)]
        source_key: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let cli_config = CliConfig {
        catalog_db: cli_args.catalog_db.clone(),
        library_dir: cli_args.library_dir.clone(),
        downloads_dir: cli_args.downloads_dir.clone(),
        import_timeout_sec: cli_args.import_timeout_sec,
        http_timeout_sec: cli_args.http_timeout_sec,
        progression_flush_interval_ms: cli_args.progression_flush_interval_ms,
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    info!("Opening SQLite catalog database at {:?}...", config.catalog_db);
    std::fs::create_dir_all(&config.library_dir)
        .with_context(|| format!("Failed to create library dir: {:?}", config.library_dir))?;
    let store = Arc::new(SqliteCatalogStore::new(&config.catalog_db)?);

    let client = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()
        .context("Failed to build HTTP client")?;
    let retriever = PublicationRetriever::new(
        client,
        config.library_dir.clone(),
        config.downloads_dir.clone(),
    );
    retriever.init().await?;

    let bookshelf = Arc::new(Bookshelf::new(store.clone(), Arc::new(retriever)));
    let sessions = Arc::new(SessionRepository::new(
        store.clone(),
        Arc::new(FsAssetOpener::new(config.library_dir.clone())),
        config.progression_flush_interval,
    ));
    let host = ReaderHost::new(store, bookshelf, sessions, config.import_timeout);

    let command = match cli_args.command {
        Command::OpenLocal { path, source_key } => HostCommand::OpenLocal { path, source_key },
        Command::OpenRemote { url, source_key } => HostCommand::OpenRemote { url, source_key },
    };

    let reply = host.handle(command).await;
    let outcome = match &reply {
        HostReply::Opened { book_id } => {
            info!("Opened book {}", book_id);
            Ok(())
        }
        HostReply::Closed => Ok(()),
        HostReply::Error { code, message } => {
            error!("Command failed [{}]: {}", code, message);
            Err(anyhow::anyhow!("{}: {}", code, message))
        }
    };
    println!("{}", serde_json::to_string_pretty(&reply)?);

    // Persist any in-memory session state before exiting
    if let Err(e) = host.close_all().await {
        error!("Teardown failed: {}", e);
    }

    outcome
}
