//! Common test infrastructure
//!
//! Builds the full host graph (catalog store, retriever, bookshelf, session
//! repository) on top of a temporary directory. Tests only import from this
//! module.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use folio_reader_host::bookshelf::Bookshelf;
use folio_reader_host::catalog_store::SqliteCatalogStore;
use folio_reader_host::fetcher::{FetchError, Fetcher, LocalAsset, PublicationRetriever, SourceDescriptor};
use folio_reader_host::host::ReaderHost;
use folio_reader_host::session::{FsAssetOpener, SessionRepository};

pub struct TestHost {
    pub host: ReaderHost,
    pub store: Arc<SqliteCatalogStore>,
    pub dir: TempDir,
}

impl TestHost {
    /// Full graph with real collaborators and generous timeouts.
    pub async fn spawn() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let retriever = PublicationRetriever::new(
            reqwest::Client::new(),
            dir.path().join("library"),
            dir.path().join("downloads"),
        );
        retriever.init().await.unwrap();
        Self::build(dir, Duration::from_secs(30), Arc::new(retriever)).await
    }

    /// Full graph with the fetcher swapped out and a custom import timeout.
    /// The factory receives the library directory assets must land in.
    pub async fn spawn_with<F>(import_timeout: Duration, fetcher: F) -> Self
    where
        F: FnOnce(&PathBuf) -> Arc<dyn Fetcher>,
    {
        let dir = tempfile::tempdir().unwrap();
        let library_dir = dir.path().join("library");
        std::fs::create_dir_all(&library_dir).unwrap();
        let fetcher = fetcher(&library_dir);
        Self::build(dir, import_timeout, fetcher).await
    }

    async fn build(dir: TempDir, import_timeout: Duration, fetcher: Arc<dyn Fetcher>) -> Self {
        let library_dir = dir.path().join("library");
        std::fs::create_dir_all(&library_dir).unwrap();
        let store = Arc::new(SqliteCatalogStore::new(dir.path().join("catalog.db")).unwrap());

        let bookshelf = Arc::new(Bookshelf::new(store.clone(), fetcher));
        let sessions = Arc::new(SessionRepository::new(
            store.clone(),
            Arc::new(FsAssetOpener::new(library_dir)),
            Duration::ZERO,
        ));
        let host = ReaderHost::new(store.clone(), bookshelf, sessions, import_timeout);
        Self { host, store, dir }
    }

    /// Drop a minimal-but-valid EPUB file somewhere outside the library.
    pub fn write_epub(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, fake_epub_bytes()).unwrap();
        path
    }
}

/// Smallest byte sequence that magic-byte sniffing accepts as an EPUB: a zip
/// local-file header whose first entry is named "mimetype" with the EPUB
/// media type at offset 30.
pub fn fake_epub_bytes() -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"PK\x03\x04");
    bytes.extend_from_slice(&[0u8; 22]);
    bytes.extend_from_slice(&[8, 0, 0, 0]);
    bytes.extend_from_slice(b"mimetype");
    bytes.extend_from_slice(b"application/epub+zip");
    bytes
}

/// A fetcher that never completes within any reasonable test timeout.
pub struct StalledFetcher;

#[async_trait]
impl Fetcher for StalledFetcher {
    async fn fetch(&self, _source: &SourceDescriptor) -> Result<LocalAsset, FetchError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(FetchError::NotFound("stalled".to_string()))
    }
}

/// A fetcher that copies the source into the library after a fixed delay.
pub struct DelayedFetcher {
    pub delay: Duration,
    pub library_dir: PathBuf,
}

#[async_trait]
impl Fetcher for DelayedFetcher {
    async fn fetch(&self, source: &SourceDescriptor) -> Result<LocalAsset, FetchError> {
        tokio::time::sleep(self.delay).await;
        let source_path = match source {
            SourceDescriptor::Local(path) => path.clone(),
            SourceDescriptor::Remote(url) => {
                return Err(FetchError::NotFound(url.to_string()));
            }
        };
        let dest = self.library_dir.join(
            source_path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "asset.epub".to_string()),
        );
        tokio::fs::copy(&source_path, &dest).await?;
        Ok(LocalAsset {
            path: dest,
            media_type: "application/epub+zip".to_string(),
        })
    }
}

/// Serve `body` to the first HTTP request on an ephemeral port, then stop.
/// Returns the URL to request.
pub async fn serve_once(path: &str, body: Vec<u8>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 1024];
        let _ = socket.read(&mut request).await;
        let header = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nContent-Type: application/octet-stream\r\nConnection: close\r\n\r\n",
            body.len()
        );
        socket.write_all(header.as_bytes()).await.unwrap();
        socket.write_all(&body).await.unwrap();
        socket.shutdown().await.unwrap();
    });
    format!("http://{}{}", addr, path)
}

#[allow(dead_code)]
pub fn test_locator(progression: f64) -> folio_reader_host::catalog_store::Locator {
    folio_reader_host::catalog_store::Locator {
        href: "ch1.xhtml".to_string(),
        media_type: "application/xhtml+xml".to_string(),
        progression,
        position: None,
        total_progression: None,
        fragment: None,
    }
}
