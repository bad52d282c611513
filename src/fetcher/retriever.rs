//! Publication retriever: fetches sources into the library directory.
//!
//! Local sources are copied into the library; remote sources are streamed to
//! the downloads directory first, then moved in. Media types are detected by
//! magic-byte sniffing with an extension fallback. No publication internals
//! are parsed here.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;
use uuid::Uuid;

use super::models::{
    FetchError, LocalAsset, SourceDescriptor, MEDIA_TYPE_BINARY, MEDIA_TYPE_EPUB, MEDIA_TYPE_PDF,
};

/// Trait for fetching a source descriptor into a validated local asset.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, source: &SourceDescriptor) -> Result<LocalAsset, FetchError>;
}

/// Default fetcher: filesystem copy for local sources, HTTP download for
/// remote ones.
pub struct PublicationRetriever {
    client: reqwest::Client,
    library_dir: PathBuf,
    downloads_dir: PathBuf,
}

impl PublicationRetriever {
    pub fn new(
        client: reqwest::Client,
        library_dir: impl Into<PathBuf>,
        downloads_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client,
            library_dir: library_dir.into(),
            downloads_dir: downloads_dir.into(),
        }
    }

    /// Create the library and downloads directories.
    pub async fn init(&self) -> Result<(), FetchError> {
        fs::create_dir_all(&self.library_dir).await?;
        fs::create_dir_all(&self.downloads_dir).await?;
        Ok(())
    }

    async fn fetch_local(&self, source_path: &Path) -> Result<LocalAsset, FetchError> {
        let metadata = fs::metadata(source_path)
            .await
            .map_err(|_| FetchError::NotFound(source_path.display().to_string()))?;
        if !metadata.is_file() {
            return Err(FetchError::NotFound(source_path.display().to_string()));
        }

        let extension = source_path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        let dest = self.library_path(extension.as_deref());
        fs::copy(source_path, &dest).await?;

        let media_type = sniff_media_type(&dest, extension.as_deref()).await?;
        debug!("Copied {:?} into library as {:?} ({})", source_path, dest, media_type);
        Ok(LocalAsset {
            path: dest,
            media_type,
        })
    }

    async fn fetch_remote(&self, url: &reqwest::Url) -> Result<LocalAsset, FetchError> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(FetchError::BadStatus(status.as_u16()));
        }

        // Stream the body into the downloads dir, then move it into the
        // library once complete so the library never holds partial files.
        let temp_path = self.downloads_dir.join(format!("{}.part", Uuid::new_v4()));
        let mut file = fs::File::create(&temp_path).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        drop(file);

        let extension = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .and_then(|name| Path::new(name).extension().and_then(|e| e.to_str()))
            .map(|e| e.to_ascii_lowercase());
        let media_type = sniff_media_type(&temp_path, extension.as_deref()).await?;

        let dest = self.library_path(extension_for_media_type(&media_type).or(extension.as_deref()));
        fs::rename(&temp_path, &dest).await?;

        debug!("Downloaded {} into library as {:?} ({})", url, dest, media_type);
        Ok(LocalAsset {
            path: dest,
            media_type,
        })
    }

    fn library_path(&self, extension: Option<&str>) -> PathBuf {
        let name = match extension {
            Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
            None => Uuid::new_v4().to_string(),
        };
        self.library_dir.join(name)
    }
}

#[async_trait]
impl Fetcher for PublicationRetriever {
    async fn fetch(&self, source: &SourceDescriptor) -> Result<LocalAsset, FetchError> {
        match source {
            SourceDescriptor::Local(path) => self.fetch_local(path).await,
            SourceDescriptor::Remote(url) => self.fetch_remote(url).await,
        }
    }
}

/// Detect the media type of a file from its magic bytes, falling back to the
/// source extension when sniffing is inconclusive.
async fn sniff_media_type(path: &Path, extension: Option<&str>) -> Result<String, FetchError> {
    let mut head = [0u8; 512];
    let mut file = fs::File::open(path).await?;
    let mut read = 0;
    while read < head.len() {
        let n = file.read(&mut head[read..]).await?;
        if n == 0 {
            break;
        }
        read += n;
    }

    let sniffed = infer::get(&head[..read]).map(|t| t.mime_type());
    let media_type = match sniffed {
        Some(MEDIA_TYPE_EPUB) => MEDIA_TYPE_EPUB,
        Some(MEDIA_TYPE_PDF) => MEDIA_TYPE_PDF,
        // A zip container without a leading mimetype entry may still be an
        // EPUB; trust the extension in that case.
        Some("application/zip") if extension == Some("epub") => MEDIA_TYPE_EPUB,
        _ => extension
            .and_then(media_type_for_extension)
            .unwrap_or(MEDIA_TYPE_BINARY),
    };
    Ok(media_type.to_string())
}

fn media_type_for_extension(extension: &str) -> Option<&'static str> {
    match extension {
        "epub" => Some(MEDIA_TYPE_EPUB),
        "pdf" => Some(MEDIA_TYPE_PDF),
        _ => None,
    }
}

fn extension_for_media_type(media_type: &str) -> Option<&'static str> {
    match media_type {
        MEDIA_TYPE_EPUB => Some("epub"),
        MEDIA_TYPE_PDF => Some("pdf"),
        _ => None,
    }
}
