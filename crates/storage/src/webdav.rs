use std::io::ErrorKind;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::StreamExt;
use mealie_backup_core::{build_url, excerpt, ContentHasher, DownloadedArtifact};
use reqwest::header::CONTENT_LENGTH;
use reqwest::Body;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

use crate::target::{UploadError, UploadReceipt, UploadTarget};

/// Nextcloud (or any WebDAV server) upload settings.
#[derive(Clone)]
pub struct WebDavConfig {
    pub base_url: String,
    pub webdav_path: String,
    pub user: String,
    pub password: String,
    pub remote_dir: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for WebDavConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebDavConfig")
            .field("base_url", &self.base_url)
            .field("webdav_path", &self.webdav_path)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("remote_dir", &self.remote_dir)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct WebDavTarget {
    http: reqwest::Client,
    config: WebDavConfig,
}

impl WebDavTarget {
    pub fn new(config: WebDavConfig) -> Result<Self, UploadError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("mealie-backup/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(UploadError::Client)?;
        Ok(Self { http, config })
    }

    /// Directory URL uploads land in: `<base>/<webdav_path>/<user>/<remote_dir>`.
    fn collection_url(&self) -> String {
        build_url([
            self.config.base_url.as_str(),
            self.config.webdav_path.as_str(),
            self.config.user.as_str(),
            self.config.remote_dir.as_str(),
        ])
    }

    pub fn destination(&self, file_name: &str) -> String {
        build_url([self.collection_url().as_str(), file_name])
    }
}

#[async_trait::async_trait]
impl UploadTarget for WebDavTarget {
    fn describe(&self) -> String {
        self.collection_url()
    }

    async fn upload(&self, artifact: &DownloadedArtifact) -> Result<UploadReceipt, UploadError> {
        let staged = digest_file(&artifact.path).await?;
        let size = staged.bytes_seen();
        let digest = staged.finish();
        if digest != artifact.sha256 {
            return Err(UploadError::Integrity {
                expected: artifact.sha256.clone(),
                actual: digest,
            });
        }

        let url = self.destination(&artifact.file_name);
        info!(name = %artifact.file_name, %url, bytes = size, "uploading backup");

        // The body is streamed from disk; the digest of what actually went out
        // is collected as chunks pass through.
        let sent = Arc::new(Mutex::new(ContentHasher::new()));
        let tap = Arc::clone(&sent);
        let stream = ReaderStream::new(open_staged(&artifact.path).await?).inspect(move |chunk| {
            if let Ok(bytes) = chunk {
                tap.lock().unwrap_or_else(PoisonError::into_inner).update(bytes);
            }
        });

        let resp = self
            .http
            .put(&url)
            .basic_auth(&self.config.user, Some(&self.config.password))
            .header("X-Requested-With", "XMLHttpRequest")
            .header(CONTENT_LENGTH, size)
            .timeout(self.config.timeout)
            .body(Body::wrap_stream(stream))
            .send()
            .await
            .map_err(|source| UploadError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(%status, %url, "upload rejected");
            return Err(UploadError::Status {
                url,
                status,
                body: excerpt(&body, 200).to_owned(),
            });
        }

        let sent = std::mem::take(&mut *sent.lock().unwrap_or_else(PoisonError::into_inner));
        let bytes_sent = sent.bytes_seen();
        let sha256 = sent.finish();
        if sha256 != artifact.sha256 {
            return Err(UploadError::Integrity {
                expected: artifact.sha256.clone(),
                actual: sha256,
            });
        }

        info!(name = %artifact.file_name, %status, "upload successful");
        Ok(UploadReceipt {
            url,
            status: status.as_u16(),
            bytes_sent,
            sha256,
        })
    }
}

async fn open_staged(path: &Path) -> Result<File, UploadError> {
    File::open(path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => UploadError::MissingLocalFile(path.to_path_buf()),
        _ => UploadError::Io {
            path: path.to_path_buf(),
            source: e,
        },
    })
}

async fn digest_file(path: &Path) -> Result<ContentHasher, UploadError> {
    let mut chunks = ReaderStream::new(open_staged(path).await?);
    let mut hasher = ContentHasher::new();
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.map_err(|source| UploadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        hasher.update(&chunk);
    }
    Ok(hasher)
}
