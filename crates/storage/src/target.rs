use std::path::PathBuf;

use mealie_backup_core::DownloadedArtifact;
use reqwest::StatusCode;
use thiserror::Error;

/// Proof that an artifact reached remote storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub url: String,
    pub status: u16,
    pub bytes_sent: u64,
    /// Digest of the exact bytes that were sent.
    pub sha256: String,
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("building http client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("local file does not exist: {0:?}")]
    MissingLocalFile(PathBuf),
    #[error("reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("staged file changed since download (expected sha256 {expected}, found {actual})")]
    Integrity { expected: String, actual: String },
    #[error("upload request to {url} failed: {source}")]
    Transport { url: String, source: reqwest::Error },
    #[error("upload to {url} returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },
}

/// A remote location backups are pushed to.
#[async_trait::async_trait]
pub trait UploadTarget: Send + Sync {
    /// Human-readable destination for logs, without credentials.
    fn describe(&self) -> String;

    /// Uploads the staged artifact, verifying it still matches its recorded digest.
    async fn upload(&self, artifact: &DownloadedArtifact) -> Result<UploadReceipt, UploadError>;
}
