use std::path::PathBuf;
use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

mod client;

pub use client::MealieClient;

pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);
pub const API_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for one Mealie instance.
#[derive(Clone)]
pub struct SourceConfig {
    pub base_url: String,
    pub backup_path: String,
    pub health_path: String,
    pub download_path: String,
    pub auth_token: String,
    pub transfer_timeout: Duration,
}

impl std::fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceConfig")
            .field("base_url", &self.base_url)
            .field("backup_path", &self.backup_path)
            .field("health_path", &self.health_path)
            .field("download_path", &self.download_path)
            .field("auth_token", &"<redacted>")
            .field("transfer_timeout", &self.transfer_timeout)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("building http client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("{op} request failed: {source}")]
    Transport {
        op: &'static str,
        source: reqwest::Error,
    },
    #[error("{op} returned HTTP {status}: {body}")]
    Status {
        op: &'static str,
        status: StatusCode,
        body: String,
    },
    #[error("{op} returned an unreadable body: {source}")]
    Decode {
        op: &'static str,
        source: reqwest::Error,
    },
    #[error("no backup listed after requesting a new one")]
    NoBackupCreated,
    #[error("no file token returned for backup {0}")]
    MissingFileToken(String),
    #[error("writing artifact {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl SourceError {
    /// HTTP status of the failed response, if the server answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
