use std::path::Path;

use chrono::Local;
use mealie_backup_core::{
    artifact_name_from_disposition, build_url, excerpt, fallback_artifact_name, BackupListing,
    ContentHasher, DownloadedArtifact, FileTokenResponse,
};
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::{SourceConfig, SourceError, API_TIMEOUT, HEALTH_TIMEOUT};

type Result<T> = std::result::Result<T, SourceError>;

/// Client for the parts of the Mealie REST API a backup run needs.
#[derive(Debug, Clone)]
pub struct MealieClient {
    http: reqwest::Client,
    config: SourceConfig,
    backup_url: String,
    health_url: String,
    download_url: String,
}

impl MealieClient {
    pub fn new(config: SourceConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("mealie-backup/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(SourceError::Client)?;
        Ok(Self::with_http(http, config))
    }

    fn with_http(http: reqwest::Client, config: SourceConfig) -> Self {
        let backup_url = build_url([&config.base_url, &config.backup_path]);
        let health_url = build_url([&config.base_url, &config.health_path]);
        let download_url = build_url([&config.base_url, &config.download_path]);
        Self {
            http,
            config,
            backup_url,
            health_url,
            download_url,
        }
    }

    /// Unauthenticated reachability check against the health endpoint.
    pub async fn health_check(&self) -> Result<StatusCode> {
        let req = self.http.get(&self.health_url).timeout(HEALTH_TIMEOUT);
        let resp = send("health check", req).await?;
        let status = resp.status();
        info!(%status, url = %self.health_url, "health check succeeded");
        Ok(status)
    }

    pub async fn list_backups(&self) -> Result<BackupListing> {
        let req = self.authorized(self.http.get(&self.backup_url));
        let resp = send("list backups", req).await?;
        let listing: BackupListing = decode("list backups", resp).await?;
        debug!(count = listing.len(), "fetched backup listing");
        Ok(listing)
    }

    pub async fn delete_backup(&self, name: &str) -> Result<()> {
        let url = build_url([self.backup_url.as_str(), name]);
        send("delete backup", self.authorized(self.http.delete(url))).await?;
        info!(name, "deleted backup on server");
        Ok(())
    }

    /// Deletes every backup currently stored on the server.
    pub async fn prune_backups(&self) -> Result<usize> {
        let listing = self.list_backups().await?;
        if listing.is_empty() {
            debug!("no server backups to prune");
            return Ok(0);
        }
        info!(found = listing.len(), "pruning existing server backups");
        let mut deleted = 0;
        for name in listing.names() {
            self.delete_backup(name).await?;
            deleted += 1;
        }
        Ok(deleted)
    }

    /// Asks the server for a new backup and returns its name.
    pub async fn create_backup(&self) -> Result<String> {
        let before = self.list_backups().await?;
        send("create backup", self.authorized(self.http.post(&self.backup_url))).await?;
        let after = self.list_backups().await?;
        let name = after
            .newest_new_since(&before)
            .ok_or(SourceError::NoBackupCreated)?
            .to_owned();
        info!(name = %name, "backup created");
        Ok(name)
    }

    /// Fetches the short-lived token that authorizes downloading `name`.
    pub async fn file_token(&self, name: &str) -> Result<String> {
        let url = build_url([self.backup_url.as_str(), name]);
        let resp = send("file token", self.authorized(self.http.get(url))).await?;
        let body: FileTokenResponse = decode("file token", resp).await?;
        let token = body
            .file_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SourceError::MissingFileToken(name.to_owned()))?;
        debug!(name, token = %token, "file token retrieved");
        Ok(token)
    }

    /// Downloads the backup behind `token` into `dir`.
    pub async fn download(&self, token: &str, dir: &Path) -> Result<DownloadedArtifact> {
        let url = format!("{}{}", self.download_url, token);
        let req = self
            .authorized(self.http.get(url))
            .timeout(self.config.transfer_timeout);
        let resp = send("download backup", req).await?;

        let file_name = resp
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(artifact_name_from_disposition)
            .unwrap_or_else(|| fallback_artifact_name(Local::now()));

        let path = dir.join(&file_name);
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| SourceError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        let written = match write_body(resp, &path).await {
            Ok(hasher) => hasher,
            Err(e) => {
                let _ = tokio::fs::remove_file(&path).await;
                return Err(e);
            }
        };

        let artifact = DownloadedArtifact {
            file_name,
            path,
            size_bytes: written.bytes_seen(),
            sha256: written.finish(),
        };
        info!(
            name = %artifact.file_name,
            bytes = artifact.size_bytes,
            sha256 = %artifact.sha256,
            "downloaded backup"
        );
        Ok(artifact)
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        req.bearer_auth(&self.config.auth_token)
            .header(CONTENT_TYPE, "application/json")
            .timeout(API_TIMEOUT)
    }
}

async fn send(op: &'static str, req: RequestBuilder) -> Result<Response> {
    let resp = req
        .send()
        .await
        .map_err(|source| SourceError::Transport { op, source })?;
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(SourceError::Status {
        op,
        status,
        body: excerpt(&body, 200).to_owned(),
    })
}

/// Streams the response body to `path`, hashing it on the way.
async fn write_body(mut resp: Response, path: &Path) -> Result<ContentHasher> {
    let io_err = |source: std::io::Error| SourceError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::create(path).await.map_err(io_err)?;
    let mut hasher = ContentHasher::new();
    while let Some(chunk) = resp
        .chunk()
        .await
        .map_err(|source| SourceError::Decode {
            op: "download backup",
            source,
        })?
    {
        hasher.update(&chunk);
        file.write_all(&chunk).await.map_err(io_err)?;
    }
    file.flush().await.map_err(io_err)?;
    Ok(hasher)
}

async fn decode<T: DeserializeOwned>(op: &'static str, resp: Response) -> Result<T> {
    resp.json()
        .await
        .map_err(|source| SourceError::Decode { op, source })
}
