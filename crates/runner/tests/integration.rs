use std::collections::HashMap;
use std::path::Path as FsPath;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use mealie_backup_core::{content_hash, DownloadedArtifact};
use mealie_backup_runner::{run_once, Config, ConfigError, RunOptions};
use mealie_backup_source::{MealieClient, SourceConfig};
use mealie_backup_storage::{UploadError, UploadReceipt, UploadTarget, WebDavConfig, WebDavTarget};

const ARCHIVE: &[u8] = b"PK\x03\x04 mealie backup with recipes and images";
const BACKUP_NAME: &str = "mealie_2026.10.16.02.00.00.zip";

#[derive(Default)]
struct Fake {
    healthy: bool,
    reject_upload: bool,
    fail_delete: bool,
    backups: Vec<String>,
    deleted: Vec<String>,
    requests: Vec<&'static str>,
    uploads: Vec<(String, Vec<u8>)>,
}

type Shared = Arc<Mutex<Fake>>;

async fn about(State(state): State<Shared>) -> StatusCode {
    let mut state = state.lock().unwrap();
    state.requests.push("health");
    if state.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn list(State(state): State<Shared>) -> Json<serde_json::Value> {
    let mut state = state.lock().unwrap();
    state.requests.push("list");
    let imports: Vec<_> = state
        .backups
        .iter()
        .map(|n| serde_json::json!({"name": n}))
        .collect();
    Json(serde_json::json!({"imports": imports}))
}

async fn create(State(state): State<Shared>) -> StatusCode {
    let mut state = state.lock().unwrap();
    state.requests.push("create");
    state.backups.insert(0, BACKUP_NAME.to_owned());
    StatusCode::CREATED
}

async fn token(Path(name): Path<String>, State(state): State<Shared>) -> Json<serde_json::Value> {
    state.lock().unwrap().requests.push("token");
    Json(serde_json::json!({"fileToken": format!("tok-{name}")}))
}

async fn delete(Path(name): Path<String>, State(state): State<Shared>) -> StatusCode {
    let mut state = state.lock().unwrap();
    state.requests.push("delete");
    if state.fail_delete {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    state.backups.retain(|n| n != &name);
    state.deleted.push(name);
    StatusCode::OK
}

async fn download(
    Query(params): Query<HashMap<String, String>>,
    State(state): State<Shared>,
) -> Response {
    state.lock().unwrap().requests.push("download");
    let name = params
        .get("token")
        .and_then(|t| t.strip_prefix("tok-"))
        .unwrap_or("unknown.zip")
        .to_owned();
    (
        [(header::CONTENT_DISPOSITION, format!("attachment; filename=\"{name}\""))],
        ARCHIVE.to_vec(),
    )
        .into_response()
}

async fn dav_put(Path(rest): Path<String>, State(state): State<Shared>, body: Bytes) -> StatusCode {
    let mut state = state.lock().unwrap();
    state.requests.push("upload");
    if state.reject_upload {
        return StatusCode::INSUFFICIENT_STORAGE;
    }
    state.uploads.push((rest, body.to_vec()));
    StatusCode::CREATED
}

struct TestServer {
    base_url: String,
    state: Shared,
    _handle: tokio::task::JoinHandle<()>,
}

async fn start_server(fake: Fake) -> TestServer {
    let state = Arc::new(Mutex::new(fake));
    let app = Router::new()
        .route("/api/app/about", get(about))
        .route("/api/admin/backups", get(list).post(create))
        .route("/api/admin/backups/{name}", get(token).delete(delete))
        .route("/api/utils/download", get(download))
        .route("/remote.php/dav/files/{*rest}", put(dav_put))
        .with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    TestServer {
        base_url: format!("http://{addr}"),
        state,
        _handle: handle,
    }
}

fn source_for(base_url: &str) -> MealieClient {
    MealieClient::new(SourceConfig {
        base_url: base_url.to_owned(),
        backup_path: "api/admin/backups".into(),
        health_path: "api/app/about".into(),
        download_path: "api/utils/download?token=".into(),
        auth_token: "token".into(),
        transfer_timeout: Duration::from_secs(10),
    })
    .unwrap()
}

fn webdav_for(base_url: &str) -> WebDavTarget {
    WebDavTarget::new(WebDavConfig {
        base_url: base_url.to_owned(),
        webdav_path: "remote.php/dav/files".into(),
        user: "alice".into(),
        password: "s3cret".into(),
        remote_dir: "Mealie".into(),
        timeout: Duration::from_secs(10),
    })
    .unwrap()
}

fn options(dir: &FsPath) -> RunOptions {
    RunOptions {
        staging_dir: dir.to_path_buf(),
        prune_existing: true,
        keep_local: false,
    }
}

/// Records what it was asked to upload without touching the network.
#[derive(Default)]
struct RecordingTarget {
    calls: Mutex<Vec<DownloadedArtifact>>,
}

#[async_trait::async_trait]
impl UploadTarget for RecordingTarget {
    fn describe(&self) -> String {
        "memory".into()
    }

    async fn upload(&self, artifact: &DownloadedArtifact) -> Result<UploadReceipt, UploadError> {
        let bytes = std::fs::read(&artifact.path).unwrap();
        self.calls.lock().unwrap().push(artifact.clone());
        Ok(UploadReceipt {
            url: format!("memory://{}", artifact.file_name),
            status: 201,
            bytes_sent: bytes.len() as u64,
            sha256: content_hash(&bytes),
        })
    }
}

/// Takes the staged file away while "uploading" it, so cleanup has nothing to remove.
struct ConsumingTarget;

#[async_trait::async_trait]
impl UploadTarget for ConsumingTarget {
    fn describe(&self) -> String {
        "consuming".into()
    }

    async fn upload(&self, artifact: &DownloadedArtifact) -> Result<UploadReceipt, UploadError> {
        let bytes = std::fs::read(&artifact.path).unwrap();
        std::fs::remove_file(&artifact.path).unwrap();
        Ok(UploadReceipt {
            url: format!("memory://{}", artifact.file_name),
            status: 201,
            bytes_sent: bytes.len() as u64,
            sha256: content_hash(&bytes),
        })
    }
}

#[tokio::test]
async fn full_run_uploads_the_downloaded_bytes() {
    let srv = start_server(Fake {
        healthy: true,
        backups: vec!["old-1.zip".into(), "old-2.zip".into()],
        ..Default::default()
    })
    .await;
    let staging = tempfile::tempdir().unwrap();

    let report = run_once(
        &source_for(&srv.base_url),
        &webdav_for(&srv.base_url),
        &options(staging.path()),
    )
    .await
    .unwrap();

    assert_eq!(report.backup_name, BACKUP_NAME);
    assert_eq!(report.pruned, 2);
    assert_eq!(report.artifact.sha256, content_hash(ARCHIVE));
    assert_eq!(report.receipt.sha256, report.artifact.sha256);
    assert_eq!(report.receipt.status, 201);
    assert!(!report.artifact.path.exists(), "staged file should be removed");

    let state = srv.state.lock().unwrap();
    assert_eq!(state.deleted, vec!["old-1.zip", "old-2.zip"]);
    assert_eq!(state.uploads.len(), 1);
    assert_eq!(state.uploads[0].0, format!("alice/Mealie/{BACKUP_NAME}"));
    assert_eq!(state.uploads[0].1, ARCHIVE);
    assert_eq!(state.requests.first(), Some(&"health"));
    assert_eq!(state.requests.last(), Some(&"upload"));
}

#[tokio::test]
async fn healthy_endpoint_proceeds_to_download() {
    let srv = start_server(Fake {
        healthy: true,
        ..Default::default()
    })
    .await;
    let staging = tempfile::tempdir().unwrap();
    let target = RecordingTarget::default();

    run_once(&source_for(&srv.base_url), &target, &options(staging.path()))
        .await
        .unwrap();

    assert!(srv.state.lock().unwrap().requests.contains(&"download"));
    assert_eq!(target.calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn unhealthy_endpoint_aborts_before_download_and_upload() {
    let srv = start_server(Fake {
        healthy: false,
        ..Default::default()
    })
    .await;
    let staging = tempfile::tempdir().unwrap();
    let target = RecordingTarget::default();

    let err = run_once(&source_for(&srv.base_url), &target, &options(staging.path()))
        .await
        .unwrap_err();

    assert!(format!("{err:#}").contains("503"), "{err:#}");
    assert_eq!(srv.state.lock().unwrap().requests, vec!["health"]);
    assert!(target.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unreachable_endpoint_aborts_the_run() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let staging = tempfile::tempdir().unwrap();
    let target = RecordingTarget::default();

    let err = run_once(
        &source_for(&format!("http://{addr}")),
        &target,
        &options(staging.path()),
    )
    .await
    .unwrap_err();

    assert!(err.to_string().contains("health check failed"));
    assert!(target.calls.lock().unwrap().is_empty());
    assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn keep_local_leaves_the_artifact_in_place() {
    let srv = start_server(Fake {
        healthy: true,
        ..Default::default()
    })
    .await;
    let staging = tempfile::tempdir().unwrap();
    let opts = RunOptions {
        keep_local: true,
        ..options(staging.path())
    };

    let report = run_once(&source_for(&srv.base_url), &webdav_for(&srv.base_url), &opts)
        .await
        .unwrap();

    assert_eq!(std::fs::read(&report.artifact.path).unwrap(), ARCHIVE);
}

#[tokio::test]
async fn prune_disabled_keeps_existing_server_backups() {
    let srv = start_server(Fake {
        healthy: true,
        backups: vec!["keep-me.zip".into()],
        ..Default::default()
    })
    .await;
    let staging = tempfile::tempdir().unwrap();
    let opts = RunOptions {
        prune_existing: false,
        ..options(staging.path())
    };

    let report = run_once(&source_for(&srv.base_url), &webdav_for(&srv.base_url), &opts)
        .await
        .unwrap();

    assert_eq!(report.pruned, 0);
    assert_eq!(report.backup_name, BACKUP_NAME);
    let state = srv.state.lock().unwrap();
    assert!(state.deleted.is_empty());
    assert!(state.backups.contains(&"keep-me.zip".to_owned()));
}

#[tokio::test]
async fn rejected_upload_fails_the_run_and_cleans_staging() {
    let srv = start_server(Fake {
        healthy: true,
        reject_upload: true,
        ..Default::default()
    })
    .await;
    let staging = tempfile::tempdir().unwrap();

    let err = run_once(
        &source_for(&srv.base_url),
        &webdav_for(&srv.base_url),
        &options(staging.path()),
    )
    .await
    .unwrap_err();

    assert!(format!("{err:#}").contains("507"), "{err:#}");
    assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn failed_prune_aborts_before_create_and_upload() {
    let srv = start_server(Fake {
        healthy: true,
        fail_delete: true,
        backups: vec!["old-1.zip".into()],
        ..Default::default()
    })
    .await;
    let staging = tempfile::tempdir().unwrap();

    let err = run_once(
        &source_for(&srv.base_url),
        &webdav_for(&srv.base_url),
        &options(staging.path()),
    )
    .await
    .unwrap_err();

    assert!(err.to_string().contains("removing existing server backups"), "{err:#}");
    assert!(format!("{err:#}").contains("500"), "{err:#}");
    let state = srv.state.lock().unwrap();
    assert_eq!(state.requests, vec!["health", "list", "delete"]);
    assert!(state.uploads.is_empty());
}

#[tokio::test]
async fn failed_staging_cleanup_does_not_fail_the_run() {
    let srv = start_server(Fake {
        healthy: true,
        ..Default::default()
    })
    .await;
    let staging = tempfile::tempdir().unwrap();

    let report = run_once(&source_for(&srv.base_url), &ConsumingTarget, &options(staging.path()))
        .await
        .unwrap();

    assert_eq!(report.backup_name, BACKUP_NAME);
    assert_eq!(report.receipt.sha256, content_hash(ARCHIVE));
    assert!(!report.artifact.path.exists());
}

#[test]
fn missing_configuration_fails_before_any_request() {
    let secrets = tempfile::tempdir().unwrap();
    let env: HashMap<String, String> = [
        ("MEALIE_BACKUP_SECRETS_DIR", secrets.path().to_str().unwrap()),
        ("MEALIE_BASE_URL_TS", "http://127.0.0.1:9"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_owned(), v.to_owned()))
    .collect();

    let err = Config::resolve(&env).unwrap_err();
    assert!(matches!(err, ConfigError::Missing("MEALIE_AUTH_TOKEN")));
}
