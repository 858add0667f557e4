use anyhow::{bail, Context, Result};
use mealie_backup_core::DownloadedArtifact;
use mealie_backup_source::MealieClient;
use mealie_backup_storage::{UploadReceipt, UploadTarget};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::RunOptions;

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub backup_name: String,
    pub pruned: usize,
    pub artifact: DownloadedArtifact,
    pub receipt: UploadReceipt,
}

/// Performs one backup: health check, optional prune, create, download, upload.
///
/// Steps run strictly in order and the first failure aborts the run. The
/// staged file is removed afterwards unless `keep_local` is set.
pub async fn run_once(
    source: &MealieClient,
    target: &dyn UploadTarget,
    options: &RunOptions,
) -> Result<RunReport> {
    let run_id = Uuid::new_v4();
    let span = info_span!("backup_run", %run_id);
    run_steps(run_id, source, target, options)
        .instrument(span)
        .await
}

async fn run_steps(
    run_id: Uuid,
    source: &MealieClient,
    target: &dyn UploadTarget,
    options: &RunOptions,
) -> Result<RunReport> {
    info!(destination = %target.describe(), "starting backup run");

    source
        .health_check()
        .await
        .context("health check failed, aborting backup")?;

    let pruned = if options.prune_existing {
        source
            .prune_backups()
            .await
            .context("removing existing server backups")?
    } else {
        0
    };

    let backup_name = source.create_backup().await.context("creating backup")?;
    let token = source
        .file_token(&backup_name)
        .await
        .with_context(|| format!("fetching download token for {backup_name}"))?;
    let artifact = source
        .download(&token, &options.staging_dir)
        .await
        .with_context(|| format!("downloading {backup_name}"))?;

    let uploaded = target.upload(&artifact).await;
    if !options.keep_local {
        discard(&artifact).await;
    }
    let receipt = uploaded.with_context(|| format!("uploading {}", artifact.file_name))?;

    if receipt.sha256 != artifact.sha256 || receipt.bytes_sent != artifact.size_bytes {
        bail!(
            "uploaded bytes differ from download ({} bytes, sha256 {}) vs ({} bytes, sha256 {})",
            receipt.bytes_sent,
            receipt.sha256,
            artifact.size_bytes,
            artifact.sha256
        );
    }

    info!(
        name = %backup_name,
        pruned,
        bytes = artifact.size_bytes,
        sha256 = %receipt.sha256,
        url = %receipt.url,
        "backup run complete"
    );
    Ok(RunReport {
        run_id,
        backup_name,
        pruned,
        artifact,
        receipt,
    })
}

async fn discard(artifact: &DownloadedArtifact) {
    if let Err(e) = tokio::fs::remove_file(&artifact.path).await {
        warn!(path = ?artifact.path, error = %e, "could not remove staged backup");
    }
}
