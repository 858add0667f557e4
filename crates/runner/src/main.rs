use std::process::ExitCode;

use anyhow::{Context, Result};
use mealie_backup_runner::logging::{self, LogConfig};
use mealie_backup_runner::{run_once, Config, RunReport};
use mealie_backup_source::MealieClient;
use mealie_backup_storage::WebDavTarget;
use tracing::{error, info};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    logging::init(LogConfig::from_env());

    match execute().await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "backup run failed");
            ExitCode::FAILURE
        }
    }
}

async fn execute() -> Result<RunReport> {
    let config = Config::from_env().context("loading configuration")?;
    info!(?config, "configuration loaded");

    let source = MealieClient::new(config.source.clone()).context("creating mealie client")?;
    let target = WebDavTarget::new(config.webdav.clone()).context("creating webdav client")?;
    run_once(&source, &target, &config.options).await
}
