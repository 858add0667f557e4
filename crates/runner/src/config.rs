use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use mealie_backup_source::SourceConfig;
use mealie_backup_storage::WebDavConfig;
use serde::Deserialize;
use thiserror::Error;

pub const SECRETS_DIR_VAR: &str = "MEALIE_BACKUP_SECRETS_DIR";
pub const CONFIG_FILE_VAR: &str = "MEALIE_BACKUP_CONFIG";
pub const DEFAULT_SECRETS_DIR: &str = "/run/secrets";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
    #[error("reading {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parsing config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Options that shape a run but are not tied to either endpoint.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub staging_dir: PathBuf,
    pub prune_existing: bool,
    pub keep_local: bool,
}

/// Fully resolved settings for one backup run.
#[derive(Debug, Clone)]
pub struct Config {
    pub source: SourceConfig,
    pub webdav: WebDavConfig,
    pub options: RunOptions,
}

/// Optional TOML file layered beneath env vars and secret files.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    pub mealie: MealieFileConfig,
    pub nextcloud: NextcloudFileConfig,
    pub run: RunFileConfig,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct MealieFileConfig {
    pub base_url: Option<String>,
    pub backup_path: Option<String>,
    pub health_path: Option<String>,
    pub download_path: Option<String>,
    pub auth_token: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct NextcloudFileConfig {
    pub base_url: Option<String>,
    pub webdav_path: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub remote_dir: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct RunFileConfig {
    pub staging_dir: Option<String>,
    pub prune_existing: Option<bool>,
    pub keep_local: Option<bool>,
    pub transfer_timeout_secs: Option<u64>,
}

pub fn load_config_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolves settings from env vars, then secret files, then the config file.
///
/// Blank values at any layer count as unset.
struct Sources<'a> {
    env: &'a HashMap<String, String>,
    secrets_dir: PathBuf,
}

impl Sources<'_> {
    fn get(
        &self,
        key: &'static str,
        file_value: Option<&str>,
    ) -> Result<Option<String>, ConfigError> {
        if let Some(v) = non_blank(self.env.get(key).map(String::as_str)) {
            return Ok(Some(v));
        }
        if let Some(v) = self.secret(key)? {
            return Ok(Some(v));
        }
        Ok(non_blank(file_value))
    }

    fn secret(&self, key: &'static str) -> Result<Option<String>, ConfigError> {
        let path = self.secrets_dir.join(key);
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(non_blank(Some(contents.as_str()))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ConfigError::Read { path, source }),
        }
    }

    fn required(&self, key: &'static str, file_value: Option<&str>) -> Result<String, ConfigError> {
        self.get(key, file_value)?.ok_or(ConfigError::Missing(key))
    }

    fn or_default(
        &self,
        key: &'static str,
        file_value: Option<&str>,
        default: &str,
    ) -> Result<String, ConfigError> {
        Ok(self
            .get(key, file_value)?
            .unwrap_or_else(|| default.to_owned()))
    }

    fn flag(
        &self,
        key: &'static str,
        file_value: Option<bool>,
        default: bool,
    ) -> Result<bool, ConfigError> {
        match self.get(key, None)? {
            Some(raw) => parse_bool(key, &raw),
            None => Ok(file_value.unwrap_or(default)),
        }
    }

    fn seconds(
        &self,
        key: &'static str,
        file_value: Option<u64>,
        default: u64,
    ) -> Result<u64, ConfigError> {
        match self.get(key, None)? {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                key,
                value: raw,
                reason: "expected a whole number of seconds",
            }),
            None => Ok(file_value.unwrap_or(default)),
        }
    }
}

impl Config {
    /// Reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let env: HashMap<String, String> = std::env::vars().collect();
        Self::resolve(&env)
    }

    /// Builds a config from an explicit environment map.
    pub fn resolve(env: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let secrets_dir = non_blank(env.get(SECRETS_DIR_VAR).map(String::as_str))
            .unwrap_or_else(|| DEFAULT_SECRETS_DIR.to_owned());
        let file = match non_blank(env.get(CONFIG_FILE_VAR).map(String::as_str)) {
            Some(path) => load_config_file(Path::new(&path))?,
            None => FileConfig::default(),
        };
        let src = Sources {
            env,
            secrets_dir: PathBuf::from(secrets_dir),
        };
        let m = &file.mealie;
        let nc = &file.nextcloud;
        let run = &file.run;

        let timeout = Duration::from_secs(src.seconds(
            "MEALIE_BACKUP_TIMEOUT_SECS",
            run.transfer_timeout_secs,
            60,
        )?);

        let source = SourceConfig {
            base_url: src.required("MEALIE_BASE_URL_TS", m.base_url.as_deref())?,
            backup_path: src.or_default(
                "MEALIE_BACKUP_PATH",
                m.backup_path.as_deref(),
                "api/admin/backups",
            )?,
            health_path: src.or_default(
                "MEALIE_HEALTH_PATH",
                m.health_path.as_deref(),
                "api/app/about",
            )?,
            download_path: src.or_default(
                "MEALIE_DOWNLOAD_PATH",
                m.download_path.as_deref(),
                "api/utils/download?token=",
            )?,
            auth_token: src.required("MEALIE_AUTH_TOKEN", m.auth_token.as_deref())?,
            transfer_timeout: timeout,
        };

        let webdav = WebDavConfig {
            base_url: src.required("NC_BASE_URL_TS", nc.base_url.as_deref())?,
            webdav_path: src.or_default(
                "WEBDAV_PATH",
                nc.webdav_path.as_deref(),
                "remote.php/dav/files",
            )?,
            user: src.required("NC_USER", nc.user.as_deref())?,
            password: src.required("NC_PASS", nc.password.as_deref())?,
            remote_dir: src.or_default("NC_REMOTE_DIR", nc.remote_dir.as_deref(), "Mealie")?,
            timeout,
        };

        let staging_dir = src
            .get("MEALIE_BACKUP_STAGING_DIR", run.staging_dir.as_deref())?
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir);

        let options = RunOptions {
            staging_dir,
            prune_existing: src.flag("MEALIE_BACKUP_PRUNE", run.prune_existing, true)?,
            keep_local: src.flag("MEALIE_BACKUP_KEEP_LOCAL", run.keep_local, false)?,
        };

        Ok(Self {
            source,
            webdav,
            options,
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: raw.to_owned(),
            reason: "expected true/false",
        }),
    }
}
