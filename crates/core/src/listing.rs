use serde::{Deserialize, Serialize};

/// One backup as reported by the Mealie admin backups endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackupSummary {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
}

/// Response body of `GET {backup_url}`.
///
/// Mealie lists the newest backup first. Fields other than `imports` are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackupListing {
    #[serde(default)]
    pub imports: Vec<BackupSummary>,
}

/// Response body of `GET {backup_url}/{name}`.
#[derive(Debug, Clone, Deserialize)]
pub struct FileTokenResponse {
    #[serde(rename = "fileToken", default)]
    pub file_token: Option<String>,
}

impl BackupListing {
    pub fn is_empty(&self) -> bool {
        self.imports.is_empty()
    }

    pub fn len(&self) -> usize {
        self.imports.len()
    }

    /// Names of all listed backups, skipping entries without one.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.imports
            .iter()
            .map(|b| b.name.as_str())
            .filter(|n| !n.is_empty())
    }

    /// Picks the backup that appeared since `previous` was taken.
    ///
    /// Falls back to the first named entry when nothing new is visible, e.g.
    /// when the server reuses a name within the same second.
    pub fn newest_new_since(&self, previous: &BackupListing) -> Option<&str> {
        self.names()
            .find(|name| !previous.names().any(|old| old == *name))
            .or_else(|| self.names().next())
    }
}
