use std::path::PathBuf;

use chrono::{DateTime, TimeZone};

/// A backup file staged on local disk between download and upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedArtifact {
    pub file_name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub sha256: String,
}

/// Extracts a safe file name from a `Content-Disposition` header value.
///
/// Only the final path component is kept, and `.`, `..` or empty names are
/// rejected so a hostile header cannot escape the staging directory.
pub fn artifact_name_from_disposition(header: &str) -> Option<String> {
    let (_, rest) = header.split_once("filename=")?;
    let rest = rest.trim_start();
    // A quoted value may itself contain `;`, so only bare values end at one.
    let raw = match rest.strip_prefix('"') {
        Some(quoted) => quoted.split('"').next().unwrap_or_default(),
        None => rest.split(';').next().unwrap_or_default(),
    };
    let base = raw
        .trim()
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    match base {
        "" | "." | ".." => None,
        name => Some(name.to_owned()),
    }
}

/// Name used when the download response carries no usable file name.
pub fn fallback_artifact_name<Tz>(now: DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!("mealie_{}.zip", now.format("%Y.%m.%d.%H.%M.%S"))
}
