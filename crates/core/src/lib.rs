pub mod artifact;
pub mod hash;
pub mod listing;
pub mod text;
pub mod url;

pub use artifact::{artifact_name_from_disposition, fallback_artifact_name, DownloadedArtifact};
pub use hash::{content_hash, ContentHasher};
pub use listing::{BackupListing, BackupSummary, FileTokenResponse};
pub use text::excerpt;
pub use url::build_url;
