mod target;
pub mod webdav;

pub use target::{UploadError, UploadReceipt, UploadTarget};
pub use webdav::{WebDavConfig, WebDavTarget};
