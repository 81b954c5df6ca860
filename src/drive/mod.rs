//! Drive listing, upload and download

mod client;
mod export;
mod types;

pub use client::DriveClient;
pub use export::{DownloadPlan, ExportFormat, plan_download, resolve_export};
pub use types::{CreatedFile, FileList, FileListing, ListingRow, RemoteFile};

/// MIME prefix of provider-native document types
pub const NATIVE_MIME_PREFIX: &str = "application/vnd.google-apps.";
