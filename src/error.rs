//! Batch-level error types.

use thiserror::Error;

use crate::capture::SessionError;
use crate::store::StoreError;

/// Failures while preparing directories or persisting a thumbnail.
#[derive(Debug, Error)]
pub enum AssetError {
    /// Browsing the destination directory failed for a reason other than "missing".
    #[error("Failed to check directory \"{dir}\": {source}")]
    DirectoryCheck {
        dir: String,
        #[source]
        source: StoreError,
    },
    /// Creating a destination directory failed for a reason other than "already exists".
    #[error("Failed to create directory \"{dir}\": {source}")]
    DirectoryCreate {
        dir: String,
        #[source]
        source: StoreError,
    },
    /// Uploading the encoded image failed.
    #[error("Failed to upload \"{path}\": {source}")]
    Upload {
        path: String,
        #[source]
        source: StoreError,
    },
}

/// Errors surfaced by a thumbnail batch.
#[derive(Debug, Error)]
pub enum ThumbnailError {
    /// Directory setup failed before any session started. Fatal to the batch.
    #[error(transparent)]
    Asset(#[from] AssetError),
    /// One path's capture session failed. Isolated to that path.
    #[error("Failed to save 3d thumbnail for \"{path}\": {source}")]
    Session {
        path: String,
        #[source]
        source: SessionError,
    },
    /// Another batch is already running on this scheduler.
    #[error("A thumbnail batch is already in progress")]
    BatchInProgress,
}
