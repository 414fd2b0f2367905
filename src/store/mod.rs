//! Provides the content store contract and the thumbnail asset operations built on it.
//!
//! The host owns the actual storage backend. This crate only needs three
//! calls from it (browse, create a directory, upload a file), modelled by the
//! [`ContentStore`] trait. [`local::LocalContentStore`] is a filesystem-backed
//! implementation used by the CLI and the integration tests.
//!
//! # Examples
//! ```
//! use fpp3d::store::mime_type_for;
//!
//! assert_eq!(mime_type_for("thumbs/orc.glb.webp"), "image/webp");
//! assert_eq!(mime_type_for("thumbs/orc.JPG"), "image/jpeg");
//! ```

pub mod assets;
pub mod local;

use std::borrow::Cow;
use std::time::SystemTime;

use thiserror::Error;

pub use assets::{ensure_parent_directories_exist, save_image};
pub use local::LocalContentStore;

/// Errors reported by a content store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The browsed directory does not exist.
    #[error("Directory {0} does not exist")]
    DirectoryMissing(String),
    /// The directory being created is already present.
    #[error("EEXIST: {0} already exists")]
    AlreadyExists(String),
    /// The path is malformed or escapes the namespace.
    #[error("Invalid path: {0}")]
    InvalidPath(String),
    /// An I/O failure in the backend.
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// A backend-specific failure.
    #[error("{0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_missing_directory(&self) -> bool {
        matches!(self, StoreError::DirectoryMissing(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::AlreadyExists(_))
    }
}

/// Listing returned by [`ContentStore::browse`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrowseResult {
    /// The directory that was actually browsed, if the backend resolved one.
    pub target: Option<String>,
    pub dirs: Vec<String>,
    pub files: Vec<String>,
}

/// A named in-memory file handed to [`ContentStore::upload`].
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub mime_type: String,
    pub last_modified: SystemTime,
    pub bytes: Vec<u8>,
}

/// Server acknowledgement of an upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadResponse {
    /// The stored path as confirmed by the backend, when it reports one.
    pub path: Option<String>,
}

/// An encoded image ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBlob {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
}

/// The host's namespaced file storage.
pub trait ContentStore: Send + Sync {
    /// Lists a directory. Fails with [`StoreError::DirectoryMissing`] if it is absent.
    fn browse(&self, namespace: &str, dir: &str) -> Result<BrowseResult, StoreError>;

    /// Creates one directory level. Fails with [`StoreError::AlreadyExists`] if present.
    fn create_directory(&self, namespace: &str, dir: &str) -> Result<(), StoreError>;

    /// Writes `file` into `dir`, replacing any file with the same name.
    fn upload(
        &self,
        namespace: &str,
        dir: &str,
        file: UploadFile,
    ) -> Result<UploadResponse, StoreError>;
}

/// Derives an image MIME type from a path's extension.
///
/// `jpg` is mapped to `jpeg`, the registered subtype.
pub fn mime_type_for(path: &str) -> String {
    let name = path.rsplit('/').next().unwrap_or(path);
    let ext = name.rsplit('.').next().unwrap_or_default().trim().to_lowercase();
    match ext.as_str() {
        "jpg" => "image/jpeg".to_string(),
        _ => format!("image/{}", ext),
    }
}

/// Bytes whose escapes are left in place, as `decodeURI` does.
const URI_RESERVED: &[u8] = b";/?:@&=+$,#";

/// Returns the byte encoded by the `%XX` escape starting at `i`, if any.
fn escaped_byte(path: &str, i: usize) -> Option<u8> {
    let hex = path.get(i + 1..i + 3)?;
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u8::from_str_radix(hex, 16).ok()
}

/// Percent-decodes a content-store path with `decodeURI` rules.
///
/// Escapes of URI delimiters (`%2F`, `%23`, ...) stay encoded so a file
/// name containing them never turns into extra path segments.
pub fn decode_path(path: &str) -> Result<Cow<'_, str>, StoreError> {
    let invalid = |_| StoreError::InvalidPath(path.to_string());
    let mut out = String::new();
    let mut start = 0;
    let mut i = 0;
    while i < path.len() {
        if path.as_bytes()[i] == b'%' {
            if escaped_byte(path, i).is_some_and(|b| URI_RESERVED.contains(&b)) {
                out.push_str(&urlencoding::decode(&path[start..i]).map_err(invalid)?);
                out.push_str(&path[i..i + 3]);
                i += 3;
                start = i;
                continue;
            }
        }
        i += 1;
    }

    if start == 0 {
        return urlencoding::decode(path).map_err(invalid);
    }
    out.push_str(&urlencoding::decode(&path[start..]).map_err(invalid)?);
    Ok(Cow::Owned(out))
}

/// Returns the containing directory of a `/`-separated path.
pub(crate) fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}
