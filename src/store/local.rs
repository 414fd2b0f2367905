//! A filesystem-backed [`ContentStore`].
//!
//! Each namespace is a subdirectory of the store root, so `("data", "a/b")`
//! lives at `<root>/data/a/b`. Store paths are always `/`-separated.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::notify::Notifier;
use crate::store::{BrowseResult, ContentStore, StoreError, UploadFile, UploadResponse};

pub struct LocalContentStore {
    root: PathBuf,
    notifier: Option<Arc<dyn Notifier>>,
}

impl LocalContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            notifier: None,
        }
    }

    /// Posts a "saved" notice through `notifier` after every upload.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Returns the on-disk directory backing `namespace`.
    ///
    /// # Errors
    /// Returns [`StoreError::InvalidPath`] for a namespace that isn't a plain name.
    pub fn namespace_root(&self, namespace: &str) -> Result<PathBuf, StoreError> {
        if namespace.is_empty() || namespace.contains(['/', '\\']) || namespace.starts_with('.') {
            return Err(StoreError::InvalidPath(namespace.to_string()));
        }
        Ok(self.root.join(namespace))
    }

    /// Resolves a store path, returning its normalized form and on-disk location.
    fn resolve(&self, namespace: &str, path: &str) -> Result<(String, PathBuf), StoreError> {
        let mut fs_path = self.namespace_root(namespace)?;
        let mut segments = Vec::new();
        for segment in path.split('/').filter(|s| !s.is_empty() && *s != ".") {
            if segment == ".." || segment.contains('\\') {
                return Err(StoreError::InvalidPath(path.to_string()));
            }
            fs_path.push(segment);
            segments.push(segment);
        }
        Ok((segments.join("/"), fs_path))
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn join_store_path(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

impl ContentStore for LocalContentStore {
    fn browse(&self, namespace: &str, dir: &str) -> Result<BrowseResult, StoreError> {
        let (normalized, fs_path) = self.resolve(namespace, dir)?;
        if !fs_path.is_dir() {
            return Err(StoreError::DirectoryMissing(dir.to_string()));
        }

        let mut result = BrowseResult {
            target: Some(normalized.clone()),
            ..Default::default()
        };
        for entry in fs::read_dir(&fs_path).map_err(|e| io_error(&fs_path, e))? {
            let entry = entry.map_err(|e| io_error(&fs_path, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let store_path = join_store_path(&normalized, &name);
            if entry.path().is_dir() {
                result.dirs.push(store_path);
            } else {
                result.files.push(store_path);
            }
        }
        result.dirs.sort();
        result.files.sort();
        Ok(result)
    }

    fn create_directory(&self, namespace: &str, dir: &str) -> Result<(), StoreError> {
        let (normalized, fs_path) = self.resolve(namespace, dir)?;
        if normalized.is_empty() {
            return Err(StoreError::AlreadyExists(dir.to_string()));
        }
        match fs::create_dir(&fs_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(StoreError::AlreadyExists(normalized))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::DirectoryMissing(
                crate::store::parent_dir(&normalized).to_string(),
            )),
            Err(e) => Err(io_error(&fs_path, e)),
        }
    }

    fn upload(
        &self,
        namespace: &str,
        dir: &str,
        file: UploadFile,
    ) -> Result<UploadResponse, StoreError> {
        let (normalized, fs_dir) = self.resolve(namespace, dir)?;
        if file.name.is_empty() || file.name.contains(['/', '\\']) || file.name == ".." {
            return Err(StoreError::InvalidPath(file.name));
        }
        if !fs_dir.is_dir() {
            return Err(StoreError::DirectoryMissing(dir.to_string()));
        }

        let target = fs_dir.join(&file.name);
        fs::write(&target, &file.bytes).map_err(|e| io_error(&target, e))?;

        let stored = join_store_path(&normalized, &file.name);
        log::debug!("wrote {} ({} bytes, {})", stored, file.bytes.len(), file.mime_type);
        if let Some(notifier) = &self.notifier {
            notifier.info(&format!("{} saved to {}", file.name, stored));
        }

        Ok(UploadResponse { path: Some(stored) })
    }
}
