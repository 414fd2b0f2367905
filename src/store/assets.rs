//! Directory preparation and image persistence on top of a [`ContentStore`].

use std::time::SystemTime;

use crate::error::AssetError;
use crate::store::{decode_path, mime_type_for, parent_dir, ContentStore, ImageBlob, UploadFile};

/// Makes sure the directory containing `path` exists in `namespace`.
///
/// The directory is browsed first; only a "does not exist" failure triggers
/// creation. Ancestors are then created shallowest first, and an "already
/// exists" reply on any level is accepted, so concurrent creators don't fail
/// each other.
///
/// # Errors
/// Returns [`AssetError::DirectoryCheck`] for any other browse failure and
/// [`AssetError::DirectoryCreate`] for any other create failure.
pub fn ensure_parent_directories_exist(
    store: &dyn ContentStore,
    namespace: &str,
    path: &str,
) -> Result<(), AssetError> {
    let clean = decode_path(path).map_err(|source| AssetError::DirectoryCheck {
        dir: path.to_string(),
        source,
    })?;
    let dir = parent_dir(&clean);

    let exists = match store.browse(namespace, dir) {
        Ok(listing) => listing.target.is_some(),
        Err(e) if e.is_missing_directory() => false,
        Err(source) => {
            return Err(AssetError::DirectoryCheck {
                dir: dir.to_string(),
                source,
            })
        }
    };
    if exists {
        return Ok(());
    }

    log::debug!("creating directories for {}", dir);
    let mut current = String::new();
    for segment in dir.split('/').filter(|s| !s.is_empty()) {
        if !current.is_empty() {
            current.push('/');
        }
        current.push_str(segment);

        match store.create_directory(namespace, &current) {
            Ok(()) => {}
            Err(e) if e.is_already_exists() => continue,
            Err(source) => {
                return Err(AssetError::DirectoryCreate {
                    dir: current,
                    source,
                })
            }
        }
    }
    Ok(())
}

/// Uploads `blob` to `path` and returns the stored path.
///
/// The MIME type comes from the destination's extension. The destination
/// directory must already exist (see [`ensure_parent_directories_exist`]).
/// The backend's confirmed path is preferred; otherwise the decoded requested
/// path is returned.
///
/// # Errors
/// Returns [`AssetError::Upload`] if the path can't be decoded or the upload fails.
pub fn save_image(
    store: &dyn ContentStore,
    namespace: &str,
    blob: ImageBlob,
    path: &str,
) -> Result<String, AssetError> {
    let upload_error = |source| AssetError::Upload {
        path: path.to_string(),
        source,
    };

    let clean = decode_path(path).map_err(upload_error)?.into_owned();
    let dir = parent_dir(&clean);
    let name = clean.rsplit('/').next().unwrap_or(&clean).to_string();

    let file = UploadFile {
        mime_type: mime_type_for(&name),
        name,
        last_modified: SystemTime::now(),
        bytes: blob.bytes,
    };

    let response = store.upload(namespace, dir, file).map_err(upload_error)?;
    match response.path {
        Some(stored) => Ok(decode_path(&stored).map_err(upload_error)?.into_owned()),
        None => Ok(clean),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    use super::*;
    use crate::store::{BrowseResult, StoreError, UploadResponse};

    /// Records calls; `existing` directories browse successfully.
    #[derive(Default)]
    struct RecordingStore {
        existing: Mutex<BTreeSet<String>>,
        created: Mutex<Vec<String>>,
        uploads: Mutex<Vec<(String, UploadFile)>>,
        browse_failure: bool,
        race_on: Option<&'static str>,
        confirm_path: Option<&'static str>,
    }

    impl ContentStore for RecordingStore {
        fn browse(&self, _namespace: &str, dir: &str) -> Result<BrowseResult, StoreError> {
            if self.browse_failure {
                return Err(StoreError::Backend("permission denied".into()));
            }
            if self.existing.lock().unwrap().contains(dir) {
                Ok(BrowseResult {
                    target: Some(dir.to_string()),
                    ..Default::default()
                })
            } else {
                Err(StoreError::DirectoryMissing(dir.to_string()))
            }
        }

        fn create_directory(&self, _namespace: &str, dir: &str) -> Result<(), StoreError> {
            if self.race_on == Some(dir) {
                return Err(StoreError::AlreadyExists(dir.to_string()));
            }
            if !self.existing.lock().unwrap().insert(dir.to_string()) {
                return Err(StoreError::AlreadyExists(dir.to_string()));
            }
            self.created.lock().unwrap().push(dir.to_string());
            Ok(())
        }

        fn upload(
            &self,
            _namespace: &str,
            dir: &str,
            file: UploadFile,
        ) -> Result<UploadResponse, StoreError> {
            self.uploads.lock().unwrap().push((dir.to_string(), file));
            Ok(UploadResponse {
                path: self.confirm_path.map(str::to_string),
            })
        }
    }

    fn blob() -> ImageBlob {
        ImageBlob {
            bytes: vec![1, 2, 3],
            mime_type: "image/webp",
        }
    }

    #[test]
    fn test_creates_ancestors_shallowest_first() {
        let store = RecordingStore::default();
        ensure_parent_directories_exist(&store, "data", "thumbs/a/b/model.glb.webp").unwrap();
        assert_eq!(
            *store.created.lock().unwrap(),
            vec!["thumbs", "thumbs/a", "thumbs/a/b"]
        );
    }

    #[test]
    fn test_existing_directory_creates_nothing() {
        let store = RecordingStore::default();
        store.existing.lock().unwrap().insert("thumbs/a".into());
        ensure_parent_directories_exist(&store, "data", "thumbs/a/model.glb.webp").unwrap();
        assert!(store.created.lock().unwrap().is_empty());
    }

    #[test]
    fn test_create_race_is_tolerated() {
        let store = RecordingStore {
            race_on: Some("thumbs/a"),
            ..Default::default()
        };
        ensure_parent_directories_exist(&store, "data", "thumbs/a/b/m.glb.webp").unwrap();
        assert_eq!(*store.created.lock().unwrap(), vec!["thumbs", "thumbs/a/b"]);
    }

    #[test]
    fn test_browse_failure_propagates() {
        let store = RecordingStore {
            browse_failure: true,
            ..Default::default()
        };
        let err = ensure_parent_directories_exist(&store, "data", "thumbs/m.glb.webp").unwrap_err();
        assert!(matches!(err, AssetError::DirectoryCheck { .. }));
    }

    #[test]
    fn test_decodes_before_creating() {
        let store = RecordingStore::default();
        ensure_parent_directories_exist(&store, "data", "thumbs/my%20maps/m.glb.webp").unwrap();
        assert_eq!(*store.created.lock().unwrap(), vec!["thumbs", "thumbs/my maps"]);
    }

    #[test]
    fn test_reserved_escapes_stay_in_file_name() {
        let store = RecordingStore::default();
        ensure_parent_directories_exist(&store, "data", "thumbs/a%2Fb.glb.webp").unwrap();
        let saved = save_image(&store, "data", blob(), "thumbs/a%2Fb.glb.webp").unwrap();
        assert_eq!(*store.created.lock().unwrap(), vec!["thumbs"]);
        assert_eq!(saved, "thumbs/a%2Fb.glb.webp");

        let saved = save_image(&store, "data", blob(), "thumbs/%23one%20two.glb.webp").unwrap();
        assert_eq!(saved, "thumbs/%23one two.glb.webp");

        let uploads = store.uploads.lock().unwrap();
        let targets: Vec<(&str, &str)> = uploads
            .iter()
            .map(|(dir, file)| (dir.as_str(), file.name.as_str()))
            .collect();
        assert_eq!(
            targets,
            vec![("thumbs", "a%2Fb.glb.webp"), ("thumbs", "%23one two.glb.webp")]
        );
    }

    #[test]
    fn test_save_image_derives_mime_and_splits_path() {
        let store = RecordingStore::default();
        let saved = save_image(&store, "data", blob(), "thumbs/a/photo.jpg").unwrap();
        assert_eq!(saved, "thumbs/a/photo.jpg");

        let uploads = store.uploads.lock().unwrap();
        let (dir, file) = &uploads[0];
        assert_eq!(dir, "thumbs/a");
        assert_eq!(file.name, "photo.jpg");
        assert_eq!(file.mime_type, "image/jpeg");
        assert_eq!(file.bytes, vec![1, 2, 3]);
    }

    #[test]
    fn test_save_image_prefers_confirmed_path() {
        let store = RecordingStore {
            confirm_path: Some("server/thumbs/a%20b.png"),
            ..Default::default()
        };
        let saved = save_image(&store, "data", blob(), "thumbs/a b.png").unwrap();
        assert_eq!(saved, "server/thumbs/a b.png");
        assert_eq!(store.uploads.lock().unwrap()[0].1.mime_type, "image/png");
    }
}
