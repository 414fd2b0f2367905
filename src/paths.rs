//! Maps 3D model source paths onto their mirrored thumbnail image paths.
//!
//! Thumbnails live under a fixed output root inside the content store. The
//! source directory structure is mirrored beneath that root, and the image
//! keeps the full original filename with `.webp` appended, so `a/b/tree.glb`
//! becomes `fpp-3d-thumbnails/a/b/tree.glb.webp`.
//!
//! # Examples
//! ```
//! use fpp3d::paths;
//!
//! let info = paths::thumbnail_path_info("foo/bar/model.glb");
//! assert_eq!(info.output_path, "fpp-3d-thumbnails/foo/bar/model.glb.webp");
//! assert_eq!(info.image_file_name, "model.glb.webp");
//! ```

/// The default root directory that mirrored thumbnails are written under.
pub const DEFAULT_OUTPUT_ROOT: &str = "fpp-3d-thumbnails";

/// The image extension appended to every thumbnail filename.
pub const IMAGE_EXTENSION: &str = "webp";

/// Model extensions eligible for thumbnailing. Matching is case-sensitive.
pub const RECOGNIZED_EXTENSIONS: &[&str] = &[".glb", ".GLB", ".gltf", ".GLTF"];

/// Output location for a single source model's thumbnail.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThumbnailPathInfo {
    /// Full content-store path of the thumbnail image.
    pub output_path: String,
    /// Just the filename portion of `output_path`.
    pub image_file_name: String,
}

impl ThumbnailPathInfo {
    /// Returns the directory that contains the thumbnail image.
    ///
    /// # Examples
    /// ```
    /// use fpp3d::paths;
    ///
    /// let info = paths::thumbnail_path_info("maps/props/crate.gltf");
    /// assert_eq!(info.output_dir(), "fpp-3d-thumbnails/maps/props");
    /// ```
    pub fn output_dir(&self) -> &str {
        match self.output_path.rfind('/') {
            Some(idx) => &self.output_path[..idx],
            None => "",
        }
    }
}

/// Returns true if the path ends in one of [`RECOGNIZED_EXTENSIONS`].
///
/// The extension is whatever follows the last `.` in the path; a path with no
/// `.` has no extension and never matches.
///
/// # Examples
/// ```
/// use fpp3d::paths::is_recognized_model_path;
///
/// assert!(is_recognized_model_path("model.glb"));
/// assert!(is_recognized_model_path("model.GLTF"));
/// assert!(!is_recognized_model_path("model.GLB2"));
/// assert!(!is_recognized_model_path("model.Glb"));
/// ```
pub fn is_recognized_model_path(path: &str) -> bool {
    let Some((_, extension)) = path.rsplit_once('.') else {
        return false;
    };
    RECOGNIZED_EXTENSIONS
        .iter()
        .any(|known| known.strip_prefix('.') == Some(extension))
}

/// Computes the thumbnail location under [`DEFAULT_OUTPUT_ROOT`].
pub fn thumbnail_path_info(source_path: &str) -> ThumbnailPathInfo {
    thumbnail_path_info_under(DEFAULT_OUTPUT_ROOT, source_path)
}

/// Computes the thumbnail location for `source_path` under `output_root`.
///
/// Pure and deterministic; no I/O is performed and the source path is used
/// as-is (no decoding or normalisation).
///
/// # Examples
/// ```
/// use fpp3d::paths::thumbnail_path_info_under;
///
/// let info = thumbnail_path_info_under("thumbs", "tokens/orc.glb");
/// assert_eq!(info.output_path, "thumbs/tokens/orc.glb.webp");
/// ```
pub fn thumbnail_path_info_under(output_root: &str, source_path: &str) -> ThumbnailPathInfo {
    let (dir, file_name) = match source_path.rsplit_once('/') {
        Some((dir, file_name)) => (dir, file_name),
        None => ("", source_path),
    };
    let image_file_name = format!("{}.{}", file_name, IMAGE_EXTENSION);
    let output_path = format!("{}/{}/{}", output_root, dir, image_file_name);

    ThumbnailPathInfo {
        output_path,
        image_file_name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognized_extensions_exact_case() {
        for path in ["a.glb", "a.GLB", "a.gltf", "a.GLTF", "dir.v2/a.glb"] {
            assert!(is_recognized_model_path(path), "{} should match", path);
        }
        for path in ["a.Glb", "a.gLTF", "a.glb2", "a.obj", "glb", "a.glb/", ""] {
            assert!(!is_recognized_model_path(path), "{} should not match", path);
        }
    }

    #[test]
    fn test_path_info_mirrors_directories() {
        let info = thumbnail_path_info("foo/bar/model.glb");
        assert_eq!(info.output_path, "fpp-3d-thumbnails/foo/bar/model.glb.webp");
        assert_eq!(info.image_file_name, "model.glb.webp");
        assert_eq!(info, thumbnail_path_info("foo/bar/model.glb"));
    }

    #[test]
    fn test_path_info_at_store_root() {
        let info = thumbnail_path_info("model.glb");
        assert_eq!(info.output_path, "fpp-3d-thumbnails//model.glb.webp");
        assert_eq!(info.output_dir(), "fpp-3d-thumbnails/");
    }

    #[test]
    fn test_path_info_keeps_encoded_segments() {
        let info = thumbnail_path_info("my%20maps/big%20tree.gltf");
        assert_eq!(
            info.output_path,
            "fpp-3d-thumbnails/my%20maps/big%20tree.gltf.webp"
        );
    }
}
