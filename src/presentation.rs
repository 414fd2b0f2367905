//! Glue between a file-browser listing and the thumbnail pipeline.
//!
//! The listing supplies entries with their displayed thumbnail image. This
//! module picks out model files, runs a batch for them, and points their
//! thumbnails at the generated images.

use crate::error::ThumbnailError;
use crate::paths::{is_recognized_model_path, thumbnail_path_info_under};
use crate::scheduler::{BatchSummary, ThumbnailScheduler};

/// Label shown on the progress bar while a batch runs.
pub const PROGRESS_LABEL: &str = "Generating...";

/// An image element that may be lazy-loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThumbnailImage {
    /// The active image source, once loaded.
    pub src: Option<String>,
    /// The deferred source used by lazy loading.
    pub data_src: Option<String>,
}

/// One entry of a file-browser listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub path: String,
    pub thumbnail: ThumbnailImage,
}

impl ListingEntry {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            thumbnail: ThumbnailImage::default(),
        }
    }
}

/// Paths of the entries that are recognized model files, in listing order.
pub fn recognized_paths(entries: &[ListingEntry]) -> Vec<String> {
    entries
        .iter()
        .filter(|e| is_recognized_model_path(&e.path))
        .map(|e| e.path.clone())
        .collect()
}

/// Runs a batch for every model file in `entries`.
///
/// Returns `Ok(None)` after warning the user if nothing in the listing is a
/// model file. On completion a summary notice is posted no matter how many
/// paths failed. A batch that fails during directory setup still closes the
/// progress bar; one rejected because another batch is running leaves it alone.
///
/// # Errors
/// Propagates batch-level failures from [`ThumbnailScheduler::run`].
pub fn generate_for_listing(
    scheduler: &ThumbnailScheduler,
    entries: &[ListingEntry],
    concurrency: usize,
) -> Result<Option<BatchSummary>, ThumbnailError> {
    let paths = recognized_paths(entries);
    let notifier = scheduler.notifier();
    if paths.is_empty() {
        notifier.warn("No 3d paths found!");
        return Ok(None);
    }

    let result = scheduler.run(paths, concurrency, &|pct: u8| {
        notifier.progress(PROGRESS_LABEL, pct)
    });
    let summary = match result {
        Ok(summary) => summary,
        // The running batch owns the progress bar.
        Err(ThumbnailError::BatchInProgress) => return Err(ThumbnailError::BatchInProgress),
        Err(e) => {
            notifier.progress(PROGRESS_LABEL, 100);
            return Err(e);
        }
    };
    notifier.info(&format!(
        "Generated {}/{} 3d thumbnails in {:.1}s",
        summary.succeeded,
        summary.total,
        summary.elapsed.as_secs_f64()
    ));
    Ok(Some(summary))
}

/// Points model entries' thumbnails at their generated images.
///
/// Loaded images get a new `src`; images still waiting on lazy loading get a
/// new `data_src` instead. Entries that aren't model files are untouched.
pub fn rewrite_thumbnail_sources(entries: &mut [ListingEntry], output_root: &str) {
    for entry in entries
        .iter_mut()
        .filter(|e| is_recognized_model_path(&e.path))
    {
        let output = thumbnail_path_info_under(output_root, &entry.path).output_path;
        if entry.thumbnail.src.is_some() {
            entry.thumbnail.src = Some(output);
        } else {
            entry.thumbnail.data_src = Some(output);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognized_paths_keeps_order() {
        let entries = vec![
            ListingEntry::new("maps/b.glb"),
            ListingEntry::new("maps/readme.txt"),
            ListingEntry::new("maps/a.GLTF"),
        ];
        assert_eq!(recognized_paths(&entries), vec!["maps/b.glb", "maps/a.GLTF"]);
    }

    #[test]
    fn test_rewrite_respects_lazy_loading() {
        let mut loaded = ListingEntry::new("maps/a.glb");
        loaded.thumbnail.src = Some("icons/cube.svg".into());
        let lazy = ListingEntry::new("maps/b.glb");
        let mut other = ListingEntry::new("maps/c.png");
        other.thumbnail.src = Some("maps/c.png".into());

        let mut entries = vec![loaded, lazy, other];
        rewrite_thumbnail_sources(&mut entries, "fpp-3d-thumbnails");

        assert_eq!(
            entries[0].thumbnail.src.as_deref(),
            Some("fpp-3d-thumbnails/maps/a.glb.webp")
        );
        assert_eq!(entries[0].thumbnail.data_src, None);
        assert_eq!(entries[1].thumbnail.src, None);
        assert_eq!(
            entries[1].thumbnail.data_src.as_deref(),
            Some("fpp-3d-thumbnails/maps/b.glb.webp")
        );
        assert_eq!(entries[2].thumbnail.src.as_deref(), Some("maps/c.png"));
    }
}
