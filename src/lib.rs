//! Generates thumbnail images for 3D model assets in a virtual-tabletop file browser.
//!
//! Each selected glTF/GLB model is loaded into an offscreen preview, rendered
//! once it has finished loading, encoded as WebP, and uploaded to the content
//! store at a path that mirrors the model's own location under
//! `fpp-3d-thumbnails/`. Batches run a bounded number of previews at once,
//! sharing the host's rendering-context limit with a companion module, and a
//! single failing model never stops the rest of the batch.
//!
//! # Examples
//! ```
//! use fpp3d::paths;
//!
//! assert!(paths::is_recognized_model_path("tokens/orc.glb"));
//! let info = paths::thumbnail_path_info("tokens/orc.glb");
//! assert_eq!(info.output_path, "fpp-3d-thumbnails/tokens/orc.glb.webp");
//! ```

pub mod capture;
pub mod config;
pub mod error;
pub mod logger;
pub mod notify;
pub mod paths;
pub mod presentation;
pub mod preview;
pub mod renderer;
pub mod scheduler;
pub mod settings;
pub mod store;

pub use config::ThumbnailConfig;
pub use error::{AssetError, ThumbnailError};
pub use paths::{is_recognized_model_path, thumbnail_path_info, ThumbnailPathInfo};
pub use scheduler::{BatchSummary, ThumbnailScheduler};

/// Generates thumbnails for `paths` on `scheduler`, reporting progress to its notifier.
///
/// # Errors
/// See [`ThumbnailScheduler::run`].
pub fn generate_thumbnails(
    scheduler: &ThumbnailScheduler,
    paths: Vec<String>,
    concurrency: usize,
) -> Result<BatchSummary, ThumbnailError> {
    let notifier = scheduler.notifier();
    scheduler.run(paths, concurrency, &|pct: u8| {
        notifier.progress(presentation::PROGRESS_LABEL, pct)
    })
}

/// Location of the generated thumbnail for `path`, whether or not it exists yet.
pub fn get_thumbnail_path_info(config: &ThumbnailConfig, path: &str) -> ThumbnailPathInfo {
    paths::thumbnail_path_info_under(&config.output_root, path)
}
