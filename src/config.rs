//! Thumbnail generation configuration.
//!
//! Everything the pipeline used to keep as module-wide constants lives in
//! [`ThumbnailConfig`], which is handed to the scheduler at construction.
//! It can be loaded from a TOML file; missing keys fall back to defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::paths::DEFAULT_OUTPUT_ROOT;

/// This module's settings namespace.
pub const MODULE_ID: &str = "fpp-3d-thumbnails";
/// The companion module whose previews share the rendering-context pool.
pub const COMPANION_MODULE_ID: &str = "threeportrait";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThumbnailConfig {
    pub module_id: String,
    pub companion_module_id: String,
    /// Content store namespace both models and thumbnails live in.
    pub namespace: String,
    /// Directory that mirrored thumbnails are written under.
    pub output_root: String,
    /// Encoder quality in `0.0..=1.0`.
    pub image_quality: f32,
    pub ready_timeout_ms: u64,
    /// Pause between the post-ready render and the captured render.
    pub settle_delay_ms: u64,
    /// Width and height of the offscreen surface in pixels.
    pub surface_size: u32,
    /// Keep a local copy of every encoded thumbnail in `debug_dir`.
    pub debug: bool,
    pub debug_dir: Option<PathBuf>,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            module_id: MODULE_ID.to_string(),
            companion_module_id: COMPANION_MODULE_ID.to_string(),
            namespace: "data".to_string(),
            output_root: DEFAULT_OUTPUT_ROOT.to_string(),
            image_quality: 0.8,
            ready_timeout_ms: 5000,
            settle_delay_ms: 100,
            surface_size: 256,
            debug: false,
            debug_dir: None,
        }
    }
}

impl ThumbnailConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    /// Returns an error for malformed TOML, unknown keys, or out-of-range values.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file can't be read or fails [`Self::from_toml_str`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&s)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.image_quality) {
            return Err(ConfigError::Invalid(format!(
                "image_quality must be within 0.0..=1.0, got {}",
                self.image_quality
            )));
        }
        if self.surface_size == 0 {
            return Err(ConfigError::Invalid("surface_size must be positive".into()));
        }
        if self.namespace.is_empty() || self.output_root.is_empty() {
            return Err(ConfigError::Invalid(
                "namespace and output_root must not be empty".into(),
            ));
        }
        Ok(())
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}
