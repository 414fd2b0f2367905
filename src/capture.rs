//! Provides the per-model capture session: load, wait, render, encode, persist.
//!
//! A [`CaptureSession`] owns one mounted container and one preview. It moves
//! through `Created → Loading → Ready | TimedOut → Captured → Disposed` and is
//! disposed on every exit path, including early returns and errors, because
//! disposal also runs on drop.

use std::fmt;
use std::ops::Deref;
use std::path::Path;
use std::thread;
use std::time::Duration;

use image::RgbaImage;
use thiserror::Error;

use crate::config::ThumbnailConfig;
use crate::error::AssetError;
use crate::paths::{thumbnail_path_info_under, ThumbnailPathInfo};
use crate::preview::{
    Container, Preview, PreviewError, PreviewFactory, PreviewOptions, Readiness, Stage,
};
use crate::store::{save_image, ContentStore, ImageBlob};

/// MIME type of every captured frame.
pub const IMAGE_MIME_TYPE: &str = "image/webp";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Preview(#[from] PreviewError),
    #[error("Model failed to load: {0}")]
    LoadFailed(String),
    #[error("Cannot capture a frame while {0}")]
    NotReady(SessionState),
    #[error("Failed to encode thumbnail: {0}")]
    Encode(String),
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error("Session panicked: {0}")]
    Panicked(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Loading,
    Ready,
    TimedOut,
    Captured,
    Disposed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Created => "created",
            SessionState::Loading => "loading",
            SessionState::Ready => "ready",
            SessionState::TimedOut => "timed out",
            SessionState::Captured => "captured",
            SessionState::Disposed => "disposed",
        };
        f.write_str(name)
    }
}

/// One model's offscreen preview and its mount point.
pub struct CaptureSession {
    path: String,
    container: Container,
    preview: Box<dyn Preview>,
    state: SessionState,
}

impl CaptureSession {
    /// Mounts a hidden container and starts loading `path` into a new preview.
    ///
    /// # Errors
    /// Returns [`SessionError::Preview`] if the preview can't be created; the
    /// container is unmounted again in that case.
    pub fn open(
        stage: &Stage,
        factory: &dyn PreviewFactory,
        path: &str,
        surface_size: u32,
    ) -> Result<Self, SessionError> {
        let container = stage.mount();
        let options = PreviewOptions {
            model_path: path.to_string(),
            prevent_auto_dispose: true,
            width: surface_size,
            height: surface_size,
        };
        let preview = factory.create(&container, options)?;
        Ok(Self {
            path: path.to_string(),
            container,
            preview,
            state: SessionState::Loading,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Waits up to `timeout` for the model to be added to the scene.
    ///
    /// Returns `Ok(false)` when the timeout wins.
    ///
    /// # Errors
    /// Returns [`SessionError::LoadFailed`] if the preview reports a failed load.
    pub fn await_ready(&mut self, timeout: Duration) -> Result<bool, SessionError> {
        match self.preview.ready_signal().wait(timeout) {
            Readiness::Ready => {
                self.state = SessionState::Ready;
                Ok(true)
            }
            Readiness::TimedOut => {
                self.state = SessionState::TimedOut;
                Ok(false)
            }
            Readiness::Failed(reason) => Err(SessionError::LoadFailed(reason)),
        }
    }

    /// Renders the scene and encodes the frame.
    ///
    /// One render is done straight away; if `settle` is non-zero the session
    /// waits that long and renders again so a transitional frame isn't kept.
    ///
    /// # Errors
    /// Fails if the session isn't ready, rendering fails, or encoding fails.
    pub fn capture_frame(
        &mut self,
        quality: f32,
        settle: Duration,
    ) -> Result<ImageBlob, SessionError> {
        if self.state != SessionState::Ready {
            return Err(SessionError::NotReady(self.state));
        }
        self.preview.render()?;
        if !settle.is_zero() {
            thread::sleep(settle);
            self.preview.render()?;
        }
        let blob = encode_frame(self.preview.surface(), quality)?;
        self.state = SessionState::Captured;
        Ok(blob)
    }

    /// Destroys the preview and unmounts the container. Repeated calls are no-ops.
    pub fn dispose(&mut self) {
        if self.state == SessionState::Disposed {
            return;
        }
        self.preview.destroy(Duration::ZERO);
        self.container.remove();
        self.state = SessionState::Disposed;
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Encodes an RGBA surface as lossy WebP. `quality` is in `0.0..=1.0`.
///
/// # Errors
/// Returns [`SessionError::Encode`] for an empty surface.
pub fn encode_frame(surface: &RgbaImage, quality: f32) -> Result<ImageBlob, SessionError> {
    let (width, height) = surface.dimensions();
    if width == 0 || height == 0 {
        return Err(SessionError::Encode("surface is empty".into()));
    }
    let encoded = webp::Encoder::from_rgba(surface.as_raw(), width, height)
        .encode(quality.clamp(0.0, 1.0) * 100.0);
    Ok(ImageBlob {
        bytes: encoded.deref().to_vec(),
        mime_type: IMAGE_MIME_TYPE,
    })
}

/// Collaborators a capture needs.
pub struct CaptureContext<'a> {
    pub stage: &'a Stage,
    pub previews: &'a dyn PreviewFactory,
    pub store: &'a dyn ContentStore,
    pub config: &'a ThumbnailConfig,
}

/// Result of a capture that didn't fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// The thumbnail was persisted at this path.
    Stored(String),
    /// The model never became ready; nothing was written.
    Skipped,
}

/// Runs one complete session for `path`.
///
/// The destination directory must already exist.
///
/// # Errors
/// Any failure while loading, capturing, or uploading. The session is
/// disposed before returning either way.
pub fn capture_and_store(
    ctx: &CaptureContext<'_>,
    path: &str,
) -> Result<CaptureOutcome, SessionError> {
    let mut session =
        CaptureSession::open(ctx.stage, ctx.previews, path, ctx.config.surface_size)?;

    if !session.await_ready(ctx.config.ready_timeout())? {
        log::warn!(
            "Timed out after {}ms waiting for \"{}\" to render; skipping",
            ctx.config.ready_timeout_ms,
            path
        );
        return Ok(CaptureOutcome::Skipped);
    }

    let blob = session.capture_frame(ctx.config.image_quality, ctx.config.settle_delay())?;
    session.dispose();

    let ThumbnailPathInfo {
        output_path,
        image_file_name,
    } = thumbnail_path_info_under(&ctx.config.output_root, path);

    if ctx.config.debug {
        write_debug_copy(ctx.config.debug_dir.as_deref(), &image_file_name, &blob);
    }

    let stored = save_image(ctx.store, &ctx.config.namespace, blob, &output_path)?;
    Ok(CaptureOutcome::Stored(stored))
}

fn write_debug_copy(dir: Option<&Path>, file_name: &str, blob: &ImageBlob) {
    log::debug!("encoded {} ({} bytes)", file_name, blob.bytes.len());
    let Some(dir) = dir else {
        return;
    };
    let target = dir.join(file_name);
    let written = std::fs::create_dir_all(dir).and_then(|_| std::fs::write(&target, &blob.bytes));
    if let Err(e) = written {
        log::warn!("could not write debug copy {}: {}", target.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_frame_produces_webp() {
        let surface = RgbaImage::from_pixel(8, 8, image::Rgba([200, 10, 10, 255]));
        let blob = encode_frame(&surface, 0.8).unwrap();
        assert_eq!(blob.mime_type, "image/webp");
        assert_eq!(&blob.bytes[0..4], b"RIFF");
        assert_eq!(&blob.bytes[8..12], b"WEBP");
    }

    #[test]
    fn test_encode_empty_surface_fails() {
        let surface = RgbaImage::new(0, 0);
        assert!(matches!(
            encode_frame(&surface, 0.8),
            Err(SessionError::Encode(_))
        ));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SessionState::TimedOut.to_string(), "timed out");
    }
}
