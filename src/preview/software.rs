//! A [`Preview`] backed by the CPU rasterizer.
//!
//! Loading happens on a dedicated thread: the model file is parsed, its
//! triangles are added to the shared scene, the camera is reframed, and only
//! then is the load signal fired. The thread is detached and may outlive its
//! preview. It checks for destruction after parsing and again before touching
//! the scene, so a preview destroyed mid-load discards the late result and
//! the thread exits without building triangles it no longer needs.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use image::RgbaImage;

use crate::preview::{
    load_signal, loader, Container, LoadNotifier, LoadSignal, Preview, PreviewError,
    PreviewFactory, PreviewOptions,
};
use crate::renderer::{self, Camera, Scene};
use crate::store::decode_path;

#[derive(Default)]
struct SceneState {
    scene: Scene,
    camera: Option<Camera>,
}

/// Panic-free `Mutex` access for preview state.
trait MutexExt<T> {
    fn lock_or_fail(&self) -> Result<MutexGuard<'_, T>, PreviewError>;
}

impl<T> MutexExt<T> for Mutex<T> {
    fn lock_or_fail(&self) -> Result<MutexGuard<'_, T>, PreviewError> {
        self.lock().map_err(|_| PreviewError::Poisoned)
    }
}

/// Creates [`SoftwarePreview`]s reading models from a directory on disk.
#[derive(Debug, Clone)]
pub struct SoftwarePreviewFactory {
    model_root: PathBuf,
}

impl SoftwarePreviewFactory {
    /// `model_root` is the on-disk directory that model store paths are relative to.
    pub fn new(model_root: impl Into<PathBuf>) -> Self {
        Self {
            model_root: model_root.into(),
        }
    }

    fn resolve(&self, model_path: &str) -> Result<PathBuf, PreviewError> {
        let clean = decode_path(model_path)
            .map_err(|_| PreviewError::InvalidPath(model_path.to_string()))?;
        let mut resolved = self.model_root.clone();
        for segment in clean.split('/').filter(|s| !s.is_empty() && *s != ".") {
            if segment == ".." || segment.contains('\\') {
                return Err(PreviewError::InvalidPath(model_path.to_string()));
            }
            resolved.push(segment);
        }
        Ok(resolved)
    }
}

impl PreviewFactory for SoftwarePreviewFactory {
    fn create(
        &self,
        container: &Container,
        options: PreviewOptions,
    ) -> Result<Box<dyn Preview>, PreviewError> {
        let path = self.resolve(&options.model_path)?;
        let preview = SoftwarePreview::spawn(container.id(), path, &options)?;
        Ok(Box::new(preview))
    }
}

/// Offscreen preview rendering through [`renderer::render`].
pub struct SoftwarePreview {
    state: Arc<Mutex<SceneState>>,
    destroyed: Arc<AtomicBool>,
    surface: RgbaImage,
    ready: LoadSignal,
    auto_dispose: bool,
}

impl SoftwarePreview {
    fn spawn(
        container_id: u64,
        path: PathBuf,
        options: &PreviewOptions,
    ) -> Result<Self, PreviewError> {
        let state = Arc::new(Mutex::new(SceneState::default()));
        let destroyed = Arc::new(AtomicBool::new(false));
        let (notifier, ready) = load_signal();
        let aspect = options.width as f32 / options.height.max(1) as f32;

        let thread_state = Arc::clone(&state);
        let thread_destroyed = Arc::clone(&destroyed);
        thread::Builder::new()
            .name(format!("preview-load-{}", container_id))
            .spawn(move || {
                load_into_scene(&path, aspect, &thread_state, &thread_destroyed, notifier)
            })
            .map_err(PreviewError::Spawn)?;

        Ok(Self {
            state,
            destroyed,
            surface: RgbaImage::new(options.width, options.height),
            ready,
            auto_dispose: !options.prevent_auto_dispose,
        })
    }
}

fn load_into_scene(
    path: &Path,
    aspect: f32,
    state: &Mutex<SceneState>,
    destroyed: &AtomicBool,
    notifier: LoadNotifier,
) {
    let fail = |e: loader::LoadError| format!("{}: {}", path.display(), e);
    let model = match loader::import_model(path) {
        Ok(model) => model,
        Err(e) => return notifier.failed(fail(e)),
    };
    if destroyed.load(Ordering::Acquire) {
        log::debug!("preview destroyed while parsing {}", path.display());
        return;
    }
    let triangles = match model.triangles() {
        Ok(triangles) => triangles,
        Err(e) => return notifier.failed(fail(e)),
    };
    if destroyed.load(Ordering::Acquire) {
        return;
    }

    let Ok(mut guard) = state.lock() else {
        notifier.failed("preview state poisoned");
        return;
    };
    guard.scene.add(triangles);
    let camera = Camera::for_scene(&guard.scene, aspect);
    guard.camera = camera;
    drop(guard);

    log::debug!("model added to scene: {}", path.display());
    notifier.model_added();
}

impl Preview for SoftwarePreview {
    fn ready_signal(&self) -> &LoadSignal {
        &self.ready
    }

    fn render(&mut self) -> Result<(), PreviewError> {
        if self.destroyed.load(Ordering::Acquire) {
            return Err(PreviewError::Destroyed);
        }
        let guard = self.state.lock_or_fail()?;
        match &guard.camera {
            Some(camera) => renderer::render(&guard.scene, camera, &mut self.surface),
            None => self.surface.pixels_mut().for_each(|p| p.0 = [0, 0, 0, 0]),
        }
        Ok(())
    }

    fn surface(&self) -> &RgbaImage {
        &self.surface
    }

    fn destroy(&mut self, delay: Duration) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        if let Ok(mut guard) = self.state.lock() {
            guard.scene.clear();
            guard.camera = None;
        }
        self.surface = RgbaImage::new(0, 0);
    }
}

impl Drop for SoftwarePreview {
    fn drop(&mut self) {
        if self.auto_dispose {
            self.destroy(Duration::ZERO);
        }
    }
}
