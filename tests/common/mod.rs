//! Shared test doubles: an in-memory content store, scripted previews, and a
//! notifier that records everything it is told.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use image::RgbaImage;

use fpp3d::config::ThumbnailConfig;
use fpp3d::notify::Notifier;
use fpp3d::preview::{
    load_signal, Container, LoadNotifier, LoadSignal, Preview, PreviewError, PreviewFactory,
    PreviewOptions,
};
use fpp3d::store::{BrowseResult, ContentStore, StoreError, UploadFile, UploadResponse};
use fpp3d::ThumbnailScheduler;

// ===========================================================================
// Content store
// ===========================================================================

#[derive(Default)]
pub struct MemoryStore {
    dirs: Mutex<BTreeSet<String>>,
    files: Mutex<BTreeMap<String, UploadFile>>,
    pub created: Mutex<Vec<String>>,
    pub browse_calls: AtomicUsize,
    /// Uploads of these file names fail.
    pub fail_uploads: HashSet<String>,
    /// Creating these directories reports "already exists" as if another
    /// client had just created them.
    pub race_dirs: HashSet<String>,
    pub browse_fails: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_upload(mut self, name: &str) -> Self {
        self.fail_uploads.insert(name.to_string());
        self
    }

    pub fn browse_failing(mut self) -> Self {
        self.browse_fails = true;
        self
    }

    pub fn racing_on(mut self, dir: &str) -> Self {
        self.race_dirs.insert(dir.to_string());
        self
    }

    pub fn file_paths(&self) -> Vec<String> {
        self.files.lock().unwrap().keys().cloned().collect()
    }

    pub fn file(&self, path: &str) -> Option<UploadFile> {
        self.files.lock().unwrap().get(path).cloned()
    }
}

impl ContentStore for MemoryStore {
    fn browse(&self, _namespace: &str, dir: &str) -> Result<BrowseResult, StoreError> {
        self.browse_calls.fetch_add(1, Ordering::SeqCst);
        if self.browse_fails {
            return Err(StoreError::Backend("store offline".into()));
        }
        if self.dirs.lock().unwrap().contains(dir) {
            Ok(BrowseResult {
                target: Some(dir.to_string()),
                ..Default::default()
            })
        } else {
            Err(StoreError::DirectoryMissing(dir.to_string()))
        }
    }

    fn create_directory(&self, _namespace: &str, dir: &str) -> Result<(), StoreError> {
        let mut dirs = self.dirs.lock().unwrap();
        if self.race_dirs.contains(dir) {
            dirs.insert(dir.to_string());
            return Err(StoreError::AlreadyExists(dir.to_string()));
        }
        if !dirs.insert(dir.to_string()) {
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
        if self.fail_uploads.contains(&file.name) {
            return Err(StoreError::Backend(format!("quota exceeded for {}", file.name)));
        }
        if !self.dirs.lock().unwrap().contains(dir) {
            return Err(StoreError::DirectoryMissing(dir.to_string()));
        }
        let path = format!("{}/{}", dir, file.name);
        self.files.lock().unwrap().insert(path.clone(), file);
        Ok(UploadResponse { path: Some(path) })
    }
}

// ===========================================================================
// Previews
// ===========================================================================

/// How a scripted preview behaves once created.
#[derive(Clone)]
pub enum Script {
    /// Fires `model_added` right away.
    Ready,
    /// Never fires.
    Never,
    /// Reports a failed load.
    LoadFails,
    /// Panics when rendered.
    PanicOnRender,
    /// Fires `model_added` once the gate receives a value.
    Gated(Receiver<()>),
}

pub struct ScriptedPreview {
    signal: LoadSignal,
    _pending: Option<LoadNotifier>,
    surface: RgbaImage,
    panic_on_render: bool,
    destroyed: bool,
    factory: Arc<FactoryState>,
}

impl Preview for ScriptedPreview {
    fn ready_signal(&self) -> &LoadSignal {
        &self.signal
    }

    fn render(&mut self) -> Result<(), PreviewError> {
        if self.panic_on_render {
            panic!("renderer exploded");
        }
        self.factory.renders.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn surface(&self) -> &RgbaImage {
        &self.surface
    }

    fn destroy(&mut self, _delay: Duration) {
        if !self.destroyed {
            self.destroyed = true;
            self.factory.destroyed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[derive(Default)]
pub struct FactoryState {
    pub created: Mutex<Vec<String>>,
    pub destroyed: AtomicUsize,
    pub renders: AtomicUsize,
    pub prevent_auto_dispose_seen: AtomicBool,
    pub on_create: Mutex<Option<Sender<String>>>,
}

#[derive(Default)]
pub struct ScriptedFactory {
    scripts: HashMap<String, Script>,
    pub state: Arc<FactoryState>,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: &str, script: Script) -> Self {
        self.scripts.insert(path.to_string(), script);
        self
    }

    pub fn notify_on_create(&self, tx: Sender<String>) {
        *self.state.on_create.lock().unwrap() = Some(tx);
    }

    pub fn created(&self) -> Vec<String> {
        self.state.created.lock().unwrap().clone()
    }

    pub fn destroyed(&self) -> usize {
        self.state.destroyed.load(Ordering::SeqCst)
    }
}

impl PreviewFactory for ScriptedFactory {
    fn create(
        &self,
        _container: &Container,
        options: PreviewOptions,
    ) -> Result<Box<dyn Preview>, PreviewError> {
        self.state
            .created
            .lock()
            .unwrap()
            .push(options.model_path.clone());
        if options.prevent_auto_dispose {
            self.state
                .prevent_auto_dispose_seen
                .store(true, Ordering::SeqCst);
        }
        if let Some(tx) = self.state.on_create.lock().unwrap().as_ref() {
            let _ = tx.send(options.model_path.clone());
        }

        let script = self
            .scripts
            .get(&options.model_path)
            .cloned()
            .unwrap_or(Script::Ready);
        let (notifier, signal) = load_signal();
        let mut pending = None;
        let mut panic_on_render = false;
        match script {
            Script::Ready => notifier.model_added(),
            Script::Never => pending = Some(notifier),
            Script::LoadFails => notifier.failed("corrupt buffer"),
            Script::PanicOnRender => {
                panic_on_render = true;
                notifier.model_added();
            }
            Script::Gated(gate) => {
                std::thread::spawn(move || {
                    if gate.recv().is_ok() {
                        notifier.model_added();
                    }
                });
            }
        }

        Ok(Box::new(ScriptedPreview {
            signal,
            _pending: pending,
            surface: RgbaImage::from_pixel(
                options.width,
                options.height,
                image::Rgba([40, 120, 200, 255]),
            ),
            panic_on_render,
            destroyed: false,
            factory: Arc::clone(&self.state),
        }))
    }
}

// ===========================================================================
// Notifier
// ===========================================================================

#[derive(Default)]
pub struct RecordingNotifier {
    pub progress: Mutex<Vec<u8>>,
    pub infos: Mutex<Vec<String>>,
    pub warnings: Mutex<Vec<String>>,
    pub errors: Mutex<Vec<String>>,
    quiet: AtomicBool,
}

impl RecordingNotifier {
    pub fn progress(&self) -> Vec<u8> {
        self.progress.lock().unwrap().clone()
    }

    pub fn infos(&self) -> Vec<String> {
        self.infos.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn progress(&self, _label: &str, percent: u8) {
        self.progress.lock().unwrap().push(percent);
    }

    fn info(&self, message: &str) {
        if !self.is_quiet() {
            self.infos.lock().unwrap().push(message.to_string());
        }
    }

    fn warn(&self, message: &str) {
        self.warnings.lock().unwrap().push(message.to_string());
    }

    fn error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }

    fn set_quiet(&self, quiet: bool) {
        self.quiet.store(quiet, Ordering::SeqCst);
    }

    fn is_quiet(&self) -> bool {
        self.quiet.load(Ordering::SeqCst)
    }
}

// ===========================================================================
// Helpers
// ===========================================================================

/// Fast config for scripted sessions.
pub fn test_config() -> ThumbnailConfig {
    ThumbnailConfig {
        ready_timeout_ms: 100,
        settle_delay_ms: 0,
        surface_size: 8,
        ..ThumbnailConfig::default()
    }
}

pub fn scheduler(
    config: ThumbnailConfig,
    store: &Arc<MemoryStore>,
    factory: &Arc<ScriptedFactory>,
    notifier: &Arc<RecordingNotifier>,
) -> ThumbnailScheduler {
    ThumbnailScheduler::new(
        config,
        store.clone(),
        factory.clone(),
        notifier.clone(),
    )
}

pub fn paths(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}
