//! Provides the offscreen 3D preview contract used by capture sessions.
//!
//! A preview is mounted into a hidden [`Container`], starts loading its model
//! immediately, and reports through a one-shot [`LoadSignal`] once the model
//! has been added to its scene. Sessions race that signal against a timeout
//! rather than inspecting rendered output.

pub mod loader;
pub mod software;
pub mod stage;

use std::time::Duration;

use crossbeam_channel::{after, bounded, select, Receiver, Sender};
use image::RgbaImage;
use thiserror::Error;

pub use software::{SoftwarePreview, SoftwarePreviewFactory};
pub use stage::{Container, Stage};

/// Errors raised by a preview implementation.
#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("Invalid model path: {0}")]
    InvalidPath(String),
    #[error("Failed to start model loader: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("Preview state is unavailable (a loader thread panicked)")]
    Poisoned,
    #[error("Preview has already been destroyed")]
    Destroyed,
}

/// Construction options for a preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewOptions {
    /// Content-store path of the model to load.
    pub model_path: String,
    /// Keep resources alive until `destroy` is called explicitly.
    pub prevent_auto_dispose: bool,
    pub width: u32,
    pub height: u32,
}

/// Outcome of waiting on a [`LoadSignal`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// The model was added to the scene.
    Ready,
    /// The timer fired first.
    TimedOut,
    /// The preview gave up loading.
    Failed(String),
}

/// Fires the paired [`LoadSignal`]. Consumed on use, so it fires at most once.
#[derive(Debug)]
pub struct LoadNotifier {
    tx: Sender<Result<(), String>>,
}

impl LoadNotifier {
    /// Reports that the model has been fully added to the scene.
    pub fn model_added(self) {
        // The receiver may already have been dropped with its session.
        let _ = self.tx.try_send(Ok(()));
    }

    /// Reports that loading failed.
    pub fn failed(self, reason: impl Into<String>) {
        let _ = self.tx.try_send(Err(reason.into()));
    }
}

/// Receiving half of a one-shot load completion signal.
#[derive(Debug)]
pub struct LoadSignal {
    rx: Receiver<Result<(), String>>,
}

impl LoadSignal {
    /// Waits up to `timeout` for the signal.
    ///
    /// A notifier dropped without firing counts as a failure.
    pub fn wait(&self, timeout: Duration) -> Readiness {
        select! {
            recv(self.rx) -> msg => match msg {
                Ok(Ok(())) => Readiness::Ready,
                Ok(Err(reason)) => Readiness::Failed(reason),
                Err(_) => Readiness::Failed("preview dropped its load signal".to_string()),
            },
            recv(after(timeout)) -> _ => Readiness::TimedOut,
        }
    }
}

/// Creates a connected notifier/signal pair.
pub fn load_signal() -> (LoadNotifier, LoadSignal) {
    let (tx, rx) = bounded(1);
    (LoadNotifier { tx }, LoadSignal { rx })
}

/// An offscreen model preview.
pub trait Preview: Send {
    /// The signal fired once the model has been added to the scene.
    fn ready_signal(&self) -> &LoadSignal;

    /// Renders the current scene through the current camera onto the surface.
    fn render(&mut self) -> Result<(), PreviewError>;

    /// The most recently rendered frame.
    fn surface(&self) -> &RgbaImage;

    /// Releases all resources after `delay`. Repeated calls are no-ops.
    fn destroy(&mut self, delay: Duration);
}

/// Builds previews mounted into stage containers.
pub trait PreviewFactory: Send + Sync {
    fn create(
        &self,
        container: &Container,
        options: PreviewOptions,
    ) -> Result<Box<dyn Preview>, PreviewError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_ready() {
        let (notifier, signal) = load_signal();
        notifier.model_added();
        assert_eq!(signal.wait(Duration::from_millis(10)), Readiness::Ready);
    }

    #[test]
    fn test_signal_times_out() {
        let (_notifier, signal) = load_signal();
        assert_eq!(signal.wait(Duration::from_millis(20)), Readiness::TimedOut);
    }

    #[test]
    fn test_signal_dropped_notifier_fails() {
        let (notifier, signal) = load_signal();
        drop(notifier);
        assert!(matches!(
            signal.wait(Duration::from_secs(1)),
            Readiness::Failed(_)
        ));
    }

    #[test]
    fn test_signal_fires_from_another_thread() {
        let (notifier, signal) = load_signal();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            notifier.failed("bad mesh");
        });
        assert_eq!(
            signal.wait(Duration::from_secs(2)),
            Readiness::Failed("bad mesh".to_string())
        );
        handle.join().unwrap();
    }
}
