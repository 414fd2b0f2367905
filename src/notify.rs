//! Provides the notification and progress sink used during thumbnail batches.
//!
//! The host application decides how notices are shown. The library only
//! talks to the [`Notifier`] trait, and puts it into quiet mode while a batch
//! runs so per-file "saved" notices don't flood the user.

use std::sync::atomic::{AtomicBool, Ordering};

/// Receives progress updates and user-facing messages.
pub trait Notifier: Send + Sync {
    /// Reports batch progress as a whole percentage in `0..=100`.
    fn progress(&self, label: &str, percent: u8);

    /// Posts a routine informational notice. Suppressed while quiet.
    fn info(&self, message: &str);

    /// Posts a warning. Never suppressed.
    fn warn(&self, message: &str);

    /// Posts an error. Never suppressed.
    fn error(&self, message: &str);

    /// Enables or disables quiet mode.
    fn set_quiet(&self, quiet: bool);

    /// Returns whether quiet mode is active.
    fn is_quiet(&self) -> bool;
}

/// Holds a notifier in quiet mode until dropped, then restores the previous mode.
pub struct QuietGuard<'a> {
    notifier: &'a dyn Notifier,
    previous: bool,
}

impl<'a> QuietGuard<'a> {
    pub fn new(notifier: &'a dyn Notifier) -> Self {
        let previous = notifier.is_quiet();
        notifier.set_quiet(true);
        Self { notifier, previous }
    }
}

impl Drop for QuietGuard<'_> {
    fn drop(&mut self) {
        self.notifier.set_quiet(self.previous);
    }
}

/// Routes notices through the `log` facade.
#[derive(Debug, Default)]
pub struct LogNotifier {
    quiet: AtomicBool,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Notifier for LogNotifier {
    fn progress(&self, label: &str, percent: u8) {
        log::debug!("{} {}%", label, percent);
    }

    fn info(&self, message: &str) {
        if !self.is_quiet() {
            log::info!("{}", message);
        }
    }

    fn warn(&self, message: &str) {
        log::warn!("{}", message);
    }

    fn error(&self, message: &str) {
        log::error!("{}", message);
    }

    fn set_quiet(&self, quiet: bool) {
        self.quiet.store(quiet, Ordering::Relaxed);
    }

    fn is_quiet(&self) -> bool {
        self.quiet.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_guard_restores_previous_mode() {
        let notifier = LogNotifier::new();
        assert!(!notifier.is_quiet());
        {
            let _guard = QuietGuard::new(&notifier);
            assert!(notifier.is_quiet());
            {
                let _nested = QuietGuard::new(&notifier);
                assert!(notifier.is_quiet());
            }
            // the inner guard must not lift the outer one
            assert!(notifier.is_quiet());
        }
        assert!(!notifier.is_quiet());
    }
}
