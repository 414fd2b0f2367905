//! Provides the concurrency-limited thumbnail batch scheduler.
//!
//! A batch hands its paths to a [`WorkQueue`] and starts one worker thread per
//! allowed rendering context. Workers claim paths in insertion order until the
//! queue is empty. A failing path is reported and counted but never stops its
//! worker or any sibling; only directory setup before the first session can
//! fail the whole batch.

use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crate::capture::{capture_and_store, CaptureContext, CaptureOutcome, SessionError};
use crate::config::ThumbnailConfig;
use crate::error::ThumbnailError;
use crate::notify::{Notifier, QuietGuard};
use crate::paths::thumbnail_path_info_under;
use crate::preview::{PreviewFactory, Stage};
use crate::settings::MAX_CONTEXTS;
use crate::store::{ensure_parent_directories_exist, ContentStore};

/// Aggregate result of one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub total: usize,
    pub elapsed: Duration,
}

impl BatchSummary {
    pub fn elapsed_ms(&self) -> u128 {
        self.elapsed.as_millis()
    }
}

/// A fixed list of items claimed front to back. Each item is handed out once.
#[derive(Debug)]
pub struct WorkQueue<T> {
    items: Vec<T>,
    cursor: AtomicUsize,
}

impl<T> WorkQueue<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Claims the next unclaimed item, or `None` once the queue is drained.
    pub fn claim(&self) -> Option<&T> {
        let idx = self.cursor.fetch_add(1, Ordering::AcqRel);
        self.items.get(idx)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.items
            .len()
            .saturating_sub(self.cursor.load(Ordering::Acquire))
    }
}

#[derive(Default)]
struct Tally {
    processed: usize,
    succeeded: usize,
}

/// Sessions a batch may run at once, within the rendering-context limit.
fn worker_count(concurrency: usize) -> usize {
    concurrency.clamp(MAX_CONTEXTS.min as usize, MAX_CONTEXTS.max as usize)
}

/// Whole-percent progress; only reaches 100 once every path is processed.
fn progress_percent(processed: usize, total: usize) -> u8 {
    if total == 0 || processed >= total {
        return 100;
    }
    let rounded = (processed * 200 + total) / (total * 2);
    rounded.min(99) as u8
}

struct RunningGuard<'a>(&'a AtomicBool);

impl<'a> RunningGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, ThumbnailError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| Self(flag))
            .map_err(|_| ThumbnailError::BatchInProgress)
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

pub struct ThumbnailScheduler {
    config: ThumbnailConfig,
    store: Arc<dyn ContentStore>,
    previews: Arc<dyn PreviewFactory>,
    notifier: Arc<dyn Notifier>,
    stage: Stage,
    running: AtomicBool,
}

impl ThumbnailScheduler {
    pub fn new(
        config: ThumbnailConfig,
        store: Arc<dyn ContentStore>,
        previews: Arc<dyn PreviewFactory>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            store,
            previews,
            notifier,
            stage: Stage::new(),
            running: AtomicBool::new(false),
        }
    }

    /// Mounts previews on `stage` instead of a private one.
    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stage = stage;
        self
    }

    pub fn config(&self) -> &ThumbnailConfig {
        &self.config
    }

    pub fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Generates thumbnails for `paths` using up to `concurrency` sessions at once.
    ///
    /// `concurrency` is clamped to `1..=10`. `progress` receives 0 once the
    /// batch has started, then the processed percentage after every path. A
    /// rejected batch reports nothing. The notifier stays in quiet mode for
    /// the duration of the batch.
    ///
    /// # Errors
    /// Returns [`ThumbnailError::BatchInProgress`] if this scheduler is already
    /// running a batch, or [`ThumbnailError::Asset`] if the destination
    /// directories can't be prepared. Per-path failures are not errors; they
    /// show up as `succeeded < total`.
    pub fn run(
        &self,
        paths: Vec<String>,
        concurrency: usize,
        progress: &(dyn Fn(u8) + Sync),
    ) -> Result<BatchSummary, ThumbnailError> {
        let _running = RunningGuard::acquire(&self.running)?;
        let _quiet = QuietGuard::new(self.notifier.as_ref());
        let started = Instant::now();
        let total = paths.len();

        if total == 0 {
            progress(100);
            return Ok(BatchSummary {
                succeeded: 0,
                total: 0,
                elapsed: started.elapsed(),
            });
        }

        progress(0);
        self.prepare_directories(&paths)?;

        let queue = WorkQueue::new(paths);
        let tally = Mutex::new(Tally::default());
        let ctx = CaptureContext {
            stage: &self.stage,
            previews: self.previews.as_ref(),
            store: self.store.as_ref(),
            config: &self.config,
        };
        let workers = worker_count(concurrency);
        log::debug!("starting {} workers for {} paths", workers, total);

        thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| self.work(&queue, &ctx, &tally, total, progress));
            }
        });

        let tally = tally.into_inner().unwrap_or_else(PoisonError::into_inner);
        let summary = BatchSummary {
            succeeded: tally.succeeded,
            total: tally.processed,
            elapsed: started.elapsed(),
        };
        log::info!(
            "generated {}/{} thumbnails in {}ms",
            summary.succeeded,
            summary.total,
            summary.elapsed_ms()
        );
        Ok(summary)
    }

    /// Ensures each distinct destination directory once, in first-seen order.
    fn prepare_directories(&self, paths: &[String]) -> Result<(), ThumbnailError> {
        let mut seen = HashSet::new();
        for path in paths {
            let info = thumbnail_path_info_under(&self.config.output_root, path);
            if seen.insert(info.output_dir().to_string()) {
                ensure_parent_directories_exist(
                    self.store.as_ref(),
                    &self.config.namespace,
                    &info.output_path,
                )?;
            }
        }
        Ok(())
    }

    fn work(
        &self,
        queue: &WorkQueue<String>,
        ctx: &CaptureContext<'_>,
        tally: &Mutex<Tally>,
        total: usize,
        progress: &(dyn Fn(u8) + Sync),
    ) {
        while let Some(path) = queue.claim() {
            log::debug!("claimed {} ({} left)", path, queue.remaining());

            let result = panic::catch_unwind(AssertUnwindSafe(|| capture_and_store(ctx, path)))
                .unwrap_or_else(|payload| Err(SessionError::Panicked(panic_message(payload))));

            let stored = match result {
                Ok(CaptureOutcome::Stored(saved)) => {
                    log::debug!("saved {}", saved);
                    true
                }
                Ok(CaptureOutcome::Skipped) => false,
                Err(source) => {
                    self.notifier
                        .error(&format!("Failed to save 3d thumbnail for \"{}\"", path));
                    let err = ThumbnailError::Session {
                        path: path.clone(),
                        source,
                    };
                    log::error!("{}", err);
                    false
                }
            };

            // Report under the lock so percentages never go backwards.
            let mut tally = tally.lock().unwrap_or_else(PoisonError::into_inner);
            tally.processed += 1;
            if stored {
                tally.succeeded += 1;
            }
            progress(progress_percent(tally.processed, total));
        }
    }
}
