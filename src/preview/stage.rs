//! Offscreen mount points for previews.
//!
//! The stage stands in for the host document: every preview needs a hidden
//! container to mount into, and every container must be removed when its
//! session ends. The stage counts live containers so leaks are observable.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct StageInner {
    live: AtomicUsize,
    peak: AtomicUsize,
    mounted_total: AtomicUsize,
    next_id: AtomicU64,
}

/// Registry of mounted preview containers. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct Stage {
    inner: Arc<StageInner>,
}

impl Stage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mounts a new hidden container.
    pub fn mount(&self) -> Container {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let live = self.inner.live.fetch_add(1, Ordering::AcqRel) + 1;
        self.inner.peak.fetch_max(live, Ordering::AcqRel);
        self.inner.mounted_total.fetch_add(1, Ordering::Relaxed);
        Container {
            id,
            stage: Arc::clone(&self.inner),
            mounted: true,
        }
    }

    /// Containers currently mounted.
    pub fn live(&self) -> usize {
        self.inner.live.load(Ordering::Acquire)
    }

    /// Largest number of containers mounted at the same time.
    pub fn peak(&self) -> usize {
        self.inner.peak.load(Ordering::Acquire)
    }

    /// Containers mounted over the stage's lifetime.
    pub fn mounted_total(&self) -> usize {
        self.inner.mounted_total.load(Ordering::Relaxed)
    }
}

/// A hidden mount point. Removed from the stage on [`Container::remove`] or drop.
#[derive(Debug)]
pub struct Container {
    id: u64,
    stage: Arc<StageInner>,
    mounted: bool,
}

impl Container {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Unmounts the container. Repeated calls are no-ops.
    pub fn remove(&mut self) {
        if self.mounted {
            self.mounted = false;
            self.stage.live.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

impl Drop for Container {
    fn drop(&mut self) {
        self.remove();
    }
}
