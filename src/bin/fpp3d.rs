//! Provides the `fpp3d-cli` tool for generating 3D model thumbnails into a content store.
//!
//! Usage: `fpp3d-cli <CONTENT_ROOT> [PATHS]... [--dir DIR]`
//!
//! Model paths are relative to the store's `data` namespace. Thumbnails are
//! written to `data/fpp-3d-thumbnails/<model dir>/<model file>.webp`.
//!
//! # Examples
//! ```text
//! fpp3d-cli ./store --dir maps/props --settings settings.toml
//! fpp3d-cli ./store tokens/orc.glb tokens/goblin.gltf -j 2
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use kdam::{Bar, BarExt};

use fpp3d::config::ThumbnailConfig;
use fpp3d::logger::setup_logging;
use fpp3d::notify::Notifier;
use fpp3d::presentation::{generate_for_listing, rewrite_thumbnail_sources, ListingEntry};
use fpp3d::preview::SoftwarePreviewFactory;
use fpp3d::settings::{effective_concurrency, Settings, MAX_CONTEXTS};
use fpp3d::store::{ContentStore, LocalContentStore};
use fpp3d::ThumbnailScheduler;

/// Generate WebP thumbnails for glTF/GLB models in a content store.
#[derive(Parser)]
#[command(name = "fpp3d-cli")]
struct Cli {
    /// Content store root directory (contains one directory per namespace).
    #[arg(value_name = "CONTENT_ROOT")]
    content_root: PathBuf,

    /// Model paths within the data namespace.
    #[arg(value_name = "PATHS")]
    paths: Vec<String>,

    /// Also include every file listed in this store directory.
    #[arg(long, short)]
    dir: Option<String>,

    /// Thumbnail configuration (TOML).
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Host settings (TOML, one table per module).
    #[arg(long, short)]
    settings: Option<PathBuf>,

    /// Override the rendering-context limit.
    #[arg(long, short = 'j', value_parser = clap::value_parser!(u8).range(1..=10))]
    concurrency: Option<u8>,

    /// Verbose output.
    #[arg(long, short)]
    verbose: bool,
}

/// Shows batch progress on a terminal bar.
struct BarNotifier {
    bar: Mutex<Bar>,
    quiet: AtomicBool,
}

impl BarNotifier {
    fn new() -> Self {
        Self {
            bar: Mutex::new(kdam::tqdm!(total = 100, desc = "Generating...", unit = "%")),
            quiet: AtomicBool::new(false),
        }
    }
}

impl Notifier for BarNotifier {
    fn progress(&self, _label: &str, percent: u8) {
        if let Ok(mut bar) = self.bar.try_lock() {
            let _ = bar.update_to(percent as usize);
        }
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

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => ThumbnailConfig::load(path)?,
        None => ThumbnailConfig::default(),
    };
    let mut settings = match &cli.settings {
        Some(path) => Settings::load(path)?,
        None => Settings::new(),
    };
    settings.register(&config.module_id, MAX_CONTEXTS);
    let concurrency = match cli.concurrency {
        Some(n) => n as usize,
        None => effective_concurrency(&settings, &config.module_id, &config.companion_module_id),
    };

    let notifier = Arc::new(BarNotifier::new());
    let store = LocalContentStore::new(&cli.content_root).with_notifier(notifier.clone());
    let model_root = store.namespace_root(&config.namespace)?;
    std::fs::create_dir_all(&model_root)
        .with_context(|| format!("creating {}", model_root.display()))?;

    let mut entries: Vec<ListingEntry> = cli.paths.iter().map(ListingEntry::new).collect();
    if let Some(dir) = &cli.dir {
        let listing = store
            .browse(&config.namespace, dir)
            .with_context(|| format!("listing {}", dir))?;
        entries.extend(listing.files.into_iter().map(ListingEntry::new));
    }

    let output_root = config.output_root.clone();
    let scheduler = ThumbnailScheduler::new(
        config,
        Arc::new(store),
        Arc::new(SoftwarePreviewFactory::new(model_root)),
        notifier,
    );
    log::debug!("using {} rendering contexts", concurrency);

    if generate_for_listing(&scheduler, &entries, concurrency)?.is_some() {
        rewrite_thumbnail_sources(&mut entries, &output_root);
        for entry in &entries {
            if let Some(thumb) = &entry.thumbnail.data_src {
                println!("{} -> {}", entry.path, thumb);
            }
        }
    }
    Ok(())
}
