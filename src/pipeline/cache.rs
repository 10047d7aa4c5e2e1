//! Single-flight cache: each distinct card name is resolved and downloaded
//! at most once per run.
//!
//! ## Slot lifecycle
//!
//! Every name maps to one slot, an async [`OnceCell<Outcome>`]:
//!
//! ```text
//! (no slot) ──first acquire──▶ empty cell (Pending) ──init completes──▶ Ready | Failed
//!                                   ▲                │
//!                                   └─init dropped───┘   (cancelled: next acquire re-drives)
//! ```
//!
//! The first caller runs the initialiser (resolve → fetch → decode); every
//! concurrent caller for the same name awaits that same initialiser and then
//! reads the same terminal [`Outcome`]. Failures are terminal too: a name that
//! failed is not retried within the run. Once set, the cell is read without
//! locking. The only lock is the short-lived one around the name → slot map.
//!
//! Because initialisation of a `OnceCell` is cancel-safe, dropping the run
//! (user abort) never leaves a slot stuck half-way: an abandoned slot is
//! simply still empty.

use crate::config::SheetConfig;
use crate::error::EntryError;
use crate::output::ImageAsset;
use crate::pipeline::decode::decode_asset_blocking;
use crate::pipeline::fetch::Fetcher;
use crate::pipeline::resolve::Resolver;
use crate::progress::ProgressCallback;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Terminal result of resolving + fetching one name.
#[derive(Debug, Clone)]
pub enum Outcome {
    Ready(Arc<ImageAsset>),
    Failed(EntryError),
}

impl Outcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, Outcome::Ready(_))
    }

    pub fn asset(&self) -> Option<&Arc<ImageAsset>> {
        match self {
            Outcome::Ready(asset) => Some(asset),
            Outcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&EntryError> {
        match self {
            Outcome::Ready(_) => None,
            Outcome::Failed(e) => Some(e),
        }
    }
}

type Slot = Arc<OnceCell<Outcome>>;

/// Per-run name → outcome cache with single-flight loading.
pub struct DedupCache {
    resolver: Arc<dyn Resolver>,
    fetcher: Arc<dyn Fetcher>,
    slots: Mutex<HashMap<String, Slot>>,
    timeout: Duration,
    progress: Option<ProgressCallback>,
}

impl DedupCache {
    /// `timeout` bounds resolve + fetch + decode for one name.
    pub fn new(resolver: Arc<dyn Resolver>, fetcher: Arc<dyn Fetcher>, timeout: Duration) -> Self {
        Self {
            resolver,
            fetcher,
            slots: Mutex::new(HashMap::new()),
            timeout,
            progress: None,
        }
    }

    /// Build a cache using the config's acquire timeout and progress callback.
    pub fn from_config(
        resolver: Arc<dyn Resolver>,
        fetcher: Arc<dyn Fetcher>,
        config: &SheetConfig,
    ) -> Self {
        let mut cache = Self::new(
            resolver,
            fetcher,
            Duration::from_secs(config.acquire_timeout_secs),
        );
        cache.progress = config.progress_callback.clone();
        cache
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Get the outcome for `name`, loading it if no one has yet.
    ///
    /// Concurrent calls for the same name share one load and all receive the
    /// same outcome (for `Ready`, the same `Arc`).
    pub async fn acquire(&self, name: &str) -> Outcome {
        let slot = self.slot(name);
        slot.get_or_init(|| self.load(name)).await.clone()
    }

    /// The terminal outcome for `name`, if it has one. Never triggers a load.
    pub fn peek(&self, name: &str) -> Option<Outcome> {
        let slot = self.lock_slots().get(name).cloned()?;
        slot.get().cloned()
    }

    /// Number of names that have been requested so far.
    pub fn len(&self) -> usize {
        self.lock_slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_slots(&self) -> std::sync::MutexGuard<'_, HashMap<String, Slot>> {
        // Entries are inserted whole; a poisoned map is still consistent.
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn slot(&self, name: &str) -> Slot {
        let mut slots = self.lock_slots();
        Arc::clone(
            slots
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new())),
        )
    }

    async fn load(&self, name: &str) -> Outcome {
        if let Some(ref cb) = self.progress {
            cb.on_fetch_start(name);
        }

        let outcome = match tokio::time::timeout(self.timeout, self.resolve_and_fetch(name)).await {
            Ok(Ok(asset)) => Outcome::Ready(Arc::new(asset)),
            Ok(Err(e)) => Outcome::Failed(e),
            Err(_) => Outcome::Failed(EntryError::Timeout {
                name: name.to_string(),
                secs: self.timeout.as_secs(),
            }),
        };

        match &outcome {
            Outcome::Ready(asset) => {
                debug!("'{}' ready ({} bytes)", name, asset.bytes.len());
                if let Some(ref cb) = self.progress {
                    cb.on_fetch_complete(name, asset.bytes.len());
                }
            }
            Outcome::Failed(e) => {
                warn!("{}", e);
                if let Some(ref cb) = self.progress {
                    cb.on_fetch_error(name, &e.to_string());
                }
            }
        }
        outcome
    }

    async fn resolve_and_fetch(&self, name: &str) -> Result<ImageAsset, EntryError> {
        let location = self
            .resolver
            .resolve(name)
            .await
            .map_err(|e| EntryError::NotFound {
                name: name.to_string(),
                detail: e.detail,
            })?;

        let bytes = self
            .fetcher
            .fetch(&location)
            .await
            .map_err(|e| EntryError::FetchFailed {
                name: name.to_string(),
                detail: e.to_string(),
            })?;

        decode_asset_blocking(name.to_string(), bytes).await
    }
}
