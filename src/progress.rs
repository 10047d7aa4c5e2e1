//! Progress-callback trait for per-name fetch events.
//!
//! Inject an [`Arc<dyn RunProgressCallback>`] via
//! [`crate::config::SheetConfigBuilder::progress_callback`] to receive events
//! as the scheduler resolves and downloads each distinct card name.
//!
//! Events are per *distinct name*, not per requested copy: `4 Island` and
//! `2 Island` on two lines produce one start and one completion.
//!
//! # Example
//!
//! ```rust
//! use proxysheet::{RunProgressCallback, SheetConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     fetched: AtomicUsize,
//! }
//!
//! impl RunProgressCallback for CountingCallback {
//!     fn on_fetch_complete(&self, name: &str, bytes: usize) {
//!         self.fetched.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{name}: {bytes} bytes");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { fetched: AtomicUsize::new(0) });
//!
//! let config = SheetConfig::builder()
//!     .progress_callback(counter as Arc<dyn RunProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the scheduler as it works through distinct card names.
///
/// Implementations must be `Send + Sync`: fetches run concurrently, so
/// `on_fetch_start`, `on_fetch_complete` and `on_fetch_error` may be called
/// from different worker threads at once. All methods default to no-ops.
pub trait RunProgressCallback: Send + Sync {
    /// Called once before any network request.
    fn on_run_start(&self, unique_names: usize) {
        let _ = unique_names;
    }

    /// Called just before a name is resolved.
    fn on_fetch_start(&self, name: &str) {
        let _ = name;
    }

    /// Called when a name's image is downloaded and decoded.
    fn on_fetch_complete(&self, name: &str, bytes: usize) {
        let _ = (name, bytes);
    }

    /// Called when a name fails (not found, download error, timeout).
    fn on_fetch_error(&self, name: &str, error: &str) {
        let _ = (name, error);
    }

    /// Called once after every distinct name has a terminal outcome.
    fn on_run_complete(&self, unique_names: usize, ready: usize) {
        let _ = (unique_names, ready);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl RunProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::SheetConfig`].
pub type ProgressCallback = Arc<dyn RunProgressCallback>;
