//! # proxysheet
//!
//! Turn a plain-text card list into a printable PDF of proxy cards.
//!
//! Each line of the list is `<count> <name>`. Every distinct name is looked
//! up once on Scryfall and its image downloaded once, no matter how many
//! lines or copies ask for it. All requested copies are then placed, in
//! input order, on a fixed 3-column grid across as many pages as needed.
//!
//! ## Pipeline Overview
//!
//! ```text
//! card list
//!  │
//!  ├─ 1. Input     read file, parse "<count> <name>" lines
//!  ├─ 2. Fan-out   one resolve + fetch per distinct name (bounded pool,
//!  │               single-flight cache)
//!  ├─ 3. Rebuild   per-copy sequence in input order
//!  ├─ 4. Layout    pure grid pagination
//!  └─ 5. Render    PDF (one embedded image per distinct card), atomic write
//! ```
//!
//! Lines that fail (malformed, unknown card, download error) are skipped and
//! reported; they never abort the run.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use proxysheet::{generate_to_file, SheetConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SheetConfig::default();
//!     let written = generate_to_file("deck.txt", "deck.pdf", &config).await?;
//!     for skipped in &written.output.report.skipped {
//!         eprintln!("skipped line {}: {}", skipped.line, skipped.reason);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `proxysheet` binary (clap + anyhow + indicatif + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod generate;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{Geometry, ImageVariant, PageSize, SheetConfig, SheetConfigBuilder};
pub use error::{EntryError, ProxyError};
pub use generate::{check_input, generate, generate_sync, generate_to_file, run, write_pdf, WrittenRun};
pub use output::{
    AssetFormat, Document, ImageAsset, Page, RenderSlot, RequestEntry, RunOutcome, RunOutput, RunReport,
    RunStats, SkippedEntry,
};
pub use pipeline::fetch::{FetchError, Fetcher};
pub use pipeline::render::{DocumentRenderer, PdfRenderer};
pub use pipeline::resolve::{NotFound, Resolver, SourceLocation};
pub use progress::{NoopProgressCallback, ProgressCallback, RunProgressCallback};
