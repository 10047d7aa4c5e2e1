//! Data model shared by the pipeline stages and returned to callers.
//!
//! Ownership follows the data flow: the scheduler produces
//! [`RequestEntry`]s from input lines, the dedup cache owns each fetched
//! [`ImageAsset`] behind an `Arc`, and layout hands out cheap `Arc` clones in
//! every [`RenderSlot`] that places a copy of it.

use crate::config::Geometry;
use crate::error::EntryError;
use serde::{Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// One parsed input line: `count` copies of `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestEntry {
    /// 1-based line number in the input file.
    pub line: usize,
    pub count: u32,
    pub name: String,
}

/// Encoded format of a downloaded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetFormat {
    Jpeg,
    Png,
}

/// A fetched card image, shared read-only by every slot that shows it.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageAsset {
    pub name: String,
    /// The bytes exactly as downloaded.
    pub bytes: Vec<u8>,
    pub format: AssetFormat,
    pub width: u32,
    pub height: u32,
    /// Colour channels in the encoded source (JPEG: 1, 3 or 4).
    pub components: u8,
}

impl fmt::Debug for ImageAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageAsset")
            .field("name", &self.name)
            .field("bytes", &self.bytes.len())
            .field("format", &self.format)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("components", &self.components)
            .finish()
    }
}

fn serialize_asset_name<S: Serializer>(asset: &Arc<ImageAsset>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&asset.name)
}

/// One placed copy of an asset.
#[derive(Debug, Clone, Serialize)]
pub struct RenderSlot {
    #[serde(rename = "name", serialize_with = "serialize_asset_name")]
    pub asset: Arc<ImageAsset>,
    pub page_index: usize,
    pub row: usize,
    pub column: usize,
    /// Bottom-left corner in PDF points.
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub index: usize,
    pub slots: Vec<RenderSlot>,
}

/// A laid-out, ready-to-render document.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub geometry: Geometry,
    pub pages: Vec<Page>,
}

impl Document {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn slot_count(&self) -> usize {
        self.pages.iter().map(|p| p.slots.len()).sum()
    }

    /// All slots in placement order.
    pub fn slots(&self) -> impl Iterator<Item = &RenderSlot> {
        self.pages.iter().flat_map(|p| p.slots.iter())
    }

    /// Each distinct asset once, in order of first placement.
    pub fn distinct_assets(&self) -> Vec<Arc<ImageAsset>> {
        let mut seen = HashSet::new();
        self.slots()
            .filter(|slot| seen.insert(slot.asset.name.as_str()))
            .map(|slot| Arc::clone(&slot.asset))
            .collect()
    }
}

/// Terminal state of a run that did not hit a fatal error.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// At least one card was placed.
    Document(Document),
    /// Nothing resolved (empty input, or every entry failed). No file is
    /// produced for this outcome.
    NoImages,
}

/// An input entry (or line) that contributed nothing to the document.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedEntry {
    /// 1-based input line.
    pub line: usize,
    /// Card name, or the raw line text for malformed lines.
    pub name: String,
    /// Copies requested by the entry; 0 for malformed lines.
    pub requested: u32,
    pub reason: EntryError,
}

/// Counters for one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    /// Well-formed entries.
    pub entries: usize,
    pub malformed_lines: usize,
    pub unique_names: usize,
    pub ready_names: usize,
    pub failed_names: usize,
    /// Sum of counts over well-formed entries.
    pub requested_copies: u64,
    pub placed_copies: u64,
    pub pages: usize,
    pub fetch_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// What was skipped and why, plus counters. Always available after a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub skipped: Vec<SkippedEntry>,
    pub stats: RunStats,
}

/// Result of a non-fatal run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub outcome: RunOutcome,
    pub report: RunReport,
}

impl RunOutput {
    pub fn document(&self) -> Option<&Document> {
        match &self.outcome {
            RunOutcome::Document(doc) => Some(doc),
            RunOutcome::NoImages => None,
        }
    }

    pub fn is_no_images(&self) -> bool {
        matches!(self.outcome, RunOutcome::NoImages)
    }
}
