//! Error types for the proxysheet library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ProxyError`] is **fatal**: the run cannot proceed at all (input file
//!   unreadable, output not writable, invalid configuration). Returned as
//!   `Err(ProxyError)` from the top-level entry points.
//!
//! * [`EntryError`] is **non-fatal**: one input line or one card name failed
//!   (malformed line, unknown card, download error) but every other entry is
//!   fine. Cached per name and collected into
//!   [`crate::output::RunReport::skipped`] so the caller always gets a list of
//!   what was left out and why.
//!
//! A run in which *every* entry failed is neither: it ends as
//! [`crate::output::RunOutcome::NoImages`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the proxysheet library.
///
/// Per-entry failures use [`EntryError`] and are reported in the run report
/// rather than propagated here.
#[derive(Debug, Error)]
pub enum ProxyError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Card list not found: '{path}'\nCheck the path exists and is readable.")]
    InputNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists but could not be read.
    #[error("Failed to read card list '{path}': {source}")]
    InputReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write the output PDF.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The PDF could not be assembled from the laid-out document.
    #[error("PDF rendering failed: {0}")]
    RenderFailed(String),

    /// The list asks for more copies than one run will lay out.
    #[error("Card list requests {requested} copies; a run is limited to {limit}\nSplit the list into smaller files.")]
    TooManyCopies { requested: u64, limit: u64 },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The HTTP client could not be constructed (TLS backend, proxy settings).
    #[error("HTTP client setup failed: {0}")]
    HttpClient(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (e.g. a worker task panicked).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single input line or card name.
///
/// `Clone` because one failure is shared by every requester of the same
/// name; `Serialize` so it can be emitted in the JSON run report.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryError {
    /// An input line was not `<count> <name>` with a positive integer count.
    #[error("Line {line}: {reason}: {text:?}")]
    Malformed {
        line: usize,
        text: String,
        reason: String,
    },

    /// The lookup service does not know this name, or could not be asked.
    #[error("'{name}': card not found ({detail})")]
    NotFound { name: String, detail: String },

    /// The image download failed after the name was resolved.
    #[error("'{name}': image download failed: {detail}")]
    FetchFailed { name: String, detail: String },

    /// The downloaded bytes are not an image we can place.
    #[error("'{name}': downloaded image is unusable: {detail}")]
    UndecodableImage { name: String, detail: String },

    /// Resolve + fetch did not finish within the per-name budget.
    #[error("'{name}': timed out after {secs}s")]
    Timeout { name: String, secs: u64 },
}

impl EntryError {
    /// The card name (or, for malformed lines, the raw line text).
    pub fn subject(&self) -> &str {
        match self {
            EntryError::Malformed { text, .. } => text,
            EntryError::NotFound { name, .. }
            | EntryError::FetchFailed { name, .. }
            | EntryError::UndecodableImage { name, .. }
            | EntryError::Timeout { name, .. } => name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_display_mentions_line() {
        let e = EntryError::Malformed {
            line: 7,
            text: "x Island".into(),
            reason: "count is not a positive integer".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("Line 7"), "got: {msg}");
        assert!(msg.contains("x Island"), "got: {msg}");
    }

    #[test]
    fn timeout_display() {
        let e = EntryError::Timeout {
            name: "Island".into(),
            secs: 60,
        };
        assert!(e.to_string().contains("60s"));
        assert_eq!(e.subject(), "Island");
    }

    #[test]
    fn entry_error_serialises_with_kind_tag() {
        let e = EntryError::NotFound {
            name: "NoSuchCard".into(),
            detail: "HTTP 404".into(),
        };
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains(r#""kind":"not_found""#), "got: {json}");
        let back: EntryError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);
    }

    #[test]
    fn too_many_copies_display() {
        let e = ProxyError::TooManyCopies {
            requested: 250_000,
            limit: 100_000,
        };
        let msg = e.to_string();
        assert!(msg.contains("250000"), "got: {msg}");
        assert!(msg.contains("100000"), "got: {msg}");
    }

    #[test]
    fn output_write_failed_display() {
        let e = ProxyError::OutputWriteFailed {
            path: PathBuf::from("/nope/out.pdf"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let msg = e.to_string();
        assert!(msg.contains("/nope/out.pdf"));
        assert!(msg.contains("denied"));
    }
}
