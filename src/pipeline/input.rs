//! Input handling: read the card list and parse it into ordered entries.
//!
//! Each non-blank line is `<count> <name>`: a positive integer, whitespace,
//! then the card name up to the end of the line (names may contain spaces,
//! commas and apostrophes). Bad lines are recorded as
//! [`EntryError::Malformed`] and skipped; they never abort the run. That
//! includes a line that is not valid UTF-8: the list is split on raw bytes
//! and each line decoded on its own.

use crate::error::{EntryError, ProxyError};
use crate::output::RequestEntry;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tracing::{debug, warn};

/// `<count><whitespace><name>` on a trimmed line.
static LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\S+)\s+(\S.*)$").expect("valid regex"));

/// Largest count accepted on a single line.
pub const MAX_COPIES_PER_LINE: u32 = 1_000;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Parsed entries in input order, plus the lines that were skipped.
#[derive(Debug, Default)]
pub struct ParsedInput {
    pub entries: Vec<RequestEntry>,
    pub malformed: Vec<EntryError>,
}

/// Parse a single line. `None` for blank lines.
pub fn parse_line(line_no: usize, raw: &str) -> Option<Result<RequestEntry, EntryError>> {
    let line = raw.trim();
    if line.is_empty() {
        return None;
    }

    let malformed = |reason: &str| EntryError::Malformed {
        line: line_no,
        text: line.to_string(),
        reason: reason.to_string(),
    };

    let Some(caps) = LINE_RE.captures(line) else {
        return Some(Err(malformed("expected '<count> <name>'")));
    };

    let count = match caps[1].parse::<u32>() {
        Ok(0) => return Some(Err(malformed("count must be at least 1"))),
        Ok(n) if n > MAX_COPIES_PER_LINE => {
            return Some(Err(malformed(&format!(
                "count {n} exceeds the per-line limit of {MAX_COPIES_PER_LINE}"
            ))))
        }
        Ok(n) => n,
        Err(e) if *e.kind() == std::num::IntErrorKind::PosOverflow => {
            return Some(Err(malformed(&format!(
                "count exceeds the per-line limit of {MAX_COPIES_PER_LINE}"
            ))))
        }
        Err(_) => return Some(Err(malformed("count is not a positive integer"))),
    };

    Some(Ok(RequestEntry {
        line: line_no,
        count,
        name: caps[2].trim().to_string(),
    }))
}

/// Parse the whole card list.
pub fn parse_entries(text: &str) -> ParsedInput {
    parse_bytes(text.as_bytes())
}

/// Parse a card list as raw bytes, decoding each line separately.
///
/// A leading UTF-8 byte-order mark is ignored. Lines that are not valid
/// UTF-8 are reported as malformed with their lossy text.
pub fn parse_bytes(bytes: &[u8]) -> ParsedInput {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let mut parsed = ParsedInput::default();
    for (idx, raw) in bytes.split(|&b| b == b'\n').enumerate() {
        let line_no = idx + 1;
        let result = match std::str::from_utf8(raw) {
            Ok(line) => parse_line(line_no, line),
            Err(_) => Some(Err(EntryError::Malformed {
                line: line_no,
                text: String::from_utf8_lossy(raw).trim().to_string(),
                reason: "not valid UTF-8".to_string(),
            })),
        };
        match result {
            None => {}
            Some(Ok(entry)) => parsed.entries.push(entry),
            Some(Err(e)) => {
                warn!("Skipping input: {}", e);
                parsed.malformed.push(e);
            }
        }
    }
    debug!(
        "Parsed {} entries ({} malformed lines)",
        parsed.entries.len(),
        parsed.malformed.len()
    );
    parsed
}

/// Read the card list file as raw bytes.
///
/// Only a file that cannot be read at all is fatal; encoding problems are
/// left to [`parse_bytes`], line by line.
pub async fn read_input(path: &Path) -> Result<Vec<u8>, ProxyError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ProxyError::InputNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => ProxyError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => ProxyError::InputReadFailed {
            path: path.to_path_buf(),
            source: e,
        },
    })?;

    debug!("Read card list: {} ({} bytes)", path.display(), bytes.len());
    Ok(bytes)
}
