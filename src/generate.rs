//! Top-level entry points.
//!
//! [`run`] is the core: entries in, laid-out [`Document`] (or
//! [`RunOutcome::NoImages`]) out, with the resolver and fetcher injected.
//! [`generate`] and [`generate_to_file`] wire in the real lookup service and
//! the PDF sink around it.

use crate::config::SheetConfig;
use crate::error::{EntryError, ProxyError};
use crate::output::{Document, RequestEntry, RunOutcome, RunOutput, RunReport, RunStats, SkippedEntry};
use crate::pipeline::cache::DedupCache;
use crate::pipeline::fetch::{build_http_client, Fetcher, HttpFetcher};
use crate::pipeline::input::{self, ParsedInput};
use crate::pipeline::layout::PageLayout;
use crate::pipeline::render::{self, PdfRenderer};
use crate::pipeline::resolve::{Resolver, ScryfallResolver};
use crate::pipeline::schedule::{self, Scheduler, MAX_TOTAL_COPIES};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// A run whose document (if any) has been written to disk.
#[derive(Debug, Clone)]
pub struct WrittenRun {
    pub output: RunOutput,
    /// `None` when the run ended in [`RunOutcome::NoImages`].
    pub path: Option<PathBuf>,
}

/// Resolve, fetch and lay out `entries`.
///
/// # Returns
/// `Ok(RunOutput)` whenever the run could proceed, even if some or all
/// entries failed: failures are listed in `output.report.skipped`, and a run
/// that placed nothing ends as [`RunOutcome::NoImages`].
///
/// # Errors
/// Only for fatal problems: an unusable page geometry, or more than
/// [`MAX_TOTAL_COPIES`] copies requested in total.
pub async fn run(
    entries: &[RequestEntry],
    resolver: Arc<dyn Resolver>,
    fetcher: Arc<dyn Fetcher>,
    config: &SheetConfig,
) -> Result<RunOutput, ProxyError> {
    let start = Instant::now();
    config.geometry.validate()?;
    let requested = schedule::requested_copies(entries);
    if requested > MAX_TOTAL_COPIES {
        return Err(ProxyError::TooManyCopies {
            requested,
            limit: MAX_TOTAL_COPIES,
        });
    }

    // ── Phase 1 + 2: fetch distinct names, rebuild input order ──────────
    let cache = DedupCache::from_config(resolver, fetcher, config);
    let scheduler =
        Scheduler::new(cache, config.concurrency).with_progress(config.progress_callback.clone());
    let schedule = scheduler.run(entries).await;
    let fetch_duration_ms = start.elapsed().as_millis() as u64;

    let mut stats = RunStats {
        entries: entries.len(),
        unique_names: schedule.unique_names,
        ready_names: schedule.ready_names,
        failed_names: schedule.failed_names,
        requested_copies: schedule.requested_copies,
        placed_copies: schedule.sequence.len() as u64,
        fetch_duration_ms,
        ..RunStats::default()
    };

    // ── Layout ───────────────────────────────────────────────────────────
    let outcome = if schedule.sequence.is_empty() {
        info!("No card images resolved; nothing to lay out");
        RunOutcome::NoImages
    } else {
        let doc = PageLayout::new(config.geometry.clone()).layout(&schedule.sequence);
        stats.pages = doc.page_count();
        RunOutcome::Document(doc)
    };
    stats.total_duration_ms = start.elapsed().as_millis() as u64;

    info!(
        "Run complete: {}/{} names ready, {} copies on {} pages, {}ms",
        stats.ready_names, stats.unique_names, stats.placed_copies, stats.pages, stats.total_duration_ms
    );

    Ok(RunOutput {
        outcome,
        report: RunReport {
            skipped: schedule.skipped,
            stats,
        },
    })
}

/// Read a card list, resolve it against the lookup service, and lay it out.
///
/// Malformed lines are reported alongside failed names in
/// `output.report.skipped`, ordered by line.
pub async fn generate(input_path: impl AsRef<Path>, config: &SheetConfig) -> Result<RunOutput, ProxyError> {
    let start = Instant::now();
    let input_path = input_path.as_ref();
    info!("Starting run: {}", input_path.display());

    let parsed = check_input(input_path).await?;

    let http = build_http_client(config)?;
    let resolver: Arc<dyn Resolver> = Arc::new(ScryfallResolver::new(http.clone(), config));
    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(http, config));

    let mut output = run(&parsed.entries, resolver, fetcher, config).await?;
    merge_malformed(&mut output.report, parsed.malformed);
    output.report.stats.total_duration_ms = start.elapsed().as_millis() as u64;
    Ok(output)
}

/// Run [`generate`] and write the PDF to `output_path`.
///
/// If `output_path` is an existing directory the file is named
/// [`render::DEFAULT_FILE_NAME`] inside it. Nothing is written for a
/// [`RunOutcome::NoImages`] run.
pub async fn generate_to_file(
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &SheetConfig,
) -> Result<WrittenRun, ProxyError> {
    let output = generate(input_path, config).await?;
    let path = match output.document() {
        Some(doc) => Some(write_pdf(doc.clone(), output_path.as_ref()).await?),
        None => None,
    };
    Ok(WrittenRun { output, path })
}

/// Render `doc` as PDF and write it atomically.
pub async fn write_pdf(doc: Document, output_path: &Path) -> Result<PathBuf, ProxyError> {
    render::write_document(Arc::new(PdfRenderer::new()), doc, output_path).await
}

/// Synchronous wrapper around [`generate`].
///
/// Creates a temporary tokio runtime internally.
pub fn generate_sync(input_path: impl AsRef<Path>, config: &SheetConfig) -> Result<RunOutput, ProxyError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ProxyError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(generate(input_path, config))
}

/// Read and parse a card list without touching the network.
pub async fn check_input(input_path: impl AsRef<Path>) -> Result<ParsedInput, ProxyError> {
    let bytes = input::read_input(input_path.as_ref()).await?;
    let parsed = input::parse_bytes(&bytes);
    info!(
        "Parsed {} entries ({} malformed lines)",
        parsed.entries.len(),
        parsed.malformed.len()
    );
    Ok(parsed)
}

fn merge_malformed(report: &mut RunReport, malformed: Vec<EntryError>) {
    report.stats.malformed_lines = malformed.len();
    report.skipped.extend(malformed.into_iter().map(|reason| {
        let (line, text) = match &reason {
            EntryError::Malformed { line, text, .. } => (*line, text.clone()),
            other => (0, other.subject().to_string()),
        };
        SkippedEntry {
            line,
            name: text,
            requested: 0,
            reason,
        }
    }));
    report.skipped.sort_by_key(|s| s.line);
}
