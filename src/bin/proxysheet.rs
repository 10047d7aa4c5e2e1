//! CLI binary for proxysheet.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `SheetConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use proxysheet::{
    check_input, generate, write_pdf, ImageVariant, PageSize, ProgressCallback,
    RunProgressCallback, RunReport, SheetConfig, WrittenRun,
};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const EXIT_NO_IMAGES: u8 = 2;
const EXIT_CANCELLED: u8 = 130;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar over distinct card names. Names complete out of order,
/// so the bar only counts; each line is printed as its name settles.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Preparing");
        bar.set_message("Reading card list…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }

    fn clear(&self) {
        self.bar.finish_and_clear();
    }
}

impl RunProgressCallback for CliProgressCallback {
    fn on_run_start(&self, unique_names: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} cards  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        self.bar.set_length(unique_names as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Fetching");
        self.bar.set_message("");
    }

    fn on_fetch_start(&self, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn on_fetch_complete(&self, name: &str, bytes: usize) {
        self.bar.println(format!(
            "  {} {:<40} {}",
            green("✓"),
            name,
            dim(&format!("{:>6} KB", bytes / 1024))
        ));
        self.bar.inc(1);
    }

    fn on_fetch_error(&self, name: &str, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!("  {} {:<40} {}", red("✗"), name, red(&msg)));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, unique_names: usize, ready: usize) {
        self.bar.set_prefix("Rendering");
        self.bar.set_message(format!("{ready}/{unique_names} cards ready"));
    }
}

const AFTER_HELP: &str = r#"INPUT FORMAT:
  One card per line, "<count> <name>":

    4 Lightning Bolt
    2 Jace, the Mind Sculptor
    20 Island

  Blank lines are ignored. Lines that do not parse are skipped and reported.

EXAMPLES:
  # Write mtg_cards.pdf in the current directory
  proxysheet deck.txt

  # Choose the output file and page size
  proxysheet deck.txt -o deck.pdf --page-size a4

  # Larger images, fewer parallel downloads
  proxysheet deck.txt --variant large --concurrency 2

  # Validate a list without any network access
  proxysheet --check-only deck.txt

  # Machine-readable report
  proxysheet --json deck.txt -o deck.pdf > report.json

EXIT STATUS:
  0    document written
  1    fatal error (unreadable input, unwritable output, bad options)
  2    no card could be placed; nothing written
  130  interrupted

ENVIRONMENT VARIABLES:
  RUST_LOG                 Override log filter (e.g. proxysheet=debug)
  PROXYSHEET_*             Every option has an env var, shown in --help
"#;

/// Build a printable PDF of proxy cards from a card list.
#[derive(Parser, Debug)]
#[command(
    name = "proxysheet",
    version,
    about = "Build a printable PDF of proxy cards from a card list",
    long_about = "Reads a plain-text card list, downloads each distinct card image once from \
Scryfall, and lays out every requested copy on a 3-column grid of poker-size cells.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Card list: one "<count> <name>" per line.
    input: PathBuf,

    /// Output PDF file, or a directory to write mtg_cards.pdf into.
    #[arg(short, long, env = "PROXYSHEET_OUTPUT", default_value = ".")]
    output: PathBuf,

    /// Number of card names fetched at once.
    #[arg(short, long, env = "PROXYSHEET_CONCURRENCY", default_value_t = 4,
          value_parser = clap::value_parser!(u16).range(1..=32))]
    concurrency: u16,

    /// Per-request HTTP timeout in seconds.
    #[arg(long, env = "PROXYSHEET_TIMEOUT", default_value_t = 30)]
    timeout: u64,

    /// Image rendition: small, normal, large, png, border_crop.
    #[arg(long, env = "PROXYSHEET_VARIANT", default_value = "normal")]
    variant: ImageVariant,

    /// Page size: letter or a4.
    #[arg(long, env = "PROXYSHEET_PAGE_SIZE", default_value = "letter")]
    page_size: PageSize,

    /// Cards per row.
    #[arg(long, env = "PROXYSHEET_COLUMNS", default_value_t = 3)]
    columns: usize,

    /// Base URL of the card lookup API.
    #[arg(long, env = "PROXYSHEET_API_URL", default_value = "https://api.scryfall.com")]
    api_url: String,

    /// Print the run report as JSON on stdout.
    #[arg(long, env = "PROXYSHEET_JSON")]
    json: bool,

    /// Parse the card list and print the entries; no network, no output file.
    #[arg(long)]
    check_only: bool,

    /// Disable progress bar.
    #[arg(long, env = "PROXYSHEET_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PROXYSHEET_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PROXYSHEET_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.check_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Check-only mode ──────────────────────────────────────────────────
    if cli.check_only {
        return check_only(&cli).await;
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress = show_progress.then(CliProgressCallback::new);
    let config = build_config(&cli, progress.clone().map(|p| p as ProgressCallback))?;

    // ── Fetch and lay out, racing Ctrl-C ─────────────────────────────────
    // Only this phase is cancellable; the write below always completes.
    let output = tokio::select! {
        res = generate(&cli.input, &config) => {
            if let Some(ref p) = progress {
                p.clear();
            }
            res.context("Proxy sheet generation failed")?
        }
        _ = tokio::signal::ctrl_c() => {
            if let Some(ref p) = progress {
                p.clear();
            }
            eprintln!("{} Interrupted before writing; no output written", yellow("⚠"));
            return Ok(ExitCode::from(EXIT_CANCELLED));
        }
    };

    // ── Write ────────────────────────────────────────────────────────────
    let path = match output.document() {
        Some(doc) => Some(
            write_pdf(doc.clone(), &cli.output)
                .await
                .context("Failed to write PDF")?,
        ),
        None => None,
    };
    let written = WrittenRun { output, path };

    if cli.json {
        println!("{}", report_json(&written)?);
    }
    if !cli.quiet {
        print_summary(&written);
    }

    Ok(match written.path {
        Some(_) => ExitCode::SUCCESS,
        None => ExitCode::from(EXIT_NO_IMAGES),
    })
}

/// Map CLI args to `SheetConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<SheetConfig> {
    let mut builder = SheetConfig::builder()
        .concurrency(cli.concurrency as usize)
        .request_timeout_secs(cli.timeout)
        .acquire_timeout_secs(cli.timeout.saturating_mul(2))
        .image_variant(cli.variant)
        .page_size(cli.page_size)
        .columns(cli.columns)
        .api_base_url(&cli.api_url);
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    builder.build().context("Invalid options")
}

async fn check_only(cli: &Cli) -> Result<ExitCode> {
    let parsed = check_input(&cli.input)
        .await
        .context("Failed to read card list")?;

    if cli.json {
        let json = serde_json::json!({
            "entries": parsed.entries,
            "malformed": parsed.malformed,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&json).context("Failed to serialise entries")?
        );
    } else {
        for e in &parsed.entries {
            println!("{:>4}  {:>3} × {}", e.line, e.count, e.name);
        }
        if !cli.quiet {
            for m in &parsed.malformed {
                eprintln!("{} {}", red("✗"), m);
            }
            let copies: u64 = parsed.entries.iter().map(|e| u64::from(e.count)).sum();
            eprintln!(
                "{} entries, {} copies, {} malformed lines",
                bold(&parsed.entries.len().to_string()),
                copies,
                parsed.malformed.len()
            );
        }
    }

    Ok(if parsed.entries.is_empty() {
        ExitCode::from(EXIT_NO_IMAGES)
    } else {
        ExitCode::SUCCESS
    })
}

fn report_json(written: &WrittenRun) -> Result<String> {
    let json = serde_json::json!({
        "output": written.path,
        "outcome": if written.path.is_some() { "document" } else { "no_images" },
        "report": written.output.report,
    });
    serde_json::to_string_pretty(&json).context("Failed to serialise report")
}

fn print_summary(written: &WrittenRun) {
    let RunReport { skipped, stats } = &written.output.report;

    if !skipped.is_empty() {
        eprintln!("{} Skipped {} entries:", yellow("⚠"), skipped.len());
        for s in skipped {
            eprintln!("   {} {}", dim(&format!("line {:>4}", s.line)), s.reason);
        }
    }

    match written.path {
        Some(ref path) => eprintln!(
            "{}  {}/{} copies on {} pages  {}ms  →  {}",
            if skipped.is_empty() { green("✔") } else { yellow("⚠") },
            stats.placed_copies,
            stats.requested_copies,
            stats.pages,
            stats.total_duration_ms,
            bold(&path.display().to_string()),
        ),
        None => eprintln!(
            "{}  No card images could be placed; nothing written",
            red("✘")
        ),
    }
}
