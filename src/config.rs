//! Configuration types for proxy-sheet generation.
//!
//! All run behaviour is controlled through [`SheetConfig`], built via its
//! [`SheetConfigBuilder`]. Page geometry lives in its own [`Geometry`] value
//! because layout is a pure function of it: two runs with equal geometry and
//! equal resolved card sequences always produce the same document.

use crate::error::ProxyError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use scryfall_lookup::ImageVariant;

/// Configuration for a proxy-sheet run.
///
/// Built via [`SheetConfig::builder()`] or using [`SheetConfig::default()`].
///
/// # Example
/// ```rust
/// use proxysheet::{PageSize, SheetConfig};
///
/// let config = SheetConfig::builder()
///     .concurrency(8)
///     .page_size(PageSize::A4)
///     .build()
///     .unwrap();
/// assert_eq!(config.geometry.rows_per_page(), 3);
/// ```
#[derive(Clone)]
pub struct SheetConfig {
    /// Number of card names resolved and downloaded at once. Default: 4.
    ///
    /// The lookup service asks clients to stay under ten requests a second.
    /// Each name costs two requests (lookup + image), so four workers keep a
    /// batch well-behaved while still overlapping network latency.
    pub concurrency: usize,

    /// Timeout for each individual HTTP request, in seconds. Default: 30.
    pub request_timeout_secs: u64,

    /// Total budget for resolving, downloading and decoding one name, in
    /// seconds. Default: 60. On expiry the name fails with
    /// [`crate::error::EntryError::Timeout`].
    pub acquire_timeout_secs: u64,

    /// Root URL of the card lookup service. Default: `https://api.scryfall.com`.
    pub api_base_url: String,

    /// `User-Agent` sent on every request. Default: `proxysheet/<version>`.
    pub user_agent: String,

    /// Which image rendition to download. Default: [`ImageVariant::Normal`].
    pub image_variant: ImageVariant,

    /// Page and grid geometry. Default: US Letter, 3×3 poker-size cards.
    pub geometry: Geometry,

    /// Optional progress observer.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            request_timeout_secs: 30,
            acquire_timeout_secs: 60,
            api_base_url: scryfall_lookup::DEFAULT_BASE_URL.to_string(),
            user_agent: format!("proxysheet/{}", env!("CARGO_PKG_VERSION")),
            image_variant: ImageVariant::default(),
            geometry: Geometry::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for SheetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SheetConfig")
            .field("concurrency", &self.concurrency)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("acquire_timeout_secs", &self.acquire_timeout_secs)
            .field("api_base_url", &self.api_base_url)
            .field("user_agent", &self.user_agent)
            .field("image_variant", &self.image_variant)
            .field("geometry", &self.geometry)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ProgressCallback>"),
            )
            .finish()
    }
}

impl SheetConfig {
    /// Create a new builder for `SheetConfig`.
    pub fn builder() -> SheetConfigBuilder {
        SheetConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`SheetConfig`].
#[derive(Debug)]
pub struct SheetConfigBuilder {
    config: SheetConfig,
}

impl SheetConfigBuilder {
    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn acquire_timeout_secs(mut self, secs: u64) -> Self {
        self.config.acquire_timeout_secs = secs;
        self
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into();
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    pub fn image_variant(mut self, variant: ImageVariant) -> Self {
        self.config.image_variant = variant;
        self
    }

    pub fn geometry(mut self, geometry: Geometry) -> Self {
        self.config.geometry = geometry;
        self
    }

    /// Resize the page, keeping cell size, gaps and margins.
    pub fn page_size(mut self, size: PageSize) -> Self {
        let (w, h) = size.dimensions();
        self.config.geometry.page_width = w;
        self.config.geometry.page_height = h;
        self
    }

    pub fn columns(mut self, n: usize) -> Self {
        self.config.geometry.columns = n.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<SheetConfig, ProxyError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(ProxyError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if c.request_timeout_secs == 0 || c.acquire_timeout_secs == 0 {
            return Err(ProxyError::InvalidConfig(
                "Timeouts must be at least one second".into(),
            ));
        }
        if !(c.api_base_url.starts_with("http://") || c.api_base_url.starts_with("https://")) {
            return Err(ProxyError::InvalidConfig(format!(
                "API URL must be http(s), got '{}'",
                c.api_base_url
            )));
        }
        c.geometry.validate()?;
        Ok(self.config)
    }
}

// ── Geometry ─────────────────────────────────────────────────────────────

/// Standard page sizes, in PDF points (1/72 in).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum PageSize {
    /// 8.5 × 11 in (612 × 792 pt). (default)
    #[default]
    Letter,
    /// 210 × 297 mm (595 × 842 pt).
    A4,
    /// Arbitrary width × height in points.
    Custom { width: f32, height: f32 },
}

impl PageSize {
    pub fn dimensions(&self) -> (f32, f32) {
        match *self {
            PageSize::Letter => (612.0, 792.0),
            PageSize::A4 => (595.0, 842.0),
            PageSize::Custom { width, height } => (width, height),
        }
    }
}

impl FromStr for PageSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "letter" => Ok(PageSize::Letter),
            "a4" => Ok(PageSize::A4),
            other => Err(format!("unknown page size '{other}' (expected letter or a4)")),
        }
    }
}

/// Fixed page and grid geometry, in PDF points.
///
/// The grid is centred horizontally; rows start `margin_top` below the top
/// edge and may extend down to `margin_bottom` above the bottom edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub page_width: f32,
    pub page_height: f32,
    /// Cards per row.
    pub columns: usize,
    pub cell_width: f32,
    pub cell_height: f32,
    /// Horizontal space between adjacent cells in a row.
    pub column_gap: f32,
    /// Vertical space between rows. Zero keeps cut lines shared.
    pub row_gap: f32,
    pub margin_top: f32,
    pub margin_bottom: f32,
}

impl Default for Geometry {
    /// Letter page, 3 columns of 2.5 × 3.5 in cards, three rows per page.
    fn default() -> Self {
        Self {
            page_width: 612.0,
            page_height: 792.0,
            columns: 3,
            cell_width: 180.0,
            cell_height: 252.0,
            column_gap: 10.0,
            row_gap: 0.0,
            margin_top: 18.0,
            margin_bottom: 18.0,
        }
    }
}

impl Geometry {
    /// Vertical space available for rows.
    pub fn usable_height(&self) -> f32 {
        self.page_height - self.margin_top - self.margin_bottom
    }

    /// Width of one full row of cells including gaps.
    pub fn grid_width(&self) -> f32 {
        self.columns as f32 * self.cell_width + (self.columns.saturating_sub(1)) as f32 * self.column_gap
    }

    /// X coordinate of the left edge of column 0.
    pub fn left_offset(&self) -> f32 {
        (self.page_width - self.grid_width()) / 2.0
    }

    /// Height consumed by `rows` stacked rows.
    pub fn rows_extent(&self, rows: usize) -> f32 {
        if rows == 0 {
            return 0.0;
        }
        rows as f32 * self.cell_height + (rows - 1) as f32 * self.row_gap
    }

    /// Whether `rows` rows fit in the usable height.
    pub fn fits_rows(&self, rows: usize) -> bool {
        self.rows_extent(rows) <= self.usable_height()
    }

    /// How many rows fit on one page.
    ///
    /// Closed form, nudged by one row either way so it always agrees with
    /// [`Geometry::fits_rows`] despite float rounding.
    pub fn rows_per_page(&self) -> usize {
        let pitch = self.cell_height + self.row_gap;
        if !(pitch > 0.0) || !self.fits_rows(1) {
            return 0;
        }
        let estimate = ((self.usable_height() + self.row_gap) / pitch).floor();
        let mut rows = if estimate.is_finite() { estimate as usize } else { usize::MAX };
        if rows > 0 && !self.fits_rows(rows) {
            rows -= 1;
        }
        if rows < usize::MAX && self.fits_rows(rows + 1) {
            rows += 1;
        }
        rows
    }

    /// PDF-space origin (bottom-left corner) of the cell at `row`, `column`.
    ///
    /// PDF's y axis points up, so row 0 sits highest on the page.
    pub fn cell_origin(&self, row: usize, column: usize) -> (f32, f32) {
        let x = self.left_offset() + column as f32 * (self.cell_width + self.column_gap);
        let top = self.page_height - self.margin_top - row as f32 * (self.cell_height + self.row_gap);
        (x, top - self.cell_height)
    }

    /// Reject geometries in which no card could be placed.
    pub fn validate(&self) -> Result<(), ProxyError> {
        let positive = [
            ("page width", self.page_width),
            ("page height", self.page_height),
            ("cell width", self.cell_width),
            ("cell height", self.cell_height),
        ];
        for (label, v) in positive {
            if !(v.is_finite() && v > 0.0) {
                return Err(ProxyError::InvalidConfig(format!(
                    "{label} must be positive, got {v}"
                )));
            }
        }
        let non_negative = [
            ("column gap", self.column_gap),
            ("row gap", self.row_gap),
            ("top margin", self.margin_top),
            ("bottom margin", self.margin_bottom),
        ];
        for (label, v) in non_negative {
            if !(v.is_finite() && v >= 0.0) {
                return Err(ProxyError::InvalidConfig(format!(
                    "{label} must not be negative, got {v}"
                )));
            }
        }
        if self.columns == 0 {
            return Err(ProxyError::InvalidConfig("Columns must be ≥ 1".into()));
        }
        if self.grid_width() > self.page_width {
            return Err(ProxyError::InvalidConfig(format!(
                "{} columns of {}pt cells need {}pt but the page is {}pt wide",
                self.columns,
                self.cell_width,
                self.grid_width(),
                self.page_width
            )));
        }
        if !self.fits_rows(1) {
            return Err(ProxyError::InvalidConfig(format!(
                "A {}pt cell does not fit in the {}pt usable page height",
                self.cell_height,
                self.usable_height()
            )));
        }
        Ok(())
    }
}
