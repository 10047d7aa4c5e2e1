//! # scryfall-lookup
//!
//! A deliberately small async client for the one Scryfall endpoint a proxy
//! printer needs: exact-name card lookup, returning the URI of the card's
//! image in a chosen size.
//!
//! ## How it works
//!
//! 1. `GET {base}/cards/named?exact={name}` with a descriptive `User-Agent`
//!    and `Accept: application/json` (both required by Scryfall).
//! 2. `404` means the name is unknown and maps to `Ok(None)`.
//! 3. On `200`, the card's top-level `image_uris` is used; double-faced cards
//!    carry no top-level images, so the front face (`card_faces[0]`) is used.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use scryfall_lookup::{ImageVariant, ScryfallClient, DEFAULT_BASE_URL};
//! use std::time::Duration;
//!
//! # async fn demo() -> Result<(), scryfall_lookup::LookupError> {
//! let client = ScryfallClient::new(DEFAULT_BASE_URL, "my-tool/0.1", Duration::from_secs(30))?;
//! if let Some(uri) = client.image_uri("Island", ImageVariant::Normal).await? {
//!     println!("{uri}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Caching and rate limiting are the caller's concern; every call performs
//! exactly one HTTP request.

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

// ── Public constants ─────────────────────────────────────────────────────────

/// Production API root.
pub const DEFAULT_BASE_URL: &str = "https://api.scryfall.com";

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by lookup operations.
///
/// An unknown card name is *not* an error; it is `Ok(None)`.
#[derive(Error, Debug)]
pub enum LookupError {
    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client setup failed: {0}")]
    Client(String),

    /// The request did not complete within the client timeout.
    #[error("Lookup timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Connection, TLS or body-read failure.
    #[error("Lookup request failed: {0}")]
    Request(String),

    /// The service answered with a non-success status other than 404.
    #[error("Lookup returned HTTP {status}: {detail}")]
    Status { status: u16, detail: String },

    /// The body was not the JSON shape we expect.
    #[error("Unexpected lookup response: {0}")]
    InvalidResponse(String),
}

// ── Image variants ───────────────────────────────────────────────────────────

/// Which rendition of the card image to ask for.
///
/// Sizes as documented by Scryfall: `small` 146×204 JPG, `normal` 488×680
/// JPG, `large` 672×936 JPG, `png` 745×1040 PNG, `border_crop` 480×680 JPG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageVariant {
    Small,
    #[default]
    Normal,
    Large,
    Png,
    BorderCrop,
}

impl ImageVariant {
    /// The key used in the `image_uris` object.
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageVariant::Small => "small",
            ImageVariant::Normal => "normal",
            ImageVariant::Large => "large",
            ImageVariant::Png => "png",
            ImageVariant::BorderCrop => "border_crop",
        }
    }
}

impl fmt::Display for ImageVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "small" => Ok(ImageVariant::Small),
            "normal" => Ok(ImageVariant::Normal),
            "large" => Ok(ImageVariant::Large),
            "png" => Ok(ImageVariant::Png),
            "border_crop" => Ok(ImageVariant::BorderCrop),
            other => Err(format!(
                "unknown image variant '{other}' (expected small, normal, large, png, border_crop)"
            )),
        }
    }
}

// ── Response model ───────────────────────────────────────────────────────────

/// Image URIs for one card face.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageUris {
    pub small: Option<String>,
    pub normal: Option<String>,
    pub large: Option<String>,
    pub png: Option<String>,
    pub border_crop: Option<String>,
}

impl ImageUris {
    pub fn get(&self, variant: ImageVariant) -> Option<&str> {
        match variant {
            ImageVariant::Small => self.small.as_deref(),
            ImageVariant::Normal => self.normal.as_deref(),
            ImageVariant::Large => self.large.as_deref(),
            ImageVariant::Png => self.png.as_deref(),
            ImageVariant::BorderCrop => self.border_crop.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CardFace {
    pub name: Option<String>,
    pub image_uris: Option<ImageUris>,
}

/// The subset of a Scryfall card object this crate reads.
#[derive(Debug, Clone, Deserialize)]
pub struct Card {
    pub name: String,
    pub image_uris: Option<ImageUris>,
    #[serde(default)]
    pub card_faces: Vec<CardFace>,
}

impl Card {
    /// Image URI for `variant`, falling back to the front face.
    pub fn image_uri(&self, variant: ImageVariant) -> Option<&str> {
        if let Some(uri) = self.image_uris.as_ref().and_then(|u| u.get(variant)) {
            return Some(uri);
        }
        self.card_faces
            .first()
            .and_then(|face| face.image_uris.as_ref())
            .and_then(|u| u.get(variant))
    }
}

#[derive(Debug, Deserialize)]
struct ApiError {
    details: Option<String>,
}

// ── Client ───────────────────────────────────────────────────────────────────

/// Exact-name card lookup client.
#[derive(Debug, Clone)]
pub struct ScryfallClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl ScryfallClient {
    /// Build a client with its own connection pool.
    pub fn new(
        base_url: impl Into<String>,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, LookupError> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| LookupError::Client(e.to_string()))?;
        Ok(Self::with_client(http, base_url, timeout))
    }

    /// Wrap an existing `reqwest::Client` (sharing its pool).
    ///
    /// `timeout` is only used for error reporting; the client's own timeout
    /// is what actually applies.
    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>, timeout: Duration) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http,
            base_url,
            timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Look up a card by exact name. `Ok(None)` when no such card exists.
    pub async fn card_named(&self, name: &str) -> Result<Option<Card>, LookupError> {
        let url = format!("{}/cards/named", self.base_url);
        debug!("Looking up card '{}'", name);

        let response = self
            .http
            .get(&url)
            .query(&[("exact", name)])
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            debug!("Card '{}' not found", name);
            return Ok(None);
        }

        let body = response.bytes().await.map_err(|e| self.map_transport(e))?;

        if !status.is_success() {
            let detail = serde_json::from_slice::<ApiError>(&body)
                .ok()
                .and_then(|e| e.details)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string());
            return Err(LookupError::Status {
                status: status.as_u16(),
                detail,
            });
        }

        let card: Card = serde_json::from_slice(&body)
            .map_err(|e| LookupError::InvalidResponse(e.to_string()))?;
        Ok(Some(card))
    }

    /// Look up a card and return the URI of its image in `variant`.
    ///
    /// `Ok(None)` when the card is unknown *or* has no image in that variant.
    pub async fn image_uri(
        &self,
        name: &str,
        variant: ImageVariant,
    ) -> Result<Option<String>, LookupError> {
        let Some(card) = self.card_named(name).await? else {
            return Ok(None);
        };
        let uri = card.image_uri(variant).map(str::to_string);
        if uri.is_none() {
            debug!("Card '{}' has no '{}' image", card.name, variant);
        }
        Ok(uri)
    }

    fn map_transport(&self, e: reqwest::Error) -> LookupError {
        if e.is_timeout() {
            LookupError::Timeout {
                secs: self.timeout.as_secs(),
            }
        } else {
            LookupError::Request(e.to_string())
        }
    }
}
