//! Name resolution: card name → image location.
//!
//! [`Resolver`] is the seam the dedup cache calls through; it has no caching
//! of its own. [`ScryfallResolver`] is the production implementation. Every
//! failure mode (unknown name, HTTP error, timeout, odd JSON) collapses to
//! [`NotFound`] with a human-readable detail, because for the batch the
//! consequence is the same: that name is left out of the document.

use crate::config::{ImageVariant, SheetConfig};
use async_trait::async_trait;
use scryfall_lookup::{LookupError, ScryfallClient};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Where to download a card image from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub url: String,
}

impl SourceLocation {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// The name could not be turned into an image location.
#[derive(Debug, Clone, Error)]
#[error("{detail}")]
pub struct NotFound {
    pub detail: String,
}

impl NotFound {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

/// Maps a card name to the location of its image.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, name: &str) -> Result<SourceLocation, NotFound>;
}

/// Resolver backed by the Scryfall exact-name lookup.
#[derive(Debug, Clone)]
pub struct ScryfallResolver {
    client: ScryfallClient,
    variant: ImageVariant,
}

impl ScryfallResolver {
    /// Build a resolver that shares `http`'s connection pool.
    pub fn new(http: reqwest::Client, config: &SheetConfig) -> Self {
        let client = ScryfallClient::with_client(
            http,
            config.api_base_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
        );
        Self {
            client,
            variant: config.image_variant,
        }
    }
}

#[async_trait]
impl Resolver for ScryfallResolver {
    async fn resolve(&self, name: &str) -> Result<SourceLocation, NotFound> {
        match self.client.image_uri(name, self.variant).await {
            Ok(Some(url)) => {
                debug!("Resolved '{}' → {}", name, url);
                Ok(SourceLocation::new(url))
            }
            Ok(None) => {
                warn!("Card not found: {}", name);
                Err(NotFound::new(format!("no '{}' image for this name", self.variant)))
            }
            Err(e) => {
                warn!("Lookup failed for '{}': {}", name, e);
                Err(NotFound::new(lookup_detail(&e)))
            }
        }
    }
}

fn lookup_detail(e: &LookupError) -> String {
    match e {
        LookupError::Status { status, detail } => format!("HTTP {status}: {detail}"),
        other => other.to_string(),
    }
}
