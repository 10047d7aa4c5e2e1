//! Image download: image location → raw bytes.
//!
//! [`Fetcher`] is the second seam under the dedup cache. The production
//! [`HttpFetcher`] is a plain `GET` on a shared `reqwest::Client`; the
//! client-wide timeout bounds every request so no download can hang a
//! worker forever.

use crate::config::SheetConfig;
use crate::error::ProxyError;
use crate::pipeline::resolve::SourceLocation;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Why a download failed.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("HTTP {status}")]
    Status { status: u16 },

    #[error("{0}")]
    Transport(String),

    #[error("empty response body")]
    Empty,
}

/// Retrieves raw image bytes from a location.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, location: &SourceLocation) -> Result<Vec<u8>, FetchError>;
}

/// Build the HTTP client shared by the resolver and the fetcher.
pub fn build_http_client(config: &SheetConfig) -> Result<reqwest::Client, ProxyError> {
    reqwest::Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .map_err(|e| ProxyError::HttpClient(e.to_string()))
}

/// Fetcher that downloads over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    http: reqwest::Client,
    timeout_secs: u64,
}

impl HttpFetcher {
    pub fn new(http: reqwest::Client, config: &SheetConfig) -> Self {
        Self {
            http,
            timeout_secs: config.request_timeout_secs,
        }
    }

    fn map_transport(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout {
                secs: self.timeout_secs,
            }
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, location: &SourceLocation) -> Result<Vec<u8>, FetchError> {
        debug!("Downloading {}", location);

        let response = self
            .http
            .get(&location.url)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;

        if !response.status().is_success() {
            warn!("Download of {} returned HTTP {}", location, response.status());
            return Err(FetchError::Status {
                status: response.status().as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| self.map_transport(e))?;
        if bytes.is_empty() {
            return Err(FetchError::Empty);
        }

        debug!("Downloaded {} ({} bytes)", location, bytes.len());
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testutil::serve_once;

    fn fetcher() -> HttpFetcher {
        let config = SheetConfig::default();
        HttpFetcher::new(build_http_client(&config).unwrap(), &config)
    }

    #[tokio::test]
    async fn downloads_body() {
        let base = serve_once("200 OK", "image/jpeg", vec![0xFF, 0xD8, 0xFF, 0xE0]).await;
        let bytes = fetcher()
            .fetch(&SourceLocation::new(format!("{base}/island.jpg")))
            .await
            .unwrap();
        assert_eq!(bytes, [0xFF, 0xD8, 0xFF, 0xE0]);
    }

    #[tokio::test]
    async fn non_success_status_is_error() {
        let base = serve_once("403 Forbidden", "text/plain", b"nope".to_vec()).await;
        let err = fetcher()
            .fetch(&SourceLocation::new(format!("{base}/island.jpg")))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 403 }), "got: {err:?}");
    }

    #[tokio::test]
    async fn empty_body_is_error() {
        let base = serve_once("200 OK", "image/jpeg", Vec::new()).await;
        let err = fetcher()
            .fetch(&SourceLocation::new(format!("{base}/island.jpg")))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Empty));
    }
}
