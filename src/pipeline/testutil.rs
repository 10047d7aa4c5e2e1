//! In-memory doubles and a loopback HTTP server for unit tests.

use crate::pipeline::fetch::{FetchError, Fetcher};
use crate::pipeline::resolve::{NotFound, Resolver, SourceLocation};
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const SCHEME: &str = "mem://";

/// Resolves a fixed set of names to `mem://<name>`, counting calls.
pub struct CountingResolver {
    known: HashSet<String>,
    delays: HashMap<String, u64>,
    default_delay_ms: u64,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl CountingResolver {
    pub fn new<I, S>(known: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            known: known.into_iter().map(Into::into).collect(),
            delays: HashMap::new(),
            default_delay_ms: 0,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_delay_ms(mut self, ms: u64) -> Self {
        self.default_delay_ms = ms;
        self
    }

    pub fn with_name_delay_ms(mut self, name: &str, ms: u64) -> Self {
        self.delays.insert(name.to_string(), ms);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most `resolve` calls that were running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Resolver for CountingResolver {
    async fn resolve(&self, name: &str) -> Result<SourceLocation, NotFound> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = self.delays.get(name).copied().unwrap_or(self.default_delay_ms);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.known.contains(name) {
            Ok(SourceLocation::new(format!("{SCHEME}{name}")))
        } else {
            Err(NotFound::new("HTTP 404: No cards found"))
        }
    }
}

/// Serves a small PNG for every `mem://` location, counting calls.
pub struct CountingFetcher {
    failing: HashSet<String>,
    calls: AtomicUsize,
}

impl CountingFetcher {
    pub fn new() -> Self {
        Self {
            failing: HashSet::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_for<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failing = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for CountingFetcher {
    async fn fetch(&self, location: &SourceLocation) -> Result<Vec<u8>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let name = location.url.strip_prefix(SCHEME).unwrap_or(&location.url);
        if self.failing.contains(name) {
            return Err(FetchError::Status { status: 502 });
        }
        Ok(tiny_png())
    }
}

pub fn tiny_png() -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(5, 7, Rgb([30, 90, 200])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .expect("encode png");
    buf
}

/// Serve one canned HTTP response on a loopback port; returns the base URL.
pub async fn serve_once(status_line: &'static str, content_type: &'static str, body: Vec<u8>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };
        let mut buf = vec![0u8; 4096];
        let _ = socket.read(&mut buf).await;
        let head = format!(
            "HTTP/1.1 {status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        );
        let _ = socket.write_all(head.as_bytes()).await;
        let _ = socket.write_all(&body).await;
        let _ = socket.shutdown().await;
    });
    format!("http://{addr}")
}
