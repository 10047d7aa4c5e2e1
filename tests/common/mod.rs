//! Shared test doubles: counting in-memory resolver/fetcher and a loopback
//! stand-in for the card lookup service.

#![allow(dead_code)]

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use proxysheet::{FetchError, Fetcher, NotFound, Resolver, SourceLocation};
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Route library logs to the test harness; set `RUST_LOG` to see them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn card_jpeg() -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(49, 68, Rgb([180, 140, 60])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
        .expect("encode jpeg");
    buf
}

// ── In-memory doubles ────────────────────────────────────────────────────────

/// Resolves known names to `mem://<name>` after an optional per-name delay.
pub struct MemResolver {
    known: HashSet<String>,
    delays: HashMap<String, u64>,
    calls: Mutex<HashMap<String, usize>>,
}

impl MemResolver {
    pub fn new(known: &[&str]) -> Self {
        Self {
            known: known.iter().map(|s| s.to_string()).collect(),
            delays: HashMap::new(),
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn delay(mut self, name: &str, ms: u64) -> Self {
        self.delays.insert(name.to_string(), ms);
        self
    }

    pub fn calls_for(&self, name: &str) -> usize {
        self.calls.lock().unwrap().get(name).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl Resolver for MemResolver {
    async fn resolve(&self, name: &str) -> Result<SourceLocation, NotFound> {
        *self.calls.lock().unwrap().entry(name.to_string()).or_default() += 1;
        if let Some(ms) = self.delays.get(name) {
            tokio::time::sleep(Duration::from_millis(*ms)).await;
        }
        if self.known.contains(name) {
            Ok(SourceLocation::new(format!("mem://{name}")))
        } else {
            Err(NotFound::new("HTTP 404: No cards found matching that name"))
        }
    }
}

/// Returns the same JPEG for every location.
pub struct MemFetcher {
    calls: AtomicUsize,
    payload: Vec<u8>,
}

impl MemFetcher {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            payload: card_jpeg(),
        }
    }

    /// Serve `payload` instead of a valid image.
    pub fn serving(payload: &[u8]) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            payload: payload.to_vec(),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for MemFetcher {
    async fn fetch(&self, _location: &SourceLocation) -> Result<Vec<u8>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.payload.clone())
    }
}

// ── Loopback lookup service ──────────────────────────────────────────────────

/// A tiny HTTP/1.1 server answering `/cards/named?exact=<name>` and
/// `/img/<name>.jpg` for a fixed set of single-word names.
pub struct FakeScryfall {
    pub base_url: String,
    hits: Arc<Mutex<HashMap<String, usize>>>,
}

impl FakeScryfall {
    pub async fn start(known: &[&str]) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback");
        let base_url = format!("http://{}", listener.local_addr().expect("local addr"));
        let known: Arc<HashSet<String>> = Arc::new(known.iter().map(|s| s.to_string()).collect());
        let hits = Arc::new(Mutex::new(HashMap::new()));
        let jpeg = Arc::new(card_jpeg());

        let server_base = base_url.clone();
        let server_hits = Arc::clone(&hits);
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let known = Arc::clone(&known);
                let hits = Arc::clone(&server_hits);
                let jpeg = Arc::clone(&jpeg);
                let base = server_base.clone();
                tokio::spawn(async move {
                    let Some(path) = read_request_path(&mut socket).await else {
                        return;
                    };
                    *hits.lock().unwrap().entry(path.clone()).or_default() += 1;
                    let (status, content_type, body) = route(&path, &known, &base, &jpeg);
                    let head = format!(
                        "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        body.len()
                    );
                    let _ = socket.write_all(head.as_bytes()).await;
                    let _ = socket.write_all(&body).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        Self { base_url, hits }
    }

    /// Requests seen for an exact path (including query).
    pub fn hits(&self, path: &str) -> usize {
        self.hits.lock().unwrap().get(path).copied().unwrap_or(0)
    }

    pub fn total_hits(&self) -> usize {
        self.hits.lock().unwrap().values().sum()
    }
}

async fn read_request_path(socket: &mut tokio::net::TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let head = String::from_utf8_lossy(&buf);
    let request_line = head.lines().next()?;
    request_line.split_whitespace().nth(1).map(str::to_string)
}

fn route(
    path: &str,
    known: &HashSet<String>,
    base: &str,
    jpeg: &[u8],
) -> (&'static str, &'static str, Vec<u8>) {
    if let Some(name) = path.strip_prefix("/cards/named?exact=") {
        if known.contains(name) {
            let body = format!(
                r#"{{"object":"card","name":"{name}","image_uris":{{"normal":"{base}/img/{name}.jpg"}}}}"#
            );
            return ("200 OK", "application/json", body.into_bytes());
        }
        let body = r#"{"object":"error","code":"not_found","status":404,"details":"No cards found matching that name"}"#;
        return ("404 Not Found", "application/json", body.as_bytes().to_vec());
    }
    if path.starts_with("/img/") {
        return ("200 OK", "image/jpeg", jpeg.to_vec());
    }
    ("404 Not Found", "text/plain", b"no route".to_vec())
}
