//! Pipeline stages for proxy-sheet generation.
//!
//! Each submodule implements exactly one step, and the network-facing ones
//! sit behind a trait so the rest can be tested without a network.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ schedule ──▶ cache ──▶ resolve ──▶ fetch ──▶ decode
//! (lines)   (fan-out)   (once/name) (lookup)   (HTTP)    (validate)
//!              │
//!              └──▶ reconstruct ──▶ layout ──▶ render
//!                   (input order)   (grid)     (PDF)
//! ```
//!
//! 1. [`input`]: read the list file and parse `<count> <name>` lines
//! 2. [`schedule`]: acquire every distinct name once, bounded by
//!    `concurrency`, then rebuild the per-copy sequence in input order
//! 3. [`cache`]: single-flight slot per name; concurrent callers share
//!    one load
//! 4. [`resolve`] / [`fetch`]: the only stages with network I/O
//! 5. [`decode`]: prove the bytes are a placeable image
//! 6. [`layout`]: pure grid pagination
//! 7. [`render`]: PDF serialisation and atomic file write

pub mod cache;
pub mod decode;
pub mod fetch;
pub mod input;
pub mod layout;
pub mod render;
pub mod resolve;
pub mod schedule;

#[cfg(test)]
pub(crate) mod testutil;
