//! # Picture Press
//!
//! Adaptive image compression and responsive variants for uploaded assets.
//! Hand it the raw bytes of an upload and it returns re-encoded bytes that
//! fit a size budget, or a fixed bundle of breakpoint-sized files ready to be
//! served from a `<picture>` element.
//!
//! # Architecture: Codec, Search, Fan-Out
//!
//! ```text
//! bytes ──► compress (quality search) ──► imaging (decode → resize → encode)
//!                 ▲
//! bytes ──► variants (4 parallel jobs, each one compress call) ──► VariantBundle
//! ```
//!
//! The codec adapter is a single stateless transcode. The search loop that
//! trades quality for size lives one level up and only sees the adapter
//! through the [`imaging::ImageBackend`] trait, so all of its logic is unit
//! tested against a recording mock without encoding a single pixel.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Codec adapter: decode, fit-inside resize, JPEG/WebP/AVIF encode |
//! | [`compress`] | Adaptive compressor: quality step-down until the size budget is met |
//! | [`variants`] | Responsive generator: the fixed breakpoint table, encoded in parallel |
//! | [`optimize`] | Single-shot optimize plus the keep-smaller rule |
//! | [`naming`] | Filename convention shared with templates rendering `<picture>` |
//! | [`config`] | `config.toml` loading, stock defaults, merging, validation |
//! | [`batch`] | Directory driver: discover, process in parallel, report |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## The Latest Candidate Wins
//!
//! When the search ends without meeting the budget (quality floor or attempt
//! limit), the last encode is returned, not the smallest one seen. For the
//! lossy encoders used here lower quality is smaller in practice, so the two
//! coincide.
//!
//! ## All-or-Nothing Bundles
//!
//! [`variants::VariantBundle`] has one field per breakpoint, not a map. A
//! bundle either has every file or does not exist; a single failed job fails
//! the whole call and no partial set is ever published.
//!
//! ## Bytes In, Bytes Out
//!
//! The core never touches the filesystem. Reading uploads and writing
//! derived files is the caller's job ([`batch`] and the binary), which keeps
//! the core usable from request handlers and workers alike.

pub mod batch;
pub mod compress;
pub mod config;
pub mod imaging;
pub mod naming;
pub mod optimize;
pub mod output;
pub mod variants;

#[cfg(test)]
pub(crate) mod test_helpers;
