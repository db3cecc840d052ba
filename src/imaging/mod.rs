//! Codec adapter: decode, fit-inside resize, encode.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::load_from_memory` |
//! | **Resize** | Lanczos3, fit-inside, never upscales |
//! | **Encode → JPEG** | mozjpeg (progressive) or `image` (baseline) |
//! | **Encode → WebP** | libwebp via `webp` |
//! | **Encode → AVIF** | rav1e (4:2:0) + `avif-serialize` |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension and ratio math (unit testable)
//! - **Parameters**: Data structures describing one requested output
//! - **Backend**: [`ImageBackend`] trait + [`CodecBackend`]

mod avif;
pub mod backend;
mod calculations;
pub mod codec_backend;
mod params;

pub use backend::{BackendError, Dimensions, ImageBackend, OptimizationResult};
pub use calculations::{compression_ratio, fit_inside};
pub use codec_backend::CodecBackend;
pub use params::{OptimizationOptions, OptimizationRequest, OutputFormat, Quality};
