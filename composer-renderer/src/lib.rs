//! # Layer Composer Renderer
//!
//! Raster side of the composer: PNG input, background decoding, the
//! compositor and PNG export.
//!
//! ## Pipeline
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌────────────┐   ┌──────────┐
//! │ PNG input│──▶│ ImageLoader  │──▶│ Compositor │──▶│  Export  │
//! │ (filter) │   │ (async, once)│   │ (z-order)  │   │  (PNG)   │
//! └──────────┘   └──────────────┘   └────────────┘   └──────────┘
//! ```
//!
//! The preview renders whatever has decoded so far. Export waits on every
//! visible layer's decode before compositing.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod compositor;
pub mod error;
pub mod export;
pub mod image;
pub mod loader;
pub mod raster_cache;

pub use crate::image::{
    accepts_input, data_uri_bytes, decode_data_uri, decode_image, decode_input, probe_dimensions,
    ImageFormat, Raster,
};
pub use ::image::RgbaImage;
pub use compositor::{render, RasterProvider};
pub use error::{RenderError, RenderResult};
pub use export::{
    encode_png, export_png, export_to, render_when_ready, DirectorySink, ExportSink, MemorySink,
    DEFAULT_EXPORT_FILENAME,
};
pub use loader::{DecodeHandle, DecodeOutcome, ImageLoader, LoadState};
pub use raster_cache::{CacheStats, RasterCache};
