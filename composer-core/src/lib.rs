//! # Layer Composer Core
//!
//! The layer model behind Layer Composer: an ordered stack of positioned
//! images plus the pointer rules for picking, moving and resizing them.
//! Nothing here knows about pixels; rendering lives in `composer-renderer`.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               composer-core                 │
//! ├─────────────────────────────────────────────┤
//! │  Layer Stack     │  Drag Engine             │
//! │  - Layers        │  - Hit testing           │
//! │  - Z-order       │  - Move / resize         │
//! │  - Selection     │  - Pointer events        │
//! ├─────────────────────────────────────────────┤
//! │  Canvas Config   │  Errors                  │
//! └─────────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod drag;
pub mod error;
pub mod event;
pub mod layer;
pub mod stack;

pub use config::{CanvasSize, DEFAULT_CANVAS_HEIGHT, DEFAULT_CANVAS_WIDTH};
pub use drag::{Anchor, DragEngine, DragGesture, DragMode, DragState};
pub use error::{ComposeError, ComposeResult};
pub use event::{PointerEvent, PointerPhase};
pub use layer::{Layer, LayerId, LayerUpdate, HANDLE_SIZE, MIN_LAYER_EXTENT};
pub use stack::{LayerStack, ZDirection};

/// Composer core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
