//! Canvas configuration and lenient parsing of user-entered numbers.
//!
//! Text typed into size and geometry fields never produces an error: input
//! that does not parse falls back to a fixed default.

use serde::{Deserialize, Serialize};

use crate::{ComposeError, ComposeResult};

/// Default canvas width in pixels.
pub const DEFAULT_CANVAS_WIDTH: u32 = 800;

/// Default canvas height in pixels.
pub const DEFAULT_CANVAS_HEIGHT: u32 = 600;

/// Output and preview frame size.
///
/// Independent of any layer: changing it only moves the clipping bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasSize {
    width: u32,
    height: u32,
}

impl CanvasSize {
    /// Create a canvas size.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::InvalidCanvasSize`] if either side is zero.
    pub fn new(width: u32, height: u32) -> ComposeResult<Self> {
        if width == 0 || height == 0 {
            return Err(ComposeError::InvalidCanvasSize { width, height });
        }
        Ok(Self { width, height })
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Width as a canvas coordinate.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn width_f32(&self) -> f32 {
        self.width as f32
    }

    /// Height as a canvas coordinate.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn height_f32(&self) -> f32 {
        self.height as f32
    }

    /// Replace the width from user text, falling back to [`DEFAULT_CANVAS_WIDTH`].
    #[must_use]
    pub fn with_width_input(self, input: &str) -> Self {
        Self {
            width: parse_positive_or(input, DEFAULT_CANVAS_WIDTH),
            ..self
        }
    }

    /// Replace the height from user text, falling back to [`DEFAULT_CANVAS_HEIGHT`].
    #[must_use]
    pub fn with_height_input(self, input: &str) -> Self {
        Self {
            height: parse_positive_or(input, DEFAULT_CANVAS_HEIGHT),
            ..self
        }
    }
}

impl Default for CanvasSize {
    fn default() -> Self {
        Self {
            width: DEFAULT_CANVAS_WIDTH,
            height: DEFAULT_CANVAS_HEIGHT,
        }
    }
}

impl std::fmt::Display for CanvasSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Parse a position field, falling back to `0`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn parse_coordinate_or_zero(input: &str) -> f32 {
    parse_integer(input).map_or(0.0, |v| v as f32)
}

/// Parse a width or height field, falling back to `1`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn parse_extent_or_one(input: &str) -> f32 {
    match parse_integer(input) {
        Some(v) if v != 0 => v as f32,
        _ => 1.0,
    }
}

fn parse_positive_or(input: &str, fallback: u32) -> u32 {
    parse_integer(input)
        .and_then(|v| u32::try_from(v).ok())
        .filter(|v| *v > 0)
        .unwrap_or(fallback)
}

/// Integer prefix of the input, ignoring surrounding whitespace.
///
/// `"120px"` reads as 120 and `"12.7"` as 12.
fn parse_integer(input: &str) -> Option<i32> {
    let trimmed = input.trim();
    let end = trimmed
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map_or(trimmed.len(), |(i, _)| i);
    trimmed[..end].parse().ok()
}
