//! Layers - one positioned, resizable image instance each.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Smallest width or height a layer may have.
pub const MIN_LAYER_EXTENT: f32 = 1.0;

/// Side length of the square resize handle centred on a layer's bottom-right corner.
pub const HANDLE_SIZE: f32 = 8.0;

/// Unique identifier for a layer.
///
/// Ids are random v4 UUIDs and are never handed out twice, so an id stays
/// unique even after its layer is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerId(Uuid);

impl LayerId {
    /// Create a new unique layer ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from an existing UUID.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for LayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A partial update to a layer's geometry or flags.
///
/// Every field left as `None` keeps its current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerUpdate {
    /// New X position.
    pub x: Option<f32>,
    /// New Y position.
    pub y: Option<f32>,
    /// New width.
    pub width: Option<f32>,
    /// New height.
    pub height: Option<f32>,
    /// New visibility.
    pub visible: Option<bool>,
    /// New stacking order.
    pub z_index: Option<i32>,
    /// New selection flag.
    pub selected: Option<bool>,
}

impl LayerUpdate {
    /// Update only the position.
    #[must_use]
    pub fn position(x: f32, y: f32) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }

    /// Update only the size.
    #[must_use]
    pub fn size(width: f32, height: f32) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            ..Self::default()
        }
    }
}

/// One positioned image over the canvas.
///
/// The decoded raster is not stored here: rasters are cached by the image
/// loader under the layer's [`LayerId`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    id: LayerId,
    name: String,
    /// X position (pixels from left).
    pub x: f32,
    /// Y position (pixels from top).
    pub y: f32,
    width: f32,
    height: f32,
    original_width: u32,
    original_height: u32,
    /// Stacking order, higher paints later.
    pub z_index: i32,
    /// Whether the layer is painted and hit-testable.
    pub visible: bool,
    pub(crate) selected: bool,
}

impl Layer {
    /// Create a new layer at the origin, sized to its intrinsic dimensions.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new(name: impl Into<String>, original_width: u32, original_height: u32) -> Self {
        Self {
            id: LayerId::new(),
            name: name.into(),
            x: 0.0,
            y: 0.0,
            width: (original_width as f32).max(MIN_LAYER_EXTENT),
            height: (original_height as f32).max(MIN_LAYER_EXTENT),
            original_width,
            original_height,
            z_index: 0,
            visible: true,
            selected: false,
        }
    }

    /// Set the position.
    #[must_use]
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    /// Set the size, clamped to [`MIN_LAYER_EXTENT`].
    #[must_use]
    pub fn with_size(mut self, width: f32, height: f32) -> Self {
        self.set_width(width);
        self.set_height(height);
        self
    }

    /// Set the stacking order.
    #[must_use]
    pub fn with_z_index(mut self, z_index: i32) -> Self {
        self.z_index = z_index;
        self
    }

    /// Set the visibility.
    #[must_use]
    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Unique identifier.
    #[must_use]
    pub fn id(&self) -> LayerId {
        self.id
    }

    /// Display label, usually the source file name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current rendered width.
    #[must_use]
    pub fn width(&self) -> f32 {
        self.width
    }

    /// Current rendered height.
    #[must_use]
    pub fn height(&self) -> f32 {
        self.height
    }

    /// Intrinsic decoded width in pixels.
    #[must_use]
    pub fn original_width(&self) -> u32 {
        self.original_width
    }

    /// Intrinsic decoded height in pixels.
    #[must_use]
    pub fn original_height(&self) -> u32 {
        self.original_height
    }

    /// Whether this layer is the current selection.
    #[must_use]
    pub fn is_selected(&self) -> bool {
        self.selected
    }

    /// Set the width, clamped to [`MIN_LAYER_EXTENT`].
    pub fn set_width(&mut self, width: f32) {
        self.width = clamp_extent(width);
    }

    /// Set the height, clamped to [`MIN_LAYER_EXTENT`].
    pub fn set_height(&mut self, height: f32) {
        self.height = clamp_extent(height);
    }

    /// Check if a point (in canvas coordinates) is within this layer.
    ///
    /// Edges count as inside.
    #[must_use]
    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }

    /// Check if a point falls on the resize handle at the bottom-right corner.
    #[must_use]
    pub fn resize_handle_contains(&self, x: f32, y: f32) -> bool {
        let half = HANDLE_SIZE / 2.0;
        let corner_x = self.x + self.width;
        let corner_y = self.y + self.height;
        x >= corner_x - half && x <= corner_x + half && y >= corner_y - half && y <= corner_y + half
    }

    /// Merge a partial update into this layer, except the selection flag.
    ///
    /// Selection goes through the stack so that at most one layer stays selected.
    pub(crate) fn apply_geometry(&mut self, update: &LayerUpdate) {
        if let Some(x) = update.x {
            self.x = x;
        }
        if let Some(y) = update.y {
            self.y = y;
        }
        if let Some(width) = update.width {
            self.set_width(width);
        }
        if let Some(height) = update.height {
            self.set_height(height);
        }
        if let Some(visible) = update.visible {
            self.visible = visible;
        }
        if let Some(z_index) = update.z_index {
            self.z_index = z_index;
        }
    }
}

// NaN collapses to the minimum as well.
fn clamp_extent(value: f32) -> f32 {
    if value >= MIN_LAYER_EXTENT {
        value
    } else {
        MIN_LAYER_EXTENT
    }
}
