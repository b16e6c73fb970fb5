//! The layer stack - ordered storage for every layer on the canvas.

use serde::{Deserialize, Serialize};

use crate::{ComposeError, ComposeResult, Layer, LayerId, LayerUpdate};

/// Offset of the first imported layer from the canvas origin.
pub const STAGGER_ORIGIN: f32 = 50.0;

/// Extra offset applied per existing layer so stacked imports stay distinguishable.
pub const STAGGER_STEP: f32 = 20.0;

/// Direction for a relative z-order nudge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZDirection {
    /// Towards the top of the stack.
    Up,
    /// Towards the bottom of the stack.
    Down,
}

/// All layers of a composition, kept in insertion order.
///
/// Insertion order is the tie-break for equal `z_index` values everywhere:
/// in paint order, in hit testing and in the layer panel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerStack {
    layers: Vec<Layer>,
}

impl LayerStack {
    /// Create an empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a layer for a freshly decoded image.
    ///
    /// The layer starts at its intrinsic size, staggered from earlier layers,
    /// on top of the current stack.
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub fn add_layer(
        &mut self,
        name: impl Into<String>,
        original_width: u32,
        original_height: u32,
    ) -> LayerId {
        let index = self.layers.len();
        let offset = STAGGER_ORIGIN + STAGGER_STEP * index as f32;
        let layer = Layer::new(name, original_width, original_height)
            .with_position(offset, offset)
            .with_z_index(index as i32);
        let id = layer.id();
        tracing::debug!("Added layer {id} '{}' at z={index}", layer.name());
        self.layers.push(layer);
        id
    }

    /// Insert a fully built layer as-is.
    ///
    /// Its selection flag is cleared; use [`LayerStack::set_selected`] afterwards.
    pub fn insert(&mut self, mut layer: Layer) -> LayerId {
        layer.selected = false;
        let id = layer.id();
        self.layers.push(layer);
        id
    }

    /// Merge a partial update into the layer with `id`.
    ///
    /// Returns `false` if no such layer exists. Setting `selected` to `true`
    /// deselects every other layer.
    pub fn update_layer(&mut self, id: LayerId, update: LayerUpdate) -> bool {
        let Some(layer) = self.get_mut(id) else {
            return false;
        };
        layer.apply_geometry(&update);
        match update.selected {
            Some(true) => self.set_selected(id),
            Some(false) => {
                if let Some(layer) = self.get_mut(id) {
                    layer.selected = false;
                }
            }
            None => {}
        }
        true
    }

    /// Select the layer with `id` and deselect all others.
    ///
    /// An unknown id leaves nothing selected.
    pub fn set_selected(&mut self, id: LayerId) {
        for layer in &mut self.layers {
            layer.selected = layer.id() == id;
        }
        tracing::debug!("Selected layer {id}");
    }

    /// Deselect every layer.
    pub fn clear_selection(&mut self) {
        for layer in &mut self.layers {
            layer.selected = false;
        }
    }

    /// Flip the visibility of the layer with `id`.
    pub fn toggle_visibility(&mut self, id: LayerId) -> bool {
        match self.get_mut(id) {
            Some(layer) => {
                layer.visible = !layer.visible;
                true
            }
            None => false,
        }
    }

    /// Nudge a layer one step up or down the stack.
    ///
    /// `Up` never goes past one above the highest other layer; `Down` stops at 0.
    /// Other layers are not renumbered, so ties may appear.
    pub fn move_z_order(&mut self, id: LayerId, direction: ZDirection) -> bool {
        let others_max = self
            .layers
            .iter()
            .filter(|l| l.id() != id)
            .map(|l| l.z_index)
            .max();
        let Some(layer) = self.get_mut(id) else {
            return false;
        };
        let before = layer.z_index;
        layer.z_index = match direction {
            ZDirection::Up => match others_max {
                Some(max) => before.saturating_add(1).min(max.saturating_add(1)).max(before),
                None => before,
            },
            ZDirection::Down => {
                if before > 0 {
                    before - 1
                } else {
                    before
                }
            }
        };
        tracing::debug!("Layer {id} z {before} -> {}", layer.z_index);
        layer.z_index != before
    }

    /// Remove the layer with `id`.
    ///
    /// Deleting the selected layer leaves nothing selected.
    pub fn delete_layer(&mut self, id: LayerId) -> Option<Layer> {
        let index = self.layers.iter().position(|l| l.id() == id)?;
        tracing::debug!("Deleted layer {id}");
        Some(self.layers.remove(index))
    }

    /// Get a layer by ID.
    #[must_use]
    pub fn get(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id() == id)
    }

    fn get_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.id() == id)
    }

    /// Get a layer by ID, failing if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::LayerNotFound`] if no layer has this id.
    pub fn require(&self, id: LayerId) -> ComposeResult<&Layer> {
        self.get(id)
            .ok_or_else(|| ComposeError::LayerNotFound(id.to_string()))
    }

    /// All layers in insertion order.
    #[must_use]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// The currently selected layer, if any.
    #[must_use]
    pub fn selected(&self) -> Option<&Layer> {
        self.layers.iter().find(|l| l.is_selected())
    }

    /// Visible layers in the order they are painted, bottom first.
    ///
    /// The sort is stable, so equal `z_index` values keep insertion order.
    #[must_use]
    pub fn paint_order(&self) -> Vec<&Layer> {
        paint_order(&self.layers)
    }

    /// All layers as listed in a layer panel, topmost first.
    ///
    /// This is the reverse of the stable ascending sort, so among equal
    /// `z_index` values the layer that hit testing picks is listed first.
    #[must_use]
    pub fn panel_order(&self) -> Vec<&Layer> {
        let mut layers: Vec<_> = self.layers.iter().collect();
        layers.sort_by_key(|l| l.z_index);
        layers.reverse();
        layers
    }

    /// Find the topmost visible layer at the given canvas coordinates.
    ///
    /// Among equal `z_index` values the layer painted last wins.
    #[must_use]
    pub fn layer_at(&self, x: f32, y: f32) -> Option<LayerId> {
        self.paint_order()
            .into_iter()
            .rev()
            .find(|l| l.contains_point(x, y))
            .map(Layer::id)
    }

    /// Whether the layer holds the highest `z_index` in the stack.
    #[must_use]
    pub fn is_topmost(&self, id: LayerId) -> bool {
        let max = self.layers.iter().map(|l| l.z_index).max();
        self.get(id).is_some_and(|l| Some(l.z_index) == max)
    }

    /// Whether the layer holds the lowest `z_index` in the stack.
    #[must_use]
    pub fn is_bottommost(&self, id: LayerId) -> bool {
        let min = self.layers.iter().map(|l| l.z_index).min();
        self.get(id).is_some_and(|l| Some(l.z_index) == min)
    }

    /// Get the number of layers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Check if the stack is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

/// Visible layers of any slice in stable ascending `z_index` order.
#[must_use]
pub fn paint_order(layers: &[Layer]) -> Vec<&Layer> {
    let mut visible: Vec<_> = layers.iter().filter(|l| l.visible).collect();
    visible.sort_by_key(|l| l.z_index);
    visible
}
