//! Drag gestures: picking, moving and resizing layers with a pointer.
//!
//! ```text
//!            down on layer                move (live update)
//!   Idle ───────────────────▶ Dragging ◀───────────────┐
//!    ▲                          │   └──────────────────┘
//!    └──────── up / leave ──────┘
//! ```
//!
//! Every event is handled synchronously and produces at most one store update.

use serde::{Deserialize, Serialize};

use crate::{CanvasSize, LayerId, LayerStack, LayerUpdate, PointerEvent, PointerPhase};

/// Space kept free at the right and bottom canvas edges while moving,
/// so a layer's origin always stays grabbable.
pub const MIN_DRAG_EXTENT: f32 = 50.0;

/// Smallest width or height a resize gesture produces.
pub const MIN_RESIZE_EXTENT: f32 = 20.0;

/// What a drag gesture does to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DragMode {
    /// Translate the layer.
    Move,
    /// Change the layer's width and height from its bottom-right corner.
    Resize,
}

/// Pointer position and layer geometry recorded when a drag starts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    /// Pointer X at pointer-down.
    pub pointer_x: f32,
    /// Pointer Y at pointer-down.
    pub pointer_y: f32,
    /// Layer X at pointer-down.
    pub x: f32,
    /// Layer Y at pointer-down.
    pub y: f32,
    /// Layer width at pointer-down.
    pub width: f32,
    /// Layer height at pointer-down.
    pub height: f32,
}

/// An active drag gesture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DragGesture {
    /// Move or resize.
    pub mode: DragMode,
    /// Layer being dragged.
    pub target: LayerId,
    /// Starting pointer and geometry.
    pub anchor: Anchor,
}

impl DragGesture {
    /// Geometry update for the pointer at `(x, y)`.
    #[must_use]
    pub fn update_for(&self, canvas: CanvasSize, x: f32, y: f32) -> LayerUpdate {
        let a = &self.anchor;
        let delta_x = x - a.pointer_x;
        let delta_y = y - a.pointer_y;

        match self.mode {
            DragMode::Move => LayerUpdate::position(
                (a.x + delta_x)
                    .min(canvas.width_f32() - MIN_DRAG_EXTENT)
                    .max(0.0),
                (a.y + delta_y)
                    .min(canvas.height_f32() - MIN_DRAG_EXTENT)
                    .max(0.0),
            ),
            DragMode::Resize => LayerUpdate::size(
                (a.width + delta_x)
                    .max(MIN_RESIZE_EXTENT)
                    .min(canvas.width_f32() - a.x),
                (a.height + delta_y)
                    .max(MIN_RESIZE_EXTENT)
                    .min(canvas.height_f32() - a.y),
            ),
        }
    }
}

/// Gesture state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "gesture", rename_all = "lowercase")]
pub enum DragState {
    /// No gesture in progress.
    #[default]
    Idle,
    /// A layer is being moved or resized.
    Dragging(DragGesture),
}

/// Translates pointer events into selection changes and live geometry updates.
#[derive(Debug, Clone, Default)]
pub struct DragEngine {
    state: DragState,
}

impl DragEngine {
    /// Create an idle engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current gesture state.
    #[must_use]
    pub fn state(&self) -> DragState {
        self.state
    }

    /// Check if a gesture is in progress.
    #[must_use]
    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging(_))
    }

    /// Dispatch a pointer event.
    ///
    /// Returns `true` if the layer stack changed.
    pub fn handle(&mut self, stack: &mut LayerStack, canvas: CanvasSize, event: PointerEvent) -> bool {
        match event.phase {
            PointerPhase::Down => self.pointer_down(stack, event.x, event.y).is_some(),
            PointerPhase::Move => self.pointer_move(stack, canvas, event.x, event.y),
            PointerPhase::Up => {
                self.pointer_up();
                false
            }
            PointerPhase::Leave => {
                self.pointer_leave();
                false
            }
        }
    }

    /// Start a gesture on the topmost visible layer under the pointer.
    ///
    /// The hit layer becomes the selection. Grabbing its resize handle starts
    /// a resize, anywhere else a move. A miss changes nothing.
    pub fn pointer_down(&mut self, stack: &mut LayerStack, x: f32, y: f32) -> Option<LayerId> {
        let id = stack.layer_at(x, y)?;
        stack.set_selected(id);
        let layer = stack.get(id)?;

        let mode = if layer.resize_handle_contains(x, y) {
            DragMode::Resize
        } else {
            DragMode::Move
        };
        let anchor = Anchor {
            pointer_x: x,
            pointer_y: y,
            x: layer.x,
            y: layer.y,
            width: layer.width(),
            height: layer.height(),
        };

        tracing::debug!("Drag start: {mode:?} on layer {id} at ({x}, {y})");
        self.state = DragState::Dragging(DragGesture {
            mode,
            target: id,
            anchor,
        });
        Some(id)
    }

    /// Apply the live geometry update for the pointer at `(x, y)`.
    ///
    /// Does nothing while idle.
    pub fn pointer_move(&mut self, stack: &mut LayerStack, canvas: CanvasSize, x: f32, y: f32) -> bool {
        let DragState::Dragging(gesture) = self.state else {
            return false;
        };
        stack.update_layer(gesture.target, gesture.update_for(canvas, x, y))
    }

    /// End the gesture.
    pub fn pointer_up(&mut self) {
        self.end();
    }

    /// Cancel the gesture because the pointer left the canvas.
    ///
    /// Updates already applied during the drag are kept.
    pub fn pointer_leave(&mut self) {
        self.end();
    }

    fn end(&mut self) {
        if let DragState::Dragging(gesture) = self.state {
            tracing::debug!("Drag end on layer {}", gesture.target);
        }
        self.state = DragState::Idle;
    }
}
