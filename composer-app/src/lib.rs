//! # Layer Composer Session
//!
//! [`Composer`] ties the layer stack, drag engine, image loader and
//! compositor together behind the calls a host UI makes: add files, forward
//! pointer events, edit the layer panel, draw the preview and export.
//!
//! ## Usage
//!
//! ```no_run
//! use composer_app::Composer;
//! use composer_core::PointerEvent;
//! use composer_renderer::MemorySink;
//!
//! # async fn run(png: Vec<u8>) -> composer_renderer::RenderResult<()> {
//! let mut composer = Composer::new();
//! composer.add_images(vec![("photo.png", png)])?;
//!
//! composer.handle_pointer(PointerEvent::down(60.0, 60.0));
//! composer.handle_pointer(PointerEvent::moved(90.0, 80.0));
//! composer.handle_pointer(PointerEvent::up(90.0, 80.0));
//!
//! let mut sink = MemorySink::default();
//! composer.export(&mut sink).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use composer_core::config::{parse_coordinate_or_zero, parse_extent_or_one};
use composer_core::{
    CanvasSize, DragEngine, Layer, LayerId, LayerStack, LayerUpdate, PointerEvent, ZDirection,
};
use composer_renderer::{
    accepts_input, export_png, export_to, probe_dimensions, render, ExportSink, ImageLoader,
    RenderResult, RgbaImage,
};

/// A geometry field of the layer panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerField {
    /// X position.
    X,
    /// Y position.
    Y,
    /// Width.
    Width,
    /// Height.
    Height,
}

/// One editing session: a layer stack over a canvas, plus its rasters.
#[derive(Debug, Default)]
pub struct Composer {
    stack: LayerStack,
    canvas: CanvasSize,
    drag: DragEngine,
    loader: ImageLoader,
}

impl Composer {
    /// Create an empty session on the default 800x600 canvas.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start on a specific canvas size.
    #[must_use]
    pub fn with_canvas(mut self, canvas: CanvasSize) -> Self {
        self.canvas = canvas;
        self
    }

    /// Add a batch of image files as new layers.
    ///
    /// Files that are not PNG, or whose header cannot be read, are skipped.
    /// Accepted files become layers in input order, each on top of the
    /// previous one, and their pixels decode in the background.
    ///
    /// # Errors
    ///
    /// Returns an error if called outside a tokio runtime. No layer is added
    /// in that case.
    pub fn add_images<I, N>(&mut self, files: I) -> RenderResult<Vec<LayerId>>
    where
        I: IntoIterator<Item = (N, Vec<u8>)>,
        N: Into<String>,
    {
        ImageLoader::ensure_runtime()?;

        let mut added = Vec::new();
        for (name, bytes) in files {
            let name = name.into();
            if !accepts_input(&name, &bytes) {
                tracing::debug!("Skipped '{name}': not a PNG");
                continue;
            }
            let (width, height) = match probe_dimensions(&bytes) {
                Ok(dims) => dims,
                Err(e) => {
                    tracing::warn!("Skipped '{name}': {e}");
                    continue;
                }
            };
            let id = self.stack.add_layer(name, width, height);
            // The decode task runs on its own; export joins it through the loader.
            match self.loader.request(id, bytes) {
                Ok(_decode) => added.push(id),
                Err(e) => {
                    self.stack.delete_layer(id);
                    return Err(e);
                }
            }
        }
        Ok(added)
    }

    /// Forward a pointer event to the drag engine.
    ///
    /// Returns `true` if the layer stack changed.
    pub fn handle_pointer(&mut self, event: PointerEvent) -> bool {
        self.drag.handle(&mut self.stack, self.canvas, event)
    }

    /// Select a layer from the panel.
    pub fn select(&mut self, id: LayerId) {
        self.stack.set_selected(id);
    }

    /// Deselect every layer.
    pub fn clear_selection(&mut self) {
        self.stack.clear_selection();
    }

    /// Merge a partial update into a layer.
    pub fn update_layer(&mut self, id: LayerId, update: LayerUpdate) -> bool {
        self.stack.update_layer(id, update)
    }

    /// Apply text typed into one of the panel's geometry fields.
    ///
    /// Unparsable positions become 0 and unparsable sizes become 1.
    pub fn set_layer_field(&mut self, id: LayerId, field: LayerField, input: &str) -> bool {
        let update = match field {
            LayerField::X => LayerUpdate {
                x: Some(parse_coordinate_or_zero(input)),
                ..LayerUpdate::default()
            },
            LayerField::Y => LayerUpdate {
                y: Some(parse_coordinate_or_zero(input)),
                ..LayerUpdate::default()
            },
            LayerField::Width => LayerUpdate {
                width: Some(parse_extent_or_one(input)),
                ..LayerUpdate::default()
            },
            LayerField::Height => LayerUpdate {
                height: Some(parse_extent_or_one(input)),
                ..LayerUpdate::default()
            },
        };
        self.stack.update_layer(id, update)
    }

    /// Show or hide a layer.
    pub fn toggle_visibility(&mut self, id: LayerId) -> bool {
        self.stack.toggle_visibility(id)
    }

    /// Move a layer one step up or down the stack.
    pub fn move_layer(&mut self, id: LayerId, direction: ZDirection) -> bool {
        self.stack.move_z_order(id, direction)
    }

    /// Delete a layer and forget its raster.
    pub fn delete_layer(&mut self, id: LayerId) -> bool {
        if self.stack.delete_layer(id).is_none() {
            return false;
        }
        let stack = &self.stack;
        self.loader.prune(|live| stack.get(live).is_some());
        true
    }

    /// Set the canvas width from user text. Layers keep their geometry.
    pub fn set_canvas_width_input(&mut self, input: &str) {
        self.canvas = self.canvas.with_width_input(input);
        tracing::debug!("Canvas resized to {}", self.canvas);
    }

    /// Set the canvas height from user text. Layers keep their geometry.
    pub fn set_canvas_height_input(&mut self, input: &str) {
        self.canvas = self.canvas.with_height_input(input);
        tracing::debug!("Canvas resized to {}", self.canvas);
    }

    /// Current canvas size.
    #[must_use]
    pub fn canvas(&self) -> CanvasSize {
        self.canvas
    }

    /// The layer stack.
    #[must_use]
    pub fn stack(&self) -> &LayerStack {
        &self.stack
    }

    /// The selected layer, if any.
    #[must_use]
    pub fn selected(&self) -> Option<&Layer> {
        self.stack.selected()
    }

    /// The drag engine.
    #[must_use]
    pub fn drag(&self) -> &DragEngine {
        &self.drag
    }

    /// The image loader.
    #[must_use]
    pub fn loader(&self) -> &ImageLoader {
        &self.loader
    }

    /// Render the preview from whatever has decoded so far.
    #[must_use]
    pub fn preview(&self) -> RgbaImage {
        render(self.stack.layers(), self.canvas, &self.loader)
    }

    /// Encode the composition as PNG once every visible layer has decoded.
    ///
    /// # Errors
    ///
    /// Returns an error if PNG encoding fails.
    pub async fn export_png(&self) -> RenderResult<Vec<u8>> {
        export_png(self.stack.layers(), self.canvas, &self.loader).await
    }

    /// Export the composition into `sink`.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or saving fails.
    pub async fn export<S>(&self, sink: &mut S) -> RenderResult<()>
    where
        S: ExportSink + ?Sized,
    {
        export_to(self.stack.layers(), self.canvas, &self.loader, sink).await
    }
}
