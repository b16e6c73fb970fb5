//! Composition export to PNG.
//!
//! Export runs the same compositor as the live preview, but first waits for
//! every visible layer's decode to settle so no layer is dropped because of
//! load timing. The encoded bytes go to an [`ExportSink`].

use std::path::{Path, PathBuf};

use composer_core::{stack::paint_order, CanvasSize, Layer, LayerId};
use image::{ImageEncoder, RgbaImage};

use crate::compositor::render;
use crate::error::{RenderError, RenderResult};
use crate::loader::{DecodeOutcome, ImageLoader};

/// File name offered for every export.
pub const DEFAULT_EXPORT_FILENAME: &str = "composed-image.png";

/// Destination for exported bytes.
pub trait ExportSink {
    /// Store one exported file.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes cannot be stored.
    fn save(&mut self, filename: &str, bytes: Vec<u8>) -> RenderResult<()>;
}

/// Writes exports as files inside a directory.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// Create a sink writing into `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory the sink writes into.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ExportSink for DirectorySink {
    fn save(&mut self, filename: &str, bytes: Vec<u8>) -> RenderResult<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(filename);
        std::fs::write(&path, bytes)?;
        tracing::info!("Saved export to {}", path.display());
        Ok(())
    }
}

/// Keeps exports in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    /// Saved files in save order.
    pub files: Vec<(String, Vec<u8>)>,
}

impl ExportSink for MemorySink {
    fn save(&mut self, filename: &str, bytes: Vec<u8>) -> RenderResult<()> {
        self.files.push((filename.to_string(), bytes));
        Ok(())
    }
}

/// Encode a raster as PNG, keeping the alpha channel.
///
/// # Errors
///
/// Returns an error if encoding fails.
pub fn encode_png(image: &RgbaImage) -> RenderResult<Vec<u8>> {
    let mut buf = Vec::new();
    image::codecs::png::PngEncoder::new(&mut buf)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgba8,
        )
        .map_err(|e| RenderError::Encode(format!("PNG encoding failed: {e}")))?;
    Ok(buf)
}

/// Composite the layers once every visible layer's decode has settled.
///
/// Decodes that fail are skipped the same way the preview skips them.
pub async fn render_when_ready(
    layers: &[Layer],
    canvas: CanvasSize,
    loader: &ImageLoader,
) -> RgbaImage {
    let ids: Vec<LayerId> = paint_order(layers).iter().map(|l| l.id()).collect();
    let outcomes = loader.wait_for(&ids).await;

    let failed = outcomes
        .iter()
        .filter(|(_, outcome)| matches!(outcome, DecodeOutcome::Failed(_)))
        .count();
    if failed > 0 {
        tracing::warn!("Exporting without {failed} layer(s) that failed to decode");
    }

    render(layers, canvas, loader)
}

/// Composite and encode the layers as PNG bytes at canvas resolution.
///
/// # Errors
///
/// Returns an error if PNG encoding fails.
pub async fn export_png(
    layers: &[Layer],
    canvas: CanvasSize,
    loader: &ImageLoader,
) -> RenderResult<Vec<u8>> {
    let image = render_when_ready(layers, canvas, loader).await;
    let bytes = encode_png(&image)?;
    tracing::info!(
        "Exported {} layers at {canvas} ({} bytes)",
        layers.len(),
        bytes.len()
    );
    Ok(bytes)
}

/// Export the layers and hand the PNG to `sink` under [`DEFAULT_EXPORT_FILENAME`].
///
/// # Errors
///
/// Returns an error if encoding or saving fails.
pub async fn export_to<S>(
    layers: &[Layer],
    canvas: CanvasSize,
    loader: &ImageLoader,
    sink: &mut S,
) -> RenderResult<()>
where
    S: ExportSink + ?Sized,
{
    let bytes = export_png(layers, canvas, loader).await?;
    sink.save(DEFAULT_EXPORT_FILENAME, bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::Raster;

    fn canvas(w: u32, h: u32) -> CanvasSize {
        CanvasSize::new(w, h).expect("valid size")
    }

    #[test]
    fn test_png_keeps_size_and_alpha() {
        let mut img = RgbaImage::new(4, 3);
        img.put_pixel(1, 1, image::Rgba([10, 20, 30, 128]));

        let png = encode_png(&img).expect("encode");
        assert_eq!(&png[0..4], &[137, 80, 78, 71]);

        let decoded = image::load_from_memory(&png).expect("decode").to_rgba8();
        assert_eq!(decoded.dimensions(), (4, 3));
        assert_eq!(decoded.get_pixel(1, 1).0, [10, 20, 30, 128]);
        assert_eq!(decoded.get_pixel(0, 0).0, [0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn test_export_to_memory_sink() {
        let loader = ImageLoader::new();
        let layer = Layer::new("a.png", 2, 2);
        let _decode = loader
            .request_with(layer.id(), async {
                Ok(Raster::solid(2, 2, [255, 255, 0, 255]))
            })
            .expect("runtime");

        let mut sink = MemorySink::default();
        export_to(&[layer], canvas(4, 4), &loader, &mut sink)
            .await
            .expect("export");

        assert_eq!(sink.files.len(), 1);
        let (name, bytes) = &sink.files[0];
        assert_eq!(name, DEFAULT_EXPORT_FILENAME);
        let decoded = image::load_from_memory(bytes).expect("decode").to_rgba8();
        assert_eq!(decoded.get_pixel(1, 1).0, [255, 255, 0, 255]);
        assert_eq!(decoded.get_pixel(3, 3).0, [0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn test_failed_layer_does_not_block_export() {
        let loader = ImageLoader::new();
        let good = Layer::new("good.png", 2, 2);
        let bad = Layer::new("bad.png", 2, 2).with_z_index(1);
        let _decode = loader
            .request_with(good.id(), async { Ok(Raster::solid(2, 2, [0, 0, 255, 255])) })
            .expect("runtime");
        let _decode = loader
            .request(bad.id(), b"garbage".to_vec())
            .expect("runtime");

        let image = render_when_ready(&[good, bad], canvas(2, 2), &loader).await;
        assert_eq!(image.get_pixel(0, 0).0, [0, 0, 255, 255]);
    }

    #[test]
    fn test_directory_sink_writes_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut sink = DirectorySink::new(dir.path().join("out"));
        sink.save(DEFAULT_EXPORT_FILENAME, vec![1, 2, 3])
            .expect("save");

        let written = std::fs::read(dir.path().join("out").join(DEFAULT_EXPORT_FILENAME))
            .expect("read back");
        assert_eq!(written, vec![1, 2, 3]);
    }
}
