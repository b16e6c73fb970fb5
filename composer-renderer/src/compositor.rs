//! Flattening the layer stack into one raster.
//!
//! The same [`render`] call drives both the live preview and the final export,
//! so what the user sees is what gets saved.

use std::collections::HashMap;
use std::sync::Arc;

use composer_core::{stack::paint_order, CanvasSize, Layer, LayerId};
use image::{Rgba, RgbaImage};

use crate::image::Raster;
use crate::raster_cache::RasterCache;

/// Source of decoded rasters for the compositor.
pub trait RasterProvider {
    /// The decoded raster for a layer, or `None` if it is not available yet.
    fn raster(&self, id: LayerId) -> Option<Arc<Raster>>;
}

impl RasterProvider for HashMap<LayerId, Arc<Raster>> {
    fn raster(&self, id: LayerId) -> Option<Arc<Raster>> {
        self.get(&id).cloned()
    }
}

impl RasterProvider for RasterCache {
    fn raster(&self, id: LayerId) -> Option<Arc<Raster>> {
        self.peek(id).cloned()
    }
}

/// Composite the visible layers onto a transparent canvas.
///
/// Layers are painted in stable ascending `z_index` order. Each raster is
/// resampled to the layer's size and drawn at its position with source-over
/// alpha, clipped to the canvas. Layers without an available raster are
/// skipped for this pass.
pub fn render<P>(layers: &[Layer], canvas: CanvasSize, provider: &P) -> RgbaImage
where
    P: RasterProvider + ?Sized,
{
    let mut out = RgbaImage::new(canvas.width(), canvas.height());

    for layer in paint_order(layers) {
        match provider.raster(layer.id()) {
            Some(raster) => paint_layer(&mut out, layer, &raster),
            None => tracing::trace!("Layer {} not decoded yet, skipped", layer.id()),
        }
    }

    out
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn paint_layer(out: &mut RgbaImage, layer: &Layer, raster: &Raster) {
    let dest_w = layer.width().round().max(1.0) as u32;
    let dest_h = layer.height().round().max(1.0) as u32;
    let left = layer.x.round() as i64;
    let top = layer.y.round() as i64;

    tracing::trace!(
        "Paint layer {} at ({left}, {top}) size {dest_w}x{dest_h}",
        layer.id()
    );

    let src = &raster.pixels;
    if src.width() == 0 || src.height() == 0 {
        return;
    }
    let Some(clip) = clip_rect(out, left, top, dest_w, dest_h) else {
        return;
    };

    // Only the visible part of the placement is sampled, so the work is
    // bounded by the canvas whatever the layer's size.
    let columns: Vec<Tap> = (clip.src_x..clip.src_x + clip.width)
        .map(|dx| Tap::new(dx, dest_w, src.width()))
        .collect();

    for dy in clip.src_y..clip.src_y + clip.height {
        let row = Tap::new(dy, dest_h, src.height());
        let y = clip.dst_y + (dy - clip.src_y);
        for (i, col) in (0..clip.width).zip(&columns) {
            blend_over(out.get_pixel_mut(clip.dst_x + i, y), sample(src, col, &row));
        }
    }
}

/// Source pixels and weight for one destination row or column.
#[derive(Debug, Clone, Copy)]
struct Tap {
    lo: u32,
    hi: u32,
    t: f64,
}

impl Tap {
    /// Map destination index `d` of `dest_len` onto a source axis of `src_len`,
    /// sampling at pixel centres.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn new(d: u32, dest_len: u32, src_len: u32) -> Self {
        let max = f64::from(src_len - 1);
        let pos = ((f64::from(d) + 0.5) * f64::from(src_len) / f64::from(dest_len) - 0.5)
            .clamp(0.0, max);
        let lo = pos.floor() as u32;
        Self {
            lo,
            hi: (lo + 1).min(src_len - 1),
            t: pos - pos.floor(),
        }
    }
}

/// Bilinear sample of `src`. Exact when both taps land on whole pixels.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn sample(src: &RgbaImage, col: &Tap, row: &Tap) -> Rgba<u8> {
    if col.t <= 0.0 && row.t <= 0.0 {
        return *src.get_pixel(col.lo, row.lo);
    }
    let corners = [
        (src.get_pixel(col.lo, row.lo), (1.0 - col.t) * (1.0 - row.t)),
        (src.get_pixel(col.hi, row.lo), col.t * (1.0 - row.t)),
        (src.get_pixel(col.lo, row.hi), (1.0 - col.t) * row.t),
        (src.get_pixel(col.hi, row.hi), col.t * row.t),
    ];
    let mut px = [0u8; 4];
    for (c, channel) in px.iter_mut().enumerate() {
        let v: f64 = corners.iter().map(|(p, w)| f64::from(p.0[c]) * w).sum();
        *channel = v.round().clamp(0.0, 255.0) as u8;
    }
    Rgba(px)
}

/// Overlap of a placed raster with the canvas, in both coordinate spaces.
struct Clip {
    src_x: u32,
    src_y: u32,
    dst_x: u32,
    dst_y: u32,
    width: u32,
    height: u32,
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn clip_rect(out: &RgbaImage, left: i64, top: i64, width: u32, height: u32) -> Option<Clip> {
    let x0 = left.max(0);
    let y0 = top.max(0);
    let x1 = (left + i64::from(width)).min(i64::from(out.width()));
    let y1 = (top + i64::from(height)).min(i64::from(out.height()));
    if x0 >= x1 || y0 >= y1 {
        return None;
    }
    Some(Clip {
        src_x: (x0 - left) as u32,
        src_y: (y0 - top) as u32,
        dst_x: x0 as u32,
        dst_y: y0 as u32,
        width: (x1 - x0) as u32,
        height: (y1 - y0) as u32,
    })
}

/// Source-over compositing of straight-alpha pixels.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn blend_over(dst: &mut Rgba<u8>, src: Rgba<u8>) {
    let src_a = src.0[3];
    if src_a == 0 {
        return;
    }
    if src_a == u8::MAX || dst.0[3] == 0 {
        *dst = src;
        return;
    }

    let sa = f32::from(src_a) / 255.0;
    let da = f32::from(dst.0[3]) / 255.0;
    let out_a = sa + da * (1.0 - sa);

    for c in 0..3 {
        let s = f32::from(src.0[c]);
        let d = f32::from(dst.0[c]);
        let v = (s * sa + d * da * (1.0 - sa)) / out_a;
        dst.0[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    dst.0[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: [u8; 4] = [255, 0, 0, 255];
    const BLUE: [u8; 4] = [0, 0, 255, 255];

    fn canvas(w: u32, h: u32) -> CanvasSize {
        CanvasSize::new(w, h).expect("valid size")
    }

    fn provider(entries: &[(LayerId, Raster)]) -> HashMap<LayerId, Arc<Raster>> {
        entries
            .iter()
            .map(|(id, r)| (*id, Arc::new(r.clone())))
            .collect()
    }

    #[test]
    fn test_output_has_canvas_size_and_transparent_background() {
        let out = render(&[], canvas(40, 30), &HashMap::<LayerId, Arc<Raster>>::new());
        assert_eq!(out.dimensions(), (40, 30));
        assert!(out.pixels().all(|p| p.0 == [0, 0, 0, 0]));
    }

    #[test]
    fn test_full_cover_layer_reproduces_raster() {
        let layer = Layer::new("full.png", 20, 10);
        let mut raster = Raster::solid(20, 10, RED);
        raster.pixels.put_pixel(3, 4, Rgba(BLUE));
        let rasters = provider(&[(layer.id(), raster)]);

        let out = render(&[layer], canvas(20, 10), &rasters);
        assert_eq!(out.get_pixel(0, 0).0, RED);
        assert_eq!(out.get_pixel(3, 4).0, BLUE);
        assert_eq!(out.get_pixel(19, 9).0, RED);
    }

    #[test]
    fn test_layer_is_scaled_to_its_size() {
        let layer = Layer::new("small.png", 2, 2)
            .with_position(5.0, 5.0)
            .with_size(10.0, 10.0);
        let rasters = provider(&[(layer.id(), Raster::solid(2, 2, RED))]);

        let out = render(&[layer], canvas(30, 30), &rasters);
        assert_eq!(out.get_pixel(5, 5).0, RED);
        assert_eq!(out.get_pixel(14, 14).0, RED);
        assert_eq!(out.get_pixel(15, 15).0, [0, 0, 0, 0]);
        assert_eq!(out.get_pixel(4, 5).0, [0, 0, 0, 0]);
    }

    #[test]
    fn test_higher_z_paints_on_top_and_hidden_is_skipped() {
        let bottom = Layer::new("bottom.png", 10, 10).with_z_index(0);
        let top = Layer::new("top.png", 10, 10).with_z_index(1);
        let rasters = provider(&[
            (bottom.id(), Raster::solid(10, 10, RED)),
            (top.id(), Raster::solid(10, 10, BLUE)),
        ]);

        let out = render(&[top.clone(), bottom.clone()], canvas(10, 10), &rasters);
        assert_eq!(out.get_pixel(5, 5).0, BLUE);

        let hidden_top = top.with_visible(false);
        let out = render(&[hidden_top, bottom], canvas(10, 10), &rasters);
        assert_eq!(out.get_pixel(5, 5).0, RED);
    }

    #[test]
    fn test_equal_z_keeps_slice_order() {
        let first = Layer::new("first.png", 10, 10).with_z_index(3);
        let second = Layer::new("second.png", 10, 10).with_z_index(3);
        let rasters = provider(&[
            (first.id(), Raster::solid(10, 10, RED)),
            (second.id(), Raster::solid(10, 10, BLUE)),
        ]);

        let out = render(&[first, second], canvas(10, 10), &rasters);
        assert_eq!(out.get_pixel(0, 0).0, BLUE);
    }

    #[test]
    fn test_missing_raster_is_skipped() {
        let loaded = Layer::new("loaded.png", 10, 10);
        let pending = Layer::new("pending.png", 10, 10).with_z_index(1);
        let rasters = provider(&[(loaded.id(), Raster::solid(10, 10, RED))]);

        let out = render(&[loaded, pending], canvas(10, 10), &rasters);
        assert_eq!(out.get_pixel(0, 0).0, RED);
    }

    #[test]
    fn test_huge_layer_only_samples_visible_part() {
        let layer = Layer::new("huge.png", 2, 2)
            .with_position(-5.0, -5.0)
            .with_size(2_147_483_647.0, 2_147_483_647.0);
        let rasters = provider(&[(layer.id(), Raster::solid(2, 2, RED))]);

        let out = render(&[layer], canvas(20, 20), &rasters);
        assert_eq!(out.dimensions(), (20, 20));
        assert!(out.pixels().all(|p| p.0 == RED));
    }

    #[test]
    fn test_upscale_interpolates_between_pixels() {
        let layer = Layer::new("ramp.png", 2, 1).with_size(4.0, 1.0);
        let mut raster = Raster::solid(2, 1, [0, 0, 0, 255]);
        raster.pixels.put_pixel(1, 0, Rgba([200, 0, 0, 255]));
        let rasters = provider(&[(layer.id(), raster)]);

        let out = render(&[layer], canvas(4, 1), &rasters);
        let reds: Vec<u8> = (0..4).map(|x| out.get_pixel(x, 0).0[0]).collect();
        assert_eq!(reds, vec![0, 50, 150, 200]);
    }

    #[test]
    fn test_partially_offscreen_layer_is_clipped() {
        let layer = Layer::new("edge.png", 10, 10).with_position(-5.0, 25.0);
        let rasters = provider(&[(layer.id(), Raster::solid(10, 10, RED))]);

        let out = render(&[layer], canvas(30, 30), &rasters);
        assert_eq!(out.get_pixel(0, 29).0, RED);
        assert_eq!(out.get_pixel(4, 25).0, RED);
        assert_eq!(out.get_pixel(5, 25).0, [0, 0, 0, 0]);
    }

    #[test]
    fn test_source_over_alpha() {
        let mut dst = Rgba([0, 0, 255, 255]);
        blend_over(&mut dst, Rgba([255, 0, 0, 128]));
        assert_eq!(dst.0[3], 255);
        assert!(dst.0[0] >= 127 && dst.0[0] <= 129);
        assert!(dst.0[2] >= 126 && dst.0[2] <= 128);

        let mut clear = Rgba([0, 0, 0, 0]);
        blend_over(&mut clear, Rgba([10, 20, 30, 40]));
        assert_eq!(clear.0, [10, 20, 30, 40]);

        let mut kept = Rgba([1, 2, 3, 4]);
        blend_over(&mut kept, Rgba([9, 9, 9, 0]));
        assert_eq!(kept.0, [1, 2, 3, 4]);
    }
}
