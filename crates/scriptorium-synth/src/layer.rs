// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Composite layers — accumulate accepted glyph placements into a
// canvas-sized RGBA overlay, optionally keeping a synchronized ground-truth
// twin, and flatten the result onto a background with per-pixel alpha
// blending: out = fg·α + bg·(1−α).

use image::{GrayImage, Luma, Rgb, RgbImage, RgbaImage};
use imageproc::filter::gaussian_blur_f32;

/// Alpha values strictly above this count as ink when the ground truth is
/// binarized.
pub const GROUND_TRUTH_EPSILON: u8 = 0;

/// One full pass of glyph placements over a canvas.
///
/// The real text layer carries a ground-truth twin that receives every
/// placement at the identical offset, so each ink pixel in the overlay has a
/// marked counterpart at the same coordinates.  The decoy bleed-through
/// layer runs without a twin.
#[derive(Debug)]
pub struct TextLayer {
    overlay: RgbaImage,
    ground_truth: Option<RgbaImage>,
    placed: usize,
}

impl TextLayer {
    /// An empty (fully transparent) layer of canvas size.
    pub fn new(width: u32, height: u32, with_ground_truth: bool) -> Self {
        Self {
            overlay: RgbaImage::new(width, height),
            ground_truth: with_ground_truth.then(|| RgbaImage::new(width, height)),
            placed: 0,
        }
    }

    /// Number of glyphs accepted into this layer.
    pub fn placed(&self) -> usize {
        self.placed
    }

    pub fn overlay(&self) -> &RgbaImage {
        &self.overlay
    }

    /// Blend a colorized glyph into the overlay (and the ground-truth twin,
    /// when present) at `origin`.
    ///
    /// The layout tracker guarantees placements never overlap, so blending
    /// onto the transparent layer reduces to writing the glyph pixels where
    /// they are more opaque than what is already there.
    pub fn accept(&mut self, glyph: &RgbaImage, origin: (u32, u32)) {
        let (ox, oy) = origin;
        debug_assert!(ox + glyph.width() <= self.overlay.width());
        debug_assert!(oy + glyph.height() <= self.overlay.height());

        for (gx, gy, pixel) in glyph.enumerate_pixels() {
            let dst = self.overlay.get_pixel_mut(ox + gx, oy + gy);
            if pixel.0[3] > dst.0[3] {
                *dst = *pixel;
            }
            if let Some(gt) = self.ground_truth.as_mut() {
                let gt_dst = gt.get_pixel_mut(ox + gx, oy + gy);
                if pixel.0[3] > gt_dst.0[3] {
                    *gt_dst = *pixel;
                }
            }
        }
        self.placed += 1;
    }

    /// Turn this layer into a bleed-through decoy: heavy Gaussian blur plus
    /// a uniform reduction of opacity.  Meaningless for a layer with a
    /// ground-truth twin, so the twin is dropped if one exists.
    pub fn fade(&mut self, sigma: f32, intensity: f32) {
        self.overlay = gaussian_blur_f32(&self.overlay, sigma);
        for pixel in self.overlay.pixels_mut() {
            pixel.0[3] = (f32::from(pixel.0[3]) * intensity).round().clamp(0.0, 255.0) as u8;
        }
        self.ground_truth = None;
    }

    /// Flatten the overlay onto `background`:
    /// out = fg·α + bg·(1−α), per channel.
    pub fn compose_over(&self, background: &RgbImage) -> RgbImage {
        debug_assert_eq!(background.dimensions(), self.overlay.dimensions());

        let mut out = background.clone();
        for (x, y, fg) in self.overlay.enumerate_pixels() {
            let alpha = u32::from(fg.0[3]);
            if alpha == 0 {
                continue;
            }
            let bg = out.get_pixel_mut(x, y);
            for c in 0..3 {
                let blended =
                    (u32::from(fg.0[c]) * alpha + u32::from(bg.0[c]) * (255 - alpha) + 127) / 255;
                bg.0[c] = blended as u8;
            }
        }
        out
    }

    /// Binarize the ground-truth twin: 1 where ink was placed (any marked
    /// value strictly above the epsilon), 0 elsewhere.
    ///
    /// The result uses the white-background/black-text convention collapsed
    /// to {0, 1} with 1 = ink; the inverted sense used by the patch pipeline
    /// is the caller's responsibility.
    pub fn ground_truth_mask(&self) -> Option<GrayImage> {
        let gt = self.ground_truth.as_ref()?;
        let mut mask = GrayImage::new(gt.width(), gt.height());
        for (x, y, pixel) in gt.enumerate_pixels() {
            let value = if pixel.0[3] > GROUND_TRUTH_EPSILON { 1 } else { 0 };
            mask.put_pixel(x, y, Luma([value]));
        }
        Some(mask)
    }
}

/// Solid background helper used by tests and the assembler's fallbacks.
pub fn solid_background(width: u32, height: u32, value: u8) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb([value, value, value]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glyph::Glyph;
    use image::Rgba;

    fn ink_glyph(width: u32, height: u32) -> RgbaImage {
        let img = RgbaImage::from_pixel(width, height, Rgba([10, 10, 10, 255]));
        Glyph::from_rgba(img).colorize([46, 52, 53])
    }

    #[test]
    fn ground_truth_marks_exactly_where_ink_lands() {
        let mut layer = TextLayer::new(100, 80, true);
        let glyph = ink_glyph(20, 10);
        layer.accept(&glyph, (5, 5));
        layer.accept(&glyph, (60, 40));

        let mask = layer.ground_truth_mask().unwrap();
        for (x, y, pixel) in layer.overlay().enumerate_pixels() {
            let marked = mask.get_pixel(x, y).0[0];
            if pixel.0[3] > 0 {
                assert_eq!(marked, 1, "ink at ({x},{y}) not marked");
            } else {
                assert_eq!(marked, 0, "spurious mark at ({x},{y})");
            }
        }
    }

    #[test]
    fn mask_is_binary() {
        let mut layer = TextLayer::new(50, 50, true);
        layer.accept(&ink_glyph(10, 10), (0, 0));
        let mask = layer.ground_truth_mask().unwrap();
        assert!(mask.pixels().all(|p| p.0[0] == 0 || p.0[0] == 1));
    }

    #[test]
    fn layer_without_twin_has_no_mask() {
        let mut layer = TextLayer::new(50, 50, false);
        layer.accept(&ink_glyph(10, 10), (0, 0));
        assert!(layer.ground_truth_mask().is_none());
    }

    #[test]
    fn compose_blends_fully_opaque_ink() {
        let mut layer = TextLayer::new(10, 10, false);
        layer.accept(&ink_glyph(4, 4), (2, 2));

        let page = layer.compose_over(&solid_background(10, 10, 200));
        assert_eq!(page.get_pixel(3, 3).0, [46, 52, 53]);
        // Outside the glyph the background is untouched.
        assert_eq!(page.get_pixel(0, 0).0, [200, 200, 200]);
    }

    #[test]
    fn compose_blends_partial_alpha() {
        let mut layer = TextLayer::new(4, 4, false);
        let mut half = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 0]));
        half.put_pixel(0, 0, Rgba([0, 0, 0, 128]));
        layer.accept(&half, (0, 0));

        let page = layer.compose_over(&solid_background(4, 4, 255));
        // out = 0*128/255 + 255*127/255 ≈ 127
        let value = page.get_pixel(0, 0).0[0];
        assert!((126..=128).contains(&value), "blend produced {value}");
    }

    #[test]
    fn fade_drops_ground_truth_and_reduces_alpha() {
        let mut layer = TextLayer::new(40, 40, true);
        layer.accept(&ink_glyph(8, 8), (16, 16));
        let peak_before = layer.overlay().pixels().map(|p| p.0[3]).max().unwrap();

        layer.fade(3.0, 0.5);
        assert!(layer.ground_truth_mask().is_none());
        let peak_after = layer.overlay().pixels().map(|p| p.0[3]).max().unwrap();
        assert!(peak_after < peak_before);
    }

    #[test]
    fn placed_counts_accepted_glyphs() {
        let mut layer = TextLayer::new(100, 100, true);
        assert_eq!(layer.placed(), 0);
        layer.accept(&ink_glyph(5, 5), (0, 0));
        layer.accept(&ink_glyph(5, 5), (10, 10));
        assert_eq!(layer.placed(), 2);
    }
}
