// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Canvas layout tracker — owns the occupied regions of one text layer and
// finds non-overlapping positions for new glyphs by bounded random search.

use rand::Rng;
use scriptorium_core::types::Rect;
use tracing::debug;

/// Occupancy tracker for one layer's placement decisions.
///
/// The tracker only grows: there is no removal, and a `Canvas` lives exactly
/// as long as the layer it lays out.  When `try_place` fails the layer is
/// considered full and glyph generation for that layer stops — a deliberate
/// early-termination policy, not a maximal-packing guarantee, so finished
/// documents may end with unused space.
#[derive(Debug)]
pub struct Canvas {
    width: u32,
    height: u32,
    occupied: Vec<Rect>,
    max_attempts: u32,
}

impl Canvas {
    /// A fresh, empty canvas of the given pixel dimensions.
    pub fn new(width: u32, height: u32, max_attempts: u32) -> Self {
        Self {
            width,
            height,
            occupied: Vec::new(),
            max_attempts,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Rectangles accepted so far, in placement order.
    pub fn occupied(&self) -> &[Rect] {
        &self.occupied
    }

    /// Find a free origin for a glyph of the given size, or report the layer
    /// full.
    ///
    /// Samples up to `max_attempts` uniformly random origins; a candidate is
    /// rejected if its bounding box would leave the canvas or overlap any
    /// previously accepted rectangle.  On success the rectangle is recorded
    /// and the origin returned.
    pub fn try_place(
        &mut self,
        rng: &mut impl Rng,
        glyph_width: u32,
        glyph_height: u32,
    ) -> Option<(u32, u32)> {
        if glyph_width == 0 || glyph_height == 0 {
            return None;
        }
        if glyph_width > self.width || glyph_height > self.height {
            return None;
        }

        for _ in 0..self.max_attempts {
            let x = rng.random_range(0..=self.width - glyph_width);
            let y = rng.random_range(0..=self.height - glyph_height);
            let candidate = Rect::new(x, y, glyph_width, glyph_height);

            if self.occupied.iter().any(|r| r.intersects(&candidate)) {
                continue;
            }

            self.occupied.push(candidate);
            return Some((x, y));
        }

        debug!(
            placed = self.occupied.len(),
            attempts = self.max_attempts,
            "layer full, no free origin found"
        );
        None
    }
}
