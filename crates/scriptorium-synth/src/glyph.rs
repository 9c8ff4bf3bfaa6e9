// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Glyph loading and colorizing.  A glyph is one pre-rendered handwritten
// word image; its alpha channel is derived from its own near-white pixels
// (white paper becomes transparent, ink stays opaque) so it can be blended
// onto an arbitrary background.

use image::{Rgba, RgbaImage};
use rand::Rng;
use scriptorium_core::error::{Result, ScriptoriumError};

/// Starting ink color (RGB) for every text layer's random walk.
pub const INK_COLOR_START: [u8; 3] = [46, 52, 53];

/// A single word image with a whiteness-derived alpha mask.
///
/// Immutable once loaded; colorizing produces a fresh buffer rather than
/// touching the source pixels.
#[derive(Debug, Clone)]
pub struct Glyph {
    image: RgbaImage,
}

impl Glyph {
    /// Load a glyph from a word-corpus file and derive its alpha mask.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let img = image::open(path.as_ref()).map_err(|err| {
            ScriptoriumError::ImageError(format!(
                "failed to open glyph {}: {}",
                path.as_ref().display(),
                err
            ))
        })?;
        Ok(Self::from_rgba(img.to_rgba8()))
    }

    /// Load a glyph and surround it with a uniform white margin before the
    /// alpha derivation.  The bleed-through layer uses this so that the blur
    /// has room to spread without clipping at the glyph's bounding box.
    pub fn load_padded(path: impl AsRef<std::path::Path>, padding: u32) -> Result<Self> {
        let img = image::open(path.as_ref()).map_err(|err| {
            ScriptoriumError::ImageError(format!(
                "failed to open glyph {}: {}",
                path.as_ref().display(),
                err
            ))
        })?;
        let src = img.to_rgba8();

        let mut padded = RgbaImage::from_pixel(
            src.width() + 2 * padding,
            src.height() + 2 * padding,
            Rgba([255, 255, 255, 255]),
        );
        image::imageops::replace(&mut padded, &src, i64::from(padding), i64::from(padding));

        Ok(Self::from_rgba(padded))
    }

    /// Wrap an already-decoded RGBA buffer, deriving alpha from whiteness.
    ///
    /// Per pixel: alpha = 255 − min(r, g, b).  Pure white paper maps to
    /// fully transparent, saturated ink to fully opaque, and antialiased
    /// stroke edges fall smoothly in between.
    pub fn from_rgba(mut image: RgbaImage) -> Self {
        for pixel in image.pixels_mut() {
            let Rgba([r, g, b, _]) = *pixel;
            let whiteness = r.min(g).min(b);
            pixel.0[3] = 255 - whiteness;
        }
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Borrow the alpha-masked source pixels.
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Produce a copy of this glyph with every pixel's color replaced by
    /// `ink`, keeping the derived alpha mask.
    pub fn colorize(&self, ink: [u8; 3]) -> RgbaImage {
        let mut out = self.image.clone();
        for pixel in out.pixels_mut() {
            pixel.0[0] = ink[0];
            pixel.0[1] = ink[1];
            pixel.0[2] = ink[2];
        }
        out
    }
}

/// The slowly drifting ink color shared by all glyphs of one layer.
///
/// Before each glyph is colorized the color takes one bounded random-walk
/// step (each channel moves by −2..=2, clamped to 0..=255), emulating the
/// natural variation of pen pressure and ink flow.  The faded bleed-through
/// layer and the real text layer each run their own independent walk.
#[derive(Debug, Clone)]
pub struct InkColor {
    channels: [i16; 3],
}

impl InkColor {
    pub fn new() -> Self {
        Self {
            channels: [
                i16::from(INK_COLOR_START[0]),
                i16::from(INK_COLOR_START[1]),
                i16::from(INK_COLOR_START[2]),
            ],
        }
    }

    /// Take one walk step and return the updated RGB value.
    pub fn step(&mut self, rng: &mut impl Rng) -> [u8; 3] {
        for channel in &mut self.channels {
            *channel = (*channel + rng.random_range(-2..=2)).clamp(0, 255);
        }
        self.rgb()
    }

    /// Current RGB value without stepping.
    pub fn rgb(&self) -> [u8; 3] {
        [
            self.channels[0] as u8,
            self.channels[1] as u8,
            self.channels[2] as u8,
        ]
    }
}

impl Default for InkColor {
    fn default() -> Self {
        Self::new()
    }
}
