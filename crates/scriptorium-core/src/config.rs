// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Generator and packaging configuration.
//
// The assembly constants (fade blur, degradation ranges, ink walk) are
// empirically chosen values carried over from the original corpus recipe.
// They are kept here as named, overridable fields rather than scattered
// literals.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Locations of the three source-image corpora.
///
/// All three directories must exist and be non-empty before any document is
/// generated; `scriptorium_synth::corpus` enforces this at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    /// Directory of pre-rendered handwritten word images.
    pub handwritten_words_dir: PathBuf,
    /// Directory of page background images.
    pub background_images_dir: PathBuf,
    /// Directory of stain textures consumed by the degradation tool.
    pub stain_images_dir: PathBuf,
}

/// Knobs for assembling one synthetic document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyConfig {
    /// Strength/density scaling passed into the degradation descriptor.
    pub stain_level: u32,
    /// Reserved noise knob, forwarded alongside `stain_level`.
    pub noise_level: u32,
    /// Probability that a decoy bleed-through layer is composited first.
    pub fade_probability: f64,
    /// Gaussian blur sigma applied to the bleed-through layer.
    pub fade_blur_sigma: f32,
    /// Alpha scale applied to the bleed-through layer (reduced intensity).
    pub fade_intensity: f32,
    /// Uniform white padding, in pixels, added around bleed-through glyphs.
    pub fade_glyph_padding: u32,
    /// Random origin samples tried per glyph before a layer is declared full.
    pub placement_attempts: u32,
    /// Iteration count written into every gradient-degradation block.
    pub degradation_iterations: u32,
    /// Command prefix for the external degradation tool; the descriptor path
    /// is appended as the final argument.
    pub degrade_command: Vec<String>,
    /// Scratch directory for intermediate images and descriptors.
    /// Something RAM-backed (e.g. /dev/shm) speeds up the tool round-trips.
    pub tmp_dir: PathBuf,
    /// Directory finished pages and ground truths are saved into.
    pub output_dir: PathBuf,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            stain_level: 1,
            noise_level: 1,
            fade_probability: 0.3,
            fade_blur_sigma: 8.0,
            fade_intensity: 0.6,
            fade_glyph_padding: 25,
            placement_attempts: 100,
            degradation_iterations: 750,
            degrade_command: vec![
                "java".to_string(),
                "-jar".to_string(),
                "DivaDid.jar".to_string(),
            ],
            tmp_dir: PathBuf::from("/dev/shm"),
            output_dir: PathBuf::from("data/output"),
        }
    }
}

/// Knobs for cropping, splitting, and serializing the finished pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackagingConfig {
    /// Patch edge length in pixels (patches are square).
    pub patch_size: u32,
    /// Independent random crops tried before an original is given up on.
    pub crop_attempts: u32,
    /// Minimum fraction of edge pixels a crop must strictly exceed.
    pub edge_density_threshold: f64,
    /// Canny hysteresis thresholds for the content test.
    pub canny_low: f32,
    pub canny_high: f32,
    /// Uniform value written into both placeholder weight maps.
    pub weight_value: u8,
    /// Downsample accepted image patches to a single channel.
    pub grayscale: bool,
    /// Seed for the deterministic train/val/test shuffle.
    pub shuffle_seed: u64,
    /// Cumulative split fractions; val ends at `train + val`.
    pub train_fraction: f64,
    pub val_fraction: f64,
    /// Record-store writes per transaction commit.
    pub commit_interval: usize,
    /// Numeric prefix base and stride for record keys.
    pub key_base: u64,
    pub key_stride: u64,
    /// Directory holding the finished page/ground-truth pairs to crop.
    pub source_dir: PathBuf,
    /// Root of the results layout (full/train/val/test/labels/lmdb).
    pub results_dir: PathBuf,
    /// Where failed crop pairs are routed for manual inspection.
    pub garbage_dir: PathBuf,
}

impl Default for PackagingConfig {
    fn default() -> Self {
        Self {
            patch_size: 256,
            crop_attempts: 5,
            edge_density_threshold: 0.01,
            canny_low: 100.0,
            canny_high: 200.0,
            weight_value: 128,
            grayscale: true,
            shuffle_seed: 0x68656c6c6f, // "hello"
            train_fraction: 0.6,
            val_fraction: 0.2,
            commit_interval: 10,
            key_base: 76_547_000,
            key_stride: 37,
            source_dir: PathBuf::from("data/output"),
            results_dir: PathBuf::from("data/final"),
            garbage_dir: PathBuf::from("data/garbage"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_carry_documented_constants() {
        let asm = AssemblyConfig::default();
        assert_eq!(asm.fade_probability, 0.3);
        assert_eq!(asm.degradation_iterations, 750);
        assert_eq!(asm.placement_attempts, 100);

        let pkg = PackagingConfig::default();
        assert_eq!(pkg.patch_size, 256);
        assert_eq!(pkg.crop_attempts, 5);
        assert_eq!(pkg.edge_density_threshold, 0.01);
        assert_eq!(pkg.key_base, 76_547_000);
        assert_eq!(pkg.key_stride, 37);
        assert_eq!(pkg.commit_interval, 10);
    }

    #[test]
    fn config_round_trips_through_json() {
        let pkg = PackagingConfig::default();
        let json = serde_json::to_string(&pkg).unwrap();
        let back: PackagingConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.patch_size, pkg.patch_size);
        assert_eq!(back.shuffle_seed, pkg.shuffle_seed);
    }
}
