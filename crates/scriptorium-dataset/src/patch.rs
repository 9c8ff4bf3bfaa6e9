// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Patch extractor — random fixed-size crops of a finished page and its
// ground truth, gated by an edge-density content test, plus the two
// placeholder weight maps emitted per accepted patch.

use std::path::{Path, PathBuf};

use image::{GrayImage, Luma, RgbImage};
use imageproc::edges::canny;
use rand::Rng;
use scriptorium_core::config::PackagingConfig;
use scriptorium_core::error::{Result, ScriptoriumError};
use scriptorium_core::types::ArtifactKind;
use tracing::{debug, info, instrument, warn};

use crate::layout::ResultsLayout;

/// What became of one original/ground-truth pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    /// A crop passed the content test; four artifact files were written.
    Accepted,
    /// The original is smaller than the patch size in some dimension.
    Undersized,
    /// No crop passed within the attempt budget; the last pair went to the
    /// garbage directory for manual inspection.
    Garbage,
}

/// Crops one original+ground-truth pair into dataset patches.
///
/// Stateless apart from its borrowed configuration, so one extractor can be
/// shared read-only across parallel workers; each worker supplies its own
/// RNG.
pub struct PatchExtractor<'a> {
    config: &'a PackagingConfig,
    layout: &'a ResultsLayout,
}

impl<'a> PatchExtractor<'a> {
    pub fn new(config: &'a PackagingConfig, layout: &'a ResultsLayout) -> Self {
        Self { config, layout }
    }

    /// Process one original page.
    ///
    /// The companion ground truth is found by the `_gt` filename convention.
    /// Up to `crop_attempts` independent random crops are tried; both images
    /// are cropped at the identical top-left offset (x and y sampled
    /// independently).  The first crop whose Canny edge fraction strictly
    /// exceeds the threshold wins.
    #[instrument(skip(self, rng), fields(original = %original.display()))]
    pub fn process(&self, rng: &mut impl Rng, original: &Path) -> Result<PatchOutcome> {
        let gt_path = derive_gt_path(original);

        let page = open_rgb(original)?;
        let gt = open_rgb(&gt_path)?;

        let size = self.config.patch_size;
        if page.width() < size || page.height() < size {
            debug!(
                width = page.width(),
                height = page.height(),
                "original undersized, skipped"
            );
            return Ok(PatchOutcome::Undersized);
        }

        info!(
            width = page.width(),
            height = page.height(),
            "cropping and prepping"
        );

        let basename = file_name(original)?;
        let gt_basename = file_name(&gt_path)?;

        let mut last_attempt = None;
        for _ in 0..self.config.crop_attempts {
            let x = rng.random_range(0..=page.width() - size);
            let y = rng.random_range(0..=page.height() - size);

            let page_crop = image::imageops::crop_imm(&page, x, y, size, size).to_image();
            let gt_crop = image::imageops::crop_imm(&gt, x, y, size, size).to_image();
            let gt_mask = binarize_inverted(&gt_crop);

            let edges = canny(
                &image::DynamicImage::ImageRgb8(page_crop.clone()).to_luma8(),
                self.config.canny_low,
                self.config.canny_high,
            );
            let edge_pixels = edges.pixels().filter(|p| p.0[0] > 0).count() as u64;
            let area = u64::from(size) * u64::from(size);

            if content_sufficient(edge_pixels, area, self.config.edge_density_threshold) {
                self.write_patch(&basename, &page_crop, &gt_mask)?;
                return Ok(PatchOutcome::Accepted);
            }
            last_attempt = Some((page_crop, gt_mask, edge_pixels));
        }

        // Route the last attempted pair to the garbage location for manual
        // inspection; the original produces no patch, which is not an error.
        if let Some((page_crop, gt_mask, edge_pixels)) = last_attempt {
            warn!(edge_pixels, "content test never passed, routing to garbage");
            page_crop
                .save(self.layout.garbage_dir().join(&basename))
                .map_err(image_err)?;
            gt_mask
                .save(self.layout.garbage_dir().join(&gt_basename))
                .map_err(image_err)?;
        }
        Ok(PatchOutcome::Garbage)
    }

    /// Write the accepted crop's four artifact files into `full/`.
    ///
    /// All four share the original's basename, which is the 1:1 filename
    /// correspondence the splitter relies on.
    fn write_patch(&self, basename: &str, page: &RgbImage, gt: &GrayImage) -> Result<()> {
        let dest = |kind: ArtifactKind| self.layout.full_dir(kind).join(basename);

        if self.config.grayscale {
            image::DynamicImage::ImageRgb8(page.clone())
                .to_luma8()
                .save(dest(ArtifactKind::OriginalImages))
                .map_err(image_err)?;
        } else {
            page.save(dest(ArtifactKind::OriginalImages))
                .map_err(image_err)?;
        }
        gt.save(dest(ArtifactKind::ProcessedGt)).map_err(image_err)?;

        let weights = GrayImage::from_pixel(
            page.width(),
            page.height(),
            Luma([self.config.weight_value]),
        );
        weights
            .save(dest(ArtifactKind::RecallWeights))
            .map_err(image_err)?;
        weights
            .save(dest(ArtifactKind::PrecisionWeights))
            .map_err(image_err)?;

        debug!(basename, "patch accepted");
        Ok(())
    }
}

/// The edge-density acceptance test, strict at the boundary: a crop sitting
/// exactly on the threshold is rejected.
pub fn content_sufficient(edge_pixels: u64, area: u64, threshold: f64) -> bool {
    edge_pixels as f64 > threshold * area as f64
}

/// `img_123.png` → `img_123_gt.png`.
pub fn derive_gt_path(original: &Path) -> PathBuf {
    let stem = original
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = original
        .extension()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    original.with_file_name(format!("{stem}_gt.{ext}"))
}

/// True for files following the `_gt` companion naming convention; the
/// packaging walk skips these (they are picked up via their original).
pub fn is_ground_truth(path: &Path) -> bool {
    path.file_stem()
        .map(|s| s.to_string_lossy().ends_with("_gt"))
        .unwrap_or(false)
}

/// Binarize a ground-truth crop with inverted sense: background = 1,
/// ink = 0.  Channel extraction, clip to {0, 1}, invert.
fn binarize_inverted(crop: &RgbImage) -> GrayImage {
    let mut mask = GrayImage::new(crop.width(), crop.height());
    for (x, y, pixel) in crop.enumerate_pixels() {
        let value = pixel.0[1].min(1);
        mask.put_pixel(x, y, Luma([1 - value]));
    }
    mask
}

fn open_rgb(path: &Path) -> Result<RgbImage> {
    image::open(path)
        .map(|img| img.to_rgb8())
        .map_err(|e| ScriptoriumError::Patch(format!("failed to open {}: {e}", path.display())))
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| {
            ScriptoriumError::Patch(format!("{} has no file name", path.display()))
        })
}

fn image_err(e: image::ImageError) -> ScriptoriumError {
    ScriptoriumError::ImageError(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use image::Rgb;
    use tempfile::TempDir;

    struct Fixture {
        _tmp: TempDir,
        source: PathBuf,
        config: PackagingConfig,
        layout: ResultsLayout,
    }

    fn fixture() -> Fixture {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("source");
        std::fs::create_dir(&source).unwrap();

        let config = PackagingConfig {
            source_dir: source.clone(),
            results_dir: tmp.path().join("final"),
            garbage_dir: tmp.path().join("garbage"),
            ..PackagingConfig::default()
        };
        let layout = ResultsLayout::new(&config.results_dir, &config.garbage_dir);
        layout.bootstrap().unwrap();

        Fixture {
            _tmp: tmp,
            source,
            config,
            layout,
        }
    }

    /// Write an original/ground-truth pair; `paint` fills the original.
    fn write_pair(
        source: &Path,
        name: &str,
        size: (u32, u32),
        paint: impl Fn(u32, u32) -> Rgb<u8>,
    ) -> PathBuf {
        let mut page = RgbImage::new(size.0, size.1);
        for (x, y, p) in page.enumerate_pixels_mut() {
            *p = paint(x, y);
        }
        let path = source.join(name);
        page.save(&path).unwrap();

        // Ground truth: ink (1) wherever the page is dark.
        let mut gt = GrayImage::new(size.0, size.1);
        for (x, y, p) in gt.enumerate_pixels_mut() {
            let value = if paint(x, y).0[0] < 128 { 1 } else { 0 };
            *p = Luma([value]);
        }
        gt.save(derive_gt_path(&path)).unwrap();
        path
    }

    fn checkerboard(x: u32, y: u32) -> Rgb<u8> {
        if ((x / 8) + (y / 8)) % 2 == 0 {
            Rgb([0, 0, 0])
        } else {
            Rgb([255, 255, 255])
        }
    }

    #[test]
    fn undersized_original_is_skipped() {
        let fx = fixture();
        let path = write_pair(&fx.source, "img_1.png", (100, 100), checkerboard);

        let extractor = PatchExtractor::new(&fx.config, &fx.layout);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            extractor.process(&mut rng, &path).unwrap(),
            PatchOutcome::Undersized
        );

        // No patches, no garbage.
        assert_eq!(count_files(&fx.layout.full_dir(ArtifactKind::OriginalImages)), 0);
        assert_eq!(count_files(fx.layout.garbage_dir()), 0);
    }

    #[test]
    fn flat_original_goes_to_garbage() {
        let fx = fixture();
        let path = write_pair(&fx.source, "img_2.png", (300, 300), |_, _| {
            Rgb([180, 180, 180])
        });

        let extractor = PatchExtractor::new(&fx.config, &fx.layout);
        let mut rng = StdRng::seed_from_u64(2);
        assert_eq!(
            extractor.process(&mut rng, &path).unwrap(),
            PatchOutcome::Garbage
        );

        // Exactly one crop pair lands in garbage, nothing in full/.
        assert_eq!(count_files(fx.layout.garbage_dir()), 2);
        assert!(fx.layout.garbage_dir().join("img_2.png").is_file());
        assert!(fx.layout.garbage_dir().join("img_2_gt.png").is_file());
        for kind in ArtifactKind::ALL {
            assert_eq!(count_files(&fx.layout.full_dir(kind)), 0);
        }
    }

    #[test]
    fn strong_edges_produce_one_patch() {
        let fx = fixture();
        let path = write_pair(&fx.source, "img_3.png", (300, 300), checkerboard);

        let extractor = PatchExtractor::new(&fx.config, &fx.layout);
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(
            extractor.process(&mut rng, &path).unwrap(),
            PatchOutcome::Accepted
        );

        for kind in ArtifactKind::ALL {
            assert!(fx.layout.full_dir(kind).join("img_3.png").is_file());
        }
        assert_eq!(count_files(fx.layout.garbage_dir()), 0);

        // Ground truth patch is binary {0, 1}.
        let gt = image::open(fx.layout.full_dir(ArtifactKind::ProcessedGt).join("img_3.png"))
            .unwrap()
            .to_luma8();
        assert_eq!(gt.dimensions(), (256, 256));
        assert!(gt.pixels().all(|p| p.0[0] <= 1));

        // Weight maps are uniformly 128.
        for kind in [ArtifactKind::RecallWeights, ArtifactKind::PrecisionWeights] {
            let weights = image::open(fx.layout.full_dir(kind).join("img_3.png"))
                .unwrap()
                .to_luma8();
            assert_eq!(weights.dimensions(), (256, 256));
            assert!(weights.pixels().all(|p| p.0[0] == 128));
        }
    }

    #[test]
    fn grayscale_flag_controls_patch_channels() {
        let fx = fixture();
        let path = write_pair(&fx.source, "img_4.png", (300, 300), checkerboard);

        let extractor = PatchExtractor::new(&fx.config, &fx.layout);
        let mut rng = StdRng::seed_from_u64(4);
        extractor.process(&mut rng, &path).unwrap();

        let patch =
            image::open(fx.layout.full_dir(ArtifactKind::OriginalImages).join("img_4.png"))
                .unwrap();
        assert_eq!(patch.color().channel_count(), 1);
    }

    #[test]
    fn acceptance_is_strict_at_the_boundary() {
        // 1% of a 256x256 patch is 655.36 pixels.
        let area = 256u64 * 256;
        assert!(!content_sufficient(655, area, 0.01));
        assert!(content_sufficient(656, area, 0.01));
        // Exactly on the threshold with a round area: rejected.
        assert!(!content_sufficient(1, 100, 0.01));
        assert!(content_sufficient(2, 100, 0.01));
    }

    #[test]
    fn gt_naming_convention() {
        assert_eq!(
            derive_gt_path(Path::new("/data/img_9.png")),
            PathBuf::from("/data/img_9_gt.png")
        );
        assert!(is_ground_truth(Path::new("/data/img_9_gt.png")));
        assert!(!is_ground_truth(Path::new("/data/img_9.png")));
    }

    fn count_files(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }
}
