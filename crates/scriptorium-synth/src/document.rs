// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document assembler — drives one synthetic page through its stages:
//
//   Init → BackgroundChosen → (FadeLayerApplied) → TextLayerApplied
//        → Degraded1 → Degraded2 → Finished
//
// The two degradation passes sandwich the text stage (skipped entirely in
// bypass mode).  A document that produces no result refuses to save.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use image::RgbImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use scriptorium_core::config::AssemblyConfig;
use scriptorium_core::error::{Result, ScriptoriumError};
use tracing::{debug, info, instrument, warn};

use crate::canvas::Canvas;
use crate::corpus::CorpusManifest;
use crate::degrade::{self, Descriptor};
use crate::glyph::{Glyph, InkColor};
use crate::layer::TextLayer;

/// Candidate range for auto-assigned document seeds.
const SEED_RANGE: std::ops::Range<u64> = 10_000..100_000;
/// Attempts to find a seed whose output filename is not already taken.
const SEED_TRIES: u32 = 10;

/// Assembly progress of one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    BackgroundChosen,
    FadeLayerApplied,
    TextLayerApplied,
    Degraded1,
    Degraded2,
    Finished,
}

/// One synthetic handwritten document.
///
/// Each instance owns its own `StdRng`, seeded at construction, so repeated
/// construction with the same seed and identical corpora reproduces the
/// same document (modulo the external degradation tool's own randomness).
/// Instances are not shareable across workers; each worker builds its own.
pub struct Document<'a> {
    seed: u64,
    config: &'a AssemblyConfig,
    corpus: &'a CorpusManifest,
    stage: Stage,
    result: Option<PathBuf>,
    result_ground_truth: Option<PathBuf>,
    rng: StdRng,
}

impl<'a> Document<'a> {
    /// A document with an explicit seed.
    ///
    /// The seed doubles as filename identity (`img_<seed>.png`) and as the
    /// RNG seed for every random decision this document makes.
    pub fn new(corpus: &'a CorpusManifest, config: &'a AssemblyConfig, seed: u64) -> Self {
        debug!(seed, "document created");
        Self {
            seed,
            config,
            corpus,
            stage: Stage::Init,
            result: None,
            result_ground_truth: None,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// A document with an auto-assigned seed, drawn via [`draw_seeds`].
    pub fn with_random_seed(
        corpus: &'a CorpusManifest,
        config: &'a AssemblyConfig,
    ) -> Result<Self> {
        let mut seeds = draw_seeds(1, &config.output_dir)?;
        match seeds.pop() {
            Some(seed) => Ok(Self::new(corpus, config, seed)),
            None => Err(ScriptoriumError::SeedExhausted(SEED_TRIES)),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Path of the finished page, once `create` has succeeded.
    pub fn result(&self) -> Option<&Path> {
        self.result.as_deref()
    }

    /// Path of the finished ground truth, once the text stage has run.
    pub fn result_ground_truth(&self) -> Option<&Path> {
        self.result_ground_truth.as_deref()
    }

    // -- Generation -----------------------------------------------------------

    /// Run the full assembly pipeline.
    ///
    /// Returns `Ok(true)` when the document reached `Finished`, `Ok(false)`
    /// on a soft abort (unreadable background or intermediate image, or a
    /// text layer that placed no glyphs) — temps already produced are
    /// deleted before returning.  A degradation-tool failure propagates as
    /// an error for this document only.
    #[instrument(skip(self), fields(seed = self.seed, bypass))]
    pub fn create(&mut self, bypass: bool) -> Result<bool> {
        std::fs::create_dir_all(&self.config.tmp_dir)?;

        let background = self.corpus.random_background(&mut self.rng).to_path_buf();
        self.stage = Stage::BackgroundChosen;
        info!(background = %background.display(), "assembling document");

        if bypass {
            return self.create_bypassed(&background);
        }

        // Pass 1: degrade the raw background before any text lands on it.
        let (xml_1, degraded_1) = degrade::pass_paths(&self.config.tmp_dir, self.seed, 1);
        self.run_degradation(&background, &xml_1, &degraded_1)?;

        let Some(page) = load_page(&degraded_1) else {
            warn!(path = %degraded_1.display(), "degraded background unreadable, aborting");
            remove_quietly(&xml_1);
            remove_quietly(&degraded_1);
            return Ok(false);
        };

        let Some(page) = self.apply_text_layers(page)? else {
            remove_quietly(&xml_1);
            remove_quietly(&degraded_1);
            return Ok(false);
        };

        let augmented = self
            .config
            .tmp_dir
            .join(format!("{}_augmented.png", self.seed));
        save_page(&page, &augmented)?;
        self.stage = Stage::Degraded1;

        // Pass 2: degrade the texted page.
        let (xml_2, degraded_2) = degrade::pass_paths(&self.config.tmp_dir, self.seed, 2);
        self.run_degradation(&augmented, &xml_2, &degraded_2)?;
        self.stage = Stage::Degraded2;

        self.result = Some(degraded_2);
        remove_quietly(&xml_1);
        remove_quietly(&xml_2);
        remove_quietly(&degraded_1);
        remove_quietly(&augmented);

        self.stage = Stage::Finished;
        info!(seed = self.seed, "document finished");
        Ok(true)
    }

    /// Bypass mode: text straight onto the chosen background, no
    /// degradation passes.
    fn create_bypassed(&mut self, background: &Path) -> Result<bool> {
        let Some(page) = load_page(background) else {
            warn!(path = %background.display(), "background unreadable, aborting");
            return Ok(false);
        };

        let Some(page) = self.apply_text_layers(page)? else {
            return Ok(false);
        };

        let augmented = self
            .config
            .tmp_dir
            .join(format!("{}_augmented.png", self.seed));
        save_page(&page, &augmented)?;

        self.result = Some(augmented);
        self.stage = Stage::Finished;
        info!(seed = self.seed, "document finished (degradation bypassed)");
        Ok(true)
    }

    /// Optional bleed-through decoy, then the real text layer.
    ///
    /// Returns `None` when the real layer placed no glyphs at all; an empty
    /// page is never saved.
    fn apply_text_layers(&mut self, page: RgbImage) -> Result<Option<RgbImage>> {
        let page = if self.rng.random::<f64>() < self.config.fade_probability {
            let faded = self.add_text_fade(page)?;
            self.stage = Stage::FadeLayerApplied;
            faded
        } else {
            page
        };

        let Some(page) = self.add_text(&page)? else {
            warn!(seed = self.seed, "text layer placed no glyphs, aborting");
            return Ok(None);
        };
        self.stage = Stage::TextLayerApplied;
        Ok(Some(page))
    }

    /// Composite the faded bleed-through layer onto `page`.
    ///
    /// Emulates text on the reverse side of the page showing through:
    /// glyphs are padded with white margin, heavily blurred, and composited
    /// at reduced intensity.  No ground truth is produced.
    fn add_text_fade(&mut self, page: RgbImage) -> Result<RgbImage> {
        let mut canvas = Canvas::new(
            page.width(),
            page.height(),
            self.config.placement_attempts,
        );
        let mut layer = TextLayer::new(page.width(), page.height(), false);
        let mut ink = InkColor::new();

        loop {
            let word = self.corpus.random_word(&mut self.rng).to_path_buf();
            let glyph = Glyph::load_padded(&word, self.config.fade_glyph_padding)?;
            let Some(origin) = canvas.try_place(&mut self.rng, glyph.width(), glyph.height())
            else {
                break;
            };
            let color = ink.step(&mut self.rng);
            layer.accept(&glyph.colorize(color), origin);
        }

        if layer.placed() == 0 {
            return Ok(page);
        }

        debug!(placed = layer.placed(), "bleed-through layer composited");
        layer.fade(self.config.fade_blur_sigma, self.config.fade_intensity);
        Ok(layer.compose_over(&page))
    }

    /// Composite the real text layer onto `page` and write the
    /// ground-truth twin to the scratch directory.
    fn add_text(&mut self, page: &RgbImage) -> Result<Option<RgbImage>> {
        let mut canvas = Canvas::new(
            page.width(),
            page.height(),
            self.config.placement_attempts,
        );
        let mut layer = TextLayer::new(page.width(), page.height(), true);
        let mut ink = InkColor::new();

        loop {
            let word = self.corpus.random_word(&mut self.rng).to_path_buf();
            let glyph = Glyph::load(&word)?;
            let Some(origin) = canvas.try_place(&mut self.rng, glyph.width(), glyph.height())
            else {
                break;
            };
            let color = ink.step(&mut self.rng);
            layer.accept(&glyph.colorize(color), origin);
        }

        if layer.placed() == 0 {
            return Ok(None);
        }
        debug!(placed = layer.placed(), "text layer composited");

        let Some(mask) = layer.ground_truth_mask() else {
            return Err(ScriptoriumError::ImageError(
                "text layer lost its ground-truth twin".to_string(),
            ));
        };
        let gt_path = self.config.tmp_dir.join(format!("{}_gt.png", self.seed));
        mask.save(&gt_path).map_err(|e| {
            ScriptoriumError::ImageError(format!(
                "failed to save ground truth {}: {e}",
                gt_path.display()
            ))
        })?;
        self.result_ground_truth = Some(gt_path);

        Ok(Some(layer.compose_over(page)))
    }

    /// Build, write, and run one degradation descriptor.
    fn run_degradation(&mut self, input: &Path, xml: &Path, output: &Path) -> Result<()> {
        let descriptor = Descriptor {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            degradations: vec![degrade::sample_degradation(
                &mut self.rng,
                self.config.stain_level,
                self.config.degradation_iterations,
                self.corpus.stain_dir(),
            )],
        };
        descriptor.write_to(xml)?;
        degrade::run_tool(&self.config.degrade_command, xml)
    }

    // -- Saving ---------------------------------------------------------------

    /// Copy the finished page into the output directory, then delete the
    /// temp source — the page is consumed by the copy.
    ///
    /// With no result (generation aborted or never ran) this logs and
    /// returns without side effects.
    #[instrument(skip(self), fields(seed = self.seed))]
    pub fn save(&mut self, file: Option<&str>) -> Result<()> {
        let Some(result) = self.result.take() else {
            warn!("trying to save document before it has been generated");
            return Ok(());
        };

        let name = file
            .map(str::to_string)
            .unwrap_or_else(|| format!("img_{}.png", self.seed));
        std::fs::create_dir_all(&self.config.output_dir)?;
        let dest = self.config.output_dir.join(name);

        std::fs::copy(&result, &dest)?;
        std::fs::remove_file(&result)?;
        info!(dest = %dest.display(), "document saved");
        Ok(())
    }

    /// Copy the ground truth into the output directory.
    ///
    /// The temp source is kept: the ground truth may be saved again under a
    /// different naming scheme than its companion page.
    #[instrument(skip(self), fields(seed = self.seed))]
    pub fn save_ground_truth(&self, file: Option<&str>) -> Result<()> {
        let Some(gt) = &self.result_ground_truth else {
            warn!("trying to save ground truth before it has been generated");
            return Ok(());
        };

        let name = file
            .map(str::to_string)
            .unwrap_or_else(|| format!("img_{}_gt.png", self.seed));
        std::fs::create_dir_all(&self.config.output_dir)?;
        let dest = self.config.output_dir.join(name);

        std::fs::copy(gt, &dest)?;
        info!(dest = %dest.display(), "ground truth saved");
        Ok(())
    }
}

/// Draw `count` distinct document seeds from 10000..100000, rejecting any
/// whose output filename `img_<seed>.png` already exists — the seed is part
/// of the saved filename.  Gives up after 10 tries per requested seed.
///
/// The dispatcher draws all seeds up front on one thread, so filenames stay
/// unique within a run even across parallel workers.
pub fn draw_seeds(count: usize, output_dir: &Path) -> Result<Vec<u64>> {
    let mut entropy = rand::rng();
    let mut seeds = BTreeSet::new();
    let mut tries = 0usize;
    while seeds.len() < count {
        if tries > count * SEED_TRIES as usize {
            return Err(ScriptoriumError::SeedExhausted(SEED_TRIES));
        }
        tries += 1;

        let seed = entropy.random_range(SEED_RANGE);
        if output_dir.join(format!("img_{seed}.png")).is_file() {
            continue;
        }
        seeds.insert(seed);
    }
    Ok(seeds.into_iter().collect())
}

/// Load a page image, flattening to RGB.  Unreadable files are a soft
/// abort, not an error, so this maps failures to `None`.
fn load_page(path: &Path) -> Option<RgbImage> {
    image::open(path).ok().map(|img| img.to_rgb8())
}

fn save_page(page: &RgbImage, path: &Path) -> Result<()> {
    page.save(path).map_err(|e| {
        ScriptoriumError::ImageError(format!("failed to save page {}: {e}", path.display()))
    })
}

fn remove_quietly(path: &Path) {
    let _ = std::fs::remove_file(path);
}
