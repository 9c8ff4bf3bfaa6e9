// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Corpus manifests — in-memory listings of the word, background, and stain
// corpora, built once per run and shared read-only across workers.  This
// replaces re-reading the directory for every glyph choice.

use std::path::{Path, PathBuf};

use rand::Rng;
use scriptorium_core::config::CorpusConfig;
use scriptorium_core::error::{Result, ScriptoriumError};
use tracing::{info, instrument};

/// File extensions treated as corpus images.
const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "tif"];

/// Pre-loaded, indexable listings of the three corpora.
///
/// Loading the manifest is the startup precondition check: a missing or
/// empty corpus directory is fatal before any document work begins.
#[derive(Debug, Clone)]
pub struct CorpusManifest {
    words: Vec<PathBuf>,
    backgrounds: Vec<PathBuf>,
    stain_dir: PathBuf,
}

impl CorpusManifest {
    /// Scan all three corpus directories and build the manifest.
    #[instrument(skip_all, fields(
        words = %config.handwritten_words_dir.display(),
        backgrounds = %config.background_images_dir.display(),
    ))]
    pub fn load(config: &CorpusConfig) -> Result<Self> {
        let words = list_images(&config.handwritten_words_dir, "handwritten words")?;
        let backgrounds = list_images(&config.background_images_dir, "background images")?;
        // The tool samples from this directory itself; only its non-emptiness
        // matters here.
        let stains = list_images(&config.stain_images_dir, "stain textures")?;

        info!(
            word_count = words.len(),
            background_count = backgrounds.len(),
            stain_count = stains.len(),
            "corpus manifest loaded"
        );

        Ok(Self {
            words,
            backgrounds,
            stain_dir: config.stain_images_dir.clone(),
        })
    }

    /// Pick a word image uniformly at random.
    pub fn random_word(&self, rng: &mut impl Rng) -> &Path {
        &self.words[rng.random_range(0..self.words.len())]
    }

    /// Pick a background image uniformly at random.
    pub fn random_background(&self, rng: &mut impl Rng) -> &Path {
        &self.backgrounds[rng.random_range(0..self.backgrounds.len())]
    }

    /// The stain texture directory handed to the degradation tool.
    pub fn stain_dir(&self) -> &Path {
        &self.stain_dir
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    pub fn background_count(&self) -> usize {
        self.backgrounds.len()
    }
}

/// List image files in `dir`, sorted by name for reproducible indexing.
fn list_images(dir: &Path, what: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(ScriptoriumError::Corpus(format!(
            "{} folder {} does not exist",
            what,
            dir.display()
        )));
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| {
                    IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
                })
        })
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(ScriptoriumError::Corpus(format!(
            "{} folder {} contains no images",
            what,
            dir.display()
        )));
    }

    Ok(files)
}
