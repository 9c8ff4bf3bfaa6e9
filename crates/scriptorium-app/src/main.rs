// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scriptorium — synthetic handwritten-document dataset generator.
//
// Entry point.  Initialises logging, then runs one of the two pipelines:
// `generate` assembles synthetic pages in parallel, `package` crops them
// into patches, splits the patch set, and serializes the record stores.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use tracing::{error, info, info_span, warn};

use scriptorium_core::config::{AssemblyConfig, CorpusConfig, PackagingConfig};
use scriptorium_core::error::{Result, ScriptoriumError};
use scriptorium_core::types::{ArtifactKind, SplitKind};
use scriptorium_dataset::patch::{PatchExtractor, is_ground_truth};
use scriptorium_dataset::split::split_into_sets;
use scriptorium_dataset::store::RecordStore;
use scriptorium_dataset::ResultsLayout;
use scriptorium_synth::document::draw_seeds;
use scriptorium_synth::{CorpusManifest, Document};

#[derive(Parser)]
#[command(name = "scriptorium", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Size of the worker pool (defaults to the number of cores).
    #[arg(long, global = true)]
    threads: Option<usize>,
}

#[derive(Subcommand)]
enum Command {
    /// Assemble synthetic handwritten pages and their ground truths.
    Generate {
        /// Number of documents to generate.
        #[arg(long, default_value_t = 10)]
        count: usize,

        /// Handwritten word-image corpus.
        #[arg(long)]
        words_dir: PathBuf,

        /// Background-image corpus.
        #[arg(long)]
        backgrounds_dir: PathBuf,

        /// Stain-texture corpus for the degradation tool.
        #[arg(long)]
        stains_dir: PathBuf,

        /// Where finished pages and ground truths are saved.
        #[arg(long, default_value = "data/output")]
        output_dir: PathBuf,

        /// Scratch directory for intermediates (RAM-backed is fastest).
        #[arg(long, default_value = "/dev/shm")]
        tmp_dir: PathBuf,

        /// Stain strength/density scaling for the degradation passes.
        #[arg(long, default_value_t = 1)]
        stain_level: u32,

        /// Noise scaling, forwarded alongside the stain level.
        #[arg(long, default_value_t = 1)]
        noise_level: u32,

        /// Skip both degradation passes.
        #[arg(long)]
        bypass: bool,
    },

    /// Crop finished pages into patches, split them, and build the stores.
    Package {
        /// Directory of `img_<seed>.png` / `img_<seed>_gt.png` pairs.
        #[arg(long, default_value = "data/output")]
        source_dir: PathBuf,

        /// Root of the packaged results tree.
        #[arg(long, default_value = "data/final")]
        results_dir: PathBuf,

        /// Where crop pairs that fail the content test are routed.
        #[arg(long, default_value = "data/garbage")]
        garbage_dir: PathBuf,

        /// Keep color patches instead of downsampling to grayscale.
        #[arg(long)]
        color: bool,

        /// Seed for the deterministic train/val/test shuffle.
        #[arg(long, default_value_t = 0x68656c6c6f)]
        shuffle_seed: u64,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if let Some(threads) = cli.threads {
        if let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
        {
            warn!(error = %e, "could not size worker pool, using default");
        }
    }

    let result = match cli.command {
        Command::Generate {
            count,
            words_dir,
            backgrounds_dir,
            stains_dir,
            output_dir,
            tmp_dir,
            stain_level,
            noise_level,
            bypass,
        } => generate(
            count,
            CorpusConfig {
                handwritten_words_dir: words_dir,
                background_images_dir: backgrounds_dir,
                stain_images_dir: stains_dir,
            },
            AssemblyConfig {
                stain_level,
                noise_level,
                tmp_dir,
                output_dir,
                ..AssemblyConfig::default()
            },
            bypass,
        ),
        Command::Package {
            source_dir,
            results_dir,
            garbage_dir,
            color,
            shuffle_seed,
        } => package(PackagingConfig {
            source_dir,
            results_dir,
            garbage_dir,
            grayscale: !color,
            shuffle_seed,
            ..PackagingConfig::default()
        }),
    };

    if let Err(e) = result {
        error!(error = %e, "fatal");
        std::process::exit(1);
    }
}

/// Assemble `count` documents across the worker pool.
///
/// Seeds are drawn up front on the dispatching thread so that filenames are
/// unique within the run; each task then owns an independent `Document`
/// (and thus its own RNG and canvases) identified by an explicit worker id.
fn generate(
    count: usize,
    corpus_config: CorpusConfig,
    assembly: AssemblyConfig,
    bypass: bool,
) -> Result<()> {
    // Fatal precondition: all three corpora must exist and be non-empty.
    let corpus = CorpusManifest::load(&corpus_config)?;
    info!(count, bypass, "generating documents");

    let seeds = draw_seeds(count, &assembly.output_dir)?;

    seeds
        .into_par_iter()
        .enumerate()
        .for_each(|(worker_id, seed)| {
            let span = info_span!("worker", id = worker_id, seed);
            let _guard = span.enter();

            let mut doc = Document::new(&corpus, &assembly, seed);
            match doc.create(bypass) {
                Ok(true) => {
                    if let Err(e) = doc.save(None) {
                        error!(error = %e, "saving page failed");
                        return;
                    }
                    if let Err(e) = doc.save_ground_truth(None) {
                        error!(error = %e, "saving ground truth failed");
                    }
                }
                Ok(false) => info!("document aborted, nothing saved"),
                // Fatal for this document only; sibling tasks keep running.
                Err(e) => error!(error = %e, "document generation failed"),
            }
        });

    Ok(())
}

/// Crop, split, and serialize — the three packaging steps, in order.
/// Splitting must complete before any store is written.
fn package(config: PackagingConfig) -> Result<()> {
    let layout = ResultsLayout::new(&config.results_dir, &config.garbage_dir);
    layout.bootstrap()?;

    // Step 1: crop in parallel, one original per task.
    let originals = list_originals(&config.source_dir)?;
    info!(originals = originals.len(), "cropping patches");

    let extractor = PatchExtractor::new(&config, &layout);
    originals
        .par_iter()
        .enumerate()
        .for_each(|(worker_id, path)| {
            let span = info_span!("worker", id = worker_id);
            let _guard = span.enter();

            let mut rng = StdRng::seed_from_u64(config.shuffle_seed.wrapping_add(worker_id as u64));
            match extractor.process(&mut rng, path) {
                Ok(outcome) => info!(?outcome, original = %path.display(), "processed"),
                // Per-patch soft failure: logged, not propagated.
                Err(e) => warn!(error = %e, original = %path.display(), "patch skipped"),
            }
        });

    // Step 2: deterministic split, single-threaded.
    let assignment = split_into_sets(&layout, &config)?;
    info!(total = assignment.total(), "patches assigned to splits");

    // Step 3: one store per (kind, split).  Stores are independent files,
    // so the four kinds of a split can be written in parallel.
    for split in SplitKind::ALL {
        ArtifactKind::ALL.par_iter().try_for_each(|&kind| {
            let mut store = RecordStore::open(layout.store_dir(kind, split))?;
            let written = store.write_directory(&layout.split_dir(split, kind), &config)?;
            info!(%kind, %split, written, "store written");
            Ok::<(), ScriptoriumError>(())
        })?;
    }

    info!("packaging complete");
    Ok(())
}

/// Sorted listing of finished pages, skipping `_gt` companions (they are
/// picked up through their originals).
fn list_originals(dir: &std::path::Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && !is_ground_truth(path))
        .collect();
    files.sort();
    Ok(files)
}
