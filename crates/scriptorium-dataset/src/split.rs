// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Dataset splitter — deterministic shuffle of the accepted patch set and
// 60/20/20 partition into train/val/test.  Since every patch has exactly
// one file per artifact family under the same basename, iterating the
// original-image listing is enough to move all four families in lockstep.

use std::io::Write;
use std::path::Path;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use scriptorium_core::config::PackagingConfig;
use scriptorium_core::error::Result;
use scriptorium_core::types::{ArtifactKind, SplitKind};
use tracing::{info, instrument};

use crate::layout::ResultsLayout;

/// The partition produced by one split run, in assignment order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitAssignment {
    pub train: Vec<String>,
    pub val: Vec<String>,
    pub test: Vec<String>,
}

impl SplitAssignment {
    pub fn for_split(&self, split: SplitKind) -> &[String] {
        match split {
            SplitKind::Train => &self.train,
            SplitKind::Val => &self.val,
            SplitKind::Test => &self.test,
        }
    }

    pub fn total(&self) -> usize {
        self.train.len() + self.val.len() + self.test.len()
    }
}

/// Deterministically partition `files`.
///
/// The index sequence is shuffled with a seeded RNG, then cut at the
/// cumulative fractions (floored): the first 60% of the shuffled order goes
/// to train, the next 20% to val, the rest to test.  Same seed + same list
/// ⇒ same partition.
pub fn assign_splits(
    files: &[String],
    seed: u64,
    train_fraction: f64,
    val_fraction: f64,
) -> SplitAssignment {
    let mut sequence: Vec<usize> = (0..files.len()).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    sequence.shuffle(&mut rng);

    let train_cutoff = (files.len() as f64 * train_fraction).floor() as usize;
    let val_cutoff = (files.len() as f64 * (train_fraction + val_fraction)).floor() as usize;

    let mut assignment = SplitAssignment {
        train: Vec::new(),
        val: Vec::new(),
        test: Vec::new(),
    };
    for (count, &index) in sequence.iter().enumerate() {
        let file = files[index].clone();
        if count < train_cutoff {
            assignment.train.push(file);
        } else if count < val_cutoff {
            assignment.val.push(file);
        } else {
            assignment.test.push(file);
        }
    }
    assignment
}

/// Move every accepted patch out of `full/` into its split's directories
/// and write the three filename manifests.
///
/// Single-threaded by design; serialization must not start until this has
/// run to completion.
#[instrument(skip(layout, config))]
pub fn split_into_sets(layout: &ResultsLayout, config: &PackagingConfig) -> Result<SplitAssignment> {
    let files = list_patches(&layout.full_dir(ArtifactKind::OriginalImages))?;
    let assignment = assign_splits(
        &files,
        config.shuffle_seed,
        config.train_fraction,
        config.val_fraction,
    );

    for split in SplitKind::ALL {
        for file in assignment.for_split(split) {
            for kind in ArtifactKind::ALL {
                std::fs::rename(
                    layout.full_dir(kind).join(file),
                    layout.split_dir(split, kind).join(file),
                )?;
            }
        }
        write_manifest(layout, split, assignment.for_split(split))?;
    }

    info!(
        train = assignment.train.len(),
        val = assignment.val.len(),
        test = assignment.test.len(),
        "dataset split complete"
    );
    Ok(assignment)
}

/// Sorted listing of the accepted-patch basenames.  Sorting makes the
/// shuffle input, and therefore the whole partition, reproducible across
/// runs and filesystems.
fn list_patches(dir: &Path) -> Result<Vec<String>> {
    let mut files: Vec<String> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    files.sort();
    Ok(files)
}

/// One `./<filename>` line per moved patch.
fn write_manifest(layout: &ResultsLayout, split: SplitKind, files: &[String]) -> Result<()> {
    let mut out = std::fs::File::create(layout.manifest_path(split))?;
    for file in files {
        writeln!(out, "./{file}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn filenames(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("img_{i}.png")).collect()
    }

    #[test]
    fn ten_files_split_six_two_two() {
        let files = filenames(10);
        let assignment = assign_splits(&files, 99, 0.6, 0.2);
        assert_eq!(assignment.train.len(), 6);
        assert_eq!(assignment.val.len(), 2);
        assert_eq!(assignment.test.len(), 2);
        assert_eq!(assignment.total(), 10);
    }

    #[test]
    fn partition_is_deterministic() {
        let files = filenames(25);
        let a = assign_splits(&files, 1234, 0.6, 0.2);
        let b = assign_splits(&files, 1234, 0.6, 0.2);
        assert_eq!(a, b);

        let c = assign_splits(&files, 4321, 0.6, 0.2);
        assert_ne!(a, c, "different seeds should shuffle differently");
    }

    #[test]
    fn every_file_lands_in_exactly_one_split() {
        let files = filenames(17);
        let assignment = assign_splits(&files, 7, 0.6, 0.2);

        let mut seen: Vec<&String> = assignment
            .train
            .iter()
            .chain(&assignment.val)
            .chain(&assignment.test)
            .collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 17);
    }

    #[test]
    fn empty_input_empty_partition() {
        let assignment = assign_splits(&[], 1, 0.6, 0.2);
        assert_eq!(assignment.total(), 0);
    }

    #[test]
    fn split_moves_all_four_families_and_writes_manifests() {
        let tmp = TempDir::new().unwrap();
        let config = PackagingConfig {
            results_dir: tmp.path().join("final"),
            garbage_dir: tmp.path().join("garbage"),
            ..PackagingConfig::default()
        };
        let layout = ResultsLayout::new(&config.results_dir, &config.garbage_dir);
        layout.bootstrap().unwrap();

        for file in filenames(10) {
            for kind in ArtifactKind::ALL {
                std::fs::write(layout.full_dir(kind).join(&file), b"patch").unwrap();
            }
        }

        let assignment = split_into_sets(&layout, &config).unwrap();
        assert_eq!(assignment.train.len(), 6);
        assert_eq!(assignment.val.len(), 2);
        assert_eq!(assignment.test.len(), 2);

        // full/ is drained, each split holds its files in all four families.
        for kind in ArtifactKind::ALL {
            assert_eq!(
                std::fs::read_dir(layout.full_dir(kind)).unwrap().count(),
                0
            );
        }
        for split in SplitKind::ALL {
            for file in assignment.for_split(split) {
                for kind in ArtifactKind::ALL {
                    assert!(layout.split_dir(split, kind).join(file).is_file());
                }
            }
        }

        // Manifests list exactly the split's files, one `./name` line each.
        for split in SplitKind::ALL {
            let manifest = std::fs::read_to_string(layout.manifest_path(split)).unwrap();
            let lines: Vec<&str> = manifest.lines().collect();
            assert_eq!(lines.len(), assignment.for_split(split).len());
            for (line, file) in lines.iter().zip(assignment.for_split(split)) {
                assert_eq!(*line, format!("./{file}"));
            }
        }
    }

    #[test]
    fn rerunning_on_identical_inputs_reproduces_manifests() {
        let make = |root: &Path| -> String {
            let config = PackagingConfig {
                results_dir: root.join("final"),
                garbage_dir: root.join("garbage"),
                ..PackagingConfig::default()
            };
            let layout = ResultsLayout::new(&config.results_dir, &config.garbage_dir);
            layout.bootstrap().unwrap();
            for file in filenames(12) {
                for kind in ArtifactKind::ALL {
                    std::fs::write(layout.full_dir(kind).join(&file), b"p").unwrap();
                }
            }
            split_into_sets(&layout, &config).unwrap();
            std::fs::read_to_string(layout.manifest_path(SplitKind::Train)).unwrap()
        };

        let tmp_a = TempDir::new().unwrap();
        let tmp_b = TempDir::new().unwrap();
        assert_eq!(make(tmp_a.path()), make(tmp_b.path()));
    }
}
