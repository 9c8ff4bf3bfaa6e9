// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Results-directory layout contract:
//
//   <results>/
//     full/ train/ val/ test/     — each with the four artifact subfolders
//     labels/                     — train.txt / val.txt / test.txt manifests
//     lmdb/                       — one store directory per (kind, split)
//
// plus a garbage directory for crop pairs that failed the content test.

use std::path::{Path, PathBuf};

use scriptorium_core::error::Result;
use scriptorium_core::types::{ArtifactKind, SplitKind};
use tracing::{debug, instrument};

/// Path helper for the packaged-results tree.
#[derive(Debug, Clone)]
pub struct ResultsLayout {
    root: PathBuf,
    garbage: PathBuf,
}

impl ResultsLayout {
    pub fn new(root: impl Into<PathBuf>, garbage: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            garbage: garbage.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn garbage_dir(&self) -> &Path {
        &self.garbage
    }

    /// `full/<kind>/` — where freshly accepted patches land before the split.
    pub fn full_dir(&self, kind: ArtifactKind) -> PathBuf {
        self.root.join("full").join(kind.dir_name())
    }

    /// `<split>/<kind>/`.
    pub fn split_dir(&self, split: SplitKind, kind: ArtifactKind) -> PathBuf {
        self.root.join(split.dir_name()).join(kind.dir_name())
    }

    /// `labels/`.
    pub fn labels_dir(&self) -> PathBuf {
        self.root.join("labels")
    }

    /// `labels/<split>.txt`.
    pub fn manifest_path(&self, split: SplitKind) -> PathBuf {
        self.labels_dir().join(split.manifest_name())
    }

    /// `lmdb/<kind>_<split>_lmdb/`.
    pub fn store_dir(&self, kind: ArtifactKind, split: SplitKind) -> PathBuf {
        self.root.join("lmdb").join(kind.store_name(split))
    }

    /// Create the whole tree.  `create_dir_all` is idempotent, so an
    /// already-existing directory counts as success; any other OS error is
    /// fatal and propagates.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub fn bootstrap(&self) -> Result<()> {
        let full = self.root.join("full");
        for kind in ArtifactKind::ALL {
            std::fs::create_dir_all(full.join(kind.dir_name()))?;
            for split in SplitKind::ALL {
                std::fs::create_dir_all(self.split_dir(split, kind))?;
            }
        }
        std::fs::create_dir_all(self.labels_dir())?;
        std::fs::create_dir_all(self.root.join("lmdb"))?;
        std::fs::create_dir_all(&self.garbage)?;
        debug!("results layout bootstrapped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn bootstrap_creates_full_tree() {
        let tmp = TempDir::new().unwrap();
        let layout = ResultsLayout::new(tmp.path().join("final"), tmp.path().join("garbage"));
        layout.bootstrap().unwrap();

        for kind in ArtifactKind::ALL {
            assert!(layout.full_dir(kind).is_dir());
            for split in SplitKind::ALL {
                assert!(layout.split_dir(split, kind).is_dir());
            }
        }
        assert!(layout.labels_dir().is_dir());
        assert!(layout.garbage_dir().is_dir());
    }

    #[test]
    fn bootstrap_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let layout = ResultsLayout::new(tmp.path().join("final"), tmp.path().join("garbage"));
        layout.bootstrap().unwrap();
        layout.bootstrap().unwrap();
    }

    #[test]
    fn store_dir_naming() {
        let layout = ResultsLayout::new("/data/final", "/data/garbage");
        assert_eq!(
            layout.store_dir(ArtifactKind::ProcessedGt, SplitKind::Val),
            PathBuf::from("/data/final/lmdb/processed_gt_val_lmdb")
        );
    }
}
