// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types shared by the assembly and packaging pipelines.

use serde::{Deserialize, Serialize};

/// An axis-aligned occupied region on a canvas, in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive right edge.
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// True if the two rectangles share any pixel.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

/// The three dataset partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SplitKind {
    Train,
    Val,
    Test,
}

impl SplitKind {
    pub const ALL: [SplitKind; 3] = [SplitKind::Train, SplitKind::Val, SplitKind::Test];

    /// Directory name under the results root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Val => "val",
            Self::Test => "test",
        }
    }

    /// Manifest filename under `labels/`.
    pub fn manifest_name(&self) -> &'static str {
        match self {
            Self::Train => "train.txt",
            Self::Val => "val.txt",
            Self::Test => "test.txt",
        }
    }
}

impl std::fmt::Display for SplitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// The four per-patch artifact families.
///
/// Every accepted patch produces exactly one file in each family, all under
/// the same basename, which is what lets the splitter move them in lockstep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtifactKind {
    OriginalImages,
    ProcessedGt,
    RecallWeights,
    PrecisionWeights,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 4] = [
        ArtifactKind::OriginalImages,
        ArtifactKind::ProcessedGt,
        ArtifactKind::RecallWeights,
        ArtifactKind::PrecisionWeights,
    ];

    /// Subdirectory name inside each split directory.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::OriginalImages => "original_images",
            Self::ProcessedGt => "processed_gt",
            Self::RecallWeights => "recall_weights",
            Self::PrecisionWeights => "precision_weights",
        }
    }

    /// Record-store directory name for one (kind, split) pair,
    /// e.g. `original_images_train_lmdb`.
    pub fn store_name(&self, split: SplitKind) -> String {
        format!("{}_{}_lmdb", self.dir_name(), split.dir_name())
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dir_name())
    }
}
