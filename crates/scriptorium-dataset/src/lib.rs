// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scriptorium — dataset packaging: patch extraction, deterministic
// splitting, and transactional record stores.

pub mod layout;
pub mod patch;
pub mod split;
pub mod store;

pub use layout::ResultsLayout;
pub use patch::{PatchExtractor, PatchOutcome};
pub use split::{SplitAssignment, assign_splits, split_into_sets};
pub use store::{DatasetRecord, RecordStore, record_key};
