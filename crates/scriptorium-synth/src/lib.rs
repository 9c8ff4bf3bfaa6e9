// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scriptorium — document assembly: corpus manifests, glyph layout and
// compositing, degradation passes, and the document state machine.

pub mod canvas;
pub mod corpus;
pub mod degrade;
pub mod document;
pub mod glyph;
pub mod layer;

pub use canvas::Canvas;
pub use corpus::CorpusManifest;
pub use document::{Document, Stage};
pub use glyph::{Glyph, InkColor};
pub use layer::TextLayer;
