// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Scriptorium.

use thiserror::Error;

/// Top-level error type for all Scriptorium operations.
#[derive(Debug, Error)]
pub enum ScriptoriumError {
    // -- Corpus / precondition errors --
    #[error("corpus error: {0}")]
    Corpus(String),

    #[error("could not find an unused document seed after {0} tries")]
    SeedExhausted(u32),

    // -- Assembly errors --
    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("degradation pass failed: {0}")]
    Degradation(String),

    #[error("degradation descriptor generation failed: {0}")]
    Descriptor(String),

    // -- Packaging errors --
    #[error("patch extraction failed: {0}")]
    Patch(String),

    // -- Storage / persistence --
    #[error("database error: {0}")]
    Database(String),

    #[error("record store error on {file}: {source}")]
    Record {
        file: String,
        #[source]
        source: Box<ScriptoriumError>,
    },

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ScriptoriumError {
    /// Wrap an error with the filename it occurred on, for the record store
    /// writer's must-surface-the-offender contract.
    pub fn on_file(self, file: impl Into<String>) -> Self {
        Self::Record {
            file: file.into(),
            source: Box::new(self),
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ScriptoriumError>;
