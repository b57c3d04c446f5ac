// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Printmate.

use thiserror::Error;

/// Top-level error type for all Printmate operations.
///
/// Superseded work is deliberately NOT an error: components that lose a race
/// against a newer job return a neutral outcome variant instead, so nothing
/// here ever represents "a newer job took over".
#[derive(Debug, Error)]
pub enum PrintmateError {
    // -- Document errors --
    #[error("could not read document: {0}")]
    Parse(String),

    #[error("document transform failed: {0}")]
    Codec(String),

    #[error("rendering engine unavailable: {0}")]
    RenderingUnavailable(String),

    #[error("document is {actual} bytes, over the {limit} byte limit")]
    DocumentTooLarge { actual: u64, limit: u64 },

    // -- Handoff / persistence --
    #[error("preview store unavailable: {0}")]
    Storage(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PrintmateError>;
