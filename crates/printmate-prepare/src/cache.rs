// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Single-entry memoisation of the two expensive pipeline stages.
//
// The vector cache is keyed by the fingerprint of (source digest, range
// expression, orientation). The raster cache is keyed by the *vector
// result's* fingerprint, not the full parameter set, so toggling the colour
// mode alone never recomputes the vector stage — it only gates whether
// rasterisation additionally runs.

use printmate_core::{RasterResult, VectorResult};
use tracing::debug;

/// Last vector transform and last grayscale conversion, each at most one.
#[derive(Debug, Default)]
pub struct TransformCache {
    vector: Option<VectorResult>,
    raster: Option<RasterResult>,
}

impl TransformCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached vector result, only if its fingerprint matches.
    pub fn vector(&self, fingerprint: &str) -> Option<&VectorResult> {
        self.vector
            .as_ref()
            .filter(|entry| entry.fingerprint == fingerprint)
    }

    /// Replace the vector entry. Raster output is derived from vector bytes,
    /// so the raster entry is unconditionally evicted.
    pub fn store_vector(&mut self, result: VectorResult) {
        debug!(fingerprint = %result.fingerprint, "vector cache updated, raster evicted");
        self.raster = None;
        self.vector = Some(result);
    }

    /// The cached raster result, only if its fingerprint matches.
    pub fn raster(&self, fingerprint: &str) -> Option<&RasterResult> {
        self.raster
            .as_ref()
            .filter(|entry| entry.fingerprint == fingerprint)
    }

    pub fn store_raster(&mut self, result: RasterResult) {
        debug!(fingerprint = %result.fingerprint, "raster cache updated");
        self.raster = Some(result);
    }

    /// Drop both entries. Called when the source document is replaced.
    pub fn clear(&mut self) {
        self.vector = None;
        self.raster = None;
    }
}
