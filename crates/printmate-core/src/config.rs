// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Preparation pipeline configuration.

use serde::{Deserialize, Serialize};

/// Hard ceiling on both the uploaded file and the converted artifact.
pub const MAX_DOCUMENT_BYTES: u64 = 20 * 1024 * 1024;

/// Tunable knobs for the preparation pipeline.
///
/// Defaults match production behaviour; tests override individual fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareConfig {
    /// Byte ceiling applied to the upload and to the rasterised output.
    pub max_document_bytes: u64,
    /// Oversampling factor for grayscale rasterisation (quality/size knob).
    pub raster_oversample: f32,
    /// JPEG quality (1-100) for re-encoded grayscale pages.
    pub jpeg_quality: u8,
    /// Maximum pages rendered in the strip preview.
    pub strip_page_limit: usize,
    /// Pixel height of the strip preview viewport.
    pub strip_viewport_height: u32,
    /// Preview fit-scale clamp, lower bound.
    pub min_preview_scale: f32,
    /// Preview fit-scale clamp, upper bound. Bounds memory on very large pages.
    pub max_preview_scale: f32,
    /// Output pixel density multiplier for preview sharpness.
    pub device_pixel_ratio: f32,
    /// Delay before a free-text range edit starts a new job.
    pub text_debounce_ms: u64,
    /// Interval between preview store polls in the viewer process.
    pub poll_interval_ms: u64,
    /// Total time the viewer waits for a payload before giving up.
    pub poll_timeout_ms: u64,
}

impl Default for PrepareConfig {
    fn default() -> Self {
        Self {
            max_document_bytes: MAX_DOCUMENT_BYTES,
            raster_oversample: 2.0,
            jpeg_quality: 80,
            strip_page_limit: 8,
            strip_viewport_height: 180,
            min_preview_scale: 0.1,
            max_preview_scale: 3.0,
            device_pixel_ratio: 1.0,
            text_debounce_ms: 450,
            poll_interval_ms: 250,
            poll_timeout_ms: 15_000,
        }
    }
}
