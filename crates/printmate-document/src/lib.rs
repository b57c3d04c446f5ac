// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// printmate-document — Document processing for Printmate order preparation.
//
// Provides page range parsing, vector page transforms (subset + rotation),
// raster-image-to-document promotion, page rendering, and grayscale
// rasterisation of whole documents.

pub mod pdf;
pub mod range;
pub mod raster;

// Re-export the primary entry points so callers can use
// `printmate_document::PageTransformer` etc.
pub use pdf::promote::promote_to_document;
pub use pdf::transform::PageTransformer;
pub use raster::grayscale::{GrayscaleOptions, RasterizeOutcome, rasterize_to_grayscale};
pub use raster::render::PageRenderer;
