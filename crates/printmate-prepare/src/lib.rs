// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// printmate-prepare — Coordination layer for order preparation.
//
// Owns the session state (uploaded document, parameters, caches, current
// output), the monotonic job sequencer that supersedes in-flight work, and
// the incremental preview renderer.

pub mod cache;
pub mod preview;
pub mod sequencer;
pub mod session;

pub use cache::TransformCache;
pub use preview::{PreviewMode, PreviewPage, PreviewRenderer, PreviewSurface, RenderOutcome};
pub use sequencer::{JobSequencer, JobToken};
pub use session::{Materialized, ParameterEdit, PrepareSession};
