// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Incremental preview rendering.
//
// One algorithm, two variants: a bounded horizontal strip of thumbnails and
// an unbounded full-document view. Pages are rendered one at a time with a
// cooperative yield between them, so the interface stays responsive and a
// supersede check can land between pages. Cancellation is silent: pages
// already handed to the surface stay in place, and no error is reported —
// the caller knows a newer job is in flight.

use std::sync::Arc;

use image::RgbaImage;
use printmate_core::PrepareConfig;
use printmate_core::error::{PrintmateError, Result};
use printmate_document::PageRenderer;
use printmate_document::raster::render::PageSize;
use tracing::{debug, instrument};

use crate::sequencer::JobToken;

/// A rendered preview page handed to the display surface.
#[derive(Debug, Clone)]
pub struct PreviewPage {
    /// 1-based position in the previewed document.
    pub page_number: u32,
    pub image: RgbaImage,
    /// The fit scale used, before device-pixel-ratio multiplication.
    pub scale: f32,
}

/// Where rendered pages land. The app wires this to its display; tests use
/// a collecting fake.
pub trait PreviewSurface: Send {
    /// Remove all previously pushed pages.
    fn clear(&mut self);
    /// Append one rendered page.
    fn push_page(&mut self, page: PreviewPage);
}

/// Which preview variant to render.
#[derive(Debug, Clone, Copy)]
pub enum PreviewMode {
    /// At most `max_pages` thumbnails fit-scaled to a fixed viewport height.
    Strip { max_pages: usize, viewport_height: u32 },
    /// Every page, fit-scaled to the container width.
    Full { container_width: u32 },
}

/// Outcome of a preview render that may have been overtaken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Complete { pages_rendered: usize },
    Superseded,
}

/// Source of page geometry and pixels for the preview. Implemented for the
/// pdfium-backed renderer; the seam exists so supersession and scaling logic
/// are testable without a rendering library installed.
pub trait PreviewSource: Send + Sync {
    fn page_sizes(&self) -> Result<Vec<PageSize>>;
    fn render_page(&self, page_index: u32, scale: f32) -> Result<RgbaImage>;
}

/// Preview source backed by the real page renderer and a document's bytes.
pub struct DocumentPreviewSource {
    renderer: Arc<PageRenderer>,
    bytes: Arc<Vec<u8>>,
}

impl DocumentPreviewSource {
    pub fn new(renderer: Arc<PageRenderer>, bytes: Arc<Vec<u8>>) -> Self {
        Self { renderer, bytes }
    }
}

impl PreviewSource for DocumentPreviewSource {
    fn page_sizes(&self) -> Result<Vec<PageSize>> {
        self.renderer.page_sizes(&self.bytes)
    }

    fn render_page(&self, page_index: u32, scale: f32) -> Result<RgbaImage> {
        self.renderer.render_page(&self.bytes, page_index, scale)
    }
}

/// Renders document pages into a [`PreviewSurface`], page by page.
#[derive(Debug, Clone)]
pub struct PreviewRenderer {
    min_scale: f32,
    max_scale: f32,
    device_pixel_ratio: f32,
}

impl PreviewRenderer {
    pub fn new(config: &PrepareConfig) -> Self {
        Self {
            min_scale: config.min_preview_scale,
            max_scale: config.max_preview_scale,
            device_pixel_ratio: config.device_pixel_ratio,
        }
    }

    /// Compute the clamped fit scale for one page in the given mode.
    ///
    /// The upper clamp bounds memory on outsized source pages; the lower
    /// clamp keeps degenerate containers from producing invisible output.
    pub fn fit_scale(&self, mode: PreviewMode, size: PageSize) -> f32 {
        let fit = match mode {
            PreviewMode::Strip { viewport_height, .. } => {
                viewport_height as f32 / size.height_pt.max(1.0)
            }
            PreviewMode::Full { container_width } => {
                container_width as f32 / size.width_pt.max(1.0)
            }
        };
        fit.clamp(self.min_scale, self.max_scale)
    }

    /// Render the document into `surface`.
    ///
    /// The token is checked after every suspension point; on mismatch the
    /// render stops where it is, leaves the already-pushed pages alone, and
    /// reports [`RenderOutcome::Superseded`] without error.
    #[instrument(skip_all, fields(mode = ?mode))]
    pub async fn render(
        &self,
        source: Arc<dyn PreviewSource>,
        mode: PreviewMode,
        token: &JobToken,
        surface: &mut dyn PreviewSurface,
    ) -> Result<RenderOutcome> {
        if !token.is_current() {
            return Ok(RenderOutcome::Superseded);
        }

        let sizes = {
            let source = Arc::clone(&source);
            tokio::task::spawn_blocking(move || source.page_sizes())
                .await
                .map_err(|err| PrintmateError::Codec(format!("page size task failed: {err}")))??
        };
        if !token.is_current() {
            return Ok(RenderOutcome::Superseded);
        }

        surface.clear();

        let page_limit = match mode {
            PreviewMode::Strip { max_pages, .. } => max_pages.min(sizes.len()),
            PreviewMode::Full { .. } => sizes.len(),
        };

        for (index, size) in sizes.iter().take(page_limit).copied().enumerate() {
            let scale = self.fit_scale(mode, size);
            let render_scale = scale * self.device_pixel_ratio;

            let image = {
                let source = Arc::clone(&source);
                tokio::task::spawn_blocking(move || source.render_page(index as u32, render_scale))
                    .await
                    .map_err(|err| PrintmateError::Codec(format!("render task failed: {err}")))??
            };
            if !token.is_current() {
                debug!(completed = index, "preview render superseded");
                return Ok(RenderOutcome::Superseded);
            }

            surface.push_page(PreviewPage {
                page_number: index as u32 + 1,
                image,
                scale,
            });

            // Hand control back between pages so newer work can land.
            tokio::task::yield_now().await;
            if !token.is_current() {
                debug!(completed = index + 1, "preview render superseded");
                return Ok(RenderOutcome::Superseded);
            }
        }

        debug!(pages_rendered = page_limit, "preview render complete");
        Ok(RenderOutcome::Complete {
            pages_rendered: page_limit,
        })
    }
}
