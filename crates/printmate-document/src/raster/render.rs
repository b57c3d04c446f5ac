// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page rendering via pdfium.
//
// pdfium operations are CPU-bound and the underlying C++ library is not
// interruptible mid-call, so callers run these methods inside
// `tokio::task::spawn_blocking` and discard superseded results afterwards.

use image::RgbaImage;
use pdfium_render::prelude::*;
use printmate_core::error::PrintmateError;
use tracing::{debug, instrument};

/// Size of a page in document points (1/72 inch).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

/// Renders document pages to pixel buffers through a bound pdfium library.
///
/// The document is reloaded from bytes on each call; pdfium ties the parsed
/// document's lifetime to the borrow of the library handle, and reparsing is
/// cheap next to rendering.
pub struct PageRenderer {
    pdfium: Pdfium,
}

// SAFETY: the `thread_safe` feature serialises every pdfium call through a
// single internal lock, so a bound library handle may be shared across
// threads.
unsafe impl Send for PageRenderer {}
unsafe impl Sync for PageRenderer {}

impl PageRenderer {
    /// Bind to the pdfium library.
    ///
    /// Tries a library next to the executable first, then the system search
    /// path. Failure means grayscale conversion and previews are unavailable
    /// in this environment — a distinct condition from any per-document
    /// failure, so the UI can point at the installation rather than the file.
    pub fn new() -> Result<Self, PrintmateError> {
        let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|err| PrintmateError::RenderingUnavailable(err.to_string()))?;

        Ok(Self {
            pdfium: Pdfium::new(bindings),
        })
    }

    /// Number of pages in the document.
    pub fn page_count(&self, bytes: &[u8]) -> Result<u32, PrintmateError> {
        let document = self.load(bytes)?;
        Ok(document.pages().len() as u32)
    }

    /// Unscaled size of every page, in document points.
    pub fn page_sizes(&self, bytes: &[u8]) -> Result<Vec<PageSize>, PrintmateError> {
        let document = self.load(bytes)?;
        let sizes = document
            .pages()
            .iter()
            .map(|page| PageSize {
                width_pt: page.width().value,
                height_pt: page.height().value,
            })
            .collect();
        Ok(sizes)
    }

    /// Render one page (0-based) at the given scale factor relative to its
    /// point size, returning an RGBA buffer.
    #[instrument(skip(self, bytes), fields(page_index, scale = %scale))]
    pub fn render_page(
        &self,
        bytes: &[u8],
        page_index: u32,
        scale: f32,
    ) -> Result<RgbaImage, PrintmateError> {
        let document = self.load(bytes)?;
        let pages = document.pages();
        let total = pages.len() as u32;

        let page = pages.get(page_index as u16).map_err(|err| {
            PrintmateError::Codec(format!(
                "page {} out of range (document has {total} pages): {err:?}",
                page_index + 1
            ))
        })?;

        let target_width = (page.width().value * scale).round().max(1.0) as i32;
        let target_height = (page.height().value * scale).round().max(1.0) as i32;

        let config = PdfRenderConfig::new()
            .set_target_width(target_width)
            .set_target_height(target_height);

        let bitmap = page.render_with_config(&config).map_err(|err| {
            PrintmateError::Codec(format!(
                "rasterisation failed for page {}: {err:?}",
                page_index + 1
            ))
        })?;

        let rendered = bitmap.as_image().to_rgba8();
        debug!(
            width = rendered.width(),
            height = rendered.height(),
            "page rendered"
        );
        Ok(rendered)
    }

    fn load<'a>(&'a self, bytes: &'a [u8]) -> Result<PdfDocument<'a>, PrintmateError> {
        self.pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|err| {
                PrintmateError::Codec(format!("could not open document for rendering: {err:?}"))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Render-path tests need a pdfium shared library on the machine, so they
    // are ignored by default and run explicitly in environments that have it.

    #[test]
    #[ignore]
    fn binds_to_an_installed_pdfium() {
        PageRenderer::new().expect("pdfium library present");
    }

    #[test]
    #[ignore]
    fn unreadable_bytes_are_a_codec_error() {
        let renderer = PageRenderer::new().expect("pdfium library present");
        let result = renderer.page_count(b"not a pdf");
        assert!(matches!(result, Err(PrintmateError::Codec(_))));
    }
}
