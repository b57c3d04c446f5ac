// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Session state and the materialisation pipeline.
//
// One explicit state struct owns the uploaded document, the current
// parameters, both caches, and the current output slot — no ambient
// globals. All mutation goes through a std::sync::Mutex that is never held
// across an await; correctness across suspension points rests on the job
// token, re-checked after every await, plus a source-digest re-validation
// before any cache write.

use std::sync::{Arc, Mutex, MutexGuard};

use printmate_core::error::{PrintmateError, Result};
use printmate_core::{
    Binding, ColorMode, DocumentKind, Orientation, PrepareConfig, PreparedOutput, RasterResult,
    SideMode, SourceDocument, TransformParameters, VectorResult, pricing,
};
use printmate_document::raster::grayscale::{
    GrayscaleOptions, RasterizeOutcome, rasterize_to_grayscale,
};
use printmate_document::{PageRenderer, PageTransformer, promote_to_document, range};
use tracing::{debug, info, instrument, warn};

use crate::cache::TransformCache;
use crate::preview::{
    DocumentPreviewSource, PreviewMode, PreviewRenderer, PreviewSurface, RenderOutcome,
};
use crate::sequencer::{JobSequencer, JobToken};

/// Result of one "produce current output" attempt.
#[derive(Debug)]
pub enum Materialized {
    /// The output slot now holds this artifact.
    Ready(PreparedOutput),
    /// A newer job took over before this one could land. Not an error.
    Superseded,
}

/// A single user edit to the preparation parameters.
///
/// Free-text edits are debounced before starting a job; discrete control
/// changes start one immediately.
#[derive(Debug, Clone)]
pub enum ParameterEdit {
    RangeExpression(String),
    Orientation(Orientation),
    ColorMode(ColorMode),
    SideMode(SideMode),
    Binding(Binding),
    Copies(u32),
}

impl ParameterEdit {
    fn is_debounced(&self) -> bool {
        matches!(self, Self::RangeExpression(_))
    }

    fn apply(self, params: &mut TransformParameters) {
        match self {
            Self::RangeExpression(expr) => params.range_expression = expr,
            Self::Orientation(orientation) => params.orientation = orientation,
            Self::ColorMode(mode) => params.color_mode = mode,
            Self::SideMode(mode) => params.side_mode = mode,
            Self::Binding(binding) => params.binding = binding,
            Self::Copies(copies) => params.copies = copies.max(1),
        }
    }
}

#[derive(Default)]
struct SessionInner {
    source: Option<Arc<SourceDocument>>,
    params: TransformParameters,
    cache: TransformCache,
    output: Option<PreparedOutput>,
    /// User-facing message for the last failed materialisation; cleared on
    /// success or new upload.
    last_error: Option<String>,
}

/// The order screen's session: current document, parameters, caches, job
/// counter, and output slot.
///
/// Cheaply cloneable; clones share state (teacher pattern for service
/// structs passed into spawned tasks).
#[derive(Clone)]
pub struct PrepareSession {
    inner: Arc<Mutex<SessionInner>>,
    sequencer: JobSequencer,
    renderer: Arc<Mutex<Option<Arc<PageRenderer>>>>,
    config: PrepareConfig,
}

impl PrepareSession {
    pub fn new(config: PrepareConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionInner::default())),
            sequencer: JobSequencer::new(),
            renderer: Arc::new(Mutex::new(None)),
            config,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().expect("session lock poisoned")
    }

    // -- Upload ---------------------------------------------------------------

    /// Replace the session's document wholesale.
    ///
    /// Clears caches, the output slot, and any previous error; every
    /// in-flight job is superseded. Rejects files over the size cap and
    /// files that are neither PDF nor a supported raster image.
    #[instrument(skip(self, bytes), fields(filename, bytes_len = bytes.len()))]
    pub fn set_document(&self, bytes: Vec<u8>, filename: &str) -> Result<()> {
        if bytes.len() as u64 > self.config.max_document_bytes {
            return Err(PrintmateError::DocumentTooLarge {
                actual: bytes.len() as u64,
                limit: self.config.max_document_bytes,
            });
        }

        let kind = DocumentKind::detect(&bytes).ok_or_else(|| {
            PrintmateError::Parse(format!("unsupported file type for {filename}"))
        })?;

        let source = Arc::new(SourceDocument::new(bytes, filename, kind));
        info!(digest = %source.digest, ?kind, "document replaced");

        let mut inner = self.lock();
        inner.source = Some(source);
        inner.cache.clear();
        inner.output = None;
        inner.last_error = None;
        drop(inner);

        // Anything still running belongs to the old document.
        let _ = self.sequencer.begin();
        Ok(())
    }

    // -- Parameter edits ------------------------------------------------------

    /// Current parameters (snapshot).
    pub fn params(&self) -> TransformParameters {
        self.lock().params.clone()
    }

    /// Replace the whole parameter set at once (initial form state).
    /// Supersedes in-flight work like any other edit; the caller drives the
    /// next materialisation itself.
    pub fn set_params(&self, params: TransformParameters) {
        self.lock().params = params;
        let _ = self.sequencer.begin();
    }

    /// Apply one edit and start a new job to refresh the output.
    ///
    /// Free-text range edits wait out the debounce delay first; if another
    /// edit arrives in the meantime the sleeping job wakes up superseded and
    /// does nothing, so a typing burst costs one materialisation, not one
    /// per keystroke.
    pub fn queue_edit(self: &Arc<Self>, edit: ParameterEdit) -> tokio::task::JoinHandle<()> {
        let debounced = edit.is_debounced();
        {
            let mut inner = self.lock();
            edit.apply(&mut inner.params);
        }

        let token = self.sequencer.begin();
        let session = Arc::clone(self);
        let delay = std::time::Duration::from_millis(self.config.text_debounce_ms);

        tokio::spawn(async move {
            if debounced {
                tokio::time::sleep(delay).await;
                if !token.is_current() {
                    return;
                }
            }
            if let Err(err) = session.materialize_with(&token).await {
                warn!(%err, "materialisation failed");
            }
        })
    }

    // -- Materialisation ------------------------------------------------------

    /// Produce the current output for the current parameters.
    #[instrument(skip(self))]
    pub async fn materialize(&self) -> Result<Materialized> {
        let token = self.sequencer.begin();
        self.materialize_with(&token).await
    }

    async fn materialize_with(&self, token: &JobToken) -> Result<Materialized> {
        let result = self.run_pipeline(token).await;

        match &result {
            Ok(Materialized::Ready(output)) => {
                debug!(pages = output.page_count, bytes = output.bytes.len(), "output ready");
            }
            Ok(Materialized::Superseded) => {}
            Err(err) => {
                // Stale bytes must never stay available for submission after
                // a failed materialisation.
                let mut inner = self.lock();
                if token.is_current() {
                    inner.output = None;
                    inner.last_error = Some(printmate_core::remedy::remedy_for(err).message);
                }
            }
        }
        result
    }

    async fn run_pipeline(&self, token: &JobToken) -> Result<Materialized> {
        let (source, params) = {
            let inner = self.lock();
            let source = inner
                .source
                .clone()
                .ok_or_else(|| PrintmateError::Parse("no document uploaded".into()))?;
            (source, inner.params.clone())
        };

        // -- Vector stage -----------------------------------------------------
        let fingerprint = params.vector_fingerprint(&source.digest);

        let cached_vector = self.lock().cache.vector(&fingerprint).cloned();
        let vector = match cached_vector {
            Some(hit) => {
                debug!(fingerprint = %hit.fingerprint, "vector cache hit");
                hit
            }
            None => {
                let computed = self
                    .compute_vector(Arc::clone(&source), &params, fingerprint.clone())
                    .await?;
                if !token.is_current() {
                    return Ok(Materialized::Superseded);
                }
                let mut inner = self.lock();
                // The upload may have changed while we were transforming;
                // a cache entry for a replaced source must never be written.
                if !self.source_is_authoritative(&inner, &source) {
                    return Ok(Materialized::Superseded);
                }
                inner.cache.store_vector(computed.clone());
                computed
            }
        };

        // -- Raster stage (BW only) -------------------------------------------
        let output_bytes;
        match params.color_mode {
            ColorMode::Color => {
                output_bytes = vector.bytes.clone();
            }
            ColorMode::Bw => {
                let cached_raster = self.lock().cache.raster(&vector.fingerprint).cloned();
                let raster = match cached_raster {
                    Some(hit) => {
                        debug!(fingerprint = %hit.fingerprint, "raster cache hit");
                        hit
                    }
                    None => {
                        let outcome = self
                            .compute_raster(&vector, token.clone())
                            .await?;
                        let Some(computed) = outcome else {
                            return Ok(Materialized::Superseded);
                        };
                        if !token.is_current() {
                            return Ok(Materialized::Superseded);
                        }
                        let mut inner = self.lock();
                        if !self.source_is_authoritative(&inner, &source) {
                            return Ok(Materialized::Superseded);
                        }
                        inner.cache.store_raster(computed.clone());
                        computed
                    }
                };
                output_bytes = raster.bytes;
            }
        }

        // -- Output slot ------------------------------------------------------
        let output = PreparedOutput {
            fingerprint: vector.fingerprint,
            bytes: output_bytes,
            page_count: vector.page_count,
        };

        let mut inner = self.lock();
        if !token.is_current() || !self.source_is_authoritative(&inner, &source) {
            return Ok(Materialized::Superseded);
        }
        inner.output = Some(output.clone());
        inner.last_error = None;
        Ok(Materialized::Ready(output))
    }

    fn source_is_authoritative(&self, inner: &SessionInner, source: &SourceDocument) -> bool {
        inner
            .source
            .as_ref()
            .is_some_and(|current| current.digest == source.digest)
    }

    async fn compute_vector(
        &self,
        source: Arc<SourceDocument>,
        params: &TransformParameters,
        fingerprint: String,
    ) -> Result<VectorResult> {
        let orientation = params.orientation;
        let expression = params.range_expression.clone();

        tokio::task::spawn_blocking(move || {
            if source.kind.is_raster_image() {
                // Uploaded images become a single full-bleed page; range and
                // orientation do not apply.
                let bytes = promote_to_document(&source.bytes)?;
                return Ok(VectorResult {
                    fingerprint,
                    bytes,
                    page_count: 1,
                });
            }

            let transformer = PageTransformer::from_bytes(&source.bytes)?;
            let pages = range::parse_page_ranges(transformer.page_count(), &expression);
            let bytes = transformer.subset_with_rotation(&pages, orientation)?;
            Ok(VectorResult {
                fingerprint,
                bytes,
                page_count: pages.len() as u32,
            })
        })
        .await
        .map_err(|err| PrintmateError::Codec(format!("transform task failed: {err}")))?
    }

    /// Run grayscale conversion. `Ok(None)` means the token was superseded
    /// mid-conversion and no result should be used.
    async fn compute_raster(
        &self,
        vector: &VectorResult,
        token: JobToken,
    ) -> Result<Option<RasterResult>> {
        let renderer = self.page_renderer()?;
        let bytes = Arc::new(vector.bytes.clone());
        let fingerprint = vector.fingerprint.clone();
        let options = GrayscaleOptions {
            oversample: self.config.raster_oversample,
            jpeg_quality: self.config.jpeg_quality,
            max_output_bytes: self.config.max_document_bytes,
        };

        tokio::task::spawn_blocking(move || {
            let outcome =
                rasterize_to_grayscale(&renderer, &bytes, &options, &|| token.is_current())?;
            Ok(match outcome {
                RasterizeOutcome::Complete(raster_bytes) => Some(RasterResult {
                    fingerprint,
                    bytes: raster_bytes,
                }),
                RasterizeOutcome::Superseded => None,
            })
        })
        .await
        .map_err(|err| PrintmateError::Codec(format!("grayscale task failed: {err}")))?
    }

    /// Bind the page renderer on first use and share it afterwards.
    fn page_renderer(&self) -> Result<Arc<PageRenderer>> {
        let mut slot = self.renderer.lock().expect("renderer lock poisoned");
        if let Some(renderer) = slot.as_ref() {
            return Ok(Arc::clone(renderer));
        }
        let renderer = Arc::new(PageRenderer::new()?);
        *slot = Some(Arc::clone(&renderer));
        Ok(renderer)
    }

    // -- Read side ------------------------------------------------------------

    /// The current output artifact, if a successful materialisation exists.
    pub fn current_output(&self) -> Option<PreparedOutput> {
        self.lock().output.clone()
    }

    /// User-facing message for the last failure, if any.
    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    /// Price estimate for the current output and parameters.
    pub fn price_estimate(&self) -> u64 {
        let inner = self.lock();
        let pages = inner.output.as_ref().map_or(0, |o| o.page_count);
        pricing::estimate(pages, &inner.params)
    }

    // -- Finalisation ---------------------------------------------------------

    /// One last synchronous re-materialisation immediately before the bytes
    /// cross the upload boundary, so the handed-off artifact is guaranteed
    /// fresh even when the live preview was skipped.
    #[instrument(skip(self))]
    pub async fn finalize(&self) -> Result<PreparedOutput> {
        match self.materialize().await? {
            Materialized::Ready(output) => Ok(output),
            Materialized::Superseded => Err(PrintmateError::Codec(
                "parameters changed during finalisation, try again".into(),
            )),
        }
    }

    // -- Preview --------------------------------------------------------------

    /// Render the current output into `surface`.
    ///
    /// Rides along with the job that produced the output: any newer edit or
    /// upload supersedes the render mid-flight.
    pub async fn render_preview(
        &self,
        mode: PreviewMode,
        surface: &mut dyn PreviewSurface,
    ) -> Result<RenderOutcome> {
        let Some(output) = self.current_output() else {
            return Err(PrintmateError::Codec("nothing to preview yet".into()));
        };

        let token = self.sequencer.observe();
        let renderer = self.page_renderer()?;
        let source = Arc::new(DocumentPreviewSource::new(renderer, Arc::new(output.bytes)));

        PreviewRenderer::new(&self.config)
            .render(source, mode, &token, surface)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Document, Object, dictionary};

    fn sample_pdf(page_count: u32) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids = Vec::new();
        for _ in 0..page_count {
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(595),
                    Object::Integer(842),
                ],
            });
            kids.push(Object::Reference(page_id));
        }
        let kid_count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => kid_count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("save sample pdf");
        bytes
    }

    fn color_session() -> Arc<PrepareSession> {
        let session = Arc::new(PrepareSession::new(PrepareConfig {
            text_debounce_ms: 20,
            ..PrepareConfig::default()
        }));
        {
            let mut inner = session.lock();
            inner.params.color_mode = ColorMode::Color;
        }
        session
    }

    #[tokio::test]
    async fn unsupported_upload_is_rejected() {
        let session = color_session();
        let result = session.set_document(b"plain text".to_vec(), "notes.txt");
        assert!(matches!(result, Err(PrintmateError::Parse(_))));
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected_before_conversion() {
        let session = Arc::new(PrepareSession::new(PrepareConfig {
            max_document_bytes: 16,
            ..PrepareConfig::default()
        }));
        let result = session.set_document(b"%PDF-1.5 xxxxxxxxxxxxxxxx".to_vec(), "big.pdf");
        assert!(matches!(result, Err(PrintmateError::DocumentTooLarge { .. })));
    }

    #[tokio::test]
    async fn materialize_without_document_is_an_error() {
        let session = color_session();
        assert!(session.materialize().await.is_err());
    }

    #[tokio::test]
    async fn color_pipeline_produces_output_and_price() {
        let session = color_session();
        session
            .set_document(sample_pdf(4), "doc.pdf")
            .expect("upload");

        let Materialized::Ready(output) = session.materialize().await.expect("materialize") else {
            panic!("expected ready output");
        };
        assert_eq!(output.page_count, 4);
        assert!(!output.bytes.is_empty());
        // 4 pages, colour, single-sided, one copy.
        assert_eq!(session.price_estimate(), 20);
    }

    #[tokio::test]
    async fn range_expression_limits_output_pages() {
        let session = color_session();
        session
            .set_document(sample_pdf(10), "doc.pdf")
            .expect("upload");
        {
            let mut inner = session.lock();
            inner.params.range_expression = "3-5,2,2".into();
        }

        let Materialized::Ready(output) = session.materialize().await.expect("materialize") else {
            panic!("expected ready output");
        };
        assert_eq!(output.page_count, 4);
    }

    #[tokio::test]
    async fn repeated_materialisation_is_byte_identical() {
        let session = color_session();
        session
            .set_document(sample_pdf(3), "doc.pdf")
            .expect("upload");

        let Materialized::Ready(first) = session.materialize().await.expect("first") else {
            panic!("expected ready output");
        };
        let Materialized::Ready(second) = session.materialize().await.expect("second") else {
            panic!("expected ready output");
        };
        assert_eq!(first.fingerprint, second.fingerprint);
        assert_eq!(first.bytes, second.bytes);
    }

    #[tokio::test]
    async fn image_upload_is_promoted_to_one_page() {
        use image::{ImageFormat, RgbImage};
        use std::io::Cursor;

        let img = RgbImage::from_pixel(64, 48, image::Rgb([200, 10, 10]));
        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .expect("encode png");

        let session = color_session();
        session.set_document(png, "photo.png").expect("upload");
        {
            // Range and orientation must not apply to promoted images.
            let mut inner = session.lock();
            inner.params.range_expression = "5-9".into();
            inner.params.orientation = Orientation::Landscape;
        }

        let Materialized::Ready(output) = session.materialize().await.expect("materialize") else {
            panic!("expected ready output");
        };
        assert_eq!(output.page_count, 1);
    }

    #[tokio::test]
    async fn stale_job_cannot_write_the_output_slot() {
        let session = color_session();
        session
            .set_document(sample_pdf(2), "doc.pdf")
            .expect("upload");

        let stale = session.sequencer.begin();
        let _newer = session.sequencer.begin();

        let result = session.materialize_with(&stale).await.expect("pipeline");
        assert!(matches!(result, Materialized::Superseded));
        assert!(session.current_output().is_none());
    }

    #[tokio::test]
    async fn failed_materialisation_clears_output_and_blocks_submission() {
        let session = color_session();
        session
            .set_document(sample_pdf(2), "doc.pdf")
            .expect("upload");
        let Materialized::Ready(_) = session.materialize().await.expect("materialize") else {
            panic!("expected ready output");
        };
        assert!(session.current_output().is_some());

        // Right magic bytes, hopeless body: detection accepts it, the
        // transformer cannot.
        session
            .set_document(b"%PDF-1.5 this is not really a pdf".to_vec(), "broken.pdf")
            .expect("upload passes detection");
        // Upload itself clears the slot; the failed materialisation must
        // then record an actionable error rather than restoring stale bytes.
        assert!(session.materialize().await.is_err());
        assert!(session.current_output().is_none());
        assert!(session.last_error().is_some());
    }

    #[tokio::test]
    async fn debounced_edits_collapse_to_the_last_one() {
        let session = color_session();
        session
            .set_document(sample_pdf(10), "doc.pdf")
            .expect("upload");

        let first = session.queue_edit(ParameterEdit::RangeExpression("1-2".into()));
        let second = session.queue_edit(ParameterEdit::RangeExpression("1-3".into()));
        let (a, b) = tokio::join!(first, second);
        a.expect("first edit task");
        b.expect("second edit task");

        let output = session.current_output().expect("output after edits");
        assert_eq!(output.page_count, 3);
    }

    #[tokio::test]
    async fn discrete_edit_starts_a_job_immediately() {
        let session = color_session();
        session
            .set_document(sample_pdf(6), "doc.pdf")
            .expect("upload");

        session
            .queue_edit(ParameterEdit::Orientation(Orientation::Landscape))
            .await
            .expect("edit task");

        let output = session.current_output().expect("output");
        assert_eq!(output.page_count, 6);
        assert_eq!(session.params().orientation, Orientation::Landscape);
    }

    #[tokio::test]
    async fn finalize_returns_fresh_output() {
        let session = color_session();
        session
            .set_document(sample_pdf(3), "doc.pdf")
            .expect("upload");

        // No prior materialisation: finalize runs one itself.
        let output = session.finalize().await.expect("finalize");
        assert_eq!(output.page_count, 3);
        assert_eq!(
            session.current_output().expect("slot filled").fingerprint,
            output.fingerprint
        );
    }
}
