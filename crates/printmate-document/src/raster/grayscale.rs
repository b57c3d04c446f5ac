// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Grayscale rasterisation — convert every page of a vector document into a
// grayscale raster page and rebuild a document that preserves the original
// page geometry.
//
// Pipeline per page: render at a fixed oversample, flatten transparency onto
// white, apply BT.709 luma, re-encode as JPEG, embed as a DCTDecode image
// XObject on a page whose MediaBox equals the source page's point size.

use image::RgbaImage;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, dictionary};
use printmate_core::error::PrintmateError;
use tracing::{debug, info, instrument};

use super::render::PageRenderer;

/// Knobs for the grayscale conversion.
#[derive(Debug, Clone)]
pub struct GrayscaleOptions {
    /// Render scale relative to the page's point size.
    pub oversample: f32,
    /// JPEG quality (1-100) for the re-encoded pages.
    pub jpeg_quality: u8,
    /// Ceiling on the rebuilt document's size in bytes.
    pub max_output_bytes: u64,
}

impl Default for GrayscaleOptions {
    fn default() -> Self {
        Self {
            oversample: 2.0,
            jpeg_quality: 80,
            max_output_bytes: 20 * 1024 * 1024,
        }
    }
}

/// Result of a conversion that may have been overtaken by newer work.
#[derive(Debug)]
pub enum RasterizeOutcome {
    /// The rebuilt grayscale document.
    Complete(Vec<u8>),
    /// A newer job took over; no output was produced. Not an error.
    Superseded,
}

/// Convert every page of `bytes` to grayscale raster pages.
///
/// `should_continue` is polled between pages; when it returns false the
/// conversion stops where it is and reports [`RasterizeOutcome::Superseded`].
/// The underlying render call itself is not interruptible, so this is the
/// finest cancellation granularity available.
#[instrument(skip_all, fields(bytes_len = bytes.len()))]
pub fn rasterize_to_grayscale(
    renderer: &PageRenderer,
    bytes: &[u8],
    options: &GrayscaleOptions,
    should_continue: &dyn Fn() -> bool,
) -> Result<RasterizeOutcome, PrintmateError> {
    let sizes = renderer.page_sizes(bytes)?;
    info!(pages = sizes.len(), "starting grayscale conversion");

    let mut target = Document::with_version("1.5");
    let pages_id = target.new_object_id();
    let mut kids: Vec<Object> = Vec::with_capacity(sizes.len());

    // One JPEG scratch buffer for the whole document; cleared per page.
    let mut jpeg_buffer: Vec<u8> = Vec::new();

    for (index, size) in sizes.iter().enumerate() {
        if !should_continue() {
            debug!(completed = index, "grayscale conversion superseded");
            return Ok(RasterizeOutcome::Superseded);
        }

        let mut rendered = renderer.render_page(bytes, index as u32, options.oversample)?;
        flatten_onto_white(&mut rendered);
        luma_grayscale_in_place(&mut rendered);

        jpeg_buffer.clear();
        encode_jpeg(&rendered, options.jpeg_quality, &mut jpeg_buffer)?;

        let page_id = embed_jpeg_page(
            &mut target,
            pages_id,
            &jpeg_buffer,
            rendered.width(),
            rendered.height(),
            size.width_pt,
            size.height_pt,
        );
        kids.push(Object::Reference(page_id));

        debug!(
            page = index + 1,
            jpeg_bytes = jpeg_buffer.len(),
            "page converted"
        );
    }

    let kid_count = kids.len() as i64;
    target.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => kid_count,
        }),
    );
    let catalog_id = target.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    target.trailer.set("Root", catalog_id);

    let mut output = Vec::new();
    target.save_to(&mut output).map_err(|err| {
        PrintmateError::Codec(format!("failed to serialise grayscale PDF: {err}"))
    })?;

    if output.len() as u64 > options.max_output_bytes {
        return Err(PrintmateError::DocumentTooLarge {
            actual: output.len() as u64,
            limit: options.max_output_bytes,
        });
    }

    info!(output_bytes = output.len(), "grayscale conversion complete");
    Ok(RasterizeOutcome::Complete(output))
}

/// Composite the image over an opaque white background.
///
/// Source documents with transparency must not leak whatever substrate the
/// encoder would otherwise assume.
pub fn flatten_onto_white(image: &mut RgbaImage) {
    for pixel in image.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        if a == 255 {
            continue;
        }
        let alpha = a as u32;
        let blend = |channel: u8| -> u8 {
            ((channel as u32 * alpha + 255 * (255 - alpha)) / 255) as u8
        };
        pixel.0 = [blend(r), blend(g), blend(b), 255];
    }
}

/// Replace every pixel with its ITU-R BT.709 luma, leaving alpha untouched.
///
/// `Y = round(0.2126 R + 0.7152 G + 0.0722 B)` — the weighted coefficients,
/// not a plain channel average.
pub fn luma_grayscale_in_place(image: &mut RgbaImage) {
    for pixel in image.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        let y = (0.2126 * r as f32 + 0.7152 * g as f32 + 0.0722 * b as f32).round() as u8;
        pixel.0 = [y, y, y, a];
    }
}

/// Encode RGBA pixels as an RGB JPEG at the given quality into `out`.
fn encode_jpeg(image: &RgbaImage, quality: u8, out: &mut Vec<u8>) -> Result<(), PrintmateError> {
    let rgb = image::DynamicImage::ImageRgba8(image.clone()).to_rgb8();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(out, quality);
    rgb.write_with_encoder(encoder)
        .map_err(|err| PrintmateError::Codec(format!("JPEG encoding failed: {err}")))?;
    Ok(())
}

/// Add one page displaying `jpeg` full-bleed, sized in document points to the
/// original page's dimensions regardless of the oversampled pixel size.
fn embed_jpeg_page(
    target: &mut Document,
    pages_id: lopdf::ObjectId,
    jpeg: &[u8],
    width_px: u32,
    height_px: u32,
    width_pt: f32,
    height_pt: f32,
) -> lopdf::ObjectId {
    let image_id = target.add_object(lopdf::Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width_px as i64,
            "Height" => height_px as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        jpeg.to_vec(),
    ));

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Real(width_pt),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Real(height_pt),
                    Object::Integer(0),
                    Object::Integer(0),
                ],
            ),
            Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = target.add_object(lopdf::Stream::new(
        dictionary! {},
        content.encode().expect("static content stream encodes"),
    ));

    target.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(width_pt),
            Object::Real(height_pt),
        ],
        "Resources" => dictionary! {
            "XObject" => dictionary! {
                "Im0" => image_id,
            },
        },
        "Contents" => content_id,
    })
}
