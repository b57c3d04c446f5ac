// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raster image promotion — wrap an uploaded PNG/JPEG as a one-page document
// using `printpdf` 0.8.
//
// The page is full-bleed at the image's native pixel dimensions, one pixel
// per point, so the shop prints exactly what the user uploaded. Page range
// and orientation settings do not apply to promoted images.

use printmate_core::error::PrintmateError;
use printpdf::{
    Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Pt, RawImage, RawImageData,
    RawImageFormat, XObjectTransform,
};
use tracing::{debug, info, instrument};

/// Wrap image bytes as a single-page document sized to the image.
///
/// Returns the serialised document bytes.
#[instrument(skip_all, fields(bytes_len = image_bytes.len()))]
pub fn promote_to_document(image_bytes: &[u8]) -> Result<Vec<u8>, PrintmateError> {
    let decoded = image::load_from_memory(image_bytes)
        .map_err(|err| PrintmateError::Parse(format!("failed to decode image: {err}")))?;

    let width_px = decoded.width() as usize;
    let height_px = decoded.height() as usize;
    info!(width_px, height_px, "promoting image to one-page document");

    let rgb = decoded.to_rgb8();
    let raw = RawImage {
        pixels: RawImageData::U8(rgb.into_raw()),
        width: width_px,
        height: height_px,
        data_format: RawImageFormat::RGB8,
        tag: Vec::new(),
    };

    let mut doc = PdfDocument::new("Printmate Document");
    let xobject_id = doc.add_image(&raw);

    // 1 px = 1 pt. At 72 dpi the XObject lands at its native pixel size,
    // exactly filling the page with no margin.
    let page_w = Mm::from(Pt(width_px as f32));
    let page_h = Mm::from(Pt(height_px as f32));

    let ops = vec![Op::UseXobject {
        id: xobject_id,
        transform: XObjectTransform {
            translate_x: Some(Pt(0.0)),
            translate_y: Some(Pt(0.0)),
            scale_x: None,
            scale_y: None,
            dpi: Some(72.0),
            rotate: None,
        },
    }];

    doc.with_pages(vec![PdfPage::new(page_w, page_h, ops)]);

    let mut warnings: Vec<PdfWarnMsg> = Vec::new();
    let output = doc.save(&PdfSaveOptions::default(), &mut warnings);

    debug!(output_bytes = output.len(), "image promotion complete");
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, image::Rgb([120, 40, 200]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .expect("encode png");
        bytes
    }

    fn number(obj: &lopdf::Object) -> f32 {
        match obj {
            lopdf::Object::Integer(i) => *i as f32,
            lopdf::Object::Real(r) => *r,
            other => panic!("not a number: {other:?}"),
        }
    }

    #[test]
    fn promoted_image_becomes_a_single_page() {
        let output = promote_to_document(&png_bytes(200, 300)).expect("promote");
        let doc = lopdf::Document::load_mem(&output).expect("reload as pdf");
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn promoted_page_matches_image_pixel_dimensions() {
        let output = promote_to_document(&png_bytes(200, 300)).expect("promote");
        let doc = lopdf::Document::load_mem(&output).expect("reload as pdf");
        let page_id = doc.get_pages()[&1];
        let lopdf::Object::Dictionary(dict) = doc.get_object(page_id).expect("page") else {
            panic!("page is not a dictionary");
        };
        let lopdf::Object::Array(media_box) = dict.get(b"MediaBox").expect("MediaBox") else {
            panic!("MediaBox is not an array");
        };
        let width = number(&media_box[2]);
        let height = number(&media_box[3]);
        // Mm <-> Pt round-trips can wobble below a point.
        assert!((width - 200.0).abs() < 1.0, "width {width}");
        assert!((height - 300.0).abs() < 1.0, "height {height}");
    }

    #[test]
    fn garbage_bytes_fail_with_parse_error() {
        let result = promote_to_document(b"not an image at all");
        assert!(matches!(result, Err(PrintmateError::Parse(_))));
    }
}
