// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Vector page transform — build a subset/rotated copy of a source document
// using the `lopdf` crate. The source is never mutated; every output page is
// a deep clone of its source page with an absolute /Rotate applied.

use lopdf::{Document, Object, ObjectId, dictionary};
use printmate_core::Orientation;
use printmate_core::error::PrintmateError;
use tracing::{debug, info, instrument, warn};

/// Produces vector-preserving page subsets of a loaded source document.
///
/// Wraps `lopdf::Document`. Page selection order is the caller's: the same
/// page number may appear more than once and is copied once per occurrence.
pub struct PageTransformer {
    /// The parsed source document. Read-only for the transformer's lifetime.
    document: Document,
}

impl PageTransformer {
    /// Parse a source document from uploaded bytes.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self, PrintmateError> {
        let document = Document::load_mem(data)
            .map_err(|err| PrintmateError::Parse(format!("failed to load PDF: {err}")))?;

        debug!(pages = document.get_pages().len(), "source document loaded");
        Ok(Self { document })
    }

    /// Number of pages in the source document.
    pub fn page_count(&self) -> u32 {
        self.document.get_pages().len() as u32
    }

    /// Copy the given pages (1-based, in caller order, duplicates allowed)
    /// into a new document, setting each output page's rotation to the
    /// absolute value for `orientation` — the source page's own /Rotate is
    /// deliberately not added in.
    ///
    /// Returns the serialised output bytes.
    #[instrument(skip(self), fields(page_count = pages.len(), orientation = ?orientation))]
    pub fn subset_with_rotation(
        &self,
        pages: &[u32],
        orientation: Orientation,
    ) -> Result<Vec<u8>, PrintmateError> {
        let source_pages = self.document.get_pages();

        let mut target = Document::with_version("1.5");
        let pages_id = target.new_object_id();
        let mut kids: Vec<Object> = Vec::with_capacity(pages.len());

        for &page_number in pages {
            let page_id = *source_pages.get(&page_number).ok_or_else(|| {
                PrintmateError::Codec(format!(
                    "page {page_number} not found (document has {} pages)",
                    source_pages.len()
                ))
            })?;

            let cloned_id = copy_page(&self.document, &mut target, page_id)?;

            // Absolute rotation, and a parent pointer into the new page tree.
            if let Ok(Object::Dictionary(page_dict)) = target.get_object_mut(cloned_id) {
                page_dict.set("Rotate", Object::Integer(orientation.rotation_degrees()));
                page_dict.set("Parent", Object::Reference(pages_id));
            }

            kids.push(Object::Reference(cloned_id));
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
            PrintmateError::Codec(format!("failed to serialise transformed PDF: {err}"))
        })?;

        info!(
            output_pages = pages.len(),
            output_bytes = output.len(),
            "page subset written"
        );
        Ok(output)
    }
}

/// Clone a single page object (and everything it transitively references)
/// from `source` into `target`, returning the new page's object ID.
///
/// The /Parent back-reference is skipped during cloning to avoid cycles; the
/// caller patches it to point at the target's page tree.
fn copy_page(
    source: &Document,
    target: &mut Document,
    page_id: ObjectId,
) -> Result<ObjectId, PrintmateError> {
    let page_object = source.get_object(page_id).map_err(|err| {
        PrintmateError::Codec(format!("cannot read page object {page_id:?}: {err}"))
    })?;

    let cloned = clone_value(source, target, page_object)?;
    Ok(target.add_object(cloned))
}

/// Deep-clone a single lopdf object, recursively resolving references
/// (except /Parent, which the caller patches).
fn clone_value(
    source: &Document,
    target: &mut Document,
    object: &Object,
) -> Result<Object, PrintmateError> {
    match object {
        Object::Dictionary(dict) => {
            let mut new_dict = lopdf::Dictionary::new();
            for (key, value) in dict.iter() {
                if key == b"Parent" {
                    continue;
                }
                let cloned = clone_value(source, target, value)?;
                new_dict.set(key.clone(), cloned);
            }
            Ok(Object::Dictionary(new_dict))
        }
        Object::Array(array) => {
            let mut new_array = Vec::with_capacity(array.len());
            for item in array {
                new_array.push(clone_value(source, target, item)?);
            }
            Ok(Object::Array(new_array))
        }
        Object::Reference(ref_id) => match source.get_object(*ref_id) {
            Ok(referenced) => {
                let cloned = clone_value(source, target, referenced)?;
                let new_id = target.add_object(cloned);
                Ok(Object::Reference(new_id))
            }
            Err(err) => {
                warn!(?ref_id, %err, "cannot resolve reference, using Null");
                Ok(Object::Null)
            }
        },
        Object::Stream(stream) => {
            let mut new_dict = lopdf::Dictionary::new();
            for (key, value) in stream.dict.iter() {
                if key == b"Parent" {
                    continue;
                }
                let cloned = clone_value(source, target, value)?;
                new_dict.set(key.clone(), cloned);
            }
            Ok(Object::Stream(lopdf::Stream::new(new_dict, stream.content.clone())))
        }
        // Boolean, Integer, Real, String, Name, Null are trivially cloneable.
        other => Ok(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};

    /// Build a minimal n-page document in memory; each page gets a distinct
    /// MediaBox width so tests can tell pages apart after transformation.
    fn sample_pdf(page_count: u32) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut kids = Vec::new();
        for i in 0..page_count {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(lopdf::Stream::new(
                dictionary! {},
                content.encode().expect("encode content"),
            ));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(500 + i as i64),
                    Object::Integer(700),
                ],
                "Contents" => content_id,
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

    fn page_rotation(bytes: &[u8], page_number: u32) -> i64 {
        let doc = Document::load_mem(bytes).expect("reload output");
        let pages = doc.get_pages();
        let page_id = pages[&page_number];
        let Ok(Object::Dictionary(dict)) = doc.get_object(page_id) else {
            panic!("page {page_number} is not a dictionary");
        };
        dict.get(b"Rotate")
            .and_then(|r| r.as_i64())
            .unwrap_or(0)
    }

    fn page_width(bytes: &[u8], page_number: u32) -> i64 {
        let doc = Document::load_mem(bytes).expect("reload output");
        let pages = doc.get_pages();
        let page_id = pages[&page_number];
        let Ok(Object::Dictionary(dict)) = doc.get_object(page_id) else {
            panic!("page {page_number} is not a dictionary");
        };
        let Ok(Object::Array(media_box)) = dict.get(b"MediaBox") else {
            panic!("page {page_number} has no MediaBox");
        };
        media_box[2].as_i64().expect("numeric width")
    }

    #[test]
    fn unreadable_bytes_fail_with_parse_error() {
        let result = PageTransformer::from_bytes(b"definitely not a pdf");
        assert!(matches!(result, Err(PrintmateError::Parse(_))));
    }

    #[test]
    fn subset_keeps_requested_pages_in_order() {
        let source = sample_pdf(5);
        let transformer = PageTransformer::from_bytes(&source).expect("load");

        let output = transformer
            .subset_with_rotation(&[3, 1], Orientation::Portrait)
            .expect("transform");

        let doc = Document::load_mem(&output).expect("reload");
        assert_eq!(doc.get_pages().len(), 2);
        // Source page 3 has width 502, source page 1 has width 500.
        assert_eq!(page_width(&output, 1), 502);
        assert_eq!(page_width(&output, 2), 500);
    }

    #[test]
    fn duplicate_page_numbers_are_copied_per_occurrence() {
        let source = sample_pdf(3);
        let transformer = PageTransformer::from_bytes(&source).expect("load");

        let output = transformer
            .subset_with_rotation(&[2, 2, 2], Orientation::Portrait)
            .expect("transform");

        let doc = Document::load_mem(&output).expect("reload");
        assert_eq!(doc.get_pages().len(), 3);
    }

    #[test]
    fn landscape_sets_absolute_rotation() {
        let source = sample_pdf(2);
        let transformer = PageTransformer::from_bytes(&source).expect("load");

        let output = transformer
            .subset_with_rotation(&[1, 2], Orientation::Landscape)
            .expect("transform");

        assert_eq!(page_rotation(&output, 1), 90);
        assert_eq!(page_rotation(&output, 2), 90);
    }

    #[test]
    fn portrait_resets_rotation_to_zero() {
        // Source page carries /Rotate 180; output must be 0, not 180.
        let mut doc = Document::load_mem(&sample_pdf(1)).expect("load sample");
        let page_id = doc.get_pages()[&1];
        if let Ok(Object::Dictionary(dict)) = doc.get_object_mut(page_id) {
            dict.set("Rotate", Object::Integer(180));
        }
        let mut rotated_source = Vec::new();
        doc.save_to(&mut rotated_source).expect("save");

        let transformer = PageTransformer::from_bytes(&rotated_source).expect("load");
        let output = transformer
            .subset_with_rotation(&[1], Orientation::Portrait)
            .expect("transform");

        assert_eq!(page_rotation(&output, 1), 0);
    }

    #[test]
    fn source_document_is_untouched() {
        let source = sample_pdf(3);
        let transformer = PageTransformer::from_bytes(&source).expect("load");
        let _ = transformer
            .subset_with_rotation(&[1], Orientation::Landscape)
            .expect("transform");
        assert_eq!(transformer.page_count(), 3);
        // A second transform still sees the full, unrotated source.
        let output = transformer
            .subset_with_rotation(&[1, 2, 3], Orientation::Portrait)
            .expect("second transform");
        assert_eq!(page_rotation(&output, 3), 0);
    }

    #[test]
    fn missing_page_is_a_codec_error() {
        let source = sample_pdf(2);
        let transformer = PageTransformer::from_bytes(&source).expect("load");
        let result = transformer.subset_with_rotation(&[7], Orientation::Portrait);
        assert!(matches!(result, Err(PrintmateError::Codec(_))));
    }
}
