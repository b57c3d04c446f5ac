// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for Printmate order preparation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Colour mode requested for the prepared output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorMode {
    Color,
    Bw,
}

impl ColorMode {
    /// Stable token used in fingerprints and the order form payload.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Color => "COLOR",
            Self::Bw => "BW",
        }
    }
}

/// Page orientation applied as an absolute rotation to every output page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl Orientation {
    /// Absolute /Rotate value in degrees.
    pub fn rotation_degrees(&self) -> i64 {
        match self {
            Self::Portrait => 0,
            Self::Landscape => 90,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Portrait => "PORTRAIT",
            Self::Landscape => "LANDSCAPE",
        }
    }
}

/// Single- or double-sided printing. Affects pricing only, never the bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SideMode {
    Single,
    Double,
}

/// Binding requested at the shop counter. Affects pricing only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Binding {
    None,
    Soft,
    Spiral,
}

/// User-selected preparation parameters.
///
/// A value type: two parameter sets are interchangeable exactly when their
/// fingerprints match. Only `range_expression` and `orientation` influence
/// the vector transform; `color_mode` gates the rasterisation stage; the
/// remaining fields feed the price estimate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformParameters {
    /// Free-text page range expression, e.g. `"1-3,7"`. Empty means all pages.
    pub range_expression: String,
    pub orientation: Orientation,
    pub color_mode: ColorMode,
    pub side_mode: SideMode,
    pub binding: Binding,
    /// Number of copies, minimum 1.
    pub copies: u32,
}

impl Default for TransformParameters {
    fn default() -> Self {
        Self {
            range_expression: String::new(),
            orientation: Orientation::Portrait,
            color_mode: ColorMode::Bw,
            side_mode: SideMode::Single,
            binding: Binding::None,
            copies: 1,
        }
    }
}

impl TransformParameters {
    /// Fingerprint of the vector stage inputs: source digest, range
    /// expression, and orientation. Changing the colour mode alone must not
    /// change this value.
    pub fn vector_fingerprint(&self, source_digest: &str) -> String {
        fingerprint_of(&[
            source_digest,
            &self.range_expression,
            self.orientation.as_str(),
        ])
    }
}

/// SHA-256 over length-prefixed components, hex encoded. Length prefixes
/// keep `["a|b", "c"]` and `["a", "b|c"]` distinct.
pub fn fingerprint_of(components: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in components {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Kind of uploaded document, detected from magic bytes rather than the
/// filename so a mislabelled upload still takes the right path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentKind {
    Pdf,
    Png,
    Jpeg,
}

impl DocumentKind {
    /// Sniff the document kind from leading bytes.
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"%PDF") {
            Some(Self::Pdf)
        } else if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
            Some(Self::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else {
            None
        }
    }

    /// Whether this is a raster image that gets promoted to a one-page
    /// document instead of going through the page transform.
    pub fn is_raster_image(&self) -> bool {
        matches!(self, Self::Png | Self::Jpeg)
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }
}

/// The originally uploaded file. Immutable; replaced wholesale on a new
/// upload and never mutated in place.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub bytes: Vec<u8>,
    pub filename: String,
    /// SHA-256 of `bytes`, hex encoded. Doubles as the upload generation
    /// marker when validating cache writes.
    pub digest: String,
    pub kind: DocumentKind,
}

impl SourceDocument {
    pub fn new(bytes: Vec<u8>, filename: impl Into<String>, kind: DocumentKind) -> Self {
        let digest = hex::encode(Sha256::digest(&bytes));
        Self {
            bytes,
            filename: filename.into(),
            digest,
            kind,
        }
    }
}

/// Output of the vector transform stage for one fingerprint.
#[derive(Debug, Clone)]
pub struct VectorResult {
    pub fingerprint: String,
    pub bytes: Vec<u8>,
    pub page_count: u32,
}

/// Output of the grayscale rasterisation stage, keyed by the fingerprint of
/// the vector result it was derived from.
#[derive(Debug, Clone)]
pub struct RasterResult {
    pub fingerprint: String,
    pub bytes: Vec<u8>,
}

/// The current, fully materialised output artifact. Only the most recently
/// started job may write this.
#[derive(Debug, Clone)]
pub struct PreparedOutput {
    pub fingerprint: String,
    pub bytes: Vec<u8>,
    pub page_count: u32,
}

/// A binary artifact in flight between the authoring process and a viewer
/// process. Persisted transiently in the preview store, consumed exactly
/// once, then deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewPayload {
    pub id: String,
    pub filename: String,
    pub created_at: DateTime<Utc>,
    #[serde(with = "serde_bytes_vec")]
    pub bytes: Vec<u8>,
}

impl PreviewPayload {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            filename: filename.into(),
            created_at: Utc::now(),
            bytes,
        }
    }
}

/// Plain Vec<u8> passthrough so the payload serialises as a byte array
/// without pulling in an extra crate.
mod serde_bytes_vec {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        Vec::<u8>::deserialize(de)
    }
}
