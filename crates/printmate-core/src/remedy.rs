// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Short, actionable user-facing messages for every error. None of these are
// fatal: the user can always retry with different parameters or another file.

use crate::error::PrintmateError;

/// Severity from the user's perspective, drives presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Likely to clear on retry.
    Transient,
    /// User must change something (parameters, file).
    ActionRequired,
    /// Environment problem outside the user's parameters.
    Environment,
}

/// A user-facing message with a suggested next step.
#[derive(Debug, Clone)]
pub struct Remedy {
    pub message: String,
    pub suggestion: String,
    pub retriable: bool,
    pub severity: Severity,
}

/// Map an error to the short actionable string the order screen shows.
pub fn remedy_for(err: &PrintmateError) -> Remedy {
    match err {
        PrintmateError::Parse(_) => Remedy {
            message: "Could not process this document.".into(),
            suggestion: "The file may be damaged. Try re-exporting it as a PDF and uploading again.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        PrintmateError::Codec(_) => Remedy {
            message: "Preparing the document failed.".into(),
            suggestion: "Try different page or orientation settings, or upload the file again.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        PrintmateError::RenderingUnavailable(_) => Remedy {
            message: "Black & white conversion is not available right now.".into(),
            suggestion: "The page renderer could not start. Reinstall the PDF rendering library, or order in colour.".into(),
            retriable: false,
            severity: Severity::Environment,
        },

        PrintmateError::DocumentTooLarge { .. } => Remedy {
            message: "The converted document is too large.".into(),
            suggestion: "Switch to colour mode or reduce the page range, then try again.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        PrintmateError::Storage(_) => Remedy {
            message: "The preview window could not receive the document.".into(),
            suggestion: "The preview is shown on this screen instead.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        PrintmateError::Io(_) => Remedy {
            message: "Reading or writing a file failed.".into(),
            suggestion: "Check disk space and permissions, then try again.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        PrintmateError::Serialization(_) => Remedy {
            message: "An internal data error occurred.".into(),
            suggestion: "Try the operation again.".into(),
            retriable: true,
            severity: Severity::Transient,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_large_suggests_parameter_changes() {
        let remedy = remedy_for(&PrintmateError::DocumentTooLarge {
            actual: 45 * 1024 * 1024,
            limit: 20 * 1024 * 1024,
        });
        assert!(remedy.suggestion.contains("colour") || remedy.suggestion.contains("page"));
        assert_eq!(remedy.severity, Severity::ActionRequired);
    }

    #[test]
    fn rendering_unavailable_is_distinct_from_too_large() {
        let a = remedy_for(&PrintmateError::RenderingUnavailable("no library".into()));
        let b = remedy_for(&PrintmateError::DocumentTooLarge { actual: 1, limit: 0 });
        assert_ne!(a.message, b.message);
        assert_eq!(a.severity, Severity::Environment);
    }

    #[test]
    fn storage_failure_degrades_not_blocks() {
        let remedy = remedy_for(&PrintmateError::Storage("locked".into()));
        assert!(remedy.retriable);
    }
}
