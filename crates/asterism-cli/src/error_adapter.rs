//! Error adapter for converting StageError to miette diagnostics.
//!
//! This module provides the bridge between the library's standard error
//! type and miette's rich diagnostic formatting used in the CLI. Stage
//! errors carry no source spans, so the adapter contributes an error code
//! and, where useful, a help message.

use std::fmt;

use miette::Diagnostic as MietteDiagnostic;

use asterism_core::StageError;

/// Adapter wrapping a [`StageError`] for miette rendering.
pub struct ErrorAdapter<'a>(pub &'a StageError);

impl fmt::Debug for ErrorAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for ErrorAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for ErrorAdapter<'_> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl MietteDiagnostic for ErrorAdapter<'_> {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let code = match &self.0 {
            StageError::DuplicateUuid(_) => "asterism::duplicate_uuid",
            StageError::DanglingReference { .. } => "asterism::dangling_reference",
            StageError::MalformedDocument(_) => "asterism::malformed_document",
            StageError::UnsupportedObjectType(_) => "asterism::unsupported_object_type",
            StageError::InvalidGrouping(_) => "asterism::invalid_grouping",
            StageError::Io(_) => "asterism::io",
            StageError::Encode(_) => "asterism::encode",
        };
        Some(Box::new(code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let help = match &self.0 {
            StageError::MalformedDocument(_) => {
                "the file may be corrupt or written by a newer version of asterism"
            }
            StageError::InvalidGrouping(_) => {
                "section operations require all selected entities to share one containment level"
            }
            _ => return None,
        };
        Some(Box::new(help))
    }
}

/// Convert a [`StageError`] into a reportable miette diagnostic.
pub fn to_reportable(err: &StageError) -> ErrorAdapter<'_> {
    ErrorAdapter(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_cover_document_errors() {
        let err = StageError::MalformedDocument("truncated".to_string());
        let adapter = to_reportable(&err);

        assert_eq!(
            adapter.code().unwrap().to_string(),
            "asterism::malformed_document"
        );
        assert!(adapter.help().is_some());
        assert_eq!(adapter.to_string(), "malformed document: truncated");
    }

    #[test]
    fn test_io_errors_have_no_help() {
        let err = StageError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing",
        ));
        let adapter = to_reportable(&err);

        assert_eq!(adapter.code().unwrap().to_string(), "asterism::io");
        assert!(adapter.help().is_none());
    }
}
