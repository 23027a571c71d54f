//! Error types for stage document operations.
//!
//! This module provides the main error type [`StageError`] covering
//! structural violations, load/migration failures and the storage boundary.
//! Structural violations are detected before any mutation takes place, so a
//! returned error always means the document is unchanged.

use std::io;

use thiserror::Error;
use uuid::Uuid;

/// The main error type for stage document operations.
#[derive(Debug, Error)]
pub enum StageError {
    /// An object with this uuid is already present in the registry.
    #[error("duplicate uuid {0} in registry")]
    DuplicateUuid(Uuid),

    /// An association endpoint does not resolve to a live entity.
    #[error("association {association} references missing entity {endpoint}")]
    DanglingReference { association: Uuid, endpoint: Uuid },

    /// Unrecoverable parse or migration failure; the load is aborted and no
    /// partial document is left behind.
    #[error("malformed document: {0}")]
    MalformedDocument(String),

    /// An object with an unknown type tag. During load this is recoverable:
    /// the object is skipped with a warning.
    #[error("unsupported object type `{0}`")]
    UnsupportedObjectType(String),

    /// A section pack/unpack precondition was violated; the operation was
    /// rejected before any mutation.
    #[error("invalid grouping: {0}")]
    InvalidGrouping(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}
