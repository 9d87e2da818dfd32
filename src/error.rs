//! Fatal error taxonomy.
//!
//! Anything in here aborts the run before artifacts are written. Per-document
//! problems never surface as an [`IngestError`]; they are carried on the
//! document and reported through the review manifest instead.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("source root does not exist: {}", .0.display())]
    SourceRootMissing(PathBuf),

    #[error("source root is not readable: {}: {reason}", .path.display())]
    SourceRootUnreadable { path: PathBuf, reason: String },

    #[error("overrides file is malformed: {}: {reason}", .path.display())]
    OverridesMalformed { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
