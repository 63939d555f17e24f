//! Error types for EPUB extraction.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while extracting a book model from an archive root.
///
/// Structural failures (missing container descriptor, unresolvable package
/// document, malformed XML at a required parse site) are fatal and mean the
/// input is not a usable EPUB. Gaps in optional content (cover, table of
/// contents, metadata fields) never surface here; they degrade to absent
/// values instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error("no container descriptor at {0}")]
    MissingContainer(PathBuf),

    #[error("package document not found: {0}")]
    MissingOpf(String),

    #[error("XML parsing error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<quick_xml::Error> for Error {
    fn from(e: quick_xml::Error) -> Self {
        Error::Parse(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
