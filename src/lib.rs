//! # folio
//!
//! Extracts a structured, navigable document model from an unzipped EPUB
//! archive: the package document's metadata, manifest, and spine, the
//! resolved cover image, and a hierarchical table of contents built from
//! either an EPUB 2 NCX file or an EPUB 3 navigation document.
//!
//! Parsing is defensive and deterministic. Missing covers, absent metadata,
//! and broken tables of contents degrade to empty values; only a missing
//! container descriptor, an unresolvable package document, or malformed XML
//! at a required parse site reject the book.
//!
//! ## Quick Start
//!
//! ```no_run
//! let book = folio::open_book("/tmp/staging/my-book")?;
//!
//! println!("Title: {}", book.title().unwrap_or("(untitled)"));
//! println!("Identifier: {}", book.unique_identifier());
//!
//! // Walk the reading order
//! for i in 0..book.spine.len() {
//!     if let Some(path) = book.chapter_path(i) {
//!         println!("chapter {i}: {}", path.display());
//!     }
//! }
//! # Ok::<(), folio::Error>(())
//! ```
//!
//! Archive extraction, persistence, and rendering are collaborators, not
//! part of this crate: [`open_book`] takes the root directory an archive
//! was already extracted into, and the produced [`Book`] is a plain
//! immutable value safe to share across threads.

pub mod book;
pub mod epub;
mod error;
pub(crate) mod util;

pub use book::{
    Book, GuideReference, ManifestItem, Metadata, PackageDocument, SpineItem, TocNode,
};
pub use epub::open_book;
pub use error::{Error, Result};
