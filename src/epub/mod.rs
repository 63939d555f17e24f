//! EPUB parsing: container descriptor, package document, and both
//! table-of-contents formats, assembled into a [`Book`].

mod container;
mod nav;
mod ncx;
mod package;

pub use container::{CONTAINER_PATH, locate_package, parse_container};
pub use nav::parse_nav;
pub use ncx::parse_ncx;
pub use package::{COVER_IMAGE_PROPERTY, NAV_PROPERTY, NCX_MEDIA_TYPE, parse_package};

use std::fs;
use std::path::Path;

use log::{debug, warn};

use crate::book::{Book, ManifestItem, TocNode};
use crate::error::{Error, Result};
use crate::util::{decode_href, decode_text};

/// Build the book model for an already-unzipped EPUB archive.
///
/// `root` is the absolute staging directory the archive was extracted into.
/// Locates the package document via the container descriptor, parses it,
/// selects one TOC source (NCX preferred, else the EPUB 3 navigation
/// document), and assembles the immutable [`Book`].
///
/// Container and package failures are fatal: a book whose structure cannot
/// be read is not a usable EPUB. A missing or malformed TOC degrades to an
/// empty tree so linear reading stays possible.
///
/// # Example
///
/// ```no_run
/// let book = folio::open_book("/tmp/staging/unzipped-book")?;
/// println!("{:?} by {:?}", book.title(), book.author());
/// # Ok::<(), folio::Error>(())
/// ```
pub fn open_book(root: impl AsRef<Path>) -> Result<Book> {
    let root = root.as_ref();

    let package_path = locate_package(root)?;
    let opf_file = root.join(decode_href(&package_path).as_ref());
    if !opf_file.is_file() {
        return Err(Error::MissingOpf(package_path));
    }
    let opf_dir = opf_file.parent().unwrap_or(root).to_path_buf();

    let bytes = fs::read(&opf_file)?;
    let document = parse_package(&decode_text(&bytes, None), &opf_dir)?;
    debug!(
        "parsed package document {} (version {:?}, {} manifest items, {} spine items)",
        package_path,
        document.metadata.version,
        document.manifest.len(),
        document.spine.len()
    );

    // One TOC source: an NCX if the manifest declares one, else the EPUB 3
    // navigation document. No fallback from one to the other.
    let toc_source = document
        .manifest
        .iter()
        .find(|item| item.media_type == NCX_MEDIA_TYPE)
        .or_else(|| {
            document
                .manifest
                .iter()
                .find(|item| item.has_property(NAV_PROPERTY))
        });

    let toc = match toc_source {
        Some(item) => load_toc(&opf_dir, item),
        None => Vec::new(),
    };

    Ok(Book {
        package_path,
        resources_root: root.to_path_buf(),
        metadata: document.metadata,
        manifest: document.manifest,
        spine: document.spine,
        toc,
    })
}

/// Read and parse the chosen TOC source. Never fails: a missing file or a
/// malformed TOC yields an empty tree.
fn load_toc(opf_dir: &Path, item: &ManifestItem) -> Vec<TocNode> {
    let path = opf_dir.join(decode_href(&item.href).as_ref());
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("TOC file {} unreadable, continuing without: {e}", path.display());
            return Vec::new();
        }
    };
    let content = decode_text(&bytes, None);

    let parsed = if item.media_type == NCX_MEDIA_TYPE {
        debug!("building TOC from NCX {}", item.href);
        ncx::parse_ncx(&content)
    } else {
        debug!("building TOC from navigation document {}", item.href);
        nav::parse_nav(&content)
    };

    match parsed {
        Ok(toc) => toc,
        Err(e) => {
            warn!("TOC {} ignored, continuing without: {e}", item.href);
            Vec::new()
        }
    }
}
