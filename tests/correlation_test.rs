//! Spine↔TOC correlation and identifier tests over an assembled book.

use std::fs;
use std::path::Path;

use folio::open_book;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// A book whose NCX hrefs use a different relative-path convention than the
/// manifest (TOC says `ch1.xhtml`, manifest says `text/ch1.xhtml`), which is
/// exactly what the loose correlation exists for.
fn fixture() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(
        root,
        "META-INF/container.xml",
        r#"<container>
  <rootfiles><rootfile full-path="OEBPS/content.opf"/></rootfiles>
</container>"#,
    );
    write(
        root,
        "OEBPS/content.opf",
        r#"<package version="2.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>Correlated</dc:title>
    <dc:creator>Nobody</dc:creator>
    <dc:identifier>free-text-id</dc:identifier>
    <dc:identifier>urn:uuid:123e4567-e89b-12d3-a456-426614174000</dc:identifier>
  </metadata>
  <manifest>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
    <item id="intro" href="text/intro.xhtml" media-type="application/xhtml+xml"/>
    <item id="ch1" href="text/ch1.xhtml" media-type="application/xhtml+xml"/>
    <item id="ch2" href="text/ch2.xhtml" media-type="application/xhtml+xml"/>
  </manifest>
  <spine toc="ncx">
    <itemref idref="intro"/>
    <itemref idref="ch1"/>
    <itemref idref="ch2"/>
  </spine>
</package>"#,
    );
    write(
        root,
        "OEBPS/toc.ncx",
        r#"<ncx><navMap>
  <navPoint><navLabel><text>Introduction</text></navLabel><content src="intro.xhtml"/></navPoint>
  <navPoint>
    <navLabel><text>Chapter 1</text></navLabel><content src="ch1.xhtml"/>
    <navPoint><navLabel><text>Section 1.1</text></navLabel><content src="ch1.xhtml#s1"/></navPoint>
  </navPoint>
  <navPoint><navLabel><text>Chapter 2</text></navLabel><content src="ch2.xhtml"/></navPoint>
</navMap></ncx>"#,
    );
    dir
}

#[test]
fn toc_node_found_for_each_spine_idref() {
    let dir = fixture();
    let book = open_book(dir.path()).unwrap();

    assert_eq!(
        book.toc_node_for_idref("intro").map(|n| n.label.as_str()),
        Some("Introduction")
    );
    assert_eq!(
        book.toc_node_for_idref("ch1").map(|n| n.label.as_str()),
        Some("Chapter 1")
    );
    assert_eq!(
        book.toc_node_for_idref("ch2").map(|n| n.label.as_str()),
        Some("Chapter 2")
    );
    assert!(book.toc_node_for_idref("absent").is_none());
}

#[test]
fn spine_index_found_for_each_toc_href() {
    let dir = fixture();
    let book = open_book(dir.path()).unwrap();

    assert_eq!(book.spine_index_for_toc_href("intro.xhtml"), Some(0));
    assert_eq!(book.spine_index_for_toc_href("ch1.xhtml"), Some(1));
    // Fragment and case are normalized away
    assert_eq!(book.spine_index_for_toc_href("CH1.xhtml#s1"), Some(1));
    assert_eq!(book.spine_index_for_toc_href("ch2.xhtml"), Some(2));
    assert_eq!(book.spine_index_for_toc_href("elsewhere.xhtml"), None);
}

#[test]
fn correlation_round_trips_through_toc() {
    let dir = fixture();
    let book = open_book(dir.path()).unwrap();

    // Every TOC root's href maps back to a spine position whose idref maps
    // forward to a TOC node again.
    for node in &book.toc {
        let href = node.href.as_deref().unwrap();
        let index = book.spine_index_for_toc_href(href).unwrap();
        let idref = &book.spine[index].idref;
        assert!(book.toc_node_for_idref(idref).is_some());
    }
}

#[test]
fn uuid_identifier_preferred_over_first() {
    let dir = fixture();
    let book = open_book(dir.path()).unwrap();
    // Second identifier carries a URN-UUID; it beats the first occurrence
    assert_eq!(
        book.unique_identifier(),
        "123e4567-e89b-12d3-a456-426614174000"
    );
}

#[test]
fn digest_identifier_is_stable_without_metadata_ids() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(
        root,
        "META-INF/container.xml",
        r#"<container><rootfiles><rootfile full-path="content.opf"/></rootfiles></container>"#,
    );
    write(
        root,
        "content.opf",
        r#"<package version="2.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>No Identifier Here</dc:title>
    <dc:creator>Anon</dc:creator>
  </metadata>
  <manifest>
    <item id="ch1" href="ch1.xhtml" media-type="application/xhtml+xml"/>
  </manifest>
  <spine><itemref idref="ch1"/></spine>
</package>"#,
    );

    let first = open_book(root).unwrap().unique_identifier();
    let second = open_book(root).unwrap().unique_identifier();
    assert_eq!(first, second);
    assert_eq!(first.len(), 40);
    assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
}
