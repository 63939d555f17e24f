//! The assembled book model and its derived operations.

use std::path::{Path, PathBuf};

use crate::util::{decode_href, last_path_segment, strip_fragment};

/// Parsed package document: metadata plus the manifest/spine/guide sections,
/// in document order. Immutable once built.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PackageDocument {
    pub metadata: Metadata,
    pub manifest: Vec<ManifestItem>,
    pub spine: Vec<SpineItem>,
    pub guide: Vec<GuideReference>,
}

/// Bibliographic metadata (Dublin Core + cover resolution result).
///
/// Singular fields keep the first non-empty value seen in the package
/// document; `creators` and `identifiers` accumulate every non-empty
/// occurrence in order. `description_html` is kept raw (untrimmed, markup
/// preserved). `cover_hint` holds the resolved cover image as an absolute
/// path string once the manifest has been processed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Metadata {
    pub version: Option<String>,
    pub title: Option<String>,
    pub language: Option<String>,
    pub date: Option<String>,
    pub publisher: Option<String>,
    pub description_html: Option<String>,
    pub cover_hint: Option<String>,
    pub creators: Vec<String>,
    pub identifiers: Vec<String>,
}

/// A manifest entry: one resource file in the archive.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestItem {
    /// Unique within the manifest; synthesized when the source omitted it.
    pub id: String,
    /// Relative to the package document's directory.
    pub href: String,
    pub media_type: String,
    /// Space-separated property tokens from the source (`nav`,
    /// `cover-image`, ...), split into individual tokens.
    pub properties: Vec<String>,
}

impl ManifestItem {
    pub fn has_property(&self, token: &str) -> bool {
        self.properties.iter().any(|p| p == token)
    }
}

/// A spine entry: one step in the linear reading order.
#[derive(Debug, Clone, PartialEq)]
pub struct SpineItem {
    /// References a manifest item id. Dangling references are retained here
    /// and fail resolution later.
    pub idref: String,
    pub linear: bool,
}

/// A guide entry (EPUB 2 semantic landmarks).
#[derive(Debug, Clone, PartialEq)]
pub struct GuideReference {
    pub ref_type: String,
    pub title: Option<String>,
    pub href: String,
}

/// A table-of-contents node. A parse yields a sequence of roots.
#[derive(Debug, Clone, PartialEq)]
pub struct TocNode {
    /// Possibly empty.
    pub label: String,
    /// Possibly carrying a `#fragment`.
    pub href: Option<String>,
    pub children: Vec<TocNode>,
}

impl TocNode {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            href: None,
            children: Vec::new(),
        }
    }
}

/// The assembled, immutable book model.
///
/// Invariant: `opf_dir() = resources_root/dirname(package_path)`; every
/// resource and chapter path resolves relative to `opf_dir()`, never to
/// `resources_root` directly.
#[derive(Debug, Clone, PartialEq)]
pub struct Book {
    /// Package document path relative to `resources_root`, as found in the
    /// container descriptor.
    pub package_path: String,
    /// Absolute root of the unzipped archive.
    pub resources_root: PathBuf,
    pub metadata: Metadata,
    pub manifest: Vec<ManifestItem>,
    pub spine: Vec<SpineItem>,
    pub toc: Vec<TocNode>,
}

impl Book {
    /// Directory the package document lives in; the base for every href.
    pub fn opf_dir(&self) -> PathBuf {
        match Path::new(&self.package_path).parent() {
            Some(parent) => self.resources_root.join(parent),
            None => self.resources_root.clone(),
        }
    }

    /// Look up a manifest item by id.
    pub fn manifest_item(&self, id: &str) -> Option<&ManifestItem> {
        self.manifest.iter().find(|item| item.id == id)
    }

    /// Resolve any manifest-style href to an absolute path under the
    /// package document's directory. Percent-encoding is decoded first.
    pub fn resource_path(&self, href: &str) -> PathBuf {
        self.opf_dir().join(decode_href(strip_fragment(href)).as_ref())
    }

    /// Absolute path of the chapter at a spine position, or `None` for an
    /// out-of-range index, dangling idref, or empty href.
    pub fn chapter_path(&self, spine_index: usize) -> Option<PathBuf> {
        let item = self.spine.get(spine_index)?;
        self.chapter_path_for_idref(&item.idref)
    }

    /// Absolute path of the chapter a spine idref points to.
    pub fn chapter_path_for_idref(&self, idref: &str) -> Option<PathBuf> {
        let item = self.manifest_item(idref)?;
        if item.href.is_empty() {
            return None;
        }
        Some(self.resource_path(&item.href))
    }

    /// A stable identifier for this book.
    ///
    /// Prefers the first identifier carrying a UUID (with or without a
    /// `urn:uuid:` prefix, case-insensitive), then the first non-empty
    /// identifier verbatim, then a SHA-1 digest over title, creators, and
    /// spine idrefs so that even identifier-free books get a deterministic id.
    pub fn unique_identifier(&self) -> String {
        for id in &self.metadata.identifiers {
            if let Some(uuid) = extract_uuid(id) {
                return uuid.to_string();
            }
        }

        if let Some(id) = self.metadata.identifiers.iter().find(|id| !id.is_empty()) {
            return id.clone();
        }

        let mut hasher = sha1_smol::Sha1::new();
        hasher.update(self.metadata.title.as_deref().unwrap_or("").as_bytes());
        hasher.update(b"|");
        hasher.update(self.metadata.creators.join(",").as_bytes());
        hasher.update(b"|");
        for item in &self.spine {
            hasher.update(item.idref.as_bytes());
        }
        hasher.digest().to_string()
    }

    /// Find the first TOC node (depth-first) that appears to reference the
    /// chapter a spine idref points to.
    ///
    /// Matching is deliberately loose: the node's href (fragment stripped,
    /// case-folded) only has to contain the manifest href, the manifest
    /// href's last path segment, or the raw idref as a substring. TOC and
    /// manifest hrefs routinely disagree on relative-path conventions, and
    /// real-world books depend on this leniency.
    pub fn toc_node_for_idref(&self, idref: &str) -> Option<&TocNode> {
        let manifest_href = self
            .manifest_item(idref)
            .map(|item| strip_fragment(&item.href).to_lowercase())
            .filter(|href| !href.is_empty());
        let segment = manifest_href
            .as_deref()
            .map(|href| last_path_segment(href).to_string())
            .filter(|seg| !seg.is_empty());
        let idref_lower = idref.to_lowercase();

        fn dfs<'a>(
            nodes: &'a [TocNode],
            matches: &dyn Fn(&str) -> bool,
        ) -> Option<&'a TocNode> {
            for node in nodes {
                if let Some(href) = &node.href {
                    let normalized = strip_fragment(href).to_lowercase();
                    if matches(&normalized) {
                        return Some(node);
                    }
                }
                if let Some(found) = dfs(&node.children, matches) {
                    return Some(found);
                }
            }
            None
        }

        dfs(&self.toc, &|href: &str| {
            if href.is_empty() {
                return false;
            }
            if let Some(full) = &manifest_href
                && href.contains(full.as_str())
            {
                return true;
            }
            if let Some(seg) = &segment
                && href.contains(seg.as_str())
            {
                return true;
            }
            !idref_lower.is_empty() && href.contains(&idref_lower)
        })
    }

    /// Inverse correlation: the spine position a TOC href points into.
    ///
    /// The href is normalized (fragment dropped, lower-cased), then matched
    /// against spine entries in tiers: full-path substring either direction,
    /// then last-path-segment equality/substring, then idref substring.
    /// The first tier producing any match wins, scanning in spine order.
    pub fn spine_index_for_toc_href(&self, href: &str) -> Option<usize> {
        let normalized = strip_fragment(href).to_lowercase();
        if normalized.is_empty() {
            return None;
        }
        let toc_segment = last_path_segment(&normalized).to_string();

        // Tier 1: full-path containment either direction.
        for (i, resolved) in self.resolvable_spine_hrefs() {
            if normalized.contains(&resolved) || resolved.contains(&normalized) {
                return Some(i);
            }
        }

        // Tier 2: last path segments.
        for (i, resolved) in self.resolvable_spine_hrefs() {
            let segment = last_path_segment(&resolved);
            if !segment.is_empty() && (segment == toc_segment || normalized.contains(segment)) {
                return Some(i);
            }
        }

        // Tier 3: idref appearing inside the href.
        for (i, item) in self.spine.iter().enumerate() {
            let idref = item.idref.to_lowercase();
            if !idref.is_empty() && normalized.contains(&idref) {
                return Some(i);
            }
        }

        None
    }

    /// Spine positions whose idref resolves to a manifest item with a
    /// non-empty href, paired with that href normalized for matching.
    fn resolvable_spine_hrefs(&self) -> impl Iterator<Item = (usize, String)> + '_ {
        self.spine.iter().enumerate().filter_map(|(i, item)| {
            let manifest = self.manifest_item(&item.idref)?;
            let href = strip_fragment(&manifest.href).to_lowercase();
            if href.is_empty() { None } else { Some((i, href)) }
        })
    }

    // Flattened metadata accessors, consumed verbatim by persistence and
    // rendering collaborators.

    pub fn title(&self) -> Option<&str> {
        self.metadata.title.as_deref()
    }

    /// First creator, if any.
    pub fn author(&self) -> Option<&str> {
        self.metadata.creators.first().map(String::as_str)
    }

    pub fn cover_path(&self) -> Option<&str> {
        self.metadata.cover_hint.as_deref()
    }

    pub fn language(&self) -> Option<&str> {
        self.metadata.language.as_deref()
    }

    pub fn publisher(&self) -> Option<&str> {
        self.metadata.publisher.as_deref()
    }

    pub fn version(&self) -> Option<&str> {
        self.metadata.version.as_deref()
    }

    pub fn date(&self) -> Option<&str> {
        self.metadata.date.as_deref()
    }

    pub fn description_html(&self) -> Option<&str> {
        self.metadata.description_html.as_deref()
    }
}

/// Extract a UUID from an identifier value, accepting a `urn:uuid:` prefix
/// (case-insensitive) or a bare UUID. Returns the UUID without the prefix.
fn extract_uuid(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    // Byte comparison: identifiers are free text, so byte offset 9 is only
    // a valid split point once the ASCII prefix actually matched.
    let bytes = trimmed.as_bytes();
    let candidate = if bytes.len() >= 9 && bytes[..9].eq_ignore_ascii_case(b"urn:uuid:") {
        &trimmed[9..]
    } else {
        trimmed
    };
    is_uuid(candidate).then_some(candidate)
}

/// 8-4-4-4-12 hex digits, case-insensitive.
fn is_uuid(s: &str) -> bool {
    let bytes = s.as_bytes();
    if bytes.len() != 36 {
        return false;
    }
    for (i, &b) in bytes.iter().enumerate() {
        match i {
            8 | 13 | 18 | 23 => {
                if b != b'-' {
                    return false;
                }
            }
            _ => {
                if !b.is_ascii_hexdigit() {
                    return false;
                }
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest_item(id: &str, href: &str, media_type: &str) -> ManifestItem {
        ManifestItem {
            id: id.to_string(),
            href: href.to_string(),
            media_type: media_type.to_string(),
            properties: Vec::new(),
        }
    }

    fn test_book() -> Book {
        let mut toc_ch2 = TocNode::new("Chapter 2");
        toc_ch2.href = Some("text/ch2.xhtml#start".to_string());
        let mut toc_ch1 = TocNode::new("Chapter 1");
        toc_ch1.href = Some("text/ch1.xhtml".to_string());
        toc_ch1.children.push(toc_ch2);

        Book {
            package_path: "OEBPS/content.opf".to_string(),
            resources_root: PathBuf::from("/books/staging/abc"),
            metadata: Metadata::default(),
            manifest: vec![
                manifest_item("ch1", "text/ch1.xhtml", "application/xhtml+xml"),
                manifest_item("ch2", "text/ch2.xhtml", "application/xhtml+xml"),
                manifest_item("css", "style.css", "text/css"),
            ],
            spine: vec![
                SpineItem {
                    idref: "ch1".to_string(),
                    linear: true,
                },
                SpineItem {
                    idref: "ch2".to_string(),
                    linear: true,
                },
                SpineItem {
                    idref: "missing".to_string(),
                    linear: true,
                },
            ],
            toc: vec![toc_ch1],
        }
    }

    #[test]
    fn test_opf_dir() {
        let book = test_book();
        assert_eq!(book.opf_dir(), PathBuf::from("/books/staging/abc/OEBPS"));

        let mut flat = test_book();
        flat.package_path = "content.opf".to_string();
        assert_eq!(flat.opf_dir(), PathBuf::from("/books/staging/abc"));
    }

    #[test]
    fn test_chapter_path() {
        let book = test_book();
        assert_eq!(
            book.chapter_path(0),
            Some(PathBuf::from("/books/staging/abc/OEBPS/text/ch1.xhtml"))
        );
        // Dangling idref fails resolution
        assert_eq!(book.chapter_path(2), None);
        // Out of range
        assert_eq!(book.chapter_path(9), None);
    }

    #[test]
    fn test_resource_path_percent_decoded() {
        let book = test_book();
        assert_eq!(
            book.resource_path("text/my%20chapter.xhtml"),
            PathBuf::from("/books/staging/abc/OEBPS/text/my chapter.xhtml")
        );
    }

    #[test]
    fn test_unique_identifier_prefers_uuid() {
        let mut book = test_book();
        book.metadata.identifiers = vec![
            "free-text-id".to_string(),
            "urn:uuid:123e4567-e89b-12d3-a456-426614174000".to_string(),
        ];
        assert_eq!(
            book.unique_identifier(),
            "123e4567-e89b-12d3-a456-426614174000"
        );
    }

    #[test]
    fn test_unique_identifier_bare_uuid() {
        let mut book = test_book();
        book.metadata.identifiers = vec!["123E4567-E89B-12D3-A456-426614174000".to_string()];
        assert_eq!(
            book.unique_identifier(),
            "123E4567-E89B-12D3-A456-426614174000"
        );
    }

    #[test]
    fn test_unique_identifier_non_ascii() {
        // Free-text identifiers may put a multibyte character across the
        // urn:uuid: prefix length; they fall through to the verbatim tier.
        let mut book = test_book();
        book.metadata.identifiers = vec!["12345678\u{e9}-rest-of-id".to_string()];
        assert_eq!(book.unique_identifier(), "12345678\u{e9}-rest-of-id");

        book.metadata.identifiers = vec![
            "caf\u{e9}-id".to_string(),
            "urn:uuid:123e4567-e89b-12d3-a456-426614174000".to_string(),
        ];
        assert_eq!(
            book.unique_identifier(),
            "123e4567-e89b-12d3-a456-426614174000"
        );
    }

    #[test]
    fn test_unique_identifier_verbatim_fallback() {
        let mut book = test_book();
        book.metadata.identifiers = vec!["urn:isbn:9781234567890".to_string()];
        assert_eq!(book.unique_identifier(), "urn:isbn:9781234567890");
    }

    #[test]
    fn test_unique_identifier_digest_fallback() {
        let mut book = test_book();
        book.metadata.title = Some("A Title".to_string());
        book.metadata.creators = vec!["An Author".to_string()];

        let id = book.unique_identifier();
        assert_eq!(id.len(), 40);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        // Deterministic across calls and parses of identical input
        assert_eq!(id, book.clone().unique_identifier());
        // Sensitive to content
        let mut other = book.clone();
        other.metadata.title = Some("Another Title".to_string());
        assert_ne!(id, other.unique_identifier());
    }

    #[test]
    fn test_toc_node_for_idref() {
        let book = test_book();
        let node = book.toc_node_for_idref("ch2").unwrap();
        assert_eq!(node.label, "Chapter 2");
        assert!(book.toc_node_for_idref("nope").is_none());
    }

    #[test]
    fn test_toc_node_matches_by_segment() {
        let mut book = test_book();
        // TOC uses a different relative-path convention than the manifest
        book.toc[0].href = Some("../text/ch1.xhtml".to_string());
        let node = book.toc_node_for_idref("ch1").unwrap();
        assert_eq!(node.label, "Chapter 1");
    }

    #[test]
    fn test_spine_index_full_path() {
        let book = test_book();
        assert_eq!(
            book.spine_index_for_toc_href("text/ch2.xhtml#start"),
            Some(1)
        );
    }

    #[test]
    fn test_spine_index_segment_match() {
        let book = test_book();
        // Differing directory prefixes fall through to segment matching
        assert_eq!(book.spine_index_for_toc_href("pages/ch1.xhtml"), Some(0));
    }

    #[test]
    fn test_spine_index_idref_match() {
        let mut book = test_book();
        // Break href resolution so only the idref tier can match
        book.manifest.clear();
        assert_eq!(book.spine_index_for_toc_href("part-ch2-end.html"), Some(1));
    }

    #[test]
    fn test_spine_index_no_match() {
        let book = test_book();
        assert_eq!(book.spine_index_for_toc_href("unrelated.xhtml"), None);
        assert_eq!(book.spine_index_for_toc_href("#only-fragment"), None);
    }

    #[test]
    fn test_flattened_accessors() {
        let mut book = test_book();
        book.metadata.title = Some("Title".to_string());
        book.metadata.creators = vec!["First".to_string(), "Second".to_string()];
        assert_eq!(book.title(), Some("Title"));
        assert_eq!(book.author(), Some("First"));
        assert_eq!(book.publisher(), None);
    }

    #[test]
    fn test_is_uuid() {
        assert!(is_uuid("123e4567-e89b-12d3-a456-426614174000"));
        assert!(is_uuid("123E4567-E89B-12D3-A456-426614174000"));
        assert!(!is_uuid("123e4567e89b12d3a456426614174000"));
        assert!(!is_uuid("not-a-uuid"));
        assert!(!is_uuid(""));
    }
}
