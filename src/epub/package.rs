//! Package document (OPF) parser.
//!
//! Stream-parses the package document into a [`PackageDocument`]: Dublin-Core
//! metadata, the manifest/spine/guide sections, and the resolved cover image.
//! Everything short of malformed XML degrades to empty or absent values; a
//! package with no manifest, no metadata, or an unresolvable cover is still a
//! loadable book.

use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::book::{GuideReference, ManifestItem, PackageDocument, SpineItem};
use crate::error::Result;
use crate::util::{decode_href, has_image_extension, local_name, resolve_entity};

/// Media type marking an EPUB 2 NCX navigation file in the manifest.
pub const NCX_MEDIA_TYPE: &str = "application/x-dtbncx+xml";

/// Manifest property token marking the EPUB 3 navigation document.
pub const NAV_PROPERTY: &str = "nav";

/// Manifest property token marking the cover image.
pub const COVER_IMAGE_PROPERTY: &str = "cover-image";

/// Parse a package document. `opf_dir` is the absolute directory the package
/// document lives in; the resolved cover href is materialized against it.
pub fn parse_package(content: &str, opf_dir: &Path) -> Result<PackageDocument> {
    PackageParser::new(opf_dir).parse(content)
}

/// Dublin-Core element currently accumulating character data.
#[derive(Debug, Clone, Copy, PartialEq)]
enum DcField {
    Title,
    Creator,
    Language,
    Identifier,
    Publisher,
    Description,
    Date,
}

impl DcField {
    fn from_local(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Self::Title),
            b"creator" => Some(Self::Creator),
            b"language" => Some(Self::Language),
            b"identifier" => Some(Self::Identifier),
            b"publisher" => Some(Self::Publisher),
            b"description" => Some(Self::Description),
            b"date" => Some(Self::Date),
            _ => None,
        }
    }

    fn local(self) -> &'static [u8] {
        match self {
            Self::Title => b"title",
            Self::Creator => b"creator",
            Self::Language => b"language",
            Self::Identifier => b"identifier",
            Self::Publisher => b"publisher",
            Self::Description => b"description",
            Self::Date => b"date",
        }
    }
}

/// Element whose text content is being collected.
#[derive(Debug, Clone, Copy, PartialEq)]
enum TextTarget {
    Dc(DcField),
    /// `<meta property="dcterms:modified">`, a fallback for `dc:date`.
    ModifiedMeta,
}

/// One-shot parser; construct a fresh instance per package document.
struct PackageParser<'a> {
    opf_dir: &'a Path,
    doc: PackageDocument,

    // Non-exclusive section flags toggled by the container elements.
    in_metadata: bool,
    in_manifest: bool,
    in_spine: bool,
    in_guide: bool,

    target: Option<TextTarget>,
    text: String,

    /// `<meta name="cover" content="...">` value, resolved once the
    /// manifest section closes.
    pending_cover: Option<String>,
    synthesized_ids: usize,
}

impl<'a> PackageParser<'a> {
    fn new(opf_dir: &'a Path) -> Self {
        Self {
            opf_dir,
            doc: PackageDocument::default(),
            in_metadata: false,
            in_manifest: false,
            in_spine: false,
            in_guide: false,
            target: None,
            text: String::new(),
            pending_cover: None,
            synthesized_ids: 0,
        }
    }

    fn parse(mut self, content: &str) -> Result<PackageDocument> {
        let mut reader = Reader::from_str(content);

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => self.handle_open(&e, false),
                Ok(Event::Empty(e)) => self.handle_open(&e, true),
                Ok(Event::Text(e)) => {
                    if self.target.is_some() {
                        self.text.push_str(&String::from_utf8_lossy(e.as_ref()));
                    }
                }
                Ok(Event::CData(e)) => {
                    if self.target.is_some() {
                        self.text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                    }
                }
                Ok(Event::GeneralRef(e)) => {
                    if self.target.is_some()
                        && let Some(resolved) = resolve_entity(&String::from_utf8_lossy(e.as_ref()))
                    {
                        self.text.push_str(&resolved);
                    }
                }
                Ok(Event::End(e)) => self.handle_close(local_name(e.name().as_ref())),
                Ok(Event::Eof) => break,
                Err(e) => return Err(e.into()),
                _ => {}
            }
        }

        Ok(self.doc)
    }

    fn handle_open(&mut self, e: &BytesStart, self_closing: bool) {
        let name = e.name();
        let local = local_name(name.as_ref());

        match local {
            b"package" => {
                if let Some(version) = attr_value(e, b"version") {
                    let version = version.trim();
                    if !version.is_empty() {
                        self.doc.metadata.version = Some(version.to_string());
                    }
                }
            }
            b"metadata" if !self_closing => self.in_metadata = true,
            b"manifest" => {
                if self_closing {
                    self.finish_manifest();
                } else {
                    self.in_manifest = true;
                }
            }
            b"spine" if !self_closing => self.in_spine = true,
            b"guide" if !self_closing => self.in_guide = true,
            b"item" if self.in_manifest => self.push_item(e),
            b"itemref" if self.in_spine => self.push_itemref(e),
            b"reference" if self.in_guide => self.push_reference(e),
            b"meta" if self.in_metadata => {
                if attr_value(e, b"name").as_deref() == Some("cover") {
                    if let Some(content) = attr_value(e, b"content")
                        && !content.is_empty()
                    {
                        self.pending_cover = Some(content);
                    }
                } else if attr_value(e, b"property").as_deref() == Some("dcterms:modified")
                    && !self_closing
                {
                    self.target = Some(TextTarget::ModifiedMeta);
                    self.text.clear();
                }
            }
            _ => {
                if self.in_metadata
                    && !self_closing
                    && let Some(field) = DcField::from_local(local)
                {
                    self.target = Some(TextTarget::Dc(field));
                    self.text.clear();
                }
            }
        }
    }

    fn handle_close(&mut self, local: &[u8]) {
        match local {
            b"metadata" => self.in_metadata = false,
            b"manifest" => {
                self.in_manifest = false;
                self.finish_manifest();
            }
            b"spine" => self.in_spine = false,
            b"guide" => self.in_guide = false,
            _ => {}
        }

        self.commit_text(local);
    }

    /// Commit accumulated character data when its own element closes.
    /// Ends of nested markup (e.g. inside a description) are ignored; only
    /// their character content survives.
    fn commit_text(&mut self, local: &[u8]) {
        let matches = match self.target {
            Some(TextTarget::Dc(field)) => field.local() == local,
            Some(TextTarget::ModifiedMeta) => local == b"meta",
            None => return,
        };
        if !matches {
            return;
        }

        let metadata = &mut self.doc.metadata;
        let trimmed = self.text.trim();

        match self.target {
            Some(TextTarget::Dc(DcField::Title)) => {
                if metadata.title.is_none() && !trimmed.is_empty() {
                    metadata.title = Some(trimmed.to_string());
                }
            }
            Some(TextTarget::Dc(DcField::Language)) => {
                if metadata.language.is_none() && !trimmed.is_empty() {
                    metadata.language = Some(trimmed.to_string());
                }
            }
            Some(TextTarget::Dc(DcField::Date)) => {
                if metadata.date.is_none() && !trimmed.is_empty() {
                    metadata.date = Some(trimmed.to_string());
                }
            }
            Some(TextTarget::Dc(DcField::Publisher)) => {
                if metadata.publisher.is_none() && !trimmed.is_empty() {
                    metadata.publisher = Some(trimmed.to_string());
                }
            }
            Some(TextTarget::Dc(DcField::Description)) => {
                // Raw content, untrimmed, markup characters preserved.
                if metadata.description_html.is_none() && !trimmed.is_empty() {
                    metadata.description_html = Some(self.text.clone());
                }
            }
            Some(TextTarget::Dc(DcField::Creator)) => {
                if !trimmed.is_empty() {
                    metadata.creators.push(trimmed.to_string());
                }
            }
            Some(TextTarget::Dc(DcField::Identifier)) => {
                if !trimmed.is_empty() {
                    metadata.identifiers.push(trimmed.to_string());
                }
            }
            Some(TextTarget::ModifiedMeta) => {
                if metadata.date.is_none() && !trimmed.is_empty() {
                    metadata.date = Some(trimmed.to_string());
                }
            }
            None => unreachable!(),
        }

        self.target = None;
        self.text.clear();
    }

    fn push_item(&mut self, e: &BytesStart) {
        let mut id = attr_value(e, b"id").unwrap_or_default();
        let href = attr_value(e, b"href").unwrap_or_default();
        let media_type = attr_value(e, b"media-type").unwrap_or_default();
        let properties = attr_value(e, b"properties")
            .map(|p| p.split_ascii_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        if id.is_empty() {
            // Placeholder only valid for this parse.
            id = format!("folio-item-{}", self.synthesized_ids);
            self.synthesized_ids += 1;
        }

        // Manifest ids are unique; first occurrence wins.
        if self.doc.manifest.iter().any(|item| item.id == id) {
            return;
        }

        self.doc.manifest.push(ManifestItem {
            id,
            href,
            media_type,
            properties,
        });
    }

    fn push_itemref(&mut self, e: &BytesStart) {
        let Some(idref) = attr_value(e, b"idref").filter(|idref| !idref.is_empty()) else {
            return;
        };
        // Only a literal "no" clears linear.
        let linear = !attr_value(e, b"linear")
            .is_some_and(|linear| linear.eq_ignore_ascii_case("no"));
        self.doc.spine.push(SpineItem { idref, linear });
    }

    fn push_reference(&mut self, e: &BytesStart) {
        let Some(href) = attr_value(e, b"href").filter(|href| !href.is_empty()) else {
            return;
        };
        self.doc.guide.push(GuideReference {
            ref_type: attr_value(e, b"type").unwrap_or_default(),
            title: attr_value(e, b"title").filter(|title| !title.is_empty()),
            href,
        });
    }

    /// Runs when the manifest section closes: resolves the pending
    /// `meta name="cover"` reference, then the cover image itself.
    fn finish_manifest(&mut self) {
        if let Some(hint) = self.pending_cover.clone()
            && let Some(idx) = find_by_hint(&self.doc.manifest, &hint)
        {
            let item = &mut self.doc.manifest[idx];
            if !item.has_property(COVER_IMAGE_PROPERTY) {
                item.properties.push(COVER_IMAGE_PROPERTY.to_string());
            }
        }

        let resolved = resolve_cover(&self.doc.manifest, self.pending_cover.as_deref());

        if let Some(href) = resolved.filter(|href| !href.is_empty()) {
            let path = self.opf_dir.join(decode_href(&href).as_ref());
            self.doc.metadata.cover_hint = Some(path.to_string_lossy().into_owned());
        }
    }
}

/// Cover image resolution, first match wins:
/// 1. manifest item with the `cover-image` property,
/// 2. the recorded cover hint matched by id, exact href, or href suffix,
/// 3. first image-classified item whose id or href mentions "cover".
fn resolve_cover(manifest: &[ManifestItem], hint: Option<&str>) -> Option<String> {
    if let Some(item) = manifest
        .iter()
        .find(|item| item.has_property(COVER_IMAGE_PROPERTY))
    {
        return Some(item.href.clone());
    }

    if let Some(hint) = hint
        && let Some(idx) = find_by_hint(manifest, hint)
    {
        return Some(manifest[idx].href.clone());
    }

    manifest
        .iter()
        .find(|item| {
            let is_image =
                item.media_type.starts_with("image/") || has_image_extension(&item.href);
            is_image
                && (item.id.to_lowercase().contains("cover")
                    || item.href.to_lowercase().contains("cover"))
        })
        .map(|item| item.href.clone())
}

/// Match a cover hint against the manifest: by item id first, else by exact
/// or suffix href match.
fn find_by_hint(manifest: &[ManifestItem], hint: &str) -> Option<usize> {
    if hint.is_empty() {
        return None;
    }
    manifest
        .iter()
        .position(|item| item.id == hint)
        .or_else(|| {
            manifest.iter().position(|item| {
                !item.href.is_empty() && (item.href == hint || item.href.ends_with(hint))
            })
        })
}

/// Read an attribute as an owned string.
fn attr_value(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| local_name(attr.key.as_ref()) == key)
        .map(|attr| String::from_utf8_lossy(&attr.value).into_owned())
}
