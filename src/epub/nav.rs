//! EPUB 3 navigation document (XHTML `<nav>`) table-of-contents parser.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::book::TocNode;
use crate::error::{Error, Result};
use crate::util::{local_name, resolve_entity};

/// Parse a navigation document, collecting only the list nested inside the
/// `<nav>` marked as the table of contents.
///
/// Fails on malformed XML, or when the whole document yields no node at all
/// (no recognizable TOC).
pub fn parse_nav(content: &str) -> Result<Vec<TocNode>> {
    NavParser::default().parse(content)
}

/// Where the parser is relative to the TOC-marked `<nav>`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
enum Phase {
    /// Scanning for the marked nav; everything else is skipped.
    #[default]
    Seeking,
    /// Inside the marked nav, collecting list items.
    Collecting,
    /// The marked nav closed; the rest of the document is irrelevant.
    Done,
}

/// An `<li>` under construction.
#[derive(Default)]
struct LiFrame {
    href: Option<String>,
    /// Text accumulated inside the item's anchor, across nested markup.
    anchor_label: String,
    has_anchor: bool,
    /// Loose text in the item, used when no anchor supplied a label.
    fallback: String,
    children: Vec<TocNode>,
}

#[derive(Default)]
struct NavParser {
    phase: Phase,
    /// Unmarked `<nav>` elements nested inside the marked one; only the
    /// marked nav's own end tag stops collection.
    nav_nesting: usize,
    stack: Vec<LiFrame>,
    roots: Vec<TocNode>,
    in_anchor: bool,
    /// Elements opened inside the current anchor, so nested inline markup
    /// contributes to the label and only the anchor's own end tag closes it.
    anchor_depth: usize,
}

impl NavParser {
    fn parse(mut self, content: &str) -> Result<Vec<TocNode>> {
        let mut reader = Reader::from_str(content);

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => self.handle_start(&e),
                Ok(Event::Empty(e)) => self.handle_empty(&e),
                Ok(Event::End(e)) => {
                    self.handle_end(local_name(e.name().as_ref()));
                    if self.phase == Phase::Done {
                        break;
                    }
                }
                Ok(Event::Text(e)) => self.push_text(&String::from_utf8_lossy(e.as_ref())),
                Ok(Event::CData(e)) => {
                    self.push_text(&String::from_utf8_lossy(&e.into_inner()));
                }
                Ok(Event::GeneralRef(e)) => {
                    if let Some(resolved) = resolve_entity(&String::from_utf8_lossy(e.as_ref())) {
                        self.push_text(&resolved);
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(e.into()),
                _ => {}
            }
        }

        if self.roots.is_empty() {
            return Err(Error::Parse(
                "no table of contents found in navigation document".to_string(),
            ));
        }
        Ok(self.roots)
    }

    fn handle_start(&mut self, e: &BytesStart) {
        let name = e.name();
        let local = local_name(name.as_ref());

        match self.phase {
            Phase::Seeking => {
                if local == b"nav" && is_toc_nav(e) {
                    self.phase = Phase::Collecting;
                    self.nav_nesting = 0;
                }
            }
            Phase::Collecting => {
                if self.in_anchor {
                    // Nested inline markup inside the anchor (span, em, ...)
                    self.anchor_depth += 1;
                    return;
                }
                match local {
                    b"nav" => self.nav_nesting += 1,
                    b"li" => self.stack.push(LiFrame::default()),
                    b"a" => {
                        if let Some(frame) = self.stack.last_mut() {
                            if frame.href.is_none() {
                                frame.href = anchor_href(e);
                            }
                            frame.has_anchor = true;
                            self.in_anchor = true;
                            self.anchor_depth = 0;
                        }
                    }
                    _ => {}
                }
            }
            Phase::Done => {}
        }
    }

    fn handle_empty(&mut self, e: &BytesStart) {
        if self.phase != Phase::Collecting || self.in_anchor {
            return;
        }
        // A self-closing anchor still supplies an href, just no label.
        if local_name(e.name().as_ref()) == b"a"
            && let Some(frame) = self.stack.last_mut()
            && frame.href.is_none()
        {
            frame.href = anchor_href(e);
        }
    }

    fn handle_end(&mut self, local: &[u8]) {
        if self.phase != Phase::Collecting {
            return;
        }

        if self.in_anchor {
            if self.anchor_depth == 0 && local == b"a" {
                self.in_anchor = false;
            } else {
                self.anchor_depth = self.anchor_depth.saturating_sub(1);
            }
            return;
        }

        match local {
            b"nav" => {
                if self.nav_nesting == 0 {
                    self.phase = Phase::Done;
                } else {
                    self.nav_nesting -= 1;
                }
            }
            b"li" => self.close_item(),
            _ => {}
        }
    }

    fn push_text(&mut self, text: &str) {
        if self.phase != Phase::Collecting {
            return;
        }
        let Some(frame) = self.stack.last_mut() else {
            return;
        };
        if self.in_anchor {
            frame.anchor_label.push_str(text);
        } else {
            frame.fallback.push_str(text);
        }
    }

    fn close_item(&mut self) {
        let Some(frame) = self.stack.pop() else {
            return;
        };

        let label = if frame.has_anchor && !frame.anchor_label.trim().is_empty() {
            frame.anchor_label.trim().to_string()
        } else {
            frame.fallback.trim().to_string()
        };

        let node = TocNode {
            label,
            href: frame.href,
            children: frame.children,
        };
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => self.roots.push(node),
        }
    }
}

/// A `<nav>` counts as the TOC when `epub:type`/`type` contains `toc`,
/// `role` contains `doc-toc`, or `id` equals `toc` (case-insensitive).
fn is_toc_nav(e: &BytesStart) -> bool {
    for attr in e.attributes().flatten() {
        let value = String::from_utf8_lossy(&attr.value).to_lowercase();
        match local_name(attr.key.as_ref()) {
            b"type" if value.contains("toc") => return true,
            b"role" if value.contains("doc-toc") => return true,
            b"id" if value == "toc" => return true,
            _ => {}
        }
    }
    false
}

fn anchor_href(e: &BytesStart) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| local_name(attr.key.as_ref()) == b"href")
        .map(|attr| String::from_utf8_lossy(&attr.value).into_owned())
        .filter(|href| !href.is_empty())
}
