//! Legacy (EPUB 2) NCX table-of-contents parser.

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::book::TocNode;
use crate::error::Result;
use crate::util::{local_name, resolve_entity};

/// Parse an NCX navigation file into a sequence of TOC roots.
///
/// Fails only on malformed XML; a navMap with zero navPoints is an empty
/// sequence, not an error.
pub fn parse_ncx(content: &str) -> Result<Vec<TocNode>> {
    NcxParser::default().parse(content)
}

/// In-progress navPoint, keyed by nesting depth on the stack.
#[derive(Default)]
struct NavFrame {
    label: String,
    href: Option<String>,
    children: Vec<TocNode>,
}

#[derive(Default)]
struct NcxParser {
    stack: Vec<NavFrame>,
    roots: Vec<TocNode>,
    /// Inside a navLabel `<text>` element of an open navPoint.
    in_text: bool,
    text: String,
}

impl NcxParser {
    fn parse(mut self, content: &str) -> Result<Vec<TocNode>> {
        let mut reader = Reader::from_str(content);

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    let name = e.name();
                    match local_name(name.as_ref()) {
                        b"navPoint" => self.stack.push(NavFrame::default()),
                        // docTitle/navInfo also carry <text>; only collect
                        // inside an open navPoint.
                        b"text" if !self.stack.is_empty() => {
                            self.in_text = true;
                            self.text.clear();
                        }
                        b"content" => self.attach_src(&e),
                        _ => {}
                    }
                }
                Ok(Event::Empty(e)) => {
                    if local_name(e.name().as_ref()) == b"content" {
                        self.attach_src(&e);
                    }
                }
                Ok(Event::Text(e)) => {
                    if self.in_text {
                        self.text.push_str(&String::from_utf8_lossy(e.as_ref()));
                    }
                }
                Ok(Event::CData(e)) => {
                    if self.in_text {
                        self.text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                    }
                }
                Ok(Event::GeneralRef(e)) => {
                    if self.in_text
                        && let Some(resolved) = resolve_entity(&String::from_utf8_lossy(e.as_ref()))
                    {
                        self.text.push_str(&resolved);
                    }
                }
                Ok(Event::End(e)) => {
                    let name = e.name();
                    match local_name(name.as_ref()) {
                        b"text" => {
                            if self.in_text {
                                self.in_text = false;
                                if let Some(frame) = self.stack.last_mut()
                                    && frame.label.is_empty()
                                {
                                    frame.label = self.text.trim().to_string();
                                }
                                self.text.clear();
                            }
                        }
                        b"navPoint" => self.close_nav_point(),
                        _ => {}
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(e.into()),
                _ => {}
            }
        }

        Ok(self.roots)
    }

    fn attach_src(&mut self, e: &quick_xml::events::BytesStart) {
        let Some(frame) = self.stack.last_mut() else {
            return;
        };
        for attr in e.attributes().flatten() {
            if local_name(attr.key.as_ref()) == b"src" {
                let src = String::from_utf8_lossy(&attr.value).into_owned();
                if !src.is_empty() {
                    frame.href = Some(src);
                }
            }
        }
    }

    fn close_nav_point(&mut self) {
        let Some(frame) = self.stack.pop() else {
            return;
        };
        let node = TocNode {
            label: frame.label,
            href: frame.href,
            children: frame.children,
        };
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => self.roots.push(node),
        }
    }
}
