//! Container descriptor (META-INF/container.xml) locator.

use std::fs;
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::{Error, Result};
use crate::util::{decode_text, local_name};

/// Fixed path of the container descriptor relative to the archive root.
pub const CONTAINER_PATH: &str = "META-INF/container.xml";

/// Find the package document path for an unzipped archive root.
///
/// Reads the container descriptor at its fixed path and returns the first
/// `rootfile@full-path` value, relative to the archive root.
pub fn locate_package(root: &Path) -> Result<String> {
    let descriptor = root.join(CONTAINER_PATH);
    if !descriptor.is_file() {
        return Err(Error::MissingContainer(descriptor));
    }

    let bytes = fs::read(&descriptor)?;
    parse_container(&decode_text(&bytes, None))
}

/// Parse a container descriptor, yielding the first rootfile's full-path.
pub fn parse_container(content: &str) -> Result<String> {
    let mut reader = Reader::from_str(content);

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if local_name(e.name().as_ref()) == b"rootfile" =>
            {
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"full-path" {
                        let path = String::from_utf8_lossy(&attr.value).into_owned();
                        if !path.is_empty() {
                            return Ok(path);
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => {}
        }
    }

    Err(Error::MissingOpf(
        "no rootfile full-path in container descriptor".to_string(),
    ))
}
