//! Shared helpers: text decoding, XML name/entity handling, href normalization.

use std::borrow::Cow;

/// Decode bytes to a string, tolerating the encodings found in the wild.
///
/// Tries UTF-8 first (a BOM is consumed automatically by encoding_rs), then
/// the hint encoding from an XML declaration if one was supplied, then falls
/// back to Windows-1252, which is the usual culprit in old ebooks.
pub fn decode_text<'a>(bytes: &'a [u8], hint_encoding: Option<&str>) -> Cow<'a, str> {
    let (result, _encoding, malformed) = encoding_rs::UTF_8.decode(bytes);

    if !malformed {
        return result;
    }

    if let Some(name) = hint_encoding
        && let Some(encoding) = encoding_rs::Encoding::for_label(name.as_bytes())
    {
        let (result, _, _) = encoding.decode(bytes);
        return result;
    }

    let (result, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    result
}

/// Extract the local name from a potentially namespaced XML name
/// (e.g., `dc:title` -> `title`).
pub fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name)
}

/// Resolve named and numeric XML entity references.
pub fn resolve_entity(entity: &str) -> Option<String> {
    match entity {
        "apos" => return Some("'".to_string()),
        "quot" => return Some("\"".to_string()),
        "lt" => return Some("<".to_string()),
        "gt" => return Some(">".to_string()),
        "amp" => return Some("&".to_string()),
        _ => {}
    }

    if let Some(hex) = entity.strip_prefix("#x") {
        if let Ok(code) = u32::from_str_radix(hex, 16)
            && let Some(c) = char::from_u32(code)
        {
            return Some(c.to_string());
        }
    } else if let Some(dec) = entity.strip_prefix('#')
        && let Ok(code) = dec.parse::<u32>()
        && let Some(c) = char::from_u32(code)
    {
        return Some(c.to_string());
    }

    None
}

/// Drop a `#fragment` suffix from an href, if present.
pub fn strip_fragment(href: &str) -> &str {
    href.split('#').next().unwrap_or(href)
}

/// Last path segment of an href, with the fragment already removed.
/// Empty when the href ends in a slash.
pub fn last_path_segment(href: &str) -> &str {
    let path = strip_fragment(href);
    path.rsplit('/').next().unwrap_or(path)
}

/// Percent-decode an href for filesystem resolution. Malformed sequences
/// leave the input unchanged rather than failing.
pub fn decode_href(href: &str) -> Cow<'_, str> {
    match percent_encoding::percent_decode_str(href).decode_utf8() {
        Ok(decoded) => decoded,
        Err(_) => Cow::Borrowed(href),
    }
}

/// True when the href's extension marks a common raster/vector image format.
/// Used as a fallback when the manifest media type is absent or wrong.
pub fn has_image_extension(href: &str) -> bool {
    let path = strip_fragment(href);
    let ext = match path.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => return false,
    };
    matches!(
        ext.as_str(),
        "jpg" | "jpeg" | "png" | "gif" | "svg" | "webp" | "bmp"
    )
}
