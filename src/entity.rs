//! XML/HTML entity decoding used by the inline pass's text processing.
//!
//! Per the data model, entity decoding applies to `Text` content but never to
//! link URLs: a URL's percent-encoding and literal `&amp;` are preserved
//! verbatim for the renderer to deal with. Only [`unescape`] (numeric and
//! named references) is used from the inline parser; [`unescape_html`] is
//! kept as a general-purpose helper for callers that do want full-string
//! unescaping (e.g. title text).

use crate::ctype::{isdigit, isxdigit};
use std::char;
use std::cmp::min;

pub const ENTITY_MIN_LENGTH: usize = 2;
pub const ENTITY_MAX_LENGTH: usize = 31;

include!(concat!(env!("OUT_DIR"), "/entitydata.rs"));

/// Attempts to decode a single entity (numeric or named) starting right
/// after the `&` at the front of `text`. Returns the decoded UTF-8 bytes and
/// the number of bytes of `text` consumed (including the trailing `;`).
pub fn unescape(text: &[u8]) -> Option<(Vec<u8>, usize)> {
    if text.len() >= 3 && text[0] == b'#' {
        let mut codepoint: u32 = 0;
        let mut i;

        let num_digits = if text.len() > 1 && isdigit(text[1]) {
            i = 1;
            while i < text.len() && isdigit(text[i]) {
                codepoint = (codepoint * 10) + (text[i] as u32 - '0' as u32);
                codepoint = min(codepoint, 0x11_0000);
                i += 1;
            }
            i - 1
        } else if text.len() > 1 && (text[1] == b'x' || text[1] == b'X') {
            i = 2;
            while i < text.len() && isxdigit(text[i]) {
                codepoint = (codepoint * 16) + ((text[i] as u32 | 32) % 39 - 9);
                codepoint = min(codepoint, 0x11_0000);
                i += 1;
            }
            i - 2
        } else {
            0
        };

        if (1..=8).contains(&num_digits) && i < text.len() && text[i] == b';' {
            if codepoint == 0 || (0xD800..=0xDFFF).contains(&codepoint) || codepoint >= 0x110000 {
                codepoint = 0xFFFD;
            }
            return Some((
                char::from_u32(codepoint)
                    .unwrap_or('\u{FFFD}')
                    .to_string()
                    .into_bytes(),
                i + 1,
            ));
        }
    }

    let size = min(text.len(), ENTITY_MAX_LENGTH);
    for i in ENTITY_MIN_LENGTH..size {
        if text[i] == b' ' {
            return None;
        }

        if text[i] == b';' {
            return lookup(&text[..i]).map(|e| (e.as_bytes().to_vec(), i + 1));
        }
    }

    None
}

fn lookup(name: &[u8]) -> Option<&'static str> {
    let name = std::str::from_utf8(name).ok()?;
    entitydata::TRANSLATED_ENTITIES
        .binary_search_by_key(&name, |&(n, _)| n)
        .ok()
        .map(|idx| entitydata::TRANSLATED_ENTITIES[idx].1)
}

/// Replaces every entity reference in `src` with its decoded form, passing
/// through anything that doesn't parse as one (a lone `&` stays a `&`).
pub fn unescape_html(src: &[u8]) -> Vec<u8> {
    let size = src.len();
    let mut i = 0;
    let mut v = Vec::with_capacity(size);

    while i < size {
        let org = i;
        while i < size && src[i] != b'&' {
            i += 1;
        }

        if i > org {
            if org == 0 && i >= size {
                return src.to_vec();
            }
            v.extend_from_slice(&src[org..i]);
        }

        if i >= size {
            return v;
        }

        i += 1;
        match unescape(&src[i..]) {
            Some((chs, consumed)) => {
                v.extend_from_slice(&chs);
                i += consumed;
            }
            None => v.push(b'&'),
        }
    }

    v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_named_entity() {
        let (bytes, len) = unescape(b"amp;rest").unwrap();
        assert_eq!(bytes, b"&");
        assert_eq!(len, 4);
    }

    #[test]
    fn decodes_decimal_and_hex() {
        assert_eq!(unescape(b"65;").unwrap().0, b"A");
        assert_eq!(unescape(b"x41;").unwrap().0, b"A");
    }

    #[test]
    fn invalid_codepoint_becomes_replacement_char() {
        let (bytes, _) = unescape(b"xD800;").unwrap();
        assert_eq!(bytes, "\u{FFFD}".as_bytes());
    }

    #[test]
    fn unescape_html_passes_through_bare_ampersand() {
        assert_eq!(unescape_html(b"a & b"), b"a & b");
        assert_eq!(unescape_html(b"a &amp; b"), b"a & b");
    }
}
