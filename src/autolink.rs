//! The GitHub-autolink text plugin (id 1, spec §4.4.8): scans a `Text`
//! item's content for bare URLs, `www.` URLs, and email addresses, and
//! splits matches out into `Link` items, leaving the surrounding text as
//! sibling `Text` items.
//!
//! Ported from the GFM autolink-extension algorithm (`www_match`/
//! `url_match`/`email_match`/`check_domain`/`autolink_delim`), adapted from
//! byte-indexed `&str` scanning to `char`-indexed scanning over a slice
//! that is paired one-for-one with the virgin column each character came
//! from, since this plugin runs after the Text item's content (and its
//! column mapping) already exist rather than over a raw source byte buffer.

use crate::ctype::{isalnum, isalpha, is_unicode_punctuation, is_unicode_whitespace};
use crate::node::{Item, Position, TextOpts};

const WWW_DELIMS: &[char] = &['*', '_', '~', '(', '['];
const LINK_END_ASSORTMENT: &[char] = &['?', '!', '.', ',', ':', '*', '_', '~', '\'', '"'];

struct Match {
    /// Index into `chars` where the match starts.
    start: usize,
    /// Index into `chars` just past the match.
    end: usize,
    url: String,
    label: String,
}

/// Splits `chars` (all on virgin `line`, with `columns[i]` the virgin
/// column of `chars[i]`) into a run of `Text`/`Link` items. Returns a
/// single-element vec (the original text, unsplit) when nothing matches.
pub fn apply_autolinks(chars: &[char], columns: &[i64], line: i64, opts: TextOpts) -> Vec<Item> {
    debug_assert_eq!(chars.len(), columns.len());
    let mut out = Vec::new();
    let mut cursor = 0usize;

    while cursor < chars.len() {
        match find_first_match(chars, cursor) {
            Some(m) => {
                if m.start > cursor {
                    out.push(text_item(chars, columns, line, cursor, m.start, opts));
                }
                out.push(Item::Link {
                    position: span(columns, line, m.start, m.end),
                    text: m.label.clone(),
                    url: m.url,
                    image: None,
                    opts: TextOpts::NONE,
                    text_position: span(columns, line, m.start, m.end),
                    url_position: Position::unset(),
                });
                cursor = m.end;
            }
            None => {
                out.push(text_item(chars, columns, line, cursor, chars.len(), opts));
                break;
            }
        }
    }

    if out.is_empty() {
        out.push(text_item(chars, columns, line, 0, chars.len(), opts));
    }
    out
}

fn text_item(chars: &[char], columns: &[i64], line: i64, start: usize, end: usize, opts: TextOpts) -> Item {
    Item::Text {
        position: span(columns, line, start, end),
        text: chars[start..end].iter().collect(),
        opts,
        space_before: false,
        space_after: false,
        open_styles: Vec::new(),
        close_styles: Vec::new(),
    }
}

fn span(columns: &[i64], line: i64, start: usize, end: usize) -> Position {
    if start >= end || end > columns.len() {
        return Position::unset();
    }
    Position::new(line, columns[start], line, columns[end - 1])
}

fn find_first_match(chars: &[char], from: usize) -> Option<Match> {
    let mut i = from;
    while i < chars.len() {
        match chars[i] {
            ':' => {
                if let Some(m) = url_match(chars, i) {
                    return Some(m);
                }
            }
            'w' => {
                if let Some(m) = www_match(chars, i) {
                    return Some(m);
                }
            }
            '@' => {
                if let Some(m) = email_match(chars, i) {
                    return Some(m);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

fn www_match(chars: &[char], i: usize) -> Option<Match> {
    if i > 0 && !is_unicode_whitespace(chars[i - 1]) && !WWW_DELIMS.contains(&chars[i - 1]) {
        return None;
    }
    if chars.len() - i < 4 || &chars[i..i + 4] != ['w', 'w', 'w', '.'] {
        return None;
    }

    let mut link_end = check_domain(&chars[i..])?;
    while i + link_end < chars.len() && !is_unicode_whitespace(chars[i + link_end]) {
        link_end += 1;
    }
    link_end = autolink_delim(&chars[i..], link_end);

    let label: String = chars[i..i + link_end].iter().collect();
    Some(Match {
        start: i,
        end: i + link_end,
        url: format!("http://{}", label),
        label,
    })
}

fn check_domain(data: &[char]) -> Option<usize> {
    let mut np = 0;
    let mut uscore1 = 0;
    let mut uscore2 = 0;

    for (i, &c) in data.iter().enumerate() {
        if c == '_' {
            uscore2 += 1;
        } else if c == '.' {
            uscore1 = uscore2;
            uscore2 = 0;
            np += 1;
        } else if !is_valid_hostchar(c) && c != '-' {
            if uscore1 == 0 && uscore2 == 0 && np > 0 {
                return Some(i);
            }
            return None;
        }
    }

    if uscore1 == 0 && uscore2 == 0 && np > 0 {
        Some(data.len())
    } else {
        None
    }
}

fn is_valid_hostchar(ch: char) -> bool {
    !ch.is_whitespace() && !is_unicode_punctuation(ch)
}

fn autolink_delim(data: &[char], mut link_end: usize) -> usize {
    for (i, &c) in data[..link_end].iter().enumerate() {
        if c == '<' {
            link_end = i;
            break;
        }
    }

    while link_end > 0 {
        let cclose = data[link_end - 1];
        let copen = if cclose == ')' { Some('(') } else { None };

        if LINK_END_ASSORTMENT.contains(&cclose) {
            link_end -= 1;
        } else if cclose == ';' {
            let mut new_end = link_end.saturating_sub(2);
            while new_end > 0 && isalpha(data[new_end] as u32 as u8) {
                new_end -= 1;
            }
            if new_end < link_end.saturating_sub(2) && data[new_end] == '&' {
                link_end = new_end;
            } else {
                link_end -= 1;
            }
        } else if let Some(copen) = copen {
            let opening = data[..link_end].iter().filter(|&&c| c == copen).count();
            let closing = data[..link_end].iter().filter(|&&c| c == cclose).count();
            if closing <= opening {
                break;
            }
            link_end -= 1;
        } else {
            break;
        }
    }

    link_end
}

fn url_match(chars: &[char], i: usize) -> Option<Match> {
    let size = chars.len();
    if size - i < 4 || chars[i + 1] != '/' || chars[i + 2] != '/' {
        return None;
    }

    let mut rewind = 0;
    while rewind < i && chars[i - rewind - 1].is_ascii_alphabetic() {
        rewind += 1;
    }

    let scheme_chars = &chars[i - rewind..i];
    let matches_scheme = crate::scanners::scheme_prefix(
        &scheme_chars
            .iter()
            .collect::<String>()
            .into_bytes(),
    )
    .is_some();
    if !matches_scheme {
        return None;
    }

    let mut link_end = check_domain(&chars[i + 3..])?;
    while i + 3 + link_end < size && !is_unicode_whitespace(chars[i + 3 + link_end]) {
        link_end += 1;
    }
    link_end += 3;
    link_end = autolink_delim(&chars[i..], link_end);

    let url: String = chars[i - rewind..i + link_end].iter().collect();
    Some(Match {
        start: i - rewind,
        end: i + link_end,
        label: url.clone(),
        url,
    })
}

const EMAIL_OK_SET: &[char] = &['.', '+', '-', '_'];

fn email_match(chars: &[char], i: usize) -> Option<Match> {
    let size = chars.len();

    let mut rewind = 0;
    let mut slashes = 0;
    while rewind < i {
        let c = chars[i - rewind - 1];
        if isalnum(c as u32 as u8) || EMAIL_OK_SET.contains(&c) {
            rewind += 1;
            continue;
        }
        if c == '/' {
            slashes += 1;
        }
        break;
    }
    if rewind == 0 || slashes > 0 {
        return None;
    }

    let mut link_end = 0;
    let mut at_count = 0;
    let mut dot_count = 0;
    while link_end < size - i {
        let c = chars[i + link_end];
        if isalnum(c as u32 as u8) {
            // fine
        } else if c == '@' {
            at_count += 1;
        } else if c == '.' && link_end < size - i - 1 {
            dot_count += 1;
        } else if c != '-' && c != '_' {
            break;
        }
        link_end += 1;
    }

    if link_end < 2
        || at_count != 1
        || dot_count == 0
        || !(isalpha(chars[i + link_end - 1] as u32 as u8) || chars[i + link_end - 1] == '.')
    {
        return None;
    }

    link_end = autolink_delim(&chars[i..], link_end);
    let label: String = chars[i - rewind..i + link_end].iter().collect();
    Some(Match {
        start: i - rewind,
        end: i + link_end,
        url: format!("mailto:{}", label),
        label,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(n: usize) -> Vec<i64> {
        (0..n as i64).collect()
    }

    #[test]
    fn plain_text_is_unsplit() {
        let chars: Vec<char> = "no links here".chars().collect();
        let c = cols(chars.len());
        let items = apply_autolinks(&chars, &c, 0, TextOpts::NONE);
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Item::Text { .. }));
    }

    #[test]
    fn bare_url_becomes_link() {
        let chars: Vec<char> = "see http://example.com here".chars().collect();
        let c = cols(chars.len());
        let items = apply_autolinks(&chars, &c, 0, TextOpts::NONE);
        assert!(items.iter().any(|i| matches!(i, Item::Link{url, ..} if url == "http://example.com")));
    }

    #[test]
    fn www_prefix_upgrades_to_http() {
        let chars: Vec<char> = "www.example.com".chars().collect();
        let c = cols(chars.len());
        let items = apply_autolinks(&chars, &c, 0, TextOpts::NONE);
        assert!(items.iter().any(|i| matches!(i, Item::Link{url, ..} if url == "http://www.example.com")));
    }

    #[test]
    fn email_becomes_mailto_link() {
        let chars: Vec<char> = "contact me@example.com today".chars().collect();
        let c = cols(chars.len());
        let items = apply_autolinks(&chars, &c, 0, TextOpts::NONE);
        assert!(items.iter().any(|i| matches!(i, Item::Link{url, ..} if url == "mailto:me@example.com")));
    }
}
