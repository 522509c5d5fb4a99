//! Hand-rolled byte-level scanners for the block- and inline-level grammar
//! productions CommonMark/GFM define syntactically: ATX/setext headings,
//! fences, HTML-block open/close shapes, thematic breaks, footnote
//! definitions, autolink schemes, table delimiter rows, and the generic
//! HTML tag shape shared by the block and inline HTML-detection paths
//! (spec §9's "single HTML-tag lexer" design note).
//!
//! Each scanner takes a byte slice (already tab-expanded and without its
//! line terminator) and returns the offset just past what it matched, or
//! `None`. They are written directly against the grammar productions
//! instead of through a parser-generator.

use crate::ctype::{isalnum, isalpha, isdigit, ispunct, isspace};

fn skip_spaces(line: &[u8], mut i: usize) -> usize {
    while i < line.len() && (line[i] == b' ' || line[i] == b'\t') {
        i += 1;
    }
    i
}

/// `#{1,6}` followed by a space, tab, or end of line. Returns the offset
/// just past the run of `#`s plus the following space, or `None`.
pub fn atx_heading_start(line: &[u8]) -> Option<usize> {
    if line.first() != Some(&b'#') {
        return None;
    }
    let mut i = 0;
    while i < line.len() && line[i] == b'#' {
        i += 1;
    }
    if i == 0 || i > 6 {
        return None;
    }
    if i == line.len() {
        return Some(i);
    }
    if line[i] == b' ' || line[i] == b'\t' {
        Some(i + 1)
    } else {
        None
    }
}

/// A run of `` ` `` or `~` of length >= 3, opening a fenced code block.
/// Returns `(fence_char, fence_length, offset_past_fence)`.
pub fn open_code_fence(line: &[u8]) -> Option<(u8, usize, usize)> {
    let c = *line.first()?;
    if c != b'`' && c != b'~' {
        return None;
    }
    let mut i = 0;
    while i < line.len() && line[i] == c {
        i += 1;
    }
    if i < 3 {
        return None;
    }
    // backtick fences forbid a backtick in the info string.
    if c == b'`' && line[i..].contains(&b'`') {
        return None;
    }
    Some((c, i, i))
}

/// A closing fence: same character, length >= the opening fence's length,
/// and nothing but that run (plus trailing spaces) on the line.
pub fn close_code_fence(line: &[u8], fence_char: u8, min_len: usize) -> bool {
    let indent = skip_spaces(line, 0);
    if indent > 3 {
        return false;
    }
    let mut i = indent;
    while i < line.len() && line[i] == fence_char {
        i += 1;
    }
    let run = i - indent;
    if run < 3 || run < min_len {
        return false;
    }
    line[i..].iter().all(|&b| b == b' ' || b == b'\t')
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetextChar {
    Equals,
    Hyphen,
}

/// `===` or `---`, optionally followed by trailing spaces, nothing else.
pub fn setext_heading_line(line: &[u8]) -> Option<SetextChar> {
    let indent = skip_spaces(line, 0);
    if indent > 3 {
        return None;
    }
    let c = *line.get(indent)?;
    if c != b'=' && c != b'-' {
        return None;
    }
    let mut i = indent;
    while i < line.len() && line[i] == c {
        i += 1;
    }
    if !line[i..].iter().all(|&b| b == b' ' || b == b'\t') {
        return None;
    }
    Some(if c == b'=' {
        SetextChar::Equals
    } else {
        SetextChar::Hyphen
    })
}

/// `>= 3` of `*`, `-`, or `_`, the same character throughout, optionally
/// separated by spaces/tabs, nothing else on the line.
pub fn thematic_break(line: &[u8]) -> bool {
    let indent = skip_spaces(line, 0);
    if indent > 3 {
        return false;
    }
    let mut count = 0;
    let mut marker = 0u8;
    for &b in &line[indent..] {
        match b {
            b'*' | b'-' | b'_' => {
                if marker == 0 {
                    marker = b;
                } else if marker != b {
                    return false;
                }
                count += 1;
            }
            b' ' | b'\t' => {}
            _ => return false,
        }
    }
    count >= 3
}

const HTML_BLOCK_TAGS_6: &[&str] = &[
    "address", "article", "aside", "base", "basefont", "blockquote", "body", "caption", "center",
    "col", "colgroup", "dd", "details", "dialog", "dir", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "footer", "form", "frame", "frameset", "h1", "h2", "h3", "h4", "h5",
    "h6", "head", "header", "hr", "html", "iframe", "legend", "li", "link", "main", "menu",
    "menuitem", "nav", "noframes", "ol", "optgroup", "option", "p", "param", "search", "section",
    "summary", "table", "tbody", "td", "tfoot", "th", "thead", "title", "tr", "track", "ul",
];

const HTML_RAW_TAGS_1: &[&str] = &["pre", "script", "style", "textarea"];

fn ascii_lower(b: u8) -> u8 {
    b.to_ascii_lowercase()
}

fn starts_with_ci(line: &[u8], needle: &str) -> bool {
    let needle = needle.as_bytes();
    line.len() >= needle.len() && line[..needle.len()].iter().zip(needle).all(|(&a, &b)| ascii_lower(a) == b)
}

fn tag_name_at(line: &[u8], mut i: usize) -> Option<(String, usize)> {
    let start = i;
    while i < line.len() && (isalnum(line[i]) || line[i] == b'-') {
        i += 1;
    }
    if i == start {
        return None;
    }
    Some((String::from_utf8_lossy(&line[start..i]).to_lowercase(), i))
}

/// Classifies the opening of an HTML block, rules 1-6. Rule 7 is handled
/// separately by [`html_block_start_7`] since it additionally requires the
/// rest of the line to be blank.
pub fn html_block_start(line: &[u8]) -> Option<u8> {
    if line.first() != Some(&b'<') {
        return None;
    }

    for tag in HTML_RAW_TAGS_1 {
        if starts_with_ci(&line[1..], tag) {
            let after = 1 + tag.len();
            let ok_boundary = line.get(after).map_or(true, |&b| {
                isspace(b) || b == b'>' || (b == b'/' && line.get(after + 1) == Some(&b'>'))
            });
            if ok_boundary {
                return Some(1);
            }
        }
    }

    if line.starts_with(b"<!--") {
        return Some(2);
    }
    if line.starts_with(b"<?") {
        return Some(3);
    }
    if line.len() > 2 && line[1] == b'!' && line[2].is_ascii_uppercase() {
        return Some(4);
    }
    if line.starts_with(b"<![CDATA[") {
        return Some(5);
    }

    let (rest, closing) = if line.get(1) == Some(&b'/') {
        (&line[2..], true)
    } else {
        (&line[1..], false)
    };
    if let Some((name, after)) = tag_name_at(rest, 0) {
        if HTML_BLOCK_TAGS_6.contains(&name.as_str()) {
            let abs_after = after + if closing { 2 } else { 1 };
            let boundary_ok = line.get(abs_after).map_or(true, |&b| {
                isspace(b) || b == b'>' || (b == b'/' && line.get(abs_after + 1) == Some(&b'>'))
            });
            if boundary_ok {
                return Some(6);
            }
        }
    }

    None
}

pub fn html_block_end(line: &[u8], rule: u8) -> bool {
    match rule {
        1 => {
            let lower = String::from_utf8_lossy(line).to_lowercase();
            lower.contains("</script>") || lower.contains("</pre>") || lower.contains("</style>")
        }
        2 => contains(line, b"-->"),
        3 => contains(line, b"?>"),
        4 => line.contains(&b'>'),
        5 => contains(line, b"]]>"),
        _ => false,
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Rule 7: any other complete open or close tag, alone on its line aside
/// from trailing whitespace.
pub fn html_block_start_7(line: &[u8]) -> bool {
    match html_tag_shape(line, 0) {
        Some(end) => line[end..].iter().all(|&b| b == b' ' || b == b'\t'),
        None => false,
    }
}

/// The single shared HTML-tag recognizer used by both the block segmenter
/// (rule 6/7 detection) and the inline raw-HTML/autolink path (spec §9).
/// Recognizes an open tag, a closing tag, an HTML comment, a processing
/// instruction, a declaration, or a CDATA section starting at `line[i]`.
/// Returns the offset just past the match.
pub fn html_tag_shape(line: &[u8], i: usize) -> Option<usize> {
    if line.get(i) != Some(&b'<') {
        return None;
    }
    if line[i..].starts_with(b"<!--") {
        let rel = find_from(&line[i..], b"-->")?;
        return Some(i + rel + 3);
    }
    if line[i..].starts_with(b"<?") {
        let rel = find_from(&line[i..], b"?>")?;
        return Some(i + rel + 2);
    }
    if line[i..].starts_with(b"<![CDATA[") {
        let rel = find_from(&line[i..], b"]]>")?;
        return Some(i + rel + 3);
    }
    if line.get(i + 1) == Some(&b'!') && line.get(i + 2).map_or(false, |b| b.is_ascii_uppercase()) {
        let rel = line[i..].iter().position(|&b| b == b'>')?;
        return Some(i + rel + 1);
    }
    if line.get(i + 1) == Some(&b'/') {
        let (_, after) = tag_name_at(line, i + 2)?;
        let after = skip_spaces(line, after);
        if line.get(after) == Some(&b'>') {
            return Some(after + 1);
        }
        return None;
    }
    // open tag: name, then attributes, then optional '/', then '>'.
    let (_, mut after) = tag_name_at(line, i + 1)?;
    loop {
        let before_ws = after;
        after = skip_spaces(line, after);
        if line.get(after) == Some(&b'/') {
            if line.get(after + 1) == Some(&b'>') {
                return Some(after + 2);
            }
            return None;
        }
        if line.get(after) == Some(&b'>') {
            return Some(after + 1);
        }
        if after == before_ws {
            return None; // no whitespace before the next attribute/terminator
        }
        match scan_attribute(line, after) {
            Some(next) => after = next,
            None => return None,
        }
    }
}

fn scan_attribute(line: &[u8], i: usize) -> Option<usize> {
    let start = i;
    let mut i = i;
    if i >= line.len() || !(isalpha(line[i]) || line[i] == b'_' || line[i] == b':') {
        return None;
    }
    while i < line.len() && (isalnum(line[i]) || matches!(line[i], b'_' | b':' | b'.' | b'-')) {
        i += 1;
    }
    if i == start {
        return None;
    }
    let after_name = skip_spaces(line, i);
    if line.get(after_name) != Some(&b'=') {
        return Some(i); // valueless attribute
    }
    let after_eq = skip_spaces(line, after_name + 1);
    match line.get(after_eq) {
        Some(&q @ (b'"' | b'\'')) => {
            let rel = line[after_eq + 1..].iter().position(|&b| b == q)?;
            Some(after_eq + 1 + rel + 1)
        }
        Some(_) => {
            let mut j = after_eq;
            while j < line.len() && !isspace(line[j]) && !matches!(line[j], b'"' | b'\'' | b'=' | b'<' | b'>' | b'`') {
                j += 1;
            }
            if j == after_eq {
                None
            } else {
                Some(j)
            }
        }
        None => None,
    }
}

fn find_from(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// `[^label]:` at indent < 4, non-empty non-space label. Returns the offset
/// just past the closing `:`.
pub fn footnote_definition(line: &[u8]) -> Option<(String, usize)> {
    let indent = skip_spaces(line, 0);
    if indent > 3 {
        return None;
    }
    if !line[indent..].starts_with(b"[^") {
        return None;
    }
    let label_start = indent + 2;
    let close = line[label_start..].iter().position(|&b| b == b']')?;
    if close == 0 {
        return None;
    }
    let label = &line[label_start..label_start + close];
    if label.iter().all(|&b| isspace(b)) {
        return None;
    }
    let after_bracket = label_start + close + 1;
    if line.get(after_bracket) != Some(&b':') {
        return None;
    }
    Some((
        String::from_utf8_lossy(label).into_owned(),
        after_bracket + 1,
    ))
}

const SCHEMES: &[&str] = &[
    "http", "https", "ftp", "ftps", "mailto", "file", "data", "irc", "news", "gopher", "nntp",
    "telnet", "ws", "wss",
];

/// A URI scheme (`letter (letter|digit|+|-|.){1,31}` then `:`) at the start
/// of `line`. Returns the offset past the `:`.
pub fn scheme(line: &[u8]) -> Option<usize> {
    let first = *line.first()?;
    if !first.is_ascii_alphabetic() {
        return None;
    }
    let mut i = 1;
    while i < line.len() && i <= 32 && matches!(line[i], b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'+' | b'-' | b'.') {
        i += 1;
    }
    if !(2..=33).contains(&i) {
        return None;
    }
    if line.get(i) == Some(&b':') {
        Some(i + 1)
    } else {
        None
    }
}

/// An absolute URI inside `<...>`: `scheme:` then no spaces/control
/// characters/`<`/`>` up to the closing `>`. Returns the offset of the
/// closing `>` (exclusive of it) on success.
pub fn autolink_uri(inner: &[u8]) -> Option<usize> {
    let after_scheme = scheme(inner)?;
    let mut i = after_scheme;
    while i < inner.len() {
        match inner[i] {
            b'<' | b'>' => return None,
            b if isspace(b) => return None,
            _ => i += 1,
        }
    }
    Some(i)
}

fn is_valid_hostchar(b: u8) -> bool {
    !isspace(b) && !ispunct(b) || b == b'-' || b == b'.'
}

/// A bare scheme check used by the GitHub-autolink plugin, which is looser
/// than [`autolink_uri`] (no enclosing `<...>`).
pub fn scheme_prefix<'a>(text: &'a [u8]) -> Option<&'a str> {
    for s in SCHEMES {
        if starts_with_ci(text, s) && text.get(s.len()) == Some(&b':') {
            return Some(s);
        }
    }
    None
}

/// An email address inside `<...>`: CommonMark's restricted grammar (no
/// general RFC-5322 parsing). Returns the offset of the closing `>`.
pub fn autolink_email(inner: &[u8]) -> Option<usize> {
    let mut i = 0;
    while i < inner.len()
        && (isalnum(inner[i]) || matches!(inner[i], b'.' | b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'/' | b'=' | b'?' | b'^' | b'_' | b'`' | b'{' | b'|' | b'}' | b'~' | b'-'))
    {
        i += 1;
    }
    if i == 0 || inner.get(i) != Some(&b'@') {
        return None;
    }
    i += 1;
    let label_start = i;
    loop {
        let seg_start = i;
        while i < inner.len() && (isalnum(inner[i]) || inner[i] == b'-') {
            i += 1;
        }
        if i == seg_start {
            return None;
        }
        if inner.get(i) == Some(&b'.') {
            i += 1;
            continue;
        }
        break;
    }
    if i == label_start {
        return None;
    }
    Some(i)
}

pub fn is_valid_domain_char(b: u8) -> bool {
    is_valid_hostchar(b)
}

/// A pipe-separated table delimiter row: cells of `:?-+:?` separated by
/// `|`, at least one hyphen per cell. Returns the number of cells and their
/// alignments if it matches.
pub fn table_delimiter_row(line: &[u8]) -> Option<Vec<crate::node::TableAlignment>> {
    use crate::node::TableAlignment;
    let trimmed = trim_ascii(line);
    let trimmed = trimmed.strip_prefix(b"|").unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix(b"|").unwrap_or(trimmed);
    if trimmed.is_empty() {
        return None;
    }
    let mut alignments = Vec::new();
    for raw_cell in split_unescaped_pipes(trimmed) {
        let cell = trim_ascii(&raw_cell);
        if cell.is_empty() {
            return None;
        }
        let left = cell.first() == Some(&b':');
        let right = cell.last() == Some(&b':');
        let inner = {
            let s = if left { &cell[1..] } else { cell };
            if right && !s.is_empty() {
                &s[..s.len() - 1]
            } else {
                s
            }
        };
        if inner.is_empty() || !inner.iter().all(|&b| b == b'-') {
            return None;
        }
        alignments.push(match (left, right) {
            (true, true) => TableAlignment::Center,
            (true, false) => TableAlignment::Left,
            (false, true) => TableAlignment::Right,
            (false, false) => TableAlignment::None,
        });
    }
    if alignments.is_empty() {
        None
    } else {
        Some(alignments)
    }
}

/// Splits a table row on unescaped `|`, consistent with
/// `parser::table::row`'s cell splitting.
pub fn split_unescaped_pipes(line: &[u8]) -> Vec<Vec<u8>> {
    let mut cells = Vec::new();
    let mut current = Vec::new();
    let mut i = 0;
    while i < line.len() {
        if line[i] == b'\\' && i + 1 < line.len() && line[i + 1] == b'|' {
            current.push(b'|');
            i += 2;
            continue;
        }
        if line[i] == b'|' {
            cells.push(std::mem::take(&mut current));
            i += 1;
            continue;
        }
        current.push(line[i]);
        i += 1;
    }
    cells.push(current);
    cells
}

fn trim_ascii(s: &[u8]) -> &[u8] {
    let start = s.iter().position(|&b| !isspace(b)).unwrap_or(s.len());
    let end = s.iter().rposition(|&b| !isspace(b)).map_or(start, |p| p + 1);
    &s[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atx_heading_requires_space_or_eol() {
        assert_eq!(atx_heading_start(b"# hi"), Some(2));
        assert_eq!(atx_heading_start(b"#"), Some(1));
        assert_eq!(atx_heading_start(b"#hi"), None);
        assert_eq!(atx_heading_start(b"####### hi"), None);
    }

    #[test]
    fn fences_match_char_and_length() {
        let (c, len, _) = open_code_fence(b"```py").unwrap();
        assert_eq!((c, len), (b'`', 3));
        assert!(close_code_fence(b"```", b'`', 3));
        assert!(close_code_fence(b"````", b'`', 3));
        assert!(!close_code_fence(b"``", b'`', 3));
        assert!(!close_code_fence(b"~~~", b'`', 3));
    }

    #[test]
    fn thematic_break_requires_three_same_char() {
        assert!(thematic_break(b"***"));
        assert!(thematic_break(b"- - -"));
        assert!(!thematic_break(b"**"));
        assert!(!thematic_break(b"*-*"));
    }

    #[test]
    fn setext_lines_distinguish_level() {
        assert_eq!(setext_heading_line(b"==="), Some(SetextChar::Equals));
        assert_eq!(setext_heading_line(b"---"), Some(SetextChar::Hyphen));
        assert_eq!(setext_heading_line(b"-x-"), None);
    }

    #[test]
    fn html_block_rules_recognized() {
        assert_eq!(html_block_start(b"<pre>"), Some(1));
        assert_eq!(html_block_start(b"<!-- c -->"), Some(2));
        assert_eq!(html_block_start(b"<?php"), Some(3));
        assert_eq!(html_block_start(b"<!DOCTYPE html>"), Some(4));
        assert_eq!(html_block_start(b"<![CDATA[x]]>"), Some(5));
        assert_eq!(html_block_start(b"<div>"), Some(6));
        assert_eq!(html_block_start(b"<xyz>"), None);
    }

    #[test]
    fn html_tag_shape_matches_simple_open_and_close_tags() {
        assert_eq!(html_tag_shape(b"<a>", 0), Some(3));
        assert_eq!(html_tag_shape(b"<a href=\"x\">", 0), Some(12));
        assert_eq!(html_tag_shape(b"</a>", 0), Some(4));
        assert_eq!(html_tag_shape(b"<br/>", 0), Some(5));
        assert!(html_block_start_7(b"<a>"));
        assert!(!html_block_start_7(b"<a> trailing text"));
    }

    #[test]
    fn footnote_definition_start_requires_label() {
        assert_eq!(
            footnote_definition(b"[^1]: text"),
            Some(("1".to_string(), 5))
        );
        assert_eq!(footnote_definition(b"[^]: text"), None);
    }

    #[test]
    fn autolink_scans_uri_and_email() {
        assert_eq!(autolink_uri(b"http://example.com"), Some(18));
        assert_eq!(autolink_email(b"a@b.com"), Some(7));
    }

    #[test]
    fn table_delimiter_row_extracts_alignments() {
        use crate::node::TableAlignment;
        let aligns = table_delimiter_row(b"| :-- | --: | :-: | --- |").unwrap();
        assert_eq!(
            aligns,
            vec![
                TableAlignment::Left,
                TableAlignment::Right,
                TableAlignment::Center,
                TableAlignment::None,
            ]
        );
    }
}
