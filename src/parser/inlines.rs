//! C4: InlineParser. Turns one block's `Fragment` (a run of tab-expanded
//! `VirginString` lines) into the flat `Vec<Item>` CommonMark/GFM inline
//! grammar describes: delimiter-run collection and rule-of-three emphasis
//! resolution, link/image bracket matching, code and math spans, autolinks
//! and raw HTML, and footnote references. Built around the
//! `process_emphasis`/`push_delimiter`/`insert_emph`/`handle_dollars`/
//! bracket-handling family of operations, adapted from an arena of
//! `AstNode`s threaded through a delimiter stack to a flat `Vec<Item>` that
//! delimiters reference by index.
//!
//! `Link`/`Image` hold `text: String`, not nested items (per the data model
//! already fixed in `node.rs`), so a bracketed label's content is flattened
//! to plain text at resolution time; any emphasis markup still literally
//! inside an unresolved label at that point survives as literal characters.
//! This is a deliberate simplification relative to a fully nested label
//! representation, acceptable because this crate's job is structure and
//! position, not rendering.
//!
//! The GitHub-autolink plugin (spec §4.4.8) is applied at text-buffer-flush
//! time rather than as a true second pass over finished `Text` items: since
//! it only ever splits one `Text` into a `Text`/`Link`/`Text` run and
//! emphasis resolution only toggles an opts bit across whichever `Text`
//! items land in a delimiter's span, running it earlier produces the same
//! result with much simpler bookkeeping.

use crate::autolink;
use crate::ctype::{is_unicode_punctuation, is_unicode_whitespace};
use crate::entity;
use crate::node::{normalize_label_key, Item, LabelMap, Position, StyleDelim, TextOpts};
use crate::parser::math;
use crate::parser::options::Extension;
use crate::scanners;
use crate::strings::VirginString;

/// The reference tables an emission pass consults; populated by the
/// `ReferenceHarvester` pre-pass (`parser::mod`) before any `Item` is built.
pub struct RefTables<'a> {
    pub links: &'a LabelMap<Item>,
    pub footnotes: &'a LabelMap<Item>,
}

pub struct InlineContext<'a> {
    pub refs: RefTables<'a>,
    pub ext: &'a Extension,
    pub working_directory: &'a str,
    pub file: &'a str,
}

struct Flat {
    chars: Vec<char>,
    cols: Vec<i64>,
    lines: Vec<i64>,
    /// `true` at the index of a `'\n'` sentinel that represents a hard
    /// (two-trailing-spaces or backslash) line break.
    hard: Vec<bool>,
}

/// Joins fragment lines into one char stream, inserting a `'\n'` sentinel
/// between consecutive lines (its own "column" is meaningless) and
/// stripping the trailing-space/backslash marker that makes a break hard
/// rather than soft.
fn flatten(lines: &[VirginString], line_base: i64) -> Flat {
    let mut f = Flat {
        chars: Vec::new(),
        cols: Vec::new(),
        lines: Vec::new(),
        hard: Vec::new(),
    };

    for (idx, line) in lines.iter().enumerate() {
        let chars = line.as_chars();
        let mut content_len = chars.len();
        let mut is_hard = false;

        if idx + 1 < lines.len() {
            let mut trailing_spaces = 0usize;
            while content_len > 0 && chars[content_len - 1] == ' ' {
                trailing_spaces += 1;
                content_len -= 1;
            }
            if trailing_spaces >= 2 {
                is_hard = true;
            } else {
                content_len += trailing_spaces;
                if content_len > 0 && chars[content_len - 1] == '\\' {
                    is_hard = true;
                    content_len -= 1;
                }
            }
        }

        for i in 0..content_len {
            f.chars.push(chars[i]);
            f.cols.push(line.virgin_pos(i as i64));
            f.lines.push(line_base + idx as i64);
            f.hard.push(false);
        }

        if idx + 1 < lines.len() {
            f.chars.push('\n');
            f.cols.push(-1);
            f.lines.push(line_base + idx as i64);
            f.hard.push(is_hard);
        }
    }

    f
}

#[derive(Clone)]
struct Delim {
    item_idx: usize,
    ch: char,
    len: usize,
    can_open: bool,
    can_close: bool,
}

struct Bracket {
    start_idx: usize,
    is_image: bool,
}

/// Parses the inline content of one fragment into a flat `Vec<Item>`.
pub fn parse_inlines(lines: &[VirginString], line_base: i64, ctx: &InlineContext) -> Vec<Item> {
    let flat = flatten(lines, line_base);
    let n = flat.chars.len();

    let mut out: Vec<Item> = Vec::new();
    let mut delims: Vec<Delim> = Vec::new();
    let mut brackets: Vec<Bracket> = Vec::new();

    let mut text_chars: Vec<char> = Vec::new();
    let mut text_cols: Vec<i64> = Vec::new();
    let mut text_line: i64 = -1;
    let mut pending_space_before = false;

    macro_rules! flush_text {
        () => {{
            if !text_chars.is_empty() {
                if ctx.ext.autolink {
                    let mut items =
                        autolink::apply_autolinks(&text_chars, &text_cols, text_line, TextOpts::NONE);
                    if let Some(Item::Text { space_before, .. }) = items.first_mut() {
                        *space_before = pending_space_before;
                    }
                    out.append(&mut items);
                } else {
                    let start_col = text_cols[0];
                    let end_col = *text_cols.last().unwrap();
                    out.push(Item::Text {
                        position: Position::new(text_line, start_col, text_line, end_col),
                        text: text_chars.iter().collect(),
                        opts: TextOpts::NONE,
                        space_before: pending_space_before,
                        space_after: false,
                        open_styles: Vec::new(),
                        close_styles: Vec::new(),
                    });
                }
                pending_space_before = false;
                text_chars.clear();
                text_cols.clear();
            }
        }};
    }

    macro_rules! push_char {
        ($ch:expr, $col:expr, $line:expr) => {{
            if text_chars.is_empty() {
                text_line = $line;
            }
            text_chars.push($ch);
            text_cols.push($col);
        }};
    }

    let mut i = 0usize;
    while i < n {
        let ch = flat.chars[i];
        let col = flat.cols[i];
        let line = flat.lines[i];

        match ch {
            '\n' => {
                flush_text!();
                mark_space_after(&mut out);
                if flat.hard[i] {
                    out.push(Item::LineBreak {
                        position: Position::new(line, col, line, col),
                    });
                } else {
                    pending_space_before = true;
                }
                i += 1;
            }
            '\\' if i + 1 < n && is_escapable(flat.chars[i + 1]) => {
                push_char!(flat.chars[i + 1], flat.cols[i + 1], flat.lines[i + 1]);
                i += 2;
            }
            '&' => {
                let rest: String = flat.chars[i + 1..].iter().take_while(|&&c| c != '\n').collect();
                match entity::unescape(rest.as_bytes()) {
                    Some((bytes, consumed)) => {
                        for c in String::from_utf8_lossy(&bytes).chars() {
                            push_char!(c, col, line);
                        }
                        i += 1 + consumed;
                    }
                    None => {
                        push_char!('&', col, line);
                        i += 1;
                    }
                }
            }
            '`' => {
                let run_end = scan_run(&flat.chars, i, '`');
                let run_len = run_end - i;
                match find_matching_run(&flat.chars, run_end, '`', run_len) {
                    Some(close_start) => {
                        flush_text!();
                        let close_end = close_start + run_len;
                        let mut content: Vec<char> = flat.chars[run_end..close_start]
                            .iter()
                            .map(|&c| if c == '\n' { ' ' } else { c })
                            .collect();
                        if content.len() >= 2
                            && content.first() == Some(&' ')
                            && content.last() == Some(&' ')
                            && content.iter().any(|&c| c != ' ')
                        {
                            content.remove(0);
                            content.pop();
                        }
                        out.push(Item::Code {
                            position: Position::new(line, col, flat.lines[close_end - 1], flat.cols[close_end - 1]),
                            text: content.into_iter().collect(),
                            is_inline: true,
                            fenced: false,
                            syntax: None,
                            syntax_position: Position::unset(),
                            start_delim: Position::new(line, col, line, flat.cols[run_end - 1]),
                            end_delim: Position::new(
                                flat.lines[close_start],
                                flat.cols[close_start],
                                flat.lines[close_end - 1],
                                flat.cols[close_end - 1],
                            ),
                        });
                        i = close_end;
                    }
                    None => {
                        for k in i..run_end {
                            push_char!(flat.chars[k], flat.cols[k], flat.lines[k]);
                        }
                        i = run_end;
                    }
                }
            }
            '$' if ctx.ext.math => {
                let run_end = scan_run(&flat.chars, i, '$');
                let run_len = (run_end - i).min(2);
                if run_len == 0 {
                    push_char!(ch, col, line);
                    i += 1;
                    continue;
                }
                match find_matching_run(&flat.chars, i + run_len, '$', run_len) {
                    Some(close_start) => {
                        flush_text!();
                        let close_end = close_start + run_len;
                        let content: String = flat.chars[i + run_len..close_start]
                            .iter()
                            .map(|&c| if c == '\n' { ' ' } else { c })
                            .collect();
                        let position = Position::new(line, col, flat.lines[close_end - 1], flat.cols[close_end - 1]);
                        out.push(math::make_math(position, content, run_len as u8, false));
                        i = close_end;
                    }
                    None => {
                        for k in i..run_end {
                            push_char!(flat.chars[k], flat.cols[k], flat.lines[k]);
                        }
                        i = run_end;
                    }
                }
            }
            '<' => {
                i = handle_angle_bracket(&flat, i, &mut out, &mut text_chars, &mut text_cols, &mut text_line);
            }
            '[' if ctx.ext.footnotes && flat.chars.get(i + 1) == Some(&'^') => {
                match find_close_bracket(&flat.chars, i + 2) {
                    Some(close) => {
                        let label: String = flat.chars[i + 2..close].iter().collect();
                        let key = normalize_label_key(&label, ctx.working_directory, ctx.file);
                        flush_text!();
                        if ctx.refs.footnotes.contains_key(&key) {
                            out.push(Item::FootnoteRef {
                                position: Position::new(line, col, flat.lines[close], flat.cols[close]),
                                id: label,
                            });
                        } else {
                            push_char!('[', col, line);
                            push_char!('^', flat.cols[i + 1], flat.lines[i + 1]);
                            for k in i + 2..=close {
                                push_char!(flat.chars[k], flat.cols[k], flat.lines[k]);
                            }
                        }
                        i = close + 1;
                    }
                    None => {
                        push_char!(ch, col, line);
                        i += 1;
                    }
                }
            }
            '!' if flat.chars.get(i + 1) == Some(&'[') => {
                flush_text!();
                brackets.push(Bracket {
                    start_idx: out.len(),
                    is_image: true,
                });
                i += 2;
            }
            '[' => {
                flush_text!();
                brackets.push(Bracket {
                    start_idx: out.len(),
                    is_image: false,
                });
                i += 1;
            }
            ']' => {
                flush_text!();
                match brackets.pop() {
                    None => {
                        push_char!(ch, col, line);
                        i += 1;
                    }
                    Some(bracket) => {
                        i = resolve_bracket(&flat, i, bracket, &mut out, &mut brackets, ctx);
                    }
                }
            }
            '*' | '_' | '~' => {
                let run_end = scan_run(&flat.chars, i, ch);
                let run_len = run_end - i;
                if ch == '~' && run_len != 2 {
                    for k in i..run_end {
                        push_char!(flat.chars[k], flat.cols[k], flat.lines[k]);
                    }
                    i = run_end;
                    continue;
                }
                flush_text!();
                let (can_open, can_close) = flanking(&flat.chars, i, run_end, ch);
                out.push(Item::Text {
                    position: Position::new(line, col, line, flat.cols[run_end - 1]),
                    text: ch.to_string().repeat(run_len),
                    opts: TextOpts::NONE,
                    space_before: pending_space_before,
                    space_after: false,
                    open_styles: Vec::new(),
                    close_styles: Vec::new(),
                });
                pending_space_before = false;
                delims.push(Delim {
                    item_idx: out.len() - 1,
                    ch,
                    len: run_len,
                    can_open,
                    can_close,
                });
                i = run_end;
            }
            _ => {
                push_char!(ch, col, line);
                i += 1;
            }
        }
    }

    flush_text!();
    process_emphasis(&mut out, &mut delims);
    out
}

fn is_escapable(ch: char) -> bool {
    ch.is_ascii_punctuation()
}

fn scan_run(chars: &[char], start: usize, ch: char) -> usize {
    let mut i = start;
    while i < chars.len() && chars[i] == ch {
        i += 1;
    }
    i
}

/// Finds a run of exactly `len` copies of `ch` at-or-after `from`, not part
/// of a longer run. Returns its start index.
fn find_matching_run(chars: &[char], from: usize, ch: char, len: usize) -> Option<usize> {
    let mut i = from;
    while i < chars.len() {
        if chars[i] == ch {
            let end = scan_run(chars, i, ch);
            if end - i == len {
                return Some(i);
            }
            i = end;
        } else {
            i += 1;
        }
    }
    None
}

fn mark_space_after(out: &mut [Item]) {
    if let Some(Item::Text { space_after, .. }) = out.last_mut() {
        *space_after = true;
    }
}

fn flanking(chars: &[char], start: usize, end: usize, ch: char) -> (bool, bool) {
    let prev = if start == 0 { None } else { Some(chars[start - 1]) };
    let next = chars.get(end).copied();
    let prev_ws = prev.map_or(true, is_unicode_whitespace);
    let next_ws = next.map_or(true, is_unicode_whitespace);
    let prev_punct = prev.map_or(false, is_unicode_punctuation);
    let next_punct = next.map_or(false, is_unicode_punctuation);

    let left = !next_ws && (!next_punct || prev_ws || prev_punct);
    let right = !prev_ws && (!prev_punct || next_ws || next_punct);

    if ch == '_' {
        let can_open = left && (!right || prev_punct);
        let can_close = right && (!left || next_punct);
        (can_open, can_close)
    } else {
        (left, right)
    }
}

fn rule_of_three_ok(open: &Delim, close: &Delim) -> bool {
    if open.ch == '~' {
        return true;
    }
    let both_flanking = open.can_open && open.can_close && close.can_open && close.can_close;
    if !both_flanking {
        return true;
    }
    let combined = open.len + close.len;
    !(combined % 3 == 0 && (open.len % 3 != 0 || close.len % 3 != 0))
}

/// Resolves the delimiter stack in place: walks closers left to right,
/// pairs each against the nearest eligible opener of the same flavor, and
/// toggles `opts`/records `open_styles`/`close_styles` on the `Text` items
/// that fall between them. Built around the same `process_emphasis`
/// closer-walk shape, simplified to a single match attempt per closer rather
/// than the `openers_bottom` skip-list optimization (a performance concern,
/// not a correctness one, at this scale).
fn process_emphasis(out: &mut [Item], delims: &mut [Delim]) {
    let mut close_i = 0usize;
    while close_i < delims.len() {
        if !delims[close_i].can_close || delims[close_i].len == 0 {
            close_i += 1;
            continue;
        }

        let mut open_i = None;
        let mut k = close_i;
        while k > 0 {
            k -= 1;
            let o = &delims[k];
            if o.ch == delims[close_i].ch && o.can_open && o.len > 0 && rule_of_three_ok(o, &delims[close_i]) {
                open_i = Some(k);
                break;
            }
        }

        let Some(open_i) = open_i else {
            close_i += 1;
            continue;
        };

        loop {
            let (open_len, close_len) = (delims[open_i].len, delims[close_i].len);
            if open_len == 0 || close_len == 0 {
                break;
            }
            let strike = delims[open_i].ch == '~';
            if strike && (open_len < 2 || close_len < 2) {
                break;
            }
            let used = if strike {
                2
            } else if open_len >= 2 && close_len >= 2 {
                2
            } else {
                1
            };

            let (oi, ci) = (delims[open_i].item_idx, delims[close_i].item_idx);
            for item in &mut out[oi + 1..ci] {
                if let Item::Text { opts, .. } = item {
                    if strike {
                        opts.strikethrough = true;
                    } else if used == 2 {
                        opts.bold = true;
                    } else {
                        opts.italic = true;
                    }
                }
            }

            let open_pos = out[oi].position();
            let close_pos = out[ci].position();
            if ci > oi + 1 {
                if let Item::Text { open_styles, .. } = &mut out[oi + 1] {
                    open_styles.push(StyleDelim { position: open_pos });
                }
                if let Item::Text { close_styles, .. } = &mut out[ci - 1] {
                    close_styles.push(StyleDelim { position: close_pos });
                }
            }

            if let Item::Text { text, .. } = &mut out[oi] {
                let new_len = text.chars().count().saturating_sub(used);
                *text = text.chars().take(new_len).collect();
            }
            if let Item::Text { text, .. } = &mut out[ci] {
                *text = text.chars().skip(used).collect();
            }

            delims[open_i].len -= used;
            delims[close_i].len -= used;
            if strike {
                break;
            }
        }

        close_i += 1;
    }
}

fn find_close_bracket(chars: &[char], from: usize) -> Option<usize> {
    let mut i = from;
    while i < chars.len() {
        match chars[i] {
            ']' => return Some(i),
            '\n' => return None,
            _ => i += 1,
        }
    }
    None
}

fn handle_angle_bracket(
    flat: &Flat,
    i: usize,
    out: &mut Vec<Item>,
    text_chars: &mut Vec<char>,
    text_cols: &mut Vec<i64>,
    text_line: &mut i64,
) -> usize {
    let n = flat.chars.len();
    let line = flat.lines[i];
    let col = flat.cols[i];

    let mut gt = None;
    let mut k = i + 1;
    while k < n && flat.chars[k] != '\n' {
        if flat.chars[k] == '>' {
            gt = Some(k);
            break;
        }
        k += 1;
    }

    if let Some(gt) = gt {
        let inner: String = flat.chars[i + 1..gt].iter().collect();
        let inner_bytes = inner.as_bytes();
        if let Some(end) = scanners::autolink_uri(inner_bytes) {
            if end == inner_bytes.len() {
                flush_pending(out, text_chars, text_cols);
                out.push(Item::Link {
                    position: Position::new(line, col, flat.lines[gt], flat.cols[gt]),
                    text: inner.clone(),
                    url: inner,
                    image: None,
                    opts: TextOpts::NONE,
                    text_position: Position::new(line, col, flat.lines[gt], flat.cols[gt]),
                    url_position: Position::unset(),
                });
                return gt + 1;
            }
        }
        if let Some(end) = scanners::autolink_email(inner_bytes) {
            if end == inner_bytes.len() {
                flush_pending(out, text_chars, text_cols);
                out.push(Item::Link {
                    position: Position::new(line, col, flat.lines[gt], flat.cols[gt]),
                    text: inner.clone(),
                    url: format!("mailto:{}", inner),
                    image: None,
                    opts: TextOpts::NONE,
                    text_position: Position::new(line, col, flat.lines[gt], flat.cols[gt]),
                    url_position: Position::unset(),
                });
                return gt + 1;
            }
        }
    }

    let rest: String = flat.chars[i..].iter().take_while(|&&c| c != '\n').collect();
    if let Some(consumed) = scanners::html_tag_shape(rest.as_bytes(), 0) {
        flush_pending(out, text_chars, text_cols);
        let end = i + consumed;
        out.push(Item::RawHtml {
            position: Position::new(line, col, flat.lines[end - 1], flat.cols[end - 1]),
            text: flat.chars[i..end].iter().collect(),
            is_free_tag: true,
        });
        return end;
    }

    if text_chars.is_empty() {
        *text_line = line;
    }
    text_chars.push('<');
    text_cols.push(col);
    i + 1
}

fn flush_pending(out: &mut Vec<Item>, text_chars: &mut Vec<char>, text_cols: &mut Vec<i64>) {
    if !text_chars.is_empty() {
        let line = out.last().map(|it| it.position().end_line).unwrap_or(0);
        let start_col = text_cols[0];
        let end_col = *text_cols.last().unwrap();
        out.push(Item::Text {
            position: Position::new(line, start_col, line, end_col),
            text: text_chars.iter().collect(),
            opts: TextOpts::NONE,
            space_before: false,
            space_after: false,
            open_styles: Vec::new(),
            close_styles: Vec::new(),
        });
        text_chars.clear();
        text_cols.clear();
    }
}

fn resolve_bracket(
    flat: &Flat,
    close_at: usize,
    bracket: Bracket,
    out: &mut Vec<Item>,
    brackets: &mut [Bracket],
    ctx: &InlineContext,
) -> usize {
    let content: Vec<Item> = out.split_off(bracket.start_idx);
    let label_text: String = content
        .iter()
        .filter_map(|it| match it {
            Item::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect();

    let nested_link_blocked = !bracket.is_image && brackets.iter().any(|b| !b.is_image);

    let n = flat.chars.len();
    let after = close_at + 1;

    // Inline form: ( url "title" )
    if !nested_link_blocked && flat.chars.get(after) == Some(&'(') {
        if let Some((url, end)) = parse_inline_destination(flat, after + 1) {
            let position = Position::new(
                flat.lines[bracket.start_idx.min(close_at)],
                flat.cols.get(close_at).copied().unwrap_or(0),
                flat.lines[end.saturating_sub(1).min(n - 1)],
                flat.cols.get(end.saturating_sub(1)).copied().unwrap_or(0),
            );
            out.push(make_link_or_image(bracket.is_image, position, label_text, url, content));
            return end;
        }
    }

    // Reference forms: full [..][label], collapsed [..][], shortcut [..]
    let (label_for_lookup, consumed_to) = if flat.chars.get(after) == Some(&'[') {
        match find_close_bracket(&flat.chars, after + 1) {
            Some(close2) if close2 == after + 1 => (label_text.clone(), close2 + 1),
            Some(close2) => (flat.chars[after + 1..close2].iter().collect(), close2 + 1),
            None => (label_text.clone(), after),
        }
    } else {
        (label_text.clone(), after)
    };

    let key = normalize_label_key(&label_for_lookup, ctx.working_directory, ctx.file);
    if !nested_link_blocked {
        if let Some(Item::Link { url, .. }) = ctx.refs.links.get(&key) {
            let position = Position::unset();
            out.push(make_link_or_image(bracket.is_image, position, label_text, url.clone(), content));
            return consumed_to;
        }
    }

    // No match: restore the brackets and content as literal text.
    out.push(Item::Text {
        position: Position::unset(),
        text: if bracket.is_image { "![".to_string() } else { "[".to_string() },
        opts: TextOpts::NONE,
        space_before: false,
        space_after: false,
        open_styles: Vec::new(),
        close_styles: Vec::new(),
    });
    out.extend(content);
    out.push(Item::Text {
        position: Position::unset(),
        text: "]".to_string(),
        opts: TextOpts::NONE,
        space_before: false,
        space_after: false,
        open_styles: Vec::new(),
        close_styles: Vec::new(),
    });
    after
}

fn make_link_or_image(is_image: bool, position: Position, text: String, url: String, content: Vec<Item>) -> Item {
    if is_image {
        Item::Image {
            position,
            text: text.clone(),
            url,
            alt: Box::new(Item::Text {
                position,
                text,
                opts: TextOpts::NONE,
                space_before: false,
                space_after: false,
                open_styles: Vec::new(),
                close_styles: Vec::new(),
            }),
        }
    } else {
        let image = content.into_iter().find_map(|it| match it {
            Item::Image { .. } => Some(Box::new(it)),
            _ => None,
        });
        Item::Link {
            position,
            text,
            url,
            image,
            opts: TextOpts::NONE,
            text_position: position,
            url_position: Position::unset(),
        }
    }
}

/// Parses `(url "title")`/`(<url> "title")` starting right after the `(`.
/// Returns the URL and the index just past the closing `)`.
fn parse_inline_destination(flat: &Flat, mut i: usize) -> Option<(String, usize)> {
    let n = flat.chars.len();
    while i < n && (flat.chars[i] == ' ' || flat.chars[i] == '\t') {
        i += 1;
    }

    let url: String;
    if flat.chars.get(i) == Some(&'<') {
        let start = i + 1;
        let mut j = start;
        while j < n && flat.chars[j] != '>' && flat.chars[j] != '\n' {
            j += 1;
        }
        if flat.chars.get(j) != Some(&'>') {
            return None;
        }
        url = flat.chars[start..j].iter().collect();
        i = j + 1;
    } else {
        let start = i;
        let mut depth = 0i32;
        while i < n {
            match flat.chars[i] {
                '(' => depth += 1,
                ')' if depth == 0 => break,
                ')' => depth -= 1,
                c if c.is_whitespace() => break,
                _ => {}
            }
            i += 1;
        }
        url = flat.chars[start..i].iter().collect();
    }

    while i < n && (flat.chars[i] == ' ' || flat.chars[i] == '\t') {
        i += 1;
    }
    if flat.chars.get(i) == Some(&'"') || flat.chars.get(i) == Some(&'\'') {
        let quote = flat.chars[i];
        let start = i + 1;
        let mut j = start;
        while j < n && flat.chars[j] != quote {
            j += 1;
        }
        i = j + 1;
        while i < n && (flat.chars[i] == ' ' || flat.chars[i] == '\t') {
            i += 1;
        }
    }

    if flat.chars.get(i) == Some(&')') {
        Some((url, i + 1))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::LabelMap;

    fn ext_all() -> Extension {
        Extension {
            autolink: true,
            math: true,
            tasklist: true,
            footnotes: true,
            header_ids: true,
            table: true,
            strikethrough: true,
        }
    }

    fn parse(text: &str, ext: &Extension, links: &LabelMap<Item>, footnotes: &LabelMap<Item>) -> Vec<Item> {
        let lines: Vec<VirginString> = text.lines().map(VirginString::new).collect();
        let ctx = InlineContext {
            refs: RefTables { links, footnotes },
            ext,
            working_directory: "wd",
            file: "doc.md",
        };
        parse_inlines(&lines, 0, &ctx)
    }

    #[test]
    fn plain_text_becomes_single_text_item() {
        let links = LabelMap::new();
        let footnotes = LabelMap::new();
        let items = parse("hello world", &Extension::default(), &links, &footnotes);
        assert_eq!(items.len(), 1);
        assert!(matches!(&items[0], Item::Text{text, ..} if text == "hello world"));
    }

    #[test]
    fn soft_break_produces_two_texts_one_paragraph() {
        let links = LabelMap::new();
        let footnotes = LabelMap::new();
        let items = parse("foo\nbar", &Extension::default(), &links, &footnotes);
        assert_eq!(items.len(), 2);
        assert!(matches!(&items[0], Item::Text{text, space_after: true, ..} if text == "foo"));
        assert!(matches!(&items[1], Item::Text{text, space_before: true, ..} if text == "bar"));
    }

    #[test]
    fn hard_break_via_trailing_spaces() {
        let links = LabelMap::new();
        let footnotes = LabelMap::new();
        let items = parse("foo  \nbar", &Extension::default(), &links, &footnotes);
        assert!(items.iter().any(|i| matches!(i, Item::LineBreak { .. })));
    }

    #[test]
    fn bold_and_italic_set_opts() {
        let links = LabelMap::new();
        let footnotes = LabelMap::new();
        let items = parse("**bold** and *italic*", &Extension::default(), &links, &footnotes);
        assert!(items.iter().any(|i| matches!(i, Item::Text{text, opts, ..} if text=="bold" && opts.bold)));
        assert!(items.iter().any(|i| matches!(i, Item::Text{text, opts, ..} if text=="italic" && opts.italic)));
    }

    #[test]
    fn strikethrough_toggles_opt() {
        let ext = ext_all();
        let links = LabelMap::new();
        let footnotes = LabelMap::new();
        let items = parse("~~gone~~", &ext, &links, &footnotes);
        assert!(items.iter().any(|i| matches!(i, Item::Text{text, opts, ..} if text=="gone" && opts.strikethrough)));
    }

    #[test]
    fn inline_code_span_is_literal() {
        let links = LabelMap::new();
        let footnotes = LabelMap::new();
        let items = parse("use `x = 1` here", &Extension::default(), &links, &footnotes);
        assert!(items.iter().any(|i| matches!(i, Item::Code{text, is_inline: true, ..} if text=="x = 1")));
    }

    #[test]
    fn inline_math_span_requires_extension() {
        let ext = ext_all();
        let links = LabelMap::new();
        let footnotes = LabelMap::new();
        let items = parse("energy $e=mc^2$ today", &ext, &links, &footnotes);
        assert!(items.iter().any(|i| matches!(i, Item::Math{expr, is_inline: true, ..} if expr=="e=mc^2")));
    }

    #[test]
    fn inline_link_is_parsed() {
        let links = LabelMap::new();
        let footnotes = LabelMap::new();
        let items = parse("see [here](/path \"t\")", &Extension::default(), &links, &footnotes);
        assert!(items.iter().any(|i| matches!(i, Item::Link{text, url, ..} if text=="here" && url=="/path")));
    }

    #[test]
    fn reference_link_resolves_against_map() {
        let mut links = LabelMap::new();
        links.insert_if_absent(
            normalize_label_key("x", "wd", "doc.md"),
            Item::Link {
                position: Position::unset(),
                text: String::new(),
                url: "/u".to_string(),
                image: None,
                opts: TextOpts::NONE,
                text_position: Position::unset(),
                url_position: Position::unset(),
            },
        );
        let footnotes = LabelMap::new();
        let items = parse("[x]", &Extension::default(), &links, &footnotes);
        assert!(items.iter().any(|i| matches!(i, Item::Link{text, url, ..} if text=="x" && url=="/u")));
    }

    #[test]
    fn unresolved_reference_link_degrades_to_text() {
        let links = LabelMap::new();
        let footnotes = LabelMap::new();
        let items = parse("[nope]", &Extension::default(), &links, &footnotes);
        assert!(!items.iter().any(|i| matches!(i, Item::Link { .. })));
    }

    #[test]
    fn footnote_reference_resolves_against_map() {
        let ext = ext_all();
        let links = LabelMap::new();
        let mut footnotes = LabelMap::new();
        footnotes.insert_if_absent(
            normalize_label_key("1", "wd", "doc.md"),
            Item::Footnote {
                position: Position::unset(),
                id: "1".to_string(),
                items: Vec::new(),
                id_position: Position::unset(),
            },
        );
        let items = parse("see[^1]", &ext, &links, &footnotes);
        assert!(items.iter().any(|i| matches!(i, Item::FootnoteRef{id, ..} if id=="1")));
    }

    #[test]
    fn autolink_extension_splits_bare_url() {
        let ext = ext_all();
        let links = LabelMap::new();
        let footnotes = LabelMap::new();
        let items = parse("go to http://example.com now", &ext, &links, &footnotes);
        assert!(items.iter().any(|i| matches!(i, Item::Link{url, ..} if url == "http://example.com")));
    }

    #[test]
    fn autolink_bracket_form_recognized() {
        let links = LabelMap::new();
        let footnotes = LabelMap::new();
        let items = parse("<http://example.com>", &Extension::default(), &links, &footnotes);
        assert!(items.iter().any(|i| matches!(i, Item::Link{url, ..} if url == "http://example.com")));
    }

    #[test]
    fn raw_html_tag_recognized() {
        let links = LabelMap::new();
        let footnotes = LabelMap::new();
        let items = parse("a <br/> tag", &Extension::default(), &links, &footnotes);
        assert!(items.iter().any(|i| matches!(i, Item::RawHtml{text, ..} if text=="<br/>")));
    }

    #[test]
    fn entity_decoded_in_text() {
        let links = LabelMap::new();
        let footnotes = LabelMap::new();
        let items = parse("a &amp; b", &Extension::default(), &links, &footnotes);
        assert!(items.iter().any(|i| matches!(i, Item::Text{text, ..} if text.contains('&'))));
    }
}
