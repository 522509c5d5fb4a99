//! C3 `BlockSegmenter` + C5 `Parser` orchestrator (spec §4.3, §4.5).
//!
//! Built around the `check_open_blocks`/`open_new_blocks`/`finalize`
//! family of operations, which walked a live `AstNode` arena line by line
//! and kept a stack of currently-open containers. This crate's owned tree
//! has no arena and no "open container" concept that survives across
//! calls, so the segmenter instead recurses: each level of nesting
//! (document, blockquote, list item) slices its own `&[VirginString]` and
//! calls `parse_blocks` on it directly, matching how [`crate::parser::table`]
//! already builds a whole construct in one pass instead of incrementally.
//!
//! Reference resolution is two-pass (spec §4.5's "Open Question"): a
//! [`harvest`] pre-pass populates the document's label maps first, then a
//! single [`build_items`] pass consumes them. This is the "cleaner
//! alternative" noted in `SPEC_FULL.md` §9, not a literal port of the
//! teacher's `collectRefLinks` boolean threaded through every routine.

mod classify;
pub mod inlines;
pub mod math;
pub mod options;
pub mod table;

use crate::error::ParseIoError;
use crate::node::{
    normalize_label_key, Document, Item, LabelMap, ListItemKind, ListItemPrestate, Position,
    TableAlignment, TextOpts,
};
use crate::scanners;
use crate::strings::{expand_tabs, VirginString};
use classify::{classify, ClassifyContext, LineKind, ListMarker};
use inlines::{parse_inlines, InlineContext, RefTables};
use options::{Extension, Options};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// A function registered via [`Parser::add_text_plugin`]: given a `Text`
/// item's literal content, returns the byte ranges that should become
/// `Link` items and the URL each one resolves to. Spec §4.4.8/§6.
pub type PluginFn = std::sync::Arc<dyn Fn(&str) -> Vec<(usize, usize, String)> + Send + Sync>;

struct TextPlugin {
    id: u32,
    #[allow(dead_code)]
    process_in_links: bool,
    func: PluginFn,
}

/// The entry point into the parser. Stateless aside from registered text
/// plugins, so `parse`/`parse_str` take `&self` and can run concurrently
/// from multiple threads (spec §5).
#[derive(Default)]
pub struct Parser {
    plugins: Vec<TextPlugin>,
}

impl Parser {
    pub fn new() -> Self {
        Parser { plugins: Vec::new() }
    }

    /// Registers (or replaces) a text plugin under `id`. `process_in_links`
    /// is recorded but, like the built-in autolink plugin, a plugin never
    /// runs inside an already-resolved `Link`/`Image` label.
    pub fn add_text_plugin(&mut self, id: u32, func: PluginFn, process_in_links: bool) {
        self.plugins.retain(|p| p.id != id);
        self.plugins.push(TextPlugin { id, process_in_links, func });
    }

    pub fn remove_text_plugin(&mut self, id: u32) {
        self.plugins.retain(|p| p.id != id);
    }

    /// Parses a standalone string with no filesystem context. This is the
    /// entry point exercised by [`Options`]'s doctest. Like every other
    /// entry point, the returned document begins with an `Anchor` (spec §6,
    /// `md4qt::Parser::parseStream`, which appends its anchor unconditionally
    /// before any content is read).
    pub fn parse_str(&self, input: &str, options: &Options) -> Document {
        let lines = prepare_lines(input);
        self.parse_lines(&lines, options, "", "<string>", "<string>")
    }

    /// Parses from an arbitrary `Read` source (the stream-based overload of
    /// the original two-overload `parse`; Rust has no overloading, so this
    /// gets its own name). A read failure degrades to an empty document
    /// with a single `Anchor`, per spec §7 — it is never returned as an
    /// `Err` from here.
    pub fn parse_reader<R: std::io::Read>(
        &self,
        mut reader: R,
        working_directory: &str,
        file: &str,
        options: &Options,
    ) -> Document {
        let mut buf = String::new();
        match reader.read_to_string(&mut buf) {
            Ok(_) => {
                let lines = prepare_lines(&buf);
                self.parse_lines(&lines, options, working_directory, file, file)
            }
            Err(source) => {
                let err = ParseIoError::Read { path: PathBuf::from(file), source };
                tracing::warn!(error = %err, "failed to read stream");
                empty_document_with_anchor(Path::new(file))
            }
        }
    }

    /// Parses `filename` from disk. When `recursive` is true, local-file
    /// links whose extension matches one of `extensions` (defaulting to
    /// `md`/`markdown`) are followed and their documents concatenated after
    /// a `PageBreak`, guarding against cycles (spec §4.5, §6). Because this
    /// entry point has no extension-gate argument, it runs with all
    /// `Extension` flags disabled; callers who want GFM extensions with
    /// file-based parsing should use [`Parser::parse_reader`] with a
    /// populated [`Options`] instead.
    pub fn parse(&self, filename: &str, recursive: bool, extensions: &[String]) -> Document {
        let exts: Vec<String> = if extensions.is_empty() {
            vec!["md".to_string(), "markdown".to_string()]
        } else {
            extensions.to_vec()
        };
        let mut parsed_files = HashSet::new();
        self.parse_file_recursive(Path::new(filename), recursive, &exts, &mut parsed_files)
    }

    fn parse_file_recursive(
        &self,
        path: &Path,
        recursive: bool,
        exts: &[String],
        parsed_files: &mut HashSet<PathBuf>,
    ) -> Document {
        let span = tracing::info_span!("parse_file", path = %path.display());
        let _enter = span.enter();

        let canon = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if !parsed_files.insert(canon.clone()) {
            let err = ParseIoError::Cycle(canon.clone());
            tracing::warn!(error = %err);
            return empty_document_with_anchor(&canon);
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(source) => {
                let err = ParseIoError::Read { path: path.to_path_buf(), source };
                tracing::warn!(error = %err);
                return empty_document_with_anchor(&canon);
            }
        };

        let working_directory =
            path.parent().map(|p| p.to_string_lossy().to_string()).unwrap_or_default();
        let file = path.file_name().map(|f| f.to_string_lossy().to_string()).unwrap_or_default();
        let options = Options { extension: Extension::default(), recursive_extensions: exts.to_vec() };

        let anchor = anchor_label(&canon);
        let lines = prepare_lines(&content);
        let mut doc = self.parse_lines(&lines, &options, &working_directory, &file, &anchor);

        if recursive {
            for target in local_link_targets(&doc, exts) {
                let target_path = path.parent().unwrap_or_else(|| Path::new(".")).join(&target);
                let sub = self.parse_file_recursive(&target_path, recursive, exts, parsed_files);
                doc.items.push(Item::PageBreak);
                doc.items.extend(sub.items);
                for (k, v) in sub.labeled_link_map.iter() {
                    doc.labeled_link_map.insert_if_absent(k.to_string(), v.clone());
                }
                for (k, v) in sub.footnote_map.iter() {
                    doc.footnote_map.insert_if_absent(k.to_string(), v.clone());
                }
                for (k, v) in sub.labeled_heading_map.iter() {
                    doc.labeled_heading_map.insert_if_absent(k.to_string(), v.clone());
                }
            }
        }

        doc
    }

    /// Runs the full segment/harvest/build pipeline and prepends the
    /// `Anchor` every parse begins with, per `md4qt::Parser::parseStream`
    /// (`examples/original_source/md4qt/parser.hpp:2830-2831`), which appends
    /// its anchor unconditionally at the top of every parse — string,
    /// stream, or file — before any content is read.
    fn parse_lines(
        &self,
        lines: &[VirginString],
        options: &Options,
        working_directory: &str,
        file: &str,
        anchor_label: &str,
    ) -> Document {
        let blocks = parse_blocks(lines, 0, options.extension.footnotes);

        let mut links = LabelMap::new();
        let mut footnotes = LabelMap::new();
        let mut headings = LabelMap::new();
        harvest(&blocks, &options.extension, working_directory, file, &mut links, &mut footnotes, &mut headings);

        let ctx = InlineContext {
            refs: RefTables { links: &links, footnotes: &footnotes },
            ext: &options.extension,
            working_directory,
            file,
        };
        let mut items = build_items(&blocks, &ctx);
        apply_text_plugins(&mut items, &self.plugins);
        items.insert(0, Item::Anchor { label: anchor_label.to_string() });

        tracing::debug!(
            links = links.len(),
            footnotes = footnotes.len(),
            headings = headings.len(),
            "reference pass complete"
        );

        Document { items, footnote_map: footnotes, labeled_link_map: links, labeled_heading_map: headings }
    }
}

fn anchor_label(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn empty_document_with_anchor(path: &Path) -> Document {
    Document {
        items: vec![Item::Anchor { label: anchor_label(path) }],
        footnote_map: LabelMap::new(),
        labeled_link_map: LabelMap::new(),
        labeled_heading_map: LabelMap::new(),
    }
}

fn prepare_lines(input: &str) -> Vec<VirginString> {
    let sanitized = input.replace('\0', "\u{FFFD}");
    sanitized.lines().map(expand_tabs).collect()
}

fn is_local_target(url: &str, exts: &[String]) -> bool {
    if url.contains("://") || url.starts_with("mailto:") || url.starts_with('#') {
        return false;
    }
    exts.iter().any(|e| url.ends_with(&format!(".{e}")))
}

fn local_link_targets(doc: &Document, exts: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    for (_, item) in doc.labeled_link_map.iter() {
        if let Item::Link { url, .. } = item {
            if is_local_target(url, exts) {
                out.push(url.clone());
            }
        }
    }
    collect_links_in_items(&doc.items, exts, &mut out);
    out
}

fn collect_links_in_items(items: &[Item], exts: &[String], out: &mut Vec<String>) {
    for item in items {
        match item {
            Item::Link { url, .. } => {
                if is_local_target(url, exts) {
                    out.push(url.clone());
                }
            }
            Item::Paragraph { items, .. }
            | Item::Blockquote { items, .. }
            | Item::List { items, .. }
            | Item::ListItem { items, .. }
            | Item::TableCell { items, .. }
            | Item::Footnote { items, .. } => collect_links_in_items(items, exts, out),
            Item::Heading { paragraph, .. } => {
                if let Item::Paragraph { items, .. } = paragraph.as_ref() {
                    collect_links_in_items(items, exts, out);
                }
            }
            Item::Table { rows, .. } => {
                for row in rows {
                    if let Item::TableRow { cells, .. } = row {
                        for cell in cells {
                            if let Item::TableCell { items, .. } = cell {
                                collect_links_in_items(items, exts, out);
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

fn apply_text_plugins(items: &mut Vec<Item>, plugins: &[TextPlugin]) {
    if plugins.is_empty() {
        return;
    }
    let mut result = Vec::with_capacity(items.len());
    for mut item in items.drain(..) {
        match &mut item {
            Item::Text { .. } => {
                result.extend(split_by_plugins(item, plugins));
                continue;
            }
            Item::Paragraph { items, .. }
            | Item::TableCell { items, .. }
            | Item::Footnote { items, .. }
            | Item::Blockquote { items, .. }
            | Item::List { items, .. }
            | Item::ListItem { items, .. } => apply_text_plugins(items, plugins),
            Item::Heading { paragraph, .. } => {
                if let Item::Paragraph { items, .. } = paragraph.as_mut() {
                    apply_text_plugins(items, plugins);
                }
            }
            Item::Table { rows, .. } => {
                for row in rows {
                    if let Item::TableRow { cells, .. } = row {
                        for cell in cells {
                            if let Item::TableCell { items, .. } = cell {
                                apply_text_plugins(items, plugins);
                            }
                        }
                    }
                }
            }
            _ => {}
        }
        result.push(item);
    }
    *items = result;
}

fn split_by_plugins(item: Item, plugins: &[TextPlugin]) -> Vec<Item> {
    let (position, text, opts, space_before, space_after) = match &item {
        Item::Text { position, text, opts, space_before, space_after, .. } => {
            (*position, text.clone(), *opts, *space_before, *space_after)
        }
        _ => return vec![item],
    };
    for plugin in plugins {
        let matches = (plugin.func)(&text);
        if let Some(&(start, end, ref url)) = matches.first() {
            let chars: Vec<char> = text.chars().collect();
            if end > chars.len() || start >= end {
                continue;
            }
            let mut out = Vec::new();
            if start > 0 {
                out.push(Item::Text {
                    position,
                    text: chars[..start].iter().collect(),
                    opts,
                    space_before,
                    space_after: false,
                    open_styles: Vec::new(),
                    close_styles: Vec::new(),
                });
            }
            let label: String = chars[start..end].iter().collect();
            out.push(Item::Link {
                position,
                text: label,
                url: url.clone(),
                image: None,
                opts: TextOpts::NONE,
                text_position: position,
                url_position: Position::unset(),
            });
            if end < chars.len() {
                out.push(Item::Text {
                    position,
                    text: chars[end..].iter().collect(),
                    opts,
                    space_before: false,
                    space_after,
                    open_styles: Vec::new(),
                    close_styles: Vec::new(),
                });
            }
            return out;
        }
    }
    vec![item]
}

// ---------------------------------------------------------------------
// Raw block tree: the segmenter's intermediate representation, before
// inline content is resolved against the reference maps.
// ---------------------------------------------------------------------

enum RawBlock {
    Paragraph { lines: Vec<VirginString>, line_base: i64 },
    Heading { level: u8, lines: Vec<VirginString>, line_base: i64, delim: Position },
    Blockquote { children: Vec<RawBlock>, delims: Vec<Position> },
    List { items: Vec<RawListItem> },
    CodeIndented { lines: Vec<VirginString>, line_base: i64 },
    CodeFenced { lines: Vec<VirginString>, line_base: i64, info: Option<String>, open_delim: Position, close_delim: Position },
    Html { lines: Vec<VirginString>, line_base: i64 },
    ThematicBreak { position: Position },
    FootnoteDef { label: String, label_position: Position, lines: Vec<VirginString>, line_base: i64 },
    LinkRefDef { label: String, url: String },
}

struct RawListItem {
    kind: ListItemKind,
    start_number: Option<u64>,
    delim_position: Position,
    children: Vec<RawBlock>,
}

fn parse_blocks(lines: &[VirginString], line_base: i64, footnotes_on: bool) -> Vec<RawBlock> {
    let mut blocks = Vec::new();
    let mut i = 0usize;
    let ctx = ClassifyContext::default();

    while i < lines.len() {
        let line = &lines[i];
        let cls = classify(line, &ctx);

        match cls.kind {
            LineKind::EmptyLine => {
                i += 1;
            }

            LineKind::Heading => {
                let bytes = line.to_string_lossy().into_bytes();
                let rest = &bytes[cls.indent as usize..];
                let content_off = scanners::atx_heading_start(rest).unwrap_or(0);
                let level = rest.iter().take_while(|&&b| b == b'#').count().clamp(1, 6) as u8;
                let delim = Position::new(
                    line_base + i as i64,
                    cls.indent,
                    line_base + i as i64,
                    cls.indent + level as i64 - 1,
                );
                let content_start = cls.indent + content_off as i64;
                let content_line = line.slice(content_start, None);
                blocks.push(RawBlock::Heading {
                    level,
                    lines: vec![content_line],
                    line_base: line_base + i as i64,
                    delim,
                });
                i += 1;
            }

            LineKind::Blockquote => {
                let start = i;
                let mut bq_lines = Vec::new();
                let mut delims = Vec::new();
                loop {
                    if i >= lines.len() {
                        break;
                    }
                    let c = classify(&lines[i], &ctx);
                    if c.kind == LineKind::Blockquote {
                        let (stripped, delim) = strip_blockquote_marker(&lines[i], line_base + i as i64);
                        bq_lines.push(stripped);
                        delims.push(delim);
                        i += 1;
                    } else if c.kind == LineKind::Text && !bq_lines.is_empty() {
                        bq_lines.push(lines[i].clone());
                        i += 1;
                    } else {
                        break;
                    }
                }
                let children = parse_blocks(&bq_lines, line_base + start as i64, footnotes_on);
                blocks.push(RawBlock::Blockquote { children, delims });
            }

            LineKind::List | LineKind::ListWithFirstEmptyLine => {
                let (block, consumed) = parse_list(lines, i, line_base, footnotes_on);
                blocks.push(block);
                i += consumed.max(1);
            }

            LineKind::Code => {
                let bytes = line.to_string_lossy().into_bytes();
                let rest = &bytes[cls.indent as usize..];
                if let Some((fence_char, fence_len, info_off)) = scanners::open_code_fence(rest) {
                    let info = String::from_utf8_lossy(&rest[info_off..]).trim().to_string();
                    let open_delim = Position::new(
                        line_base + i as i64,
                        cls.indent,
                        line_base + i as i64,
                        cls.indent + fence_len as i64 - 1,
                    );
                    let mut code_lines = Vec::new();
                    let mut j = i + 1;
                    let mut close_delim = None;
                    while j < lines.len() {
                        let cb = lines[j].to_string_lossy().into_bytes();
                        if scanners::close_code_fence(&cb, fence_char, fence_len) {
                            let ind = cb.iter().take_while(|&&b| b == b' ').count() as i64;
                            close_delim = Some(Position::new(line_base + j as i64, ind, line_base + j as i64, cb.len() as i64 - 1));
                            j += 1;
                            break;
                        }
                        code_lines.push(lines[j].clone());
                        j += 1;
                    }
                    let close_delim = close_delim.unwrap_or(open_delim);
                    blocks.push(RawBlock::CodeFenced {
                        lines: code_lines,
                        line_base: line_base + i as i64 + 1,
                        info: if info.is_empty() { None } else { Some(info) },
                        open_delim,
                        close_delim,
                    });
                    i = j;
                } else {
                    i += 1;
                }
            }

            LineKind::CodeIndentedBySpaces => {
                let start = i;
                let mut code_lines = Vec::new();
                loop {
                    if i >= lines.len() {
                        break;
                    }
                    let c = classify(&lines[i], &ctx);
                    if c.kind == LineKind::CodeIndentedBySpaces {
                        code_lines.push(lines[i].slice(4.min(lines[i].len()), None));
                        i += 1;
                    } else if c.kind == LineKind::EmptyLine {
                        let mut k = i;
                        while k < lines.len() && classify(&lines[k], &ctx).kind == LineKind::EmptyLine {
                            k += 1;
                        }
                        if k < lines.len() && classify(&lines[k], &ctx).kind == LineKind::CodeIndentedBySpaces {
                            for _ in i..k {
                                code_lines.push(VirginString::new(""));
                            }
                            i = k;
                        } else {
                            break;
                        }
                    } else {
                        break;
                    }
                }
                blocks.push(RawBlock::CodeIndented { lines: code_lines, line_base: line_base + start as i64 });
            }

            LineKind::Footnote if footnotes_on => {
                let bytes = line.to_string_lossy().into_bytes();
                let Some((label, content_off)) = scanners::footnote_definition(&bytes) else {
                    i += 1;
                    continue;
                };
                let label_position = Position::new(
                    line_base + i as i64,
                    cls.indent + 2,
                    line_base + i as i64,
                    cls.indent + 2 + label.chars().count() as i64 - 1,
                );
                let first = line.slice(content_off as i64, None);
                let mut fn_lines = vec![first];
                let mut j = i + 1;
                loop {
                    if j >= lines.len() {
                        break;
                    }
                    let c = classify(&lines[j], &ctx);
                    if c.kind == LineKind::EmptyLine {
                        fn_lines.push(VirginString::new(""));
                        j += 1;
                    } else if c.indent >= 4 {
                        fn_lines.push(lines[j].slice(4, None));
                        j += 1;
                    } else {
                        break;
                    }
                }
                blocks.push(RawBlock::FootnoteDef { label, label_position, lines: fn_lines, line_base: line_base + i as i64 });
                i = j;
            }

            _ => {
                let bytes0 = line.to_string_lossy().into_bytes();
                let rest0 = &bytes0[cls.indent as usize..];

                if let Some(rule) = scanners::html_block_start(rest0) {
                    let start = i;
                    let mut html_lines = vec![lines[i].clone()];
                    let mut ended = scanners::html_block_end(rest0, rule);
                    i += 1;
                    if !ended {
                        while i < lines.len() {
                            let c = classify(&lines[i], &ctx);
                            if rule >= 6 && c.kind == LineKind::EmptyLine {
                                break;
                            }
                            let b = lines[i].to_string_lossy().into_bytes();
                            html_lines.push(lines[i].clone());
                            i += 1;
                            if scanners::html_block_end(&b, rule) {
                                ended = true;
                                break;
                            }
                        }
                    }
                    let _ = ended;
                    blocks.push(RawBlock::Html { lines: html_lines, line_base: line_base + start as i64 });
                    continue;
                }

                if scanners::html_block_start_7(rest0) {
                    let start = i;
                    let mut html_lines = vec![lines[i].clone()];
                    i += 1;
                    while i < lines.len() && classify(&lines[i], &ctx).kind != LineKind::EmptyLine {
                        html_lines.push(lines[i].clone());
                        i += 1;
                    }
                    blocks.push(RawBlock::Html { lines: html_lines, line_base: line_base + start as i64 });
                    continue;
                }

                if scanners::thematic_break(&bytes0) && cls.indent < 4 {
                    let end_col = (bytes0.len() as i64 - 1).max(0);
                    blocks.push(RawBlock::ThematicBreak {
                        position: Position::new(line_base + i as i64, 0, line_base + i as i64, end_col),
                    });
                    i += 1;
                    continue;
                }

                if let Some((label, url)) = try_link_ref_def(line) {
                    blocks.push(RawBlock::LinkRefDef { label, url });
                    i += 1;
                    continue;
                }

                let start = i;
                let mut para_lines = vec![line.clone()];
                i += 1;
                let mut setext: Option<(u8, Position)> = None;

                while i < lines.len() {
                    let c = classify(&lines[i], &ctx);
                    if matches!(c.kind, LineKind::Text | LineKind::SomethingInList | LineKind::FencedCodeInList) {
                        let b = lines[i].to_string_lossy().into_bytes();
                        if try_link_ref_def(&lines[i]).is_some() {
                            break;
                        }
                        if scanners::thematic_break(&b) {
                            break;
                        }
                        if let Some(sc) = scanners::setext_heading_line(&b) {
                            let level = if sc == scanners::SetextChar::Equals { 1 } else { 2 };
                            setext = Some((level, Position::new(line_base + i as i64, 0, line_base + i as i64, b.len() as i64 - 1)));
                            i += 1;
                            break;
                        }
                        para_lines.push(lines[i].clone());
                        i += 1;
                    } else {
                        break;
                    }
                }

                if let Some((level, delim)) = setext {
                    blocks.push(RawBlock::Heading { level, lines: para_lines, line_base: line_base + start as i64, delim });
                } else {
                    blocks.push(RawBlock::Paragraph { lines: para_lines, line_base: line_base + start as i64 });
                }
            }
        }
    }

    blocks
}

fn strip_blockquote_marker(line: &VirginString, line_no: i64) -> (VirginString, Position) {
    let chars = line.as_chars();
    let mut i: i64 = 0;
    while i < 3 && chars.get(i as usize) == Some(&' ') {
        i += 1;
    }
    let marker_start = i;
    i += 1; // the '>'
    if chars.get(i as usize) == Some(&' ') {
        i += 1;
    }
    let start_col = line.virgin_pos(marker_start);
    let end_col = line.virgin_pos((i - 1).max(marker_start));
    (line.slice(i, None), Position::new(line_no, start_col, line_no, end_col))
}

fn try_link_ref_def(line: &VirginString) -> Option<(String, String)> {
    let all = line.as_chars();
    let indent = all.iter().take(3).take_while(|&&c| c == ' ').count();
    let chars = &all[indent..];
    if chars.first() != Some(&'[') {
        return None;
    }
    let close = chars.iter().position(|&c| c == ']')?;
    if close == 0 || chars.get(close + 1) != Some(&':') {
        return None;
    }
    let label: String = chars[1..close].iter().collect();
    if label.trim().is_empty() {
        return None;
    }
    let mut i = close + 2;
    while chars.get(i) == Some(&' ') {
        i += 1;
    }
    let start = i;
    while i < chars.len() && !chars[i].is_whitespace() {
        i += 1;
    }
    let url: String = chars[start..i].iter().collect();
    if url.is_empty() {
        return None;
    }
    let url = url.trim_start_matches('<').trim_end_matches('>').to_string();
    Some((label, url))
}

fn same_family(a: Option<ListMarker>, b: ListMarker) -> bool {
    match (a, b) {
        (Some(ListMarker::Unordered(x)), ListMarker::Unordered(y)) => x == y,
        (Some(ListMarker::Ordered { delim: x, .. }), ListMarker::Ordered { delim: y, .. }) => x == y,
        _ => false,
    }
}

fn parse_list(lines: &[VirginString], start: usize, line_base: i64, footnotes_on: bool) -> (RawBlock, usize) {
    let ctx0 = ClassifyContext::default();
    let first_cls = classify(&lines[start], &ctx0);
    let Some(marker) = first_cls.marker else {
        return (RawBlock::List { items: Vec::new() }, 1);
    };

    let mut items = Vec::new();
    let mut i = start;

    loop {
        if i >= lines.len() {
            break;
        }
        let fresh_ctx = ClassifyContext::default();
        let cls = classify(&lines[i], &fresh_ctx);
        let is_item_start = matches!(cls.kind, LineKind::List | LineKind::ListWithFirstEmptyLine)
            && cls.indent == first_cls.indent
            && same_family(cls.marker, marker);
        if i > start && !is_item_start {
            break;
        }
        if i == start && !matches!(cls.kind, LineKind::List | LineKind::ListWithFirstEmptyLine) {
            break;
        }

        let this_marker = cls.marker.unwrap();
        let marker_len_chars = {
            let chars = lines[i].as_chars();
            let mut j = cls.indent;
            j += match this_marker {
                ListMarker::Unordered(_) => 1,
                ListMarker::Ordered { start, .. } => start.to_string().len() as i64 + 1,
            };
            if chars.get(j as usize) == Some(&' ') {
                j += 1;
            }
            j - cls.indent
        };
        let content_indent = cls.indent + marker_len_chars;
        let delim_position = Position::new(
            line_base + i as i64,
            cls.indent,
            line_base + i as i64,
            cls.indent + marker_len_chars - 1,
        );

        let first_content = lines[i].slice(content_indent.min(lines[i].len()), None);
        let first_is_empty = first_content.as_chars().iter().all(|c| c.is_whitespace());

        let mut item_lines = vec![first_content];
        let mut j = i + 1;
        let item_ctx = ClassifyContext {
            in_list: true,
            list_first_line_empty: first_is_empty,
            indents: vec![content_indent],
            ..ClassifyContext::default()
        };

        while j < lines.len() {
            let c2 = classify(&lines[j], &item_ctx);
            match c2.kind {
                LineKind::EmptyLine => {
                    item_lines.push(VirginString::new(""));
                    j += 1;
                }
                LineKind::SomethingInList | LineKind::FencedCodeInList => {
                    item_lines.push(lines[j].slice(content_indent.min(lines[j].len()), None));
                    j += 1;
                }
                _ if c2.indent >= content_indent => {
                    item_lines.push(lines[j].slice(content_indent, None));
                    j += 1;
                }
                _ => break,
            }
        }

        let children = parse_blocks(&item_lines, line_base + i as i64, footnotes_on);
        items.push(RawListItem {
            kind: if matches!(this_marker, ListMarker::Ordered { .. }) {
                ListItemKind::Ordered
            } else {
                ListItemKind::Unordered
            },
            start_number: match this_marker {
                ListMarker::Ordered { start, .. } => Some(start),
                ListMarker::Unordered(_) => None,
            },
            delim_position,
            children,
        });

        i = j;
    }

    (RawBlock::List { items }, i - start)
}

// ---------------------------------------------------------------------
// Harvest pass: populate the document's label maps before inline content
// is ever built.
// ---------------------------------------------------------------------

fn harvest(
    blocks: &[RawBlock],
    ext: &Extension,
    wd: &str,
    file: &str,
    links: &mut LabelMap<Item>,
    footnotes: &mut LabelMap<Item>,
    headings: &mut LabelMap<Item>,
) {
    for b in blocks {
        match b {
            RawBlock::LinkRefDef { label, url } => {
                let key = normalize_label_key(label, wd, file);
                links.insert_if_absent(
                    key,
                    Item::Link {
                        position: Position::unset(),
                        text: String::new(),
                        url: url.clone(),
                        image: None,
                        opts: TextOpts::NONE,
                        text_position: Position::unset(),
                        url_position: Position::unset(),
                    },
                );
            }
            RawBlock::FootnoteDef { label, label_position, lines, line_base } => {
                let key = normalize_label_key(label, wd, file);
                if !footnotes.contains_key(&key) {
                    let ctx = InlineContext {
                        refs: RefTables { links, footnotes },
                        ext,
                        working_directory: wd,
                        file,
                    };
                    let children = parse_blocks(lines, *line_base, ext.footnotes);
                    let items = build_items(&children, &ctx);
                    let position = items.iter().fold(*label_position, |a, it| a.union(&it.position()));
                    footnotes.insert_if_absent(
                        key,
                        Item::Footnote { position, id: label.clone(), items, id_position: *label_position },
                    );
                }
            }
            RawBlock::Heading { level, lines, line_base, delim } => {
                let ctx = InlineContext {
                    refs: RefTables { links, footnotes },
                    ext,
                    working_directory: wd,
                    file,
                };
                let heading = build_heading(*level, lines, *line_base, *delim, &ctx);
                if let Item::Heading { label: Some(ref label), .. } = &heading {
                    let key = normalize_label_key(label, wd, file);
                    headings.insert_if_absent(key, heading);
                }
            }
            RawBlock::Blockquote { children, .. } => harvest(children, ext, wd, file, links, footnotes, headings),
            RawBlock::List { items } => {
                for it in items {
                    harvest(&it.children, ext, wd, file, links, footnotes, headings);
                }
            }
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------
// Build pass: the raw block tree becomes the final `Item` tree, with
// inline content resolved against the now-complete reference maps.
// ---------------------------------------------------------------------

fn build_items(blocks: &[RawBlock], ctx: &InlineContext) -> Vec<Item> {
    let mut out = Vec::new();
    for b in blocks {
        match b {
            RawBlock::LinkRefDef { .. } | RawBlock::FootnoteDef { .. } => {}
            RawBlock::Heading { level, lines, line_base, delim } => {
                out.push(build_heading(*level, lines, *line_base, *delim, ctx));
            }
            RawBlock::Paragraph { lines, line_base } => {
                out.extend(build_paragraph_like(lines, *line_base, ctx));
            }
            RawBlock::Blockquote { children, delims } => {
                out.push(build_blockquote(children, delims, ctx));
            }
            RawBlock::List { items } => {
                out.push(build_list(items, ctx));
            }
            RawBlock::CodeIndented { lines, line_base } => {
                out.push(build_code_indented(lines, *line_base));
            }
            RawBlock::CodeFenced { lines, line_base, info, open_delim, close_delim } => {
                out.push(build_code_fenced(lines, *line_base, info.clone(), *open_delim, *close_delim));
            }
            RawBlock::Html { lines, line_base } => {
                out.push(build_html(lines, *line_base));
            }
            RawBlock::ThematicBreak { position } => {
                out.push(Item::HorizontalLine { position: *position });
            }
        }
    }
    out
}

fn envelope(items: &[Item]) -> Position {
    items.iter().fold(Position::unset(), |acc, it| acc.union(&it.position()))
}

fn build_paragraph(lines: &[VirginString], line_base: i64, ctx: &InlineContext) -> Item {
    let items = parse_inlines(lines, line_base, ctx);
    Item::Paragraph { position: envelope(&items), items }
}

fn build_paragraph_like(lines: &[VirginString], line_base: i64, ctx: &InlineContext) -> Vec<Item> {
    if ctx.ext.table {
        for i in 0..lines.len().saturating_sub(1) {
            if table::matches(&lines[i].to_string_lossy())
                && table::detect_delimiter_row(&lines[i + 1].to_string_lossy()).is_some()
            {
                if let Some((raw_table, consumed)) = table::try_build_table(&lines[i..], line_base + i as i64) {
                    let mut out = Vec::new();
                    if i > 0 {
                        out.push(build_paragraph(&lines[..i], line_base, ctx));
                    }
                    out.push(reinline_table(raw_table, ctx));
                    let rest = &lines[i + consumed..];
                    if !rest.is_empty() {
                        out.extend(build_paragraph_like(rest, line_base + (i + consumed) as i64, ctx));
                    }
                    return out;
                }
            }
        }
    }
    vec![build_paragraph(lines, line_base, ctx)]
}

fn reinline_table(item: Item, ctx: &InlineContext) -> Item {
    match item {
        Item::Table { position, rows, column_alignments } => {
            let rows = rows.into_iter().map(|r| reinline_row(r, ctx)).collect();
            Item::Table { position, rows, column_alignments }
        }
        other => other,
    }
}

fn reinline_row(item: Item, ctx: &InlineContext) -> Item {
    match item {
        Item::TableRow { position, cells } => {
            let cells = cells.into_iter().map(|c| reinline_cell(c, ctx)).collect();
            Item::TableRow { position, cells }
        }
        other => other,
    }
}

fn reinline_cell(item: Item, ctx: &InlineContext) -> Item {
    match item {
        Item::TableCell { position, items } => {
            let text: String = items
                .iter()
                .filter_map(|it| if let Item::Text { text, .. } = it { Some(text.as_str()) } else { None })
                .collect();
            let line = position.start_line;
            let parsed = parse_inlines(&[VirginString::new(&text)], line, ctx);
            Item::TableCell { position, items: parsed }
        }
        other => other,
    }
}

fn build_heading(level: u8, lines: &[VirginString], line_base: i64, delim: Position, ctx: &InlineContext) -> Item {
    let mut working: Vec<VirginString> = lines.to_vec();
    if let Some(last) = working.last_mut() {
        strip_atx_closing_run(last);
    }
    let explicit = strip_explicit_label_from_lines(&mut working, line_base);

    let items = parse_inlines(&working, line_base, ctx);
    let position = envelope(&items).union(&delim);
    let text_plain: String = items
        .iter()
        .filter_map(|it| if let Item::Text { text, .. } = it { Some(text.as_str()) } else { None })
        .collect();
    let paragraph = Item::Paragraph { position: envelope(&items), items };

    let (label, label_position) = match explicit {
        Some((id, pos)) => (Some(id), pos),
        None if ctx.ext.header_ids && !text_plain.trim().is_empty() => (Some(slugify(&text_plain)), Position::unset()),
        None => (None, Position::unset()),
    };

    Item::Heading { position, level, paragraph: Box::new(paragraph), label, delim, label_position }
}

fn strip_atx_closing_run(line: &mut VirginString) {
    let chars = line.as_chars().to_vec();
    let mut end = chars.len();
    while end > 0 && chars[end - 1] == ' ' {
        end -= 1;
    }
    let mut j = end;
    while j > 0 && chars[j - 1] == '#' {
        j -= 1;
    }
    if j < end && (j == 0 || chars[j - 1] == ' ') {
        let mut trim_to = j;
        while trim_to > 0 && chars[trim_to - 1] == ' ' {
            trim_to -= 1;
        }
        *line = line.slice(0, Some(trim_to as i64));
    }
}

fn strip_explicit_label_from_lines(lines: &mut [VirginString], line_base: i64) -> Option<(String, Position)> {
    let idx = lines.len().checked_sub(1)?;
    let line_no = line_base + idx as i64;
    let (stripped, explicit) = strip_explicit_label(&lines[idx], line_no);
    if explicit.is_some() {
        lines[idx] = stripped;
    }
    explicit
}

fn strip_explicit_label(line: &VirginString, line_no: i64) -> (VirginString, Option<(String, Position)>) {
    let chars = line.as_chars();
    let mut end = chars.len() as i64;
    while end > 0 && chars[(end - 1) as usize] == ' ' {
        end -= 1;
    }
    if end >= 3 && chars[(end - 1) as usize] == '}' {
        let mut i = end - 2;
        while i > 0 && chars[i as usize] != '{' {
            i -= 1;
        }
        if chars.get(i as usize) == Some(&'{') && chars.get((i + 1) as usize) == Some(&'#') {
            let id: String = chars[(i + 2) as usize..(end - 1) as usize].iter().collect();
            if !id.is_empty() {
                let start_col = line.virgin_pos(i);
                let end_col = line.virgin_pos(end - 1);
                let trimmed = line.slice(0, Some(i));
                return (trimmed, Some((id, Position::new(line_no, start_col, line_no, end_col))));
            }
        }
    }
    (line.clone(), None)
}

fn slugify(text: &str) -> String {
    let mut s = String::new();
    let mut last_dash = false;
    for c in text.chars() {
        if c.is_alphanumeric() {
            s.push(c.to_lowercase().next().unwrap_or(c));
            last_dash = false;
        } else if (c.is_whitespace() || c == '-') && !last_dash {
            s.push('-');
            last_dash = true;
        }
    }
    s.trim_matches('-').to_string()
}

fn build_blockquote(children: &[RawBlock], delims: &[Position], ctx: &InlineContext) -> Item {
    let items = build_items(children, ctx);
    let position = envelope(&items);
    Item::Blockquote { position, items, delims: delims.to_vec() }
}

fn build_list(items: &[RawListItem], ctx: &InlineContext) -> Item {
    let built: Vec<Item> = items.iter().map(|ri| build_list_item(ri, ctx)).collect();
    let position = envelope(&built);
    Item::List { position, items: built }
}

fn build_list_item(ri: &RawListItem, ctx: &InlineContext) -> Item {
    let mut children = build_items(&ri.children, ctx);
    let (is_task_list, is_checked, task_delim) =
        if ctx.ext.tasklist { extract_task_marker(&mut children) } else { (false, false, Position::unset()) };
    let position = children.iter().fold(ri.delim_position, |a, b| a.union(&b.position()));
    Item::ListItem {
        position,
        kind: ri.kind,
        prestate: ListItemPrestate::Start,
        start_number: ri.start_number,
        is_task_list,
        is_checked,
        delim: ri.delim_position,
        task_delim,
        items: children,
    }
}

fn extract_task_marker(children: &mut [Item]) -> (bool, bool, Position) {
    if let Some(Item::Paragraph { items, .. }) = children.first_mut() {
        if let Some(Item::Text { text, position, .. }) = items.first_mut() {
            let trimmed = text.trim_start();
            let rest = trimmed
                .strip_prefix("[ ] ")
                .or_else(|| trimmed.strip_prefix("[x] "))
                .or_else(|| trimmed.strip_prefix("[X] "));
            if let Some(rest) = rest {
                let checked = trimmed.starts_with("[x") || trimmed.starts_with("[X");
                let marker_len = (text.chars().count() - rest.chars().count()) as i64;
                let delim_pos = Position::new(
                    position.start_line,
                    position.start_column,
                    position.start_line,
                    position.start_column + marker_len - 1,
                );
                let owned = rest.to_string();
                *text = owned;
                return (true, checked, delim_pos);
            }
        }
    }
    (false, false, Position::unset())
}

fn build_code_fenced(lines: &[VirginString], _line_base: i64, info: Option<String>, open_delim: Position, close_delim: Position) -> Item {
    let text = lines.iter().map(|l| l.to_string_lossy()).collect::<Vec<_>>().join("\n");
    let position = Position::new(open_delim.start_line, open_delim.start_column, close_delim.end_line.max(open_delim.start_line), close_delim.end_column);
    let code = Item::Code {
        position,
        text,
        is_inline: false,
        fenced: true,
        syntax: info,
        syntax_position: Position::unset(),
        start_delim: open_delim,
        end_delim: close_delim,
    };
    Item::CodeBlock { position, code: Box::new(code) }
}

fn build_code_indented(lines: &[VirginString], line_base: i64) -> Item {
    let text = lines.iter().map(|l| l.to_string_lossy()).collect::<Vec<_>>().join("\n");
    let end_line = line_base + lines.len() as i64 - 1;
    let end_col = lines.last().map(|l| (l.len() - 1).max(0)).unwrap_or(0);
    let position = Position::new(line_base, 0, end_line, end_col);
    let code = Item::Code {
        position,
        text,
        is_inline: false,
        fenced: false,
        syntax: None,
        syntax_position: Position::unset(),
        start_delim: Position::unset(),
        end_delim: Position::unset(),
    };
    Item::CodeBlock { position, code: Box::new(code) }
}

fn build_html(lines: &[VirginString], line_base: i64) -> Item {
    let text = lines.iter().map(|l| l.to_string_lossy()).collect::<Vec<_>>().join("\n");
    let end_line = line_base + lines.len() as i64 - 1;
    let end_col = lines.last().map(|l| (l.len() - 1).max(0)).unwrap_or(0);
    Item::RawHtml { position: Position::new(line_base, 0, end_line, end_col), text, is_free_tag: false }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> Parser {
        Parser::new()
    }

    #[test]
    fn plain_paragraph() {
        let doc = parser().parse_str("foo\nbar\n", &Options::default());
        assert_eq!(doc.items().len(), 2); // Anchor, Paragraph
        assert!(matches!(doc.items()[0], Item::Anchor { .. }));
        match &doc.items()[1] {
            Item::Paragraph { items, .. } => {
                assert_eq!(items.len(), 3); // "foo", break, "bar"
            }
            other => panic!("expected Paragraph, got {other:?}"),
        }
    }

    #[test]
    fn atx_heading() {
        let doc = parser().parse_str("# Hi\n", &Options::default());
        assert_eq!(doc.items().len(), 2); // Anchor, Heading
        match &doc.items()[1] {
            Item::Heading { level, .. } => assert_eq!(*level, 1),
            other => panic!("expected Heading, got {other:?}"),
        }
    }

    #[test]
    fn blockquote_with_list() {
        let doc = parser().parse_str("> - a\n> - b\n", &Options::default());
        match &doc.items()[1] {
            Item::Blockquote { items, .. } => match &items[0] {
                Item::List { items, .. } => assert_eq!(items.len(), 2),
                other => panic!("expected List, got {other:?}"),
            },
            other => panic!("expected Blockquote, got {other:?}"),
        }
    }

    #[test]
    fn fenced_code_block() {
        let doc = parser().parse_str("```py\nprint(1)\n```\n", &Options::default());
        match &doc.items()[1] {
            Item::CodeBlock { code, .. } => match code.as_ref() {
                Item::Code { text, syntax, fenced, .. } => {
                    assert_eq!(text, "print(1)");
                    assert_eq!(syntax.as_deref(), Some("py"));
                    assert!(fenced);
                }
                other => panic!("expected Code, got {other:?}"),
            },
            other => panic!("expected CodeBlock, got {other:?}"),
        }
    }

    #[test]
    fn reference_link_resolves() {
        let doc = parser().parse_str("[x]: /u\n\n[x]\n", &Options::default());
        assert_eq!(doc.labeled_link_map.len(), 1);
        let last = doc.items().last().unwrap();
        match last {
            Item::Paragraph { items, .. } => match &items[0] {
                Item::Link { url, .. } => assert_eq!(url, "/u"),
                other => panic!("expected resolved Link, got {other:?}"),
            },
            other => panic!("expected Paragraph, got {other:?}"),
        }
    }

    #[test]
    fn setext_heading_upgrades_paragraph() {
        let doc = parser().parse_str("Title\n=====\n", &Options::default());
        match &doc.items()[1] {
            Item::Heading { level, .. } => assert_eq!(*level, 1),
            other => panic!("expected Heading, got {other:?}"),
        }
    }

    #[test]
    fn thematic_break_is_not_a_list() {
        let doc = parser().parse_str("---\n", &Options::default());
        match &doc.items()[1] {
            Item::HorizontalLine { .. } => {}
            other => panic!("expected HorizontalLine, got {other:?}"),
        }
    }

    #[test]
    fn header_id_extension_slugifies() {
        let mut opts = Options::default();
        opts.extension.header_ids = true;
        let doc = parser().parse_str("# Hello World\n", &Options::default());
        match &doc.items()[1] {
            Item::Heading { label, .. } => assert_eq!(*label, None), // extension off by default
            other => panic!("expected Heading, got {other:?}"),
        }
        let doc = parser().parse_str("# Hello World\n", &opts);
        match &doc.items()[1] {
            Item::Heading { label, .. } => assert_eq!(label.as_deref(), Some("hello-world")),
            other => panic!("expected Heading, got {other:?}"),
        }
    }

    #[test]
    fn table_inside_paragraph() {
        let mut opts = Options::default();
        opts.extension.table = true;
        let doc = parser().parse_str("| a | b |\n| --- | --- |\n| 1 | 2 |\n", &opts);
        match &doc.items()[1] {
            Item::Table { rows, .. } => assert_eq!(rows.len(), 2),
            other => panic!("expected Table, got {other:?}"),
        }
    }

    #[test]
    fn tasklist_extension_marks_checked() {
        let mut opts = Options::default();
        opts.extension.tasklist = true;
        let doc = parser().parse_str("- [x] done\n- [ ] not done\n", &opts);
        match &doc.items()[1] {
            Item::List { items, .. } => {
                match &items[0] {
                    Item::ListItem { is_task_list, is_checked, .. } => {
                        assert!(is_task_list);
                        assert!(is_checked);
                    }
                    other => panic!("expected ListItem, got {other:?}"),
                }
                match &items[1] {
                    Item::ListItem { is_task_list, is_checked, .. } => {
                        assert!(is_task_list);
                        assert!(!is_checked);
                    }
                    other => panic!("expected ListItem, got {other:?}"),
                }
            }
            other => panic!("expected List, got {other:?}"),
        }
    }

    #[test]
    fn cycle_guard_returns_single_anchor() {
        use std::io::Write;
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.md");
        let b = dir.path().join("b.md");
        std::fs::write(&a, format!("[b]({})\n", b.display())).unwrap();
        std::fs::write(&b, format!("[a]({})\n", a.display())).unwrap();
        let doc = parser().parse(a.to_str().unwrap(), true, &[]);
        assert!(matches!(doc.items().first(), Some(Item::Anchor { .. })));
        let _ = Write::flush(&mut std::io::stdout());
    }
}
