//! The AST: a closed tagged union (`Item`) of inline and block nodes, each
//! carrying its virgin-source [`Position`], plus the `Document`'s three
//! label maps.
//!
//! Every node here is created once, in the orchestrator's build pass
//! (`parser::mod`), and owned by its parent; there is no arena, no `Rc`, no
//! interior mutability. A `Document` owns its root `items` outright and the
//! label maps alongside them; nodes that are "looked up" by label
//! (`FootnoteRef`, a resolved reference `Link`) hold a copy of the resolved
//! data rather than a live reference back into the map, since the map is
//! immutable after the reference-collection pass completes.

use rustc_hash::FxHashMap;

/// A `(startLine, startCol, endLine, endCol)` envelope in virgin source
/// coordinates, inclusive and zero-based. `UNSET` (`-1`) marks an unknown
/// bound, matching the data model's "Unset = -1" convention exactly so that
/// a freshly-default-constructed `Position` is recognizably incomplete
/// rather than spuriously valid at `(0, 0, 0, 0)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Position {
    pub start_line: i64,
    pub start_column: i64,
    pub end_line: i64,
    pub end_column: i64,
}

pub const UNSET: i64 = -1;

impl Position {
    pub fn unset() -> Self {
        Position {
            start_line: UNSET,
            start_column: UNSET,
            end_line: UNSET,
            end_column: UNSET,
        }
    }

    pub fn new(start_line: i64, start_column: i64, end_line: i64, end_column: i64) -> Self {
        Position {
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }

    pub fn is_set(&self) -> bool {
        self.start_line != UNSET
    }

    /// The smallest envelope containing both `self` and `other`.
    pub fn union(&self, other: &Position) -> Position {
        if !self.is_set() {
            return *other;
        }
        if !other.is_set() {
            return *self;
        }
        let (start_line, start_column) = if (self.start_line, self.start_column)
            <= (other.start_line, other.start_column)
        {
            (self.start_line, self.start_column)
        } else {
            (other.start_line, other.start_column)
        };
        let (end_line, end_column) =
            if (self.end_line, self.end_column) >= (other.end_line, other.end_column) {
                (self.end_line, self.end_column)
            } else {
                (other.end_line, other.end_column)
            };
        Position {
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }
}

/// Bitset of inline formatting carried by a `Text` item. Modeled on
/// `md4qt::TextOption`, with `Strikethrough` added for the GFM extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct TextOpts {
    pub italic: bool,
    pub bold: bool,
    pub strikethrough: bool,
}

impl TextOpts {
    pub const NONE: TextOpts = TextOpts {
        italic: false,
        bold: false,
        strikethrough: false,
    };
}

/// A single emphasis/strikethrough delimiter character (or run) recorded at
/// the virgin position it occupied, so editors can highlight the marker
/// independently of the text it surrounds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StyleDelim {
    pub position: Position,
}

/// Alignment of a table column, from the colon placement in its separator
/// row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TableAlignment {
    None,
    Left,
    Right,
    Center,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListItemKind {
    Ordered,
    Unordered,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListItemPrestate {
    Start,
    Continue,
}

/// The closed sum type every parsed node belongs to. Blocks that contain
/// other items hold them as owned `Vec<Item>`; there is no shared ownership
/// anywhere in the tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Item {
    // --- Inline ---
    Text {
        position: Position,
        text: String,
        opts: TextOpts,
        space_before: bool,
        space_after: bool,
        open_styles: Vec<StyleDelim>,
        close_styles: Vec<StyleDelim>,
    },
    LineBreak {
        position: Position,
    },
    Code {
        position: Position,
        text: String,
        is_inline: bool,
        fenced: bool,
        syntax: Option<String>,
        syntax_position: Position,
        start_delim: Position,
        end_delim: Position,
    },
    Math {
        position: Position,
        expr: String,
        is_inline: bool,
        display: bool,
    },
    Link {
        position: Position,
        text: String,
        url: String,
        image: Option<Box<Item>>,
        opts: TextOpts,
        text_position: Position,
        url_position: Position,
    },
    Image {
        position: Position,
        text: String,
        url: String,
        alt: Box<Item>,
    },
    FootnoteRef {
        position: Position,
        id: String,
    },
    RawHtml {
        position: Position,
        text: String,
        is_free_tag: bool,
    },
    Anchor {
        label: String,
    },

    // --- Block ---
    Paragraph {
        position: Position,
        items: Vec<Item>,
    },
    Heading {
        position: Position,
        level: u8,
        paragraph: Box<Item>,
        label: Option<String>,
        delim: Position,
        label_position: Position,
    },
    Blockquote {
        position: Position,
        items: Vec<Item>,
        delims: Vec<Position>,
    },
    List {
        position: Position,
        items: Vec<Item>,
    },
    ListItem {
        position: Position,
        kind: ListItemKind,
        prestate: ListItemPrestate,
        start_number: Option<u64>,
        is_task_list: bool,
        is_checked: bool,
        delim: Position,
        task_delim: Position,
        items: Vec<Item>,
    },
    CodeBlock {
        position: Position,
        code: Box<Item>,
    },
    Table {
        position: Position,
        rows: Vec<Item>,
        column_alignments: Vec<TableAlignment>,
    },
    TableRow {
        position: Position,
        cells: Vec<Item>,
    },
    TableCell {
        position: Position,
        items: Vec<Item>,
    },
    Footnote {
        position: Position,
        id: String,
        items: Vec<Item>,
        id_position: Position,
    },
    HorizontalLine {
        position: Position,
    },
    PageBreak,
    Document {
        items: Vec<Item>,
        footnote_map: LabelMap<Item>,
        labeled_link_map: LabelMap<Item>,
        labeled_heading_map: LabelMap<Item>,
    },
}

impl Item {
    pub fn position(&self) -> Position {
        match self {
            Item::Text { position, .. }
            | Item::LineBreak { position }
            | Item::Code { position, .. }
            | Item::Math { position, .. }
            | Item::Link { position, .. }
            | Item::Image { position, .. }
            | Item::FootnoteRef { position, .. }
            | Item::RawHtml { position, .. }
            | Item::Paragraph { position, .. }
            | Item::Heading { position, .. }
            | Item::Blockquote { position, .. }
            | Item::List { position, .. }
            | Item::ListItem { position, .. }
            | Item::CodeBlock { position, .. }
            | Item::Table { position, .. }
            | Item::TableRow { position, .. }
            | Item::TableCell { position, .. }
            | Item::Footnote { position, .. }
            | Item::HorizontalLine { position } => *position,
            Item::Anchor { .. } | Item::PageBreak => Position::unset(),
            Item::Document { .. } => Position::unset(),
        }
    }
}

/// An insertion-ordered `label -> value` map. `rustc_hash::FxHashMap` alone
/// does not guarantee iteration order, and spec §3/§8 requires the
/// `footnotesMap` (and, for determinism, the link/heading maps too) to
/// iterate in definition order regardless of the host map implementation;
/// this pairs a stable `Vec` with an `FxHashMap` index for O(1) lookup.
#[derive(Clone, Debug, Default)]
pub struct LabelMap<T> {
    order: Vec<(String, T)>,
    index: FxHashMap<String, usize>,
}

impl<T> LabelMap<T> {
    pub fn new() -> Self {
        LabelMap {
            order: Vec::new(),
            index: FxHashMap::default(),
        }
    }

    /// Inserts a value for `key` if absent; does nothing if the key is
    /// already present, matching the "first definition wins" rule
    /// CommonMark uses for duplicate reference-link labels.
    pub fn insert_if_absent(&mut self, key: String, value: T) -> bool {
        if self.index.contains_key(&key) {
            return false;
        }
        self.index.insert(key.clone(), self.order.len());
        self.order.push((key, value));
        true
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.index.get(key).map(|&i| &self.order[i].1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Iterates in definition (insertion) order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.order.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// The top-level parse result. Shaped identically to the `Item::Document`
/// variant above, but as a standalone struct so callers get plain
/// field/method access (`doc.items()`) instead of having to match on `Item`
/// for the one variant that never nests inside another.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub items: Vec<Item>,
    pub footnote_map: LabelMap<Item>,
    pub labeled_link_map: LabelMap<Item>,
    pub labeled_heading_map: LabelMap<Item>,
}

impl Document {
    pub fn items(&self) -> &[Item] {
        &self.items
    }
}

/// Normalizes a reference label (link label, footnote label, or heading
/// text) into the document's map key space: case-folded, uppercased,
/// whitespace-collapsed, then namespaced to the file it was found in so
/// labels from recursively-included files don't collide.
///
/// Per spec §3 the key shape is `"#LABEL/workdir/file"`.
pub fn normalize_label_key(label: &str, working_directory: &str, file: &str) -> String {
    let trimmed = label.trim();
    let folded: String = caseless::default_case_fold_str(trimmed);
    let mut collapsed = String::with_capacity(folded.len());
    let mut last_was_space = false;
    for ch in folded.chars() {
        if ch.is_whitespace() {
            if !last_was_space {
                collapsed.push(' ');
                last_was_space = true;
            }
        } else {
            last_was_space = false;
            collapsed.push(ch);
        }
    }
    let upper = collapsed.trim().to_uppercase();
    format!("#{}/{}/{}", upper, working_directory, file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_union_grows_to_contain_both() {
        let a = Position::new(1, 0, 1, 5);
        let b = Position::new(1, 3, 2, 2);
        let u = a.union(&b);
        assert_eq!(u, Position::new(1, 0, 2, 2));
    }

    #[test]
    fn unset_position_is_identity_for_union() {
        let a = Position::new(3, 1, 3, 4);
        assert_eq!(Position::unset().union(&a), a);
        assert_eq!(a.union(&Position::unset()), a);
    }

    #[test]
    fn label_normalization_folds_case_and_collapses_whitespace() {
        let a = normalize_label_key("Foo   Bar", "wd", "doc.md");
        let b = normalize_label_key("foo bar", "wd", "doc.md");
        assert_eq!(a, b);
        assert_eq!(a, "#FOO BAR/wd/doc.md");
    }

    #[test]
    fn label_map_preserves_insertion_order() {
        let mut m: LabelMap<i32> = LabelMap::new();
        m.insert_if_absent("b".into(), 2);
        m.insert_if_absent("a".into(), 1);
        let keys: Vec<&str> = m.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn label_map_first_definition_wins() {
        let mut m: LabelMap<i32> = LabelMap::new();
        assert!(m.insert_if_absent("a".into(), 1));
        assert!(!m.insert_if_absent("a".into(), 2));
        assert_eq!(m.get("a"), Some(&1));
    }
}
