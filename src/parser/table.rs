//! Tables inside paragraphs (spec §4.4.7). A text fragment whose line L
//! looks like a pipe-separated header and whose line L+1 is a matching
//! colon/hyphen alignment row is split out of the surrounding paragraph
//! into a `Table`. Built around the same `try_opening_header`/
//! `try_opening_row`/`row` trio of operations, which ran incrementally
//! against a live `AstNode` tree; here the whole candidate table is detected
//! and built in one pass over the fragment's `VirginString` lines,
//! consistent with the owned-tree model.

use crate::node::{Item, Position, TableAlignment};
use crate::scanners;
use crate::strings::VirginString;

/// Attempts to parse a table starting at `lines[0]` (the header row) given
/// that `lines[1]` has already been confirmed to be a delimiter row via
/// [`detect_delimiter_row`]. Returns the built `Table` item and the number
/// of lines it consumed, or `None` if the header/delimiter cell counts
/// don't match.
pub fn try_build_table(lines: &[VirginString], line_base: i64) -> Option<(Item, usize)> {
    if lines.len() < 2 {
        return None;
    }
    let header_cells = row(&lines[0].to_string_lossy())?;
    let alignments = detect_delimiter_row(&lines[1].to_string_lossy())?;
    if header_cells.len() != alignments.len() {
        return None;
    }

    let header_row = build_row(&header_cells, &alignments, line_base);
    let mut rows = vec![header_row];
    let mut consumed = 2;

    for line in &lines[2..] {
        let text = line.to_string_lossy();
        if text.trim().is_empty() {
            break;
        }
        let cells = match row(&text) {
            Some(c) => c,
            None => break,
        };
        rows.push(build_row(&cells, &alignments, line_base + consumed as i64));
        consumed += 1;
    }

    Some((
        Item::Table {
            position: Position::unset(),
            rows,
            column_alignments: alignments,
        },
        consumed,
    ))
}

/// Does `line` look like a table delimiter row (`| :-- | --: |` etc)?
pub fn detect_delimiter_row(line: &str) -> Option<Vec<TableAlignment>> {
    scanners::table_delimiter_row(line.as_bytes())
}

fn build_row(cells: &[String], alignments: &[TableAlignment], line: i64) -> Item {
    let mut table_cells = Vec::with_capacity(alignments.len());
    for i in 0..alignments.len() {
        let text = cells.get(i).cloned().unwrap_or_default();
        table_cells.push(Item::TableCell {
            position: Position::new(line, 0, line, text.chars().count().max(1) as i64 - 1),
            items: vec![Item::Text {
                position: Position::unset(),
                text,
                opts: Default::default(),
                space_before: false,
                space_after: false,
                open_styles: Vec::new(),
                close_styles: Vec::new(),
            }],
        });
    }
    Item::TableRow {
        position: Position::new(line, 0, line, 0),
        cells: table_cells,
    }
}

/// Splits a row into trimmed, pipe-unescaped cells: an optional leading
/// `|` is consumed, cells are separated by
/// unescaped `|`, and a trailing empty cell caused by a closing `|` is
/// dropped.
fn row(line: &str) -> Option<Vec<String>> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    let inner = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    if inner.is_empty() {
        return None;
    }
    let cells: Vec<String> = scanners::split_unescaped_pipes(inner.as_bytes())
        .into_iter()
        .map(|bytes| String::from_utf8_lossy(&bytes).trim().to_string())
        .collect();
    if cells.is_empty() {
        None
    } else {
        Some(cells)
    }
}

/// Whether `line` could plausibly be a table row at all (used by the
/// segmenter to decide whether to look for a delimiter row on the next
/// line).
pub fn matches(line: &str) -> bool {
    row(line).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_table_from_header_delim_and_rows() {
        let lines = vec![
            VirginString::new("| a | b |"),
            VirginString::new("| :-- | --: |"),
            VirginString::new("| 1 | 2 |"),
        ];
        let (table, consumed) = try_build_table(&lines, 0).unwrap();
        assert_eq!(consumed, 3);
        match table {
            Item::Table { rows, column_alignments, .. } => {
                assert_eq!(rows.len(), 2);
                assert_eq!(column_alignments, vec![TableAlignment::Left, TableAlignment::Right]);
            }
            _ => panic!("expected Table"),
        }
    }

    #[test]
    fn mismatched_cell_counts_reject() {
        let lines = vec![
            VirginString::new("| a | b | c |"),
            VirginString::new("| :-- | --: |"),
        ];
        assert!(try_build_table(&lines, 0).is_none());
    }
}
