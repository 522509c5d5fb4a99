//! C2: `LineClassifier` — recognizes the block kind of a single
//! (tab-expanded) line given a handful of context flags, per spec §4.2.
//! Setext-underline recognition is deliberately absent here: it is not a
//! classifier output, it's detected in context by the segmenter (§4.3).

use crate::scanners;
use crate::strings::VirginString;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineKind {
    EmptyLine,
    Text,
    List,
    ListWithFirstEmptyLine,
    CodeIndentedBySpaces,
    Code,
    Blockquote,
    Heading,
    SomethingInList,
    FencedCodeInList,
    Footnote,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListMarker {
    Unordered(u8),
    Ordered { start: u64, delim: u8 },
}

/// Context flags threaded into the classifier, per spec §4.2.
#[derive(Clone, Debug, Default)]
pub struct ClassifyContext {
    pub in_list: bool,
    pub list_first_line_empty: bool,
    pub fenced_code_in_list: bool,
    pub start_of_code_sequence: Option<(u8, usize)>,
    pub indents: Vec<i64>,
    pub empty_line_preceded: bool,
}

#[derive(Clone, Debug)]
pub struct Classification {
    pub kind: LineKind,
    pub indent: i64,
    pub marker: Option<ListMarker>,
}

fn leading_spaces(chars: &[char]) -> i64 {
    chars.iter().take_while(|&&c| c == ' ').count() as i64
}

pub fn classify(line: &VirginString, ctx: &ClassifyContext) -> Classification {
    let chars = line.as_chars();
    let text: String = chars.iter().collect();
    let bytes = text.as_bytes();

    if chars.iter().all(|c| c.is_whitespace()) {
        return Classification {
            kind: LineKind::EmptyLine,
            indent: 0,
            marker: None,
        };
    }

    let indent = leading_spaces(chars);

    if let Some((fence_char, min_len)) = ctx.start_of_code_sequence {
        if scanners::close_code_fence(bytes, fence_char, min_len) {
            return Classification {
                kind: LineKind::Code,
                indent,
                marker: None,
            };
        }
        return Classification {
            kind: if ctx.fenced_code_in_list {
                LineKind::FencedCodeInList
            } else {
                LineKind::Code
            },
            indent,
            marker: None,
        };
    }

    if ctx.in_list {
        if let Some(&item_indent) = ctx.indents.last() {
            if indent >= item_indent {
                let rest = &bytes[indent.min(bytes.len() as i64) as usize..];
                if scanners::open_code_fence(rest).is_some() {
                    return Classification {
                        kind: LineKind::FencedCodeInList,
                        indent,
                        marker: None,
                    };
                }
                return Classification {
                    kind: LineKind::SomethingInList,
                    indent,
                    marker: None,
                };
            }
        }
    }

    if indent >= 4 {
        return Classification {
            kind: LineKind::CodeIndentedBySpaces,
            indent,
            marker: None,
        };
    }

    let rest = &bytes[indent as usize..];

    if scanners::open_code_fence(rest).is_some() {
        return Classification {
            kind: LineKind::Code,
            indent,
            marker: None,
        };
    }

    if scanners::atx_heading_start(rest).is_some() {
        return Classification {
            kind: LineKind::Heading,
            indent,
            marker: None,
        };
    }

    if rest.first() == Some(&b'>') {
        return Classification {
            kind: LineKind::Blockquote,
            indent,
            marker: None,
        };
    }

    if scanners::footnote_definition(rest).is_some() {
        return Classification {
            kind: LineKind::Footnote,
            indent,
            marker: None,
        };
    }

    if let Some(marker) = list_marker(rest) {
        return Classification {
            kind: if ctx.list_first_line_empty {
                LineKind::ListWithFirstEmptyLine
            } else {
                LineKind::List
            },
            indent,
            marker: Some(marker),
        };
    }

    Classification {
        kind: LineKind::Text,
        indent,
        marker: None,
    }
}

fn list_marker(rest: &[u8]) -> Option<ListMarker> {
    match rest.first()? {
        b'-' | b'+' | b'*' => {
            let next = rest.get(1);
            if next.is_none() || matches!(next, Some(&b' ') | Some(&b'\t')) {
                Some(ListMarker::Unordered(rest[0]))
            } else {
                None
            }
        }
        c if c.is_ascii_digit() => {
            let mut i = 0;
            while i < rest.len() && rest[i].is_ascii_digit() && i < 9 {
                i += 1;
            }
            if i == 0 || i > 9 {
                return None;
            }
            let delim = *rest.get(i)?;
            if delim != b'.' && delim != b')' {
                return None;
            }
            let after = rest.get(i + 1);
            if after.is_some() && !matches!(after, Some(&b' ') | Some(&b'\t')) {
                return None;
            }
            let start: u64 = std::str::from_utf8(&rest[..i]).ok()?.parse().ok()?;
            Some(ListMarker::Ordered { start, delim })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify_line(s: &str, ctx: &ClassifyContext) -> LineKind {
        classify(&VirginString::new(s), ctx).kind
    }

    #[test]
    fn recognizes_basic_kinds() {
        let ctx = ClassifyContext::default();
        assert_eq!(classify_line("", &ctx), LineKind::EmptyLine);
        assert_eq!(classify_line("   ", &ctx), LineKind::EmptyLine);
        assert_eq!(classify_line("# hi", &ctx), LineKind::Heading);
        assert_eq!(classify_line("> quote", &ctx), LineKind::Blockquote);
        assert_eq!(classify_line("- item", &ctx).clone(), LineKind::List);
        assert_eq!(classify_line("1. item", &ctx), LineKind::List);
        assert_eq!(classify_line("```rust", &ctx), LineKind::Code);
        assert_eq!(classify_line("    code", &ctx), LineKind::CodeIndentedBySpaces);
        assert_eq!(classify_line("plain text", &ctx), LineKind::Text);
        assert_eq!(classify_line("[^n]: note", &ctx), LineKind::Footnote);
    }

    #[test]
    fn list_marker_rejects_ten_digits() {
        assert!(list_marker(b"1234567890. x").is_none());
    }
}
