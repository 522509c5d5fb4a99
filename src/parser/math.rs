//! Math span construction (spec §4.4.5). Only inline/display `$…$`/`$$…$$`
//! spans are in scope — there is no fenced math *block* construct anywhere
//! in the data model, so this module carries no `NodeMathBlock` counterpart.

use crate::node::{Item, Position};

/// Builds a `Math` item from the content between two matched dollar runs.
/// `dollar_count` is 1 for inline math, 2 for display math; `code_math`
/// marks the `` $` … `$ `` code-math variant, which strips one leading and
/// trailing backtick if present.
pub fn make_math(position: Position, mut literal: String, dollar_count: u8, code_math: bool) -> Item {
    if code_math {
        if let Some(stripped) = literal
            .strip_prefix('`')
            .and_then(|s| s.strip_suffix('`'))
        {
            literal = stripped.to_string();
        }
    }
    Item::Math {
        position,
        expr: literal,
        is_inline: dollar_count == 1,
        display: dollar_count == 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_math_is_not_display() {
        let m = make_math(Position::unset(), "x^2".to_string(), 1, false);
        match m {
            Item::Math { is_inline, display, .. } => {
                assert!(is_inline);
                assert!(!display);
            }
            _ => panic!("expected Math"),
        }
    }

    #[test]
    fn display_math_strips_code_backticks() {
        let m = make_math(Position::unset(), "`x^2`".to_string(), 2, true);
        match m {
            Item::Math { expr, is_inline, display, .. } => {
                assert_eq!(expr, "x^2");
                assert!(!is_inline);
                assert!(display);
            }
            _ => panic!("expected Math"),
        }
    }
}
