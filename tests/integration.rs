//! End-to-end scenarios and universal properties (spec §8), exercised
//! against the public API rather than any internal module.

use mdpos::{Document, Item, Options, Parser};
use pretty_assertions::assert_eq;

fn parse(input: &str) -> Document {
    Parser::new().parse_str(input, &Options::default())
}

fn parse_ext(input: &str, configure: impl FnOnce(&mut Options)) -> Document {
    let mut opts = Options::default();
    configure(&mut opts);
    Parser::new().parse_str(input, &opts)
}

// --- Six end-to-end scenarios -----------------------------------------

#[test]
fn scenario_1_soft_break_paragraph() {
    let doc = parse("foo\nbar\n");
    assert_eq!(doc.items().len(), 2); // Anchor, Paragraph
    match &doc.items()[1] {
        Item::Paragraph { items, .. } => {
            let texts: Vec<&str> = items
                .iter()
                .filter_map(|it| match it {
                    Item::Text { text, .. } => Some(text.as_str()),
                    _ => None,
                })
                .collect();
            assert_eq!(texts, vec!["foo", "bar"]);
        }
        other => panic!("expected Paragraph, got {other:?}"),
    }
}

#[test]
fn scenario_2_atx_heading_with_slug_label() {
    let doc = parse_ext("# Hi\n", |o| o.extension.header_ids = true);
    match &doc.items()[1] {
        Item::Heading { level, label, .. } => {
            assert_eq!(*level, 1);
            assert_eq!(label.as_deref(), Some("hi"));
        }
        other => panic!("expected Heading, got {other:?}"),
    }
}

#[test]
fn scenario_3_blockquote_wrapping_list() {
    let doc = parse("> - a\n> - b\n");
    match &doc.items()[1] {
        Item::Blockquote { items, .. } => match &items[0] {
            Item::List { items, .. } => assert_eq!(items.len(), 2),
            other => panic!("expected List, got {other:?}"),
        },
        other => panic!("expected Blockquote, got {other:?}"),
    }
}

#[test]
fn scenario_4_fenced_code_with_syntax() {
    let doc = parse("```py\nx=1\n```\n");
    match &doc.items()[1] {
        Item::CodeBlock { code, .. } => match code.as_ref() {
            Item::Code { text, syntax, fenced, .. } => {
                assert_eq!(text, "x=1");
                assert_eq!(syntax.as_deref(), Some("py"));
                assert!(fenced);
            }
            other => panic!("expected Code, got {other:?}"),
        },
        other => panic!("expected CodeBlock, got {other:?}"),
    }
}

#[test]
fn scenario_5_reference_link_resolution() {
    let doc = parse("[x]: /u\n\n[x]\n");
    assert_eq!(doc.labeled_link_map.len(), 1);
    match doc.items().last().unwrap() {
        Item::Paragraph { items, .. } => match &items[0] {
            Item::Link { text, url, .. } => {
                assert_eq!(text, "x");
                assert_eq!(url, "/u");
            }
            other => panic!("expected Link, got {other:?}"),
        },
        other => panic!("expected Paragraph, got {other:?}"),
    }
}

#[test]
fn scenario_6_tab_expansion_preserves_virgin_column() {
    let doc = parse("a\t b");
    match &doc.items()[1] {
        Item::Paragraph { items, .. } => match &items[0] {
            Item::Text { text, position, .. } => {
                assert_eq!(text, "a    b");
                assert_eq!(position.start_column, 0);
            }
            other => panic!("expected Text, got {other:?}"),
        },
        other => panic!("expected Paragraph, got {other:?}"),
    }
}

// --- Boundary behaviors -------------------------------------------------

#[test]
fn empty_input_yields_no_items() {
    let doc = parse("");
    assert_eq!(doc.items(), &[Item::Anchor { label: "<string>".to_string() }]);
    assert!(doc.labeled_link_map.is_empty());
    assert!(doc.footnote_map.is_empty());
}

#[test]
fn single_hash_is_not_a_heading() {
    let doc = parse("#\n");
    match &doc.items()[1] {
        Item::Paragraph { items, .. } => match &items[0] {
            Item::Text { text, .. } => assert_eq!(text, "#"),
            other => panic!("expected Text(\"#\"), got {other:?}"),
        },
        other => panic!("expected Paragraph, got {other:?}"),
    }
}

#[test]
fn hash_space_is_empty_heading() {
    let doc = parse("# \n");
    match &doc.items()[1] {
        Item::Heading { level, paragraph, .. } => {
            assert_eq!(*level, 1);
            match paragraph.as_ref() {
                Item::Paragraph { items, .. } => assert!(items.is_empty()),
                other => panic!("expected Paragraph, got {other:?}"),
            }
        }
        other => panic!("expected Heading, got {other:?}"),
    }
}

#[test]
fn bare_tag_on_own_line_is_html_block() {
    let doc = parse("<a>\n");
    match &doc.items()[1] {
        Item::RawHtml { .. } => {}
        other => panic!("expected RawHtml block, got {other:?}"),
    }
}

// --- Universal properties -----------------------------------------------

#[test]
fn position_envelope_contains_children() {
    let doc = parse("> hello world\n");
    match &doc.items()[1] {
        Item::Blockquote { position: bq_pos, items, .. } => {
            for child in items {
                let c = child.position();
                assert!((bq_pos.start_line, bq_pos.start_column) <= (c.start_line, c.start_column));
                assert!((bq_pos.end_line, bq_pos.end_column) >= (c.end_line, c.end_column));
            }
        }
        other => panic!("expected Blockquote, got {other:?}"),
    }
}

#[test]
fn determinism_across_runs() {
    let input = "# Title\n\nSome *em* and **strong** text.\n\n- a\n- b\n";
    let a = parse(input);
    let b = parse(input);
    assert_eq!(a, b);
}

#[test]
fn footnote_map_iterates_in_definition_order() {
    let doc = parse_ext(
        "[^b]: second\n[^a]: first\n\ntext[^b][^a]\n",
        |o| o.extension.footnotes = true,
    );
    let keys: Vec<&str> = doc.footnote_map.iter().map(|(k, _)| k).collect();
    assert_eq!(keys.len(), 2);
    assert!(keys[0].starts_with("#B/"));
    assert!(keys[1].starts_with("#A/"));
}

#[test]
fn label_normalization_is_case_and_whitespace_insensitive() {
    let doc = parse("[Some   Label]: /dest\n\n[some label]\n");
    assert_eq!(doc.labeled_link_map.len(), 1);
    match doc.items().last().unwrap() {
        Item::Paragraph { items, .. } => match &items[0] {
            Item::Link { url, .. } => assert_eq!(url, "/dest"),
            other => panic!("expected resolved Link, got {other:?}"),
        },
        other => panic!("expected Paragraph, got {other:?}"),
    }
}

// --- File-based parsing (orchestrator boundary) --------------------------

#[test]
fn parse_from_file_inserts_anchor() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    std::io::Write::write_all(&mut file, b"# Title\n").unwrap();
    let doc = Parser::new().parse(file.path().to_str().unwrap(), false, &[]);
    match doc.items().first() {
        Some(Item::Anchor { .. }) => {}
        other => panic!("expected Anchor as first item, got {other:?}"),
    }
    match &doc.items()[1] {
        Item::Heading { level, .. } => assert_eq!(*level, 1),
        other => panic!("expected Heading, got {other:?}"),
    }
}
