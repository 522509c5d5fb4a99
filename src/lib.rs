//! A Markdown parser that tracks, for every node it produces, the exact
//! `(line, column)` span in the original source text the node came from
//! (spec §1/§2).
//!
//! The data model is a closed tagged union ([`Item`]) rather than a live
//! arena: a [`Document`] owns its tree outright, alongside the label maps
//! built during reference resolution ([`normalize_label_key`]). There is no
//! renderer here — callers get the tree and its positions, and do their own
//! HTML/other output generation on top.
//!
//! ```rust
//! use mdpos::{Options, Parser};
//!
//! let doc = Parser::new().parse_str("# Title\n\nSome *text*.\n", &Options::default());
//! assert_eq!(doc.items().len(), 2);
//! ```

mod autolink;
mod ctype;
mod entity;
pub mod error;
pub mod node;
pub mod parser;
mod scanners;
mod strings;

pub use node::{
    normalize_label_key, Document, Item, LabelMap, ListItemKind, ListItemPrestate, Position,
    StyleDelim, TableAlignment, TextOpts,
};
pub use parser::options::{Extension, Options};
pub use parser::{Parser, PluginFn};
