//! Parse-time configuration. There is no render-option struct here, since
//! rendering is out of scope (spec §1), so `Options` carries only the
//! `Extension` gate struct.

/// Umbrella options struct accepted by [`crate::Parser::parse`].
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Enable CommonMark extensions.
    pub extension: Extension,

    /// File extensions recognized when following local links in recursive
    /// mode (spec §6). Defaults to `["md", "markdown"]` when empty.
    pub recursive_extensions: Vec<String>,
}

impl Options {
    pub fn recursive_extensions(&self) -> Vec<String> {
        if self.recursive_extensions.is_empty() {
            vec!["md".to_string(), "markdown".to_string()]
        } else {
            self.recursive_extensions.clone()
        }
    }
}

/// Options to select GitHub-flavored extensions. Each defaults to
/// disabled, matching core CommonMark behavior with nothing turned on.
#[derive(Debug, Clone, Default)]
pub struct Extension {
    /// Enables the GitHub-style bare URL/`www.`/email autolink upgrade
    /// (spec §4.4.3 "URL validation", §4.4.8 plugin id 1).
    ///
    /// ```rust
    /// # use mdpos::{Options, Parser};
    /// let mut options = Options::default();
    /// options.extension.autolink = true;
    /// let doc = Parser::new().parse_str("See www.example.com.\n", &options);
    /// assert!(!doc.items().is_empty());
    /// ```
    pub autolink: bool,

    /// Enables inline (`$…$`) and display (`$$…$$`) math spans (spec
    /// §4.4.5).
    pub math: bool,

    /// Enables task-list items (`[ ]`/`[x]` at the start of a list item;
    /// spec §4.4.9).
    pub tasklist: bool,

    /// Enables footnote definitions (`[^label]:`) and references
    /// (`[^label]`; spec §4.3 "Footnote definitions", §4.4.10).
    pub footnotes: bool,

    /// Enables the slugified-heading-label rule described in spec §3: a
    /// non-empty heading is labeled with the slug of its text even absent
    /// an explicit `{#id}` suffix.
    pub header_ids: bool,

    /// Enables GFM tables (spec §4.4.7).
    pub table: bool,

    /// Enables strikethrough (`~~…~~`) as a third `opts` bit alongside
    /// italic/bold (spec §3, supplemented in SPEC_FULL.md §10.5).
    pub strikethrough: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_all_disabled() {
        let o = Options::default();
        assert!(!o.extension.autolink);
        assert!(!o.extension.math);
        assert!(!o.extension.tasklist);
        assert!(!o.extension.footnotes);
        assert!(!o.extension.header_ids);
        assert!(!o.extension.table);
        assert!(!o.extension.strikethrough);
    }

    #[test]
    fn recursive_extensions_default_to_md_and_markdown() {
        let o = Options::default();
        assert_eq!(o.recursive_extensions(), vec!["md".to_string(), "markdown".to_string()]);
    }
}
