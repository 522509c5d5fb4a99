//! `VirginString`: a mutable line of text that remembers, for every character
//! it currently holds, the column in the original ("virgin") source line that
//! produced it.
//!
//! Every block- and inline-level routine in this crate edits lines before
//! classifying or tokenizing them — tabs are expanded, backslash escapes are
//! removed, entities are decoded, leading container markers are stripped.
//! `VirginString` is what lets every one of those edits still answer
//! `virgin_pos(i)` for a surviving character, which is how every AST node
//! ends up carrying real source positions instead of positions into some
//! internally-rewritten copy of the line.
//!
//! A freshly constructed `VirginString` has the identity mapping: character
//! `i` came from column `i`. Each subsequent edit appends one *pass*; a pass
//! is scoped to a single logical edit of the string (the call to `replace`
//! that made it, not a span within a string). [`VirginString::virgin_pos`]
//! walks the passes newest-first, undoing each one in turn.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct EditRecord {
    /// Position of this edit in the string as it stood immediately before
    /// the edit was applied.
    pos: i64,
    old_len: i64,
    new_len: i64,
}

#[derive(Clone, Debug)]
struct EditPass {
    /// Offset added back on unconditionally; nonzero for passes produced by
    /// `slice`/`split`, which view a sub-range of a larger string.
    first_pos: i64,
    /// Length of the string immediately before this pass was applied.
    length: i64,
    records: Vec<EditRecord>,
}

/// A line of text with virgin-position tracking. See the module docs.
#[derive(Clone, Debug)]
pub struct VirginString {
    chars: Vec<char>,
    passes: Vec<EditPass>,
}

impl VirginString {
    /// Builds a fresh `VirginString` with the identity mapping.
    pub fn new(s: &str) -> Self {
        VirginString {
            chars: s.chars().collect(),
            passes: Vec::new(),
        }
    }

    pub fn from_chars(chars: Vec<char>) -> Self {
        VirginString {
            chars,
            passes: Vec::new(),
        }
    }

    pub fn len(&self) -> i64 {
        self.chars.len() as i64
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn char_at(&self, pos: i64) -> char {
        self.chars[pos as usize]
    }

    pub fn as_chars(&self) -> &[char] {
        &self.chars
    }

    pub fn to_string_lossy(&self) -> String {
        self.chars.iter().collect()
    }

    /// Maps a column in the current (edited) string back to the column in
    /// the virgin source line that produced it.
    pub fn virgin_pos(&self, pos: i64) -> i64 {
        let mut pos = pos;
        for pass in self.passes.iter().rev() {
            pos = Self::virgin_pos_in_pass(pos, pass);
        }
        pos
    }

    fn virgin_pos_in_pass(pos: i64, pass: &EditPass) -> i64 {
        let mut p: i64 = 0;

        for rec in &pass.records {
            if rec.pos + rec.old_len.min(rec.new_len) <= pos + p {
                if rec.old_len < rec.new_len {
                    let expansion = rec.new_len - rec.old_len;
                    if expansion >= pos {
                        p -= pos;
                    } else if rec.pos - p + pass.first_pos > pass.length {
                        let boundary_hit = pos >= pass.length - p + expansion;
                        p -= pos + p + pass.first_pos - pass.length + if boundary_hit { 0 } else { 1 };
                    } else {
                        p -= expansion;
                    }
                } else {
                    p += rec.old_len - rec.new_len;
                }
            } else {
                break;
            }
        }

        pos + p + pass.first_pos
    }

    /// Replaces every non-overlapping occurrence of `needle` with
    /// `replacement`, left to right.
    pub fn replace(&mut self, needle: &str, replacement: &str) -> &mut Self {
        if needle.is_empty() {
            return self;
        }
        let needle: Vec<char> = needle.chars().collect();
        let replacement: Vec<char> = replacement.chars().collect();
        let len = self.chars.len() as i64;

        let mut out = Vec::with_capacity(self.chars.len());
        let mut records = Vec::new();
        let mut i = 0usize;

        while i < self.chars.len() {
            match find_subslice(&self.chars, &needle, i) {
                Some(p) => {
                    out.extend_from_slice(&self.chars[i..p]);
                    out.extend_from_slice(&replacement);
                    if needle.len() != replacement.len() {
                        records.push(EditRecord {
                            pos: p as i64,
                            old_len: needle.len() as i64,
                            new_len: replacement.len() as i64,
                        });
                    }
                    i = p + needle.len();
                }
                None => {
                    out.extend_from_slice(&self.chars[i..]);
                    i = self.chars.len();
                }
            }
        }

        self.chars = out;
        if !records.is_empty() {
            self.passes.push(EditPass {
                first_pos: 0,
                length: len,
                records,
            });
        }
        self
    }

    /// Removes `n` characters starting at `pos`.
    pub fn remove(&mut self, pos: i64, n: i64) -> &mut Self {
        let len = self.chars.len() as i64;
        let start = pos as usize;
        let end = (pos + n) as usize;
        self.chars.drain(start..end.min(self.chars.len()));

        self.passes.push(EditPass {
            first_pos: 0,
            length: len,
            records: vec![EditRecord {
                pos,
                old_len: n,
                new_len: 0,
            }],
        });
        self
    }

    /// Inserts a single character at `pos`.
    pub fn insert(&mut self, pos: i64, ch: char) -> &mut Self {
        let len = self.chars.len() as i64;
        self.chars.insert(pos as usize, ch);

        self.passes.push(EditPass {
            first_pos: 0,
            length: len,
            records: vec![EditRecord {
                pos,
                old_len: 1,
                new_len: 2,
            }],
        });
        self
    }

    /// Collapses runs of whitespace to a single space and strips leading and
    /// trailing whitespace, returning a new `VirginString` whose surviving
    /// characters still map back to their virgin columns.
    pub fn simplify(&self) -> VirginString {
        if self.is_empty() {
            return self.clone();
        }

        let len = self.chars.len() as i64;
        let mut result_chars = Vec::with_capacity(self.chars.len());
        let mut records: Vec<EditRecord> = Vec::new();

        let mut i: i64 = 0;
        let mut first = true;
        let mut spaces: i64;

        loop {
            let tmp = i;
            while (i as usize) < self.chars.len() && self.chars[i as usize].is_whitespace() {
                i += 1;
            }
            spaces = i - tmp;

            if i != tmp && (i - tmp > 1 || first) {
                records.push(EditRecord {
                    pos: tmp,
                    old_len: i - tmp,
                    new_len: if first { 0 } else { 1 },
                });
            }
            first = false;

            while (i as usize) != self.chars.len() && !self.chars[i as usize].is_whitespace() {
                result_chars.push(self.chars[i as usize]);
                i += 1;
            }

            if i as usize == self.chars.len() {
                break;
            }

            result_chars.push(' ');
        }

        if result_chars.last() == Some(&' ') {
            result_chars.pop();
            if spaces > 1 {
                if let Some(last) = records.last_mut() {
                    last.new_len = 0;
                }
            } else if spaces == 1 {
                records.push(EditRecord {
                    pos: len - spaces,
                    old_len: spaces,
                    new_len: 0,
                });
            }
        }

        let mut passes = self.passes.clone();
        if !records.is_empty() {
            passes.push(EditPass {
                first_pos: 0,
                length: len,
                records,
            });
        }

        VirginString {
            chars: result_chars,
            passes,
        }
    }

    /// Returns the sub-range `[pos, pos+len)` (or to the end, if `len` is
    /// `None`) as a new `VirginString` that can still answer `virgin_pos`.
    pub fn slice(&self, pos: i64, len: Option<i64>) -> VirginString {
        let old_len = self.chars.len() as i64;
        let start = pos as usize;
        let take = len.unwrap_or(old_len - pos).max(0) as usize;
        let end = (start + take).min(self.chars.len());
        let chars = self.chars[start..end].to_vec();

        let mut passes = self.passes.clone();
        let mut records = Vec::new();
        if let Some(l) = len {
            if l < old_len - pos {
                records.push(EditRecord {
                    pos: pos + l,
                    old_len: old_len - pos - l,
                    new_len: 0,
                });
            }
        }
        passes.push(EditPass {
            first_pos: pos,
            length: old_len,
            records,
        });

        VirginString { chars, passes }
    }

    /// Returns the last `n` characters as a new `VirginString`.
    pub fn right(&self, n: i64) -> VirginString {
        let len = self.chars.len() as i64;
        let start = (len - n).max(0);
        let chars = self.chars[start as usize..].to_vec();

        let mut passes = self.passes.clone();
        passes.push(EditPass {
            first_pos: len - n,
            length: len,
            records: Vec::new(),
        });

        VirginString { chars, passes }
    }

    /// Splits on every occurrence of `sep`, dropping empty segments, each
    /// carrying its own origin offset.
    pub fn split(&self, sep: &str) -> Vec<VirginString> {
        if sep.is_empty() {
            return (0..self.chars.len())
                .map(|i| {
                    let mut passes = self.passes.clone();
                    passes.push(EditPass {
                        first_pos: i as i64,
                        length: self.chars.len() as i64,
                        records: Vec::new(),
                    });
                    VirginString {
                        chars: vec![self.chars[i]],
                        passes,
                    }
                })
                .collect();
        }

        let sep: Vec<char> = sep.chars().collect();
        let mut result = Vec::new();
        let mut pos = 0usize;

        loop {
            match find_subslice(&self.chars, &sep, pos) {
                Some(fpos) if fpos < self.chars.len() => {
                    if fpos > pos {
                        result.push(self.sub_with_origin(pos, fpos));
                    }
                    pos = fpos + sep.len();
                }
                _ => break,
            }
        }

        if pos < self.chars.len() {
            result.push(self.sub_with_origin(pos, self.chars.len()));
        }

        result
    }

    fn sub_with_origin(&self, start: usize, end: usize) -> VirginString {
        let mut passes = self.passes.clone();
        passes.push(EditPass {
            first_pos: start as i64,
            length: self.chars.len() as i64,
            records: Vec::new(),
        });
        VirginString {
            chars: self.chars[start..end].to_vec(),
            passes,
        }
    }
}

fn find_subslice(haystack: &[char], needle: &[char], from: usize) -> Option<usize> {
    if needle.is_empty() || from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

/// Tab stop width used by [`expand_tabs`].
pub const TAB_STOP: i64 = 4;

/// Expands every tab in `line` to enough spaces to reach the next tab stop
/// (stops every [`TAB_STOP`] columns), recording the expansion as a single
/// edit pass so columns still map back to the pre-expansion positions.
pub fn expand_tabs(line: &str) -> VirginString {
    let chars: Vec<char> = line.chars().collect();
    let mut out = Vec::with_capacity(chars.len());
    let mut records = Vec::new();
    let mut col: i64 = 0;

    for (i, &ch) in chars.iter().enumerate() {
        if ch == '\t' {
            let width = TAB_STOP - (col % TAB_STOP);
            let width = if width == 0 { TAB_STOP } else { width };
            out.resize(out.len() + width as usize, ' ');
            if width != 1 {
                records.push(EditRecord {
                    pos: i as i64,
                    old_len: 1,
                    new_len: width,
                });
            }
            col += width;
        } else {
            out.push(ch);
            col += 1;
        }
    }

    let passes = if records.is_empty() {
        Vec::new()
    } else {
        vec![EditPass {
            first_pos: 0,
            length: chars.len() as i64,
            records,
        }]
    };

    VirginString { chars: out, passes }
}

/// Strips the single trailing line terminator (`\n`, `\r\n` or lone `\r`)
/// from a raw input line.
pub fn strip_line_ending(s: &str) -> &str {
    s.strip_suffix("\r\n")
        .or_else(|| s.strip_suffix('\n'))
        .or_else(|| s.strip_suffix('\r'))
        .unwrap_or(s)
}

pub fn is_blank(chars: &[char]) -> bool {
    chars.iter().all(|c| c.is_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_mapping_on_fresh_string() {
        let s = VirginString::new("hello");
        for i in 0..5 {
            assert_eq!(s.virgin_pos(i), i);
        }
    }

    #[test]
    fn remove_shifts_virgin_positions() {
        let mut s = VirginString::new("a  b"); // remove one space at pos 1
        s.remove(1, 1);
        assert_eq!(s.to_string_lossy(), "a b");
        assert_eq!(s.virgin_pos(0), 0);
        assert_eq!(s.virgin_pos(1), 2);
        assert_eq!(s.virgin_pos(2), 3);
    }

    #[test]
    fn insert_shifts_virgin_positions_after() {
        let mut s = VirginString::new("ac");
        s.insert(1, 'b'); // "abc"
        assert_eq!(s.to_string_lossy(), "abc");
        assert_eq!(s.virgin_pos(0), 0);
        assert_eq!(s.virgin_pos(2), 1);
    }

    #[test]
    fn tab_expansion_preserves_virgin_columns() {
        // "a\t b" -> tab at col 1 expands to 3 spaces to reach col 4.
        let s = expand_tabs("a\t b");
        assert_eq!(s.to_string_lossy(), "a    b");
        assert_eq!(s.virgin_pos(0), 0); // 'a'
        assert_eq!(s.virgin_pos(5), 3); // 'b' maps back to virgin col 3
    }

    #[test]
    fn simplify_collapses_whitespace_and_trims() {
        let s = VirginString::new("  foo   bar  ");
        let simplified = s.simplify();
        assert_eq!(simplified.to_string_lossy(), "foo bar");
    }

    #[test]
    fn slice_preserves_virgin_positions() {
        let s = VirginString::new("hello world");
        let sub = s.slice(6, Some(5));
        assert_eq!(sub.to_string_lossy(), "world");
        assert_eq!(sub.virgin_pos(0), 6);
        assert_eq!(sub.virgin_pos(4), 10);
    }

    #[test]
    fn split_segments_carry_origin() {
        let s = VirginString::new("a, b, c");
        let parts = s.split(", ");
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].to_string_lossy(), "a");
        assert_eq!(parts[1].to_string_lossy(), "b");
        assert_eq!(parts[2].to_string_lossy(), "c");
        assert_eq!(parts[1].virgin_pos(0), 3);
    }
}
