//! Byte-level character classification, independent of locale.
//!
//! CommonMark's grammar is defined over ASCII punctuation and whitespace
//! classes that must not drift with the current locale, so this is a plain
//! lookup table rather than `char::is_whitespace` and friends.

#[rustfmt::skip]
const CLASS: [u8; 256] = [
    /*      0  1  2  3  4  5  6  7  8  9  a  b  c  d  e  f */
    /* 0 */ 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 0, 0, 1, 0, 0,
    /* 1 */ 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    /* 2 */ 1, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2,
    /* 3 */ 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 2, 2, 2, 2, 2, 2,
    /* 4 */ 2, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4,
    /* 5 */ 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 2, 2, 2, 2, 2,
    /* 6 */ 2, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4,
    /* 7 */ 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 2, 2, 2, 2, 0,
    /* 8 */ 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    /* 9 */ 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    /* a */ 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    /* b */ 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    /* c */ 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    /* d */ 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    /* e */ 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    /* f */ 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
];

pub fn isspace(ch: u8) -> bool {
    CLASS[ch as usize] == 1
}

pub fn ispunct(ch: u8) -> bool {
    CLASS[ch as usize] == 2
}

pub fn isdigit(ch: u8) -> bool {
    CLASS[ch as usize] == 3
}

pub fn isalpha(ch: u8) -> bool {
    CLASS[ch as usize] == 4
}

pub fn isalnum(ch: u8) -> bool {
    isdigit(ch) || isalpha(ch)
}

pub fn isxdigit(ch: u8) -> bool {
    ch.is_ascii_hexdigit()
}

/// Unicode-aware whitespace test used by the flanking-delimiter rules, which
/// the CommonMark spec defines over "Unicode whitespace" rather than ASCII.
pub fn is_unicode_whitespace(ch: char) -> bool {
    ((ch as u32) < 128 && isspace(ch as u8)) || ch.is_whitespace()
}

/// Unicode-aware punctuation test, likewise required by the flanking rules.
pub fn is_unicode_punctuation(ch: char) -> bool {
    if (ch as u32) < 128 {
        return ispunct(ch as u8);
    }
    use unicode_categories::UnicodeCategories;
    ch.is_punctuation() || ch.is_symbol()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_ascii() {
        assert!(isspace(b' '));
        assert!(isspace(b'\t'));
        assert!(!isspace(b'a'));
        assert!(ispunct(b'!'));
        assert!(ispunct(b'_'));
        assert!(isdigit(b'5'));
        assert!(isalpha(b'z'));
        assert!(isalnum(b'5'));
        assert!(isalnum(b'z'));
        assert!(!isalnum(b'!'));
    }

    #[test]
    fn unicode_whitespace_and_punctuation() {
        assert!(is_unicode_whitespace(' '));
        assert!(is_unicode_whitespace('\u{2003}')); // em space
        assert!(!is_unicode_whitespace('a'));
        assert!(is_unicode_punctuation('!'));
        assert!(is_unicode_punctuation('\u{2014}')); // em dash
        assert!(!is_unicode_punctuation('a'));
    }
}
