//! Locale-aware string comparison for track sorting.
//!
//! Approximates the root-locale collation users expect from a music library:
//!
//! 1. **Primary**: base letters only. Accents and case are ignored, so
//!    `"éclair"` sorts with `"eclair"`. Whitespace and punctuation sort before
//!    digits, digits before letters.
//! 2. **Secondary**: unaccented before accented.
//! 3. **Tertiary**: lowercase before uppercase.
//!
//! Strings equal at all three levels fall back to code point order so the
//! comparison stays total.

use std::cmp::Ordering;

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Compare two strings the way a sorted track list should read.
pub fn locale_compare(a: &str, b: &str) -> Ordering {
    primary_key(a)
        .cmp(&primary_key(b))
        .then_with(|| secondary_key(a).cmp(&secondary_key(b)))
        .then_with(|| tertiary_key(a).cmp(&tertiary_key(b)))
        .then_with(|| a.cmp(b))
}

fn char_class(c: char) -> u8 {
    if c.is_alphabetic() {
        2
    } else if c.is_numeric() {
        1
    } else {
        0
    }
}

fn primary_key(s: &str) -> Vec<(u8, char)> {
    s.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .map(|c| (char_class(c), c))
        .collect()
}

/// Accent marks in order, with `'\0'` standing in for an unaccented base.
fn secondary_key(s: &str) -> Vec<char> {
    let mut key = Vec::new();
    for c in s.nfkd() {
        if is_combining_mark(c) {
            if let Some(last) = key.last_mut() {
                if *last == '\0' {
                    *last = c;
                    continue;
                }
            }
            key.push(c);
        } else {
            key.push('\0');
        }
    }
    key
}

/// `false` for lowercase, `true` for anything else, per base character.
fn tertiary_key(s: &str) -> Vec<bool> {
    s.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| !c.is_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(mut values: Vec<&str>) -> Vec<&str> {
        values.sort_by(|a, b| locale_compare(a, b));
        values
    }

    #[test]
    fn test_case_insensitive_primary() {
        assert_eq!(sorted(vec!["banana", "Apple", "cherry"]), vec!["Apple", "banana", "cherry"]);
    }

    #[test]
    fn test_accents_sort_with_base_letter() {
        assert_eq!(
            sorted(vec!["zebra", "éclair", "eclipse", "eclair"]),
            vec!["eclair", "éclair", "eclipse", "zebra"]
        );
    }

    #[test]
    fn test_lowercase_before_uppercase_on_tie() {
        assert_eq!(locale_compare("abc", "Abc"), Ordering::Less);
        assert_eq!(locale_compare("Abc", "abc"), Ordering::Greater);
    }

    #[test]
    fn test_punctuation_digits_letters() {
        assert_eq!(sorted(vec!["abc", "123", "(intro)"]), vec!["(intro)", "123", "abc"]);
    }

    #[test]
    fn test_prefix_sorts_first() {
        assert_eq!(locale_compare("Love", "Love Song"), Ordering::Less);
        assert_eq!(locale_compare("", "a"), Ordering::Less);
    }

    #[test]
    fn test_equal_strings() {
        assert_eq!(locale_compare("Ångström", "Ångström"), Ordering::Equal);
    }
}
