//! Natural ("human") ordering for parameter labels and key strings.
//!
//! Runs of ASCII digits compare by numeric value, everything else compares
//! byte-wise, so `welch2` < `welch10` and `Z` < `a`.

use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Chunk<'a> {
    Text(&'a str),
    Num(&'a str),
}

fn chunks(s: &str) -> impl Iterator<Item = Chunk<'_>> {
    let bytes = s.as_bytes();
    let mut pos = 0;
    std::iter::from_fn(move || {
        if pos >= bytes.len() {
            return None;
        }
        let start = pos;
        let digit = bytes[pos].is_ascii_digit();
        while pos < bytes.len() && bytes[pos].is_ascii_digit() == digit {
            pos += 1;
        }
        let part = &s[start..pos];
        Some(if digit { Chunk::Num(part) } else { Chunk::Text(part) })
    })
}

fn cmp_digits(a: &str, b: &str) -> Ordering {
    let a_trim = a.trim_start_matches('0');
    let b_trim = b.trim_start_matches('0');
    a_trim
        .len()
        .cmp(&b_trim.len())
        .then_with(|| a_trim.cmp(b_trim))
}

/// Natural comparison. Ties under natural order ("01" vs "1") fall back to
/// plain string order so the result is a total order.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = chunks(a);
    let mut right = chunks(b);
    loop {
        let ord = match (left.next(), right.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(Chunk::Num(x)), Some(Chunk::Num(y))) => cmp_digits(x, y),
            (Some(Chunk::Text(x)), Some(Chunk::Text(y))) => x.cmp(y),
            (Some(Chunk::Num(_)), Some(Chunk::Text(_))) => Ordering::Less,
            (Some(Chunk::Text(_)), Some(Chunk::Num(_))) => Ordering::Greater,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
}

pub fn natural_sort<S: AsRef<str>>(items: &mut [S]) {
    items.sort_by(|a, b| natural_cmp(a.as_ref(), b.as_ref()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digits_compare_by_value() {
        let mut v = vec!["welch10", "welch2", "welch1"];
        natural_sort(&mut v);
        assert_eq!(v, vec!["welch1", "welch2", "welch10"]);
    }

    #[test]
    fn case_sensitive() {
        let mut v = vec!["b", "a", "B"];
        natural_sort(&mut v);
        assert_eq!(v, vec!["B", "a", "b"]);
    }

    #[test]
    fn leading_number_sorts_before_text() {
        assert_eq!(natural_cmp("4", "none"), Ordering::Less);
        assert_eq!(natural_cmp("1000_x", "200_x"), Ordering::Greater);
    }

    #[test]
    fn zero_padding_is_total() {
        assert_eq!(natural_cmp("01", "1"), Ordering::Less);
        assert_eq!(natural_cmp("1", "1"), Ordering::Equal);
    }

    #[test]
    fn prefix_sorts_first() {
        assert_eq!(natural_cmp("max", "maxabs"), Ordering::Less);
    }
}
