//! Deterministic, locale-style string collation.
//!
//! Every ordering that ends up in an artifact goes through [`compare`] so the
//! output does not depend on filesystem iteration order or platform. Digit
//! runs compare by numeric value (`2 file` < `10 file`), letters compare
//! case-insensitively, and a final byte comparison keeps the order total.

use std::cmp::Ordering;

#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Number(&'a str),
    Char(char),
}

fn segments(s: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut chars = s.char_indices().peekable();
    while let Some((start, c)) = chars.next() {
        if c.is_ascii_digit() {
            let mut end = start + 1;
            while let Some(&(idx, next)) = chars.peek() {
                if !next.is_ascii_digit() {
                    break;
                }
                end = idx + 1;
                chars.next();
            }
            out.push(Segment::Number(&s[start..end]));
        } else {
            out.push(Segment::Char(c));
        }
    }
    out
}

fn compare_numbers(a: &str, b: &str) -> Ordering {
    let a_trim = a.trim_start_matches('0');
    let b_trim = b.trim_start_matches('0');
    a_trim
        .len()
        .cmp(&b_trim.len())
        .then_with(|| a_trim.cmp(b_trim))
        .then_with(|| a.len().cmp(&b.len()))
}

fn fold(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

/// Compare two strings in collation order.
pub fn compare(a: &str, b: &str) -> Ordering {
    let sa = segments(a);
    let sb = segments(b);
    for (x, y) in sa.iter().zip(sb.iter()) {
        let ord = match (x, y) {
            (Segment::Number(n), Segment::Number(m)) => compare_numbers(n, m),
            (Segment::Number(_), Segment::Char(_)) => Ordering::Less,
            (Segment::Char(_), Segment::Number(_)) => Ordering::Greater,
            (Segment::Char(c), Segment::Char(d)) => fold(*c).cmp(&fold(*d)),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    sa.len().cmp(&sb.len()).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_compare_by_value() {
        assert_eq!(compare("2 notes", "10 notes"), Ordering::Less);
        assert_eq!(compare("folder/09", "folder/9"), Ordering::Greater);
    }

    #[test]
    fn case_insensitive_with_total_tiebreak() {
        assert_eq!(compare("apple", "Banana"), Ordering::Less);
        assert_ne!(compare("Apple", "apple"), Ordering::Equal);
        assert_eq!(compare("same", "same"), Ordering::Equal);
    }

    #[test]
    fn sort_is_stable_regardless_of_input_order() {
        let mut a = vec!["b/2.txt", "a/10.txt", "a/9.txt", "A/1.txt"];
        let mut b = a.clone();
        b.reverse();
        a.sort_by(|x, y| compare(x, y));
        b.sort_by(|x, y| compare(x, y));
        assert_eq!(a, b);
        assert_eq!(a, vec!["A/1.txt", "a/9.txt", "a/10.txt", "b/2.txt"]);
    }
}
