// Numeric-aware string ordering for record names.

use std::{cmp::Ordering, iter::Peekable, str::Chars};

/// Compares two strings so that embedded numbers sort by value
/// (`lan2` < `lan10`) and letters compare case-insensitively first.
///
/// Strings that compare equal under those rules fall back to plain byte
/// order so the result is a total order.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();

    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let ordering = compare_numbers(&take_digits(&mut left), &take_digits(&mut right));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            (Some(l), Some(r)) => {
                let ordering = l.to_lowercase().cmp(r.to_lowercase());
                if ordering != Ordering::Equal {
                    return ordering;
                }
                left.next();
                right.next();
            }
        }
    }
}

fn take_digits(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.next_if(char::is_ascii_digit) {
        digits.push(c);
    }
    digits
}

fn compare_numbers(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("lan2", "lan10", Ordering::Less; "numbers by value")]
    #[test_case("wan", "WAN6", Ordering::Less; "case insensitive prefix")]
    #[test_case("cfg007", "cfg7", Ordering::Less; "leading zeros tie broken bytewise")]
    #[test_case("b", "a10", Ordering::Greater; "letters before numbers matter")]
    #[test_case("lan", "lan", Ordering::Equal; "identical")]
    fn orders(a: &str, b: &str, expected: Ordering) {
        assert_eq!(natural_cmp(a, b), expected);
    }

    #[test]
    fn sorts_interface_names() {
        let mut names = vec!["lan10", "lan1", "wan", "lan2"];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(names, vec!["lan1", "lan2", "lan10", "wan"]);
    }
}
