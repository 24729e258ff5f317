//! Table-name abbreviations used to prefix measure columns
//!
//! The rules are part of the bridge's naming contract: changing any branch
//! renames measure columns in existing bridge tables.
//!
//! 1. Segments are the matches of `[A-Z][a-z]*`.
//! 2. No segments: split on `_`. With more than one non-empty part, three or
//!    more parts give the uppercased first letters of parts 1 and 2 followed
//!    by the capitalized first letters of parts 3 and 4; exactly two parts
//!    give the capitalized first two characters of each. Anything else falls
//!    back to the first four characters capitalized, or the whole name
//!    uppercased when shorter.
//! 3. One segment: its first four characters, capitalized.
//! 4. Three or more segments: first letters of segments 1 and 2 plus the
//!    first two characters of segment 3, capitalized. Two segments: first
//!    letter of segment 1 plus the first three characters of segment 2.

use once_cell::sync::Lazy;
use regex::Regex;

static SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new("[A-Z][a-z]*").expect("segment pattern is valid"));

/// Abbreviation of `table` used as measure-column prefix
pub fn abbreviate(table: &str) -> String {
    let segments: Vec<&str> = SEGMENT.find_iter(table).map(|m| m.as_str()).collect();

    match segments.as_slice() {
        [] => abbreviate_separated(table),
        [only] => capitalize(&prefix(only, 4)),
        [first, second, third, ..] => format!(
            "{}{}{}",
            initial(first),
            initial(second),
            capitalize(&prefix(third, 2))
        ),
        [first, last] => format!("{}{}", initial(first), capitalize(&prefix(last, 3))),
    }
}

fn abbreviate_separated(table: &str) -> String {
    let parts: Vec<&str> = table.split('_').collect();

    if parts.len() > 1 && parts.iter().all(|p| !p.is_empty()) {
        if parts.len() > 2 {
            let tail: String = parts[2..parts.len().min(4)]
                .iter()
                .map(|p| prefix(p, 1))
                .collect();
            return format!("{}{}{}", initial(parts[0]), initial(parts[1]), capitalize(&tail));
        }
        return format!(
            "{}{}",
            capitalize(&prefix(parts[0], 2)),
            capitalize(&prefix(parts[1], 2))
        );
    }

    if table.chars().count() >= 4 {
        capitalize(&prefix(table, 4))
    } else {
        table.to_uppercase()
    }
}

/// First `n` characters
fn prefix(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

/// First character, uppercased
fn initial(s: &str) -> String {
    s.chars().take(1).flat_map(char::to_uppercase).collect()
}

/// First character uppercased, the rest lowercased
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
