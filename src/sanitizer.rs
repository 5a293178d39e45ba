//! Response Sanitizer
//!
//! Strips formatting artifacts from a backend's raw text so that only the SQL remains.
//! Purely textual: nothing here parses or validates SQL.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Fence opened with a `sql` marker followed by whitespace or end of line.
    /// An unclosed fence runs to end of text.
    static ref SQL_FENCE: Regex =
        Regex::new(r"(?is)```[^\S\n]*sql(?:[^\S\n]*(?:\n|\z)|[^\S\n]+)(.*?)(?:```|\z)").unwrap();
    /// Any fence. A lone word on the opening line is captured separately as a
    /// candidate info string.
    static ref ANY_FENCE: Regex =
        Regex::new(r"(?s)```(?:([A-Za-z0-9_+.-]+)[^\S\n]*\n)?(.*?)(?:```|\z)").unwrap();
}

/// Words that open a statement, so a fence line holding only one of them is SQL
/// rather than a language tag.
const STATEMENT_KEYWORDS: [&str; 12] = [
    "SELECT", "WITH", "FROM", "INSERT", "UPDATE", "DELETE", "CREATE", "DROP", "ALTER",
    "EXPLAIN", "SHOW", "DESCRIBE",
];

fn fenced_body(text: &str) -> Option<&str> {
    if let Some(body) = SQL_FENCE.captures(text).and_then(|caps| caps.get(1)) {
        return Some(body.as_str());
    }
    let caps = ANY_FENCE.captures(text)?;
    let body = caps.get(2)?;
    let start = match caps.get(1) {
        Some(word) if is_statement_keyword(word.as_str()) => word.start(),
        _ => body.start(),
    };
    text.get(start..body.end())
}

fn is_statement_keyword(word: &str) -> bool {
    STATEMENT_KEYWORDS
        .iter()
        .any(|keyword| keyword.eq_ignore_ascii_case(word))
}

/// Extract bare SQL from a provider response.
///
/// 1. a ```` ```sql ```` block wins; 2. else the first fenced block; 3. else the text
/// as is. The result is trimmed and a single trailing `;` is dropped.
pub fn clean(text: &str) -> String {
    let body = fenced_body(text).unwrap_or(text);

    let trimmed = body.trim();
    match trimmed.strip_suffix(';') {
        Some(rest) => rest.trim_end().to_string(),
        None => trimmed.to_string(),
    }
}
