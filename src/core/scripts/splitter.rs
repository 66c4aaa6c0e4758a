//! Statement splitting
//!
//! Scripts are split on `;`, but only on a `;` at the top level. Semicolons
//! inside these constructs do not end a statement:
//!
//! - single-quoted strings (`''` escapes, and backslash escapes in `E'...'`)
//! - double-quoted identifiers
//! - `--` line comments and nested `/* */` block comments
//! - dollar-quoted bodies (`$$ ... $$`, `$fn$ ... $fn$`)
//!
//! Segments are trimmed; empty segments and segments holding nothing but
//! comments are dropped.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How script text is split into statements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitMode {
    /// Quote- and comment-aware splitting
    #[default]
    Tokenized,
    /// Split on every `;`
    Naive,
}

impl FromStr for SplitMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tokenized" => Ok(SplitMode::Tokenized),
            "naive" => Ok(SplitMode::Naive),
            other => Err(format!("Unknown split mode '{other}'")),
        }
    }
}

/// Splits `script` into statements in source order
pub fn split_statements(script: &str, mode: SplitMode) -> Vec<String> {
    match mode {
        SplitMode::Tokenized => split_tokenized(script),
        SplitMode::Naive => split_naive(script),
    }
}

fn split_naive(script: &str) -> Vec<String> {
    script
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn split_tokenized(script: &str) -> Vec<String> {
    let bytes = script.as_bytes();
    let mut statements = Vec::new();
    let mut start = 0;
    let mut has_code = false;
    let mut i = 0;

    // All delimiters are ASCII, so every index used for slicing is a char boundary.
    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'\'' | b'"') => {
                has_code = true;
                let escapes = quote == b'\'' && is_escape_string_prefix(bytes, i);
                i = skip_quoted(bytes, i, quote, escapes);
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                i = skip_line_comment(bytes, i);
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = skip_block_comment(bytes, i);
            }
            b'$' => {
                has_code = true;
                i = match dollar_tag_end(bytes, i) {
                    Some(tag_end) => skip_dollar_quoted(bytes, i, tag_end),
                    None => i + 1,
                };
            }
            b';' => {
                push_segment(&mut statements, &script[start..i], has_code);
                start = i + 1;
                has_code = false;
                i += 1;
            }
            b => {
                if !b.is_ascii_whitespace() {
                    has_code = true;
                }
                i += 1;
            }
        }
    }
    push_segment(&mut statements, &script[start..], has_code);

    statements
}

fn push_segment(statements: &mut Vec<String>, segment: &str, has_code: bool) {
    let trimmed = segment.trim();
    if has_code && !trimmed.is_empty() {
        statements.push(trimmed.to_string());
    }
}

fn is_identifier_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}

/// `E'...'` (not `somE'...'`)
fn is_escape_string_prefix(bytes: &[u8], quote: usize) -> bool {
    quote > 0
        && matches!(bytes[quote - 1], b'E' | b'e')
        && (quote < 2 || !is_identifier_byte(bytes[quote - 2]))
}

/// Returns the index just past the closing quote, or the end of input
fn skip_quoted(bytes: &[u8], open: usize, quote: u8, backslash_escapes: bool) -> usize {
    let mut j = open + 1;
    while j < bytes.len() {
        let b = bytes[j];
        if backslash_escapes && b == b'\\' {
            j += 2;
            continue;
        }
        if b == quote {
            if bytes.get(j + 1) == Some(&quote) {
                j += 2;
                continue;
            }
            return j + 1;
        }
        j += 1;
    }
    bytes.len()
}

fn skip_line_comment(bytes: &[u8], start: usize) -> usize {
    bytes[start..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |offset| start + offset)
}

fn skip_block_comment(bytes: &[u8], start: usize) -> usize {
    let mut depth = 1usize;
    let mut j = start + 2;
    while j < bytes.len() {
        if bytes[j] == b'/' && bytes.get(j + 1) == Some(&b'*') {
            depth += 1;
            j += 2;
        } else if bytes[j] == b'*' && bytes.get(j + 1) == Some(&b'/') {
            depth -= 1;
            j += 2;
            if depth == 0 {
                return j;
            }
        } else {
            j += 1;
        }
    }
    bytes.len()
}

/// Index of the `$` closing an opening dollar-quote tag starting at `start`
///
/// `$1` (a positional parameter) and a `$` inside an identifier are not tags.
fn dollar_tag_end(bytes: &[u8], start: usize) -> Option<usize> {
    if start > 0 && is_identifier_byte(bytes[start - 1]) {
        return None;
    }
    let mut j = start + 1;
    if let Some(first) = bytes.get(j) {
        if first.is_ascii_digit() {
            return None;
        }
    }
    while j < bytes.len() {
        match bytes[j] {
            b'$' => return Some(j),
            b if b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80 => j += 1,
            _ => return None,
        }
    }
    None
}

fn skip_dollar_quoted(bytes: &[u8], start: usize, tag_end: usize) -> usize {
    let tag = &bytes[start..=tag_end];
    let body = tag_end + 1;
    bytes[body..]
        .windows(tag.len())
        .position(|window| window == tag)
        .map_or(bytes.len(), |offset| body + offset + tag.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn split(script: &str) -> Vec<String> {
        split_statements(script, SplitMode::Tokenized)
    }

    #[test]
    fn test_simple_statements() {
        assert_eq!(
            split("CREATE TABLE a (id int);\n INSERT INTO a VALUES (1);\n\n"),
            vec!["CREATE TABLE a (id int)", "INSERT INTO a VALUES (1)"]
        );
    }

    #[test]
    fn test_trailing_statement_without_semicolon() {
        assert_eq!(split("SELECT 1; SELECT 2"), vec!["SELECT 1", "SELECT 2"]);
    }

    #[test]
    fn test_empty_segments_are_dropped() {
        assert_eq!(split(" ;; SELECT 1 ;  ; "), vec!["SELECT 1"]);
        assert!(split("").is_empty());
        assert!(split("   \n\t").is_empty());
    }

    #[test_case("INSERT INTO t VALUES ('a;b')", 1 ; "single quoted")]
    #[test_case("INSERT INTO t VALUES ('it''s; fine')", 1 ; "doubled quote escape")]
    #[test_case("INSERT INTO t VALUES (E'it\\'s; fine')", 1 ; "backslash escape string")]
    #[test_case("SELECT 1 AS \"odd;name\"", 1 ; "quoted identifier")]
    #[test_case("SELECT 1 -- trailing; comment\n", 1 ; "line comment")]
    #[test_case("SELECT /* a; /* nested; */ b; */ 1", 1 ; "nested block comment")]
    #[test_case("DO $$ BEGIN PERFORM 1; END $$", 1 ; "anonymous dollar quote")]
    #[test_case("CREATE FUNCTION f() RETURNS int AS $fn$ SELECT 1; $fn$ LANGUAGE sql", 1 ; "tagged dollar quote")]
    #[test_case("SELECT $1; SELECT 2", 2 ; "positional parameter")]
    fn test_semicolons_inside_literals(script: &str, expected: usize) {
        assert_eq!(split(script).len(), expected, "{script}");
    }

    #[test]
    fn test_comment_only_segments_are_dropped() {
        let script = "-- header comment\n;\n/* block */;\nSELECT 1;\n-- footer\n";
        assert_eq!(split(script), vec!["SELECT 1"]);
    }

    #[test]
    fn test_comment_before_statement_is_kept() {
        assert_eq!(
            split("-- create\nCREATE TABLE a (id int);"),
            vec!["-- create\nCREATE TABLE a (id int)"]
        );
    }

    #[test]
    fn test_source_order_is_preserved() {
        let statements = split("SELECT 3; SELECT 1; SELECT 2;");
        assert_eq!(statements, vec!["SELECT 3", "SELECT 1", "SELECT 2"]);
    }

    #[test]
    fn test_unterminated_literal_runs_to_end() {
        assert_eq!(split("SELECT 'open; SELECT 2"), vec!["SELECT 'open; SELECT 2"]);
    }

    #[test]
    fn test_multibyte_text() {
        assert_eq!(
            split("INSERT INTO t VALUES ('Grüße; ünïcødé'); SELECT 'ß'"),
            vec!["INSERT INTO t VALUES ('Grüße; ünïcødé')", "SELECT 'ß'"]
        );
    }

    #[test]
    fn test_naive_mode_splits_everywhere() {
        assert_eq!(
            split_statements("INSERT INTO t VALUES ('a;b'); ", SplitMode::Naive),
            vec!["INSERT INTO t VALUES ('a", "b')"]
        );
    }

    #[test]
    fn test_split_mode_from_str() {
        assert_eq!("naive".parse::<SplitMode>().unwrap(), SplitMode::Naive);
        assert_eq!("tokenized".parse::<SplitMode>().unwrap(), SplitMode::Tokenized);
        assert!("regex".parse::<SplitMode>().is_err());
    }
}
