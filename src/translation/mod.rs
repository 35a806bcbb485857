//! Literal- and comment-aware scanning for named parameter markers (`@name`, `$name`,
//! `:name`) in SQL text.
//!
//! Markers inside string literals, quoted identifiers (`"..."`, `[...]`, `` `...` ``) and
//! comments are ignored, as are `@@system_variables` and `::casts`.

mod scanner;

use scanner::{State, is_ident_byte, quoted, scan_ident};

/// A parameter marker found in SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterToken<'a> {
    /// Byte offset of the marker character.
    pub start: usize,
    /// Byte offset one past the name.
    pub end: usize,
    pub marker: char,
    pub name: &'a str,
}

/// Every parameter marker in `sql`, in order of appearance.
#[must_use]
pub fn parameter_tokens(sql: &str) -> Vec<ParameterToken<'_>> {
    let bytes = sql.as_bytes();
    let mut tokens = Vec::new();
    let mut state = State::Normal;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                b'[' => state = State::Bracketed,
                b'`' => state = State::Backticked,
                b'-' if bytes.get(idx + 1) == Some(&b'-') => {
                    state = State::LineComment;
                    idx += 1;
                }
                b'/' if bytes.get(idx + 1) == Some(&b'*') => {
                    state = State::BlockComment(1);
                    idx += 1;
                }
                b'@' | b'$' | b':' => {
                    if bytes.get(idx + 1) == Some(&b) {
                        // @@ROWCOUNT, ::type
                        idx += 1;
                        while idx + 1 < bytes.len() && is_ident_byte(bytes[idx + 1]) {
                            idx += 1;
                        }
                    } else if idx > 0 && is_ident_byte(bytes[idx - 1]) {
                        // part of an identifier such as a$b
                    } else if let Some(end) = scan_ident(bytes, idx + 1) {
                        tokens.push(ParameterToken {
                            start: idx,
                            end,
                            marker: char::from(b),
                            name: &sql[idx + 1..end],
                        });
                        idx = end - 1;
                    }
                }
                _ => {}
            },
            State::SingleQuoted => {
                let (next, skip) = quoted(bytes, idx, b'\'', state);
                state = next;
                idx += skip;
            }
            State::DoubleQuoted => {
                let (next, skip) = quoted(bytes, idx, b'"', state);
                state = next;
                idx += skip;
            }
            State::Bracketed => {
                let (next, skip) = quoted(bytes, idx, b']', state);
                state = next;
                idx += skip;
            }
            State::Backticked => {
                let (next, skip) = quoted(bytes, idx, b'`', state);
                state = next;
                idx += skip;
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                if b == b'/' && bytes.get(idx + 1) == Some(&b'*') {
                    state = State::BlockComment(depth + 1);
                    idx += 1;
                } else if b == b'*' && bytes.get(idx + 1) == Some(&b'/') {
                    state = if depth == 1 {
                        State::Normal
                    } else {
                        State::BlockComment(depth - 1)
                    };
                    idx += 1;
                }
            }
        }
        idx += 1;
    }
    tokens
}

/// Distinct parameter names referenced by `sql`, without markers, in order of first use.
#[must_use]
pub fn named_parameters(sql: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for token in parameter_tokens(sql) {
        if !names.iter().any(|n| n.eq_ignore_ascii_case(token.name)) {
            names.push(token.name.to_string());
        }
    }
    names
}

/// Whether `sql` references the parameter `name` (marker optional, case ignored).
#[must_use]
pub fn is_parameter_referenced(sql: &str, name: &str) -> bool {
    let name = crate::provider::strip_parameter_prefix(name);
    parameter_tokens(sql)
        .iter()
        .any(|t| t.name.eq_ignore_ascii_case(name))
}

/// Rewrite named markers to positional `@P1`, `@P2`, ... A repeated name reuses its
/// position. Returns the new text and the names in positional order.
#[must_use]
pub fn rewrite_named_to_positional(sql: &str) -> (String, Vec<String>) {
    let tokens = parameter_tokens(sql);
    let mut names: Vec<String> = Vec::new();
    let mut out = String::with_capacity(sql.len());
    let mut copied = 0;

    for token in tokens {
        let position = match names.iter().position(|n| n.eq_ignore_ascii_case(token.name)) {
            Some(existing) => existing + 1,
            None => {
                names.push(token.name.to_string());
                names.len()
            }
        };
        out.push_str(&sql[copied..token.start]);
        out.push_str(&format!("@P{position}"));
        copied = token.end;
    }
    out.push_str(&sql[copied..]);
    (out, names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignores_literals_comments_and_quoted_identifiers() {
        let sql = "SELECT '@no', [@no], \"$no\", `:no` -- @no\n\
                   FROM t /* @no /* nested */ @no */ WHERE a = @yes AND b = $also";
        assert_eq!(named_parameters(sql), vec!["yes".to_string(), "also".to_string()]);
    }

    #[test]
    fn skips_system_variables_and_casts() {
        let sql = "SELECT @@IDENTITY, x::int, :real FROM t WHERE note = 'it''s @x'";
        assert_eq!(named_parameters(sql), vec!["real".to_string()]);
    }

    #[test]
    fn referenced_check_ignores_marker_and_case() {
        let sql = "UPDATE t SET name = @Name WHERE id = @id";
        assert!(is_parameter_referenced(sql, "$name"));
        assert!(is_parameter_referenced(sql, "ID"));
        assert!(!is_parameter_referenced(sql, "idx"));
    }

    #[test]
    fn positional_rewrite_reuses_indices() {
        let (text, names) =
            rewrite_named_to_positional("SELECT * FROM t WHERE a = @a OR b = @B OR c = @A");
        assert_eq!(text, "SELECT * FROM t WHERE a = @P1 OR b = @P2 OR c = @P1");
        assert_eq!(names, vec!["a".to_string(), "B".to_string()]);
    }

    #[test]
    fn multibyte_text_is_preserved() {
        let (text, _) = rewrite_named_to_positional("SELECT 'ünï' , @名 , @n");
        assert_eq!(text, "SELECT 'ünï' , @名 , @P1");
    }
}
