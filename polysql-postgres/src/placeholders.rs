//! Positional placeholder rewriting.
//!
//! Statements are written with `?` placeholders; PostgreSQL expects `$1`,
//! `$2`, ... A `?` inside a string literal, quoted identifier, comment or
//! dollar-quoted body is left alone.

/// Rewrite `?` placeholders to `$n`, returning the new SQL and the placeholder count.
///
/// ```rust
/// use polysql_postgres::placeholders::rewrite;
///
/// let (sql, count) = rewrite("SELECT * FROM t WHERE a=? AND b='?'");
/// assert_eq!(sql, "SELECT * FROM t WHERE a=$1 AND b='?'");
/// assert_eq!(count, 1);
/// ```
pub fn rewrite(sql: &str) -> (String, usize) {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut count = 0;
    let mut rest = sql;

    while let Some(c) = rest.chars().next() {
        let len = match c {
            '?' => {
                count += 1;
                out.push('$');
                out.push_str(&count.to_string());
                rest = &rest[1..];
                continue;
            }
            '\'' => {
                // E'...' only when the E is a token of its own, not the tail of `LIKE`.
                let mut before = out.chars().rev();
                let escapes = matches!(before.next(), Some('E' | 'e'))
                    && !before.next().is_some_and(is_identifier_char);
                quoted_len(rest, '\'', escapes)
            }
            '"' => quoted_len(rest, '"', false),
            '-' if rest.starts_with("--") => rest.find('\n').map_or(rest.len(), |i| i + 1),
            '/' if rest.starts_with("/*") => block_comment_len(rest),
            '$' => dollar_quote_len(rest).unwrap_or(1),
            _ => c.len_utf8(),
        };

        out.push_str(&rest[..len]);
        rest = &rest[len..];
    }

    (out, count)
}

fn is_identifier_char(c: char) -> bool {
    c == '_' || c == '$' || c.is_alphanumeric()
}

/// Length of a quoted run starting at `s`, including both quotes.
///
/// A doubled quote is an escaped quote; with `backslash` set, `\x` escapes too.
fn quoted_len(s: &str, quote: char, backslash: bool) -> usize {
    let mut chars = s.char_indices().skip(1);
    while let Some((i, c)) = chars.next() {
        if backslash && c == '\\' {
            chars.next();
        } else if c == quote {
            if s[i + 1..].starts_with(quote) {
                chars.next();
            } else {
                return i + 1;
            }
        }
    }
    s.len()
}

/// Length of a (possibly nested) block comment starting at `s`.
fn block_comment_len(s: &str) -> usize {
    let mut depth = 0;
    let mut i = 0;
    while i < s.len() {
        if s[i..].starts_with("/*") {
            depth += 1;
            i += 2;
        } else if s[i..].starts_with("*/") {
            depth -= 1;
            i += 2;
            if depth == 0 {
                return i;
            }
        } else {
            i += s[i..].chars().next().map_or(1, char::len_utf8);
        }
    }
    s.len()
}

/// Length of a dollar-quoted body starting at `s`, `None` if `s` does not open one.
fn dollar_quote_len(s: &str) -> Option<usize> {
    let tag_end = s[1..].find('$')? + 2;
    let tag = &s[..tag_end];
    let valid = tag[1..tag_end - 1]
        .chars()
        .enumerate()
        .all(|(i, c)| c == '_' || c.is_alphabetic() || (i > 0 && c.is_ascii_digit()));
    if !valid {
        return None;
    }

    let close = s[tag_end..].find(tag).map_or(s.len(), |i| tag_end + i + tag.len());
    Some(close)
}
