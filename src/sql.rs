//! String quoting and `?`-placeholder expansion for the text protocol.
//!
//! The client substitutes parameters on the client side before the statement
//! is sent; there is no prepared-statement round trip.

use crate::error::{Error, Result};

/// Quote a value as a SQL string literal; `None` yields `NULL`.
///
/// Backslash-escapes the characters MySQL treats specially inside a
/// single-quoted literal.
pub fn quote(value: Option<&str>) -> String {
    let value = match value {
        Some(value) => value,
        None => return "NULL".into(),
    };

    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');

    for ch in value.chars() {
        match ch {
            '\\' => quoted.push_str("\\\\"),
            '\0' => quoted.push_str("\\0"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\'' => quoted.push_str("\\'"),
            '\x1a' => quoted.push_str("\\Z"),
            ch => quoted.push(ch),
        }
    }

    quoted.push('\'');
    quoted
}

/// Quote an identifier in backticks, doubling any embedded backtick;
/// `None` yields `NULL`.
pub fn quote_id(id: Option<&str>) -> String {
    let id = match id {
        Some(id) => id,
        None => return "NULL".into(),
    };

    let mut quoted = String::with_capacity(id.len() + 2);
    quoted.push('`');

    for ch in id.chars() {
        if ch == '`' {
            quoted.push('`');
        }
        quoted.push(ch);
    }

    quoted.push('`');
    quoted
}

/// Replace each unescaped `?` outside of quoted literals with the quoted
/// next argument, in order.
///
/// A backslash escapes a `?` outside of literals. Placeholders inside
/// single-quoted or double-quoted strings and backtick-quoted identifiers
/// are left alone. Fails with [`Error::ArityMismatch`] unless the
/// placeholder count equals the argument count.
pub fn expand_sql(template: &str, args: &[Option<&str>]) -> Result<String> {
    let mut expanded = String::with_capacity(template.len());
    let mut placeholders = 0;

    // the delimiter of the literal we are inside of, if any
    let mut literal: Option<char> = None;
    let mut chars = template.chars();

    while let Some(ch) = chars.next() {
        match literal {
            Some(delim) => {
                expanded.push(ch);

                if ch == '\\' && delim != '`' {
                    // escaped character inside a string literal
                    if let Some(next) = chars.next() {
                        expanded.push(next);
                    }
                } else if ch == delim {
                    literal = None;
                }
            }

            None => match ch {
                '\'' | '"' | '`' => {
                    literal = Some(ch);
                    expanded.push(ch);
                }

                '\\' => {
                    // an escaped `?` stands for itself
                    match chars.next() {
                        Some('?') => expanded.push('?'),
                        Some(next) => {
                            expanded.push(ch);
                            expanded.push(next);
                        }
                        None => expanded.push(ch),
                    }
                }

                '?' => {
                    if let Some(arg) = args.get(placeholders) {
                        expanded.push_str(&quote(*arg));
                    }
                    placeholders += 1;
                }

                ch => expanded.push(ch),
            },
        }
    }

    if placeholders != args.len() {
        return Err(Error::ArityMismatch { expected: placeholders, provided: args.len() });
    }

    Ok(expanded)
}
