//! Named parameter binding
//!
//! Job SQL uses `:name` placeholders. MySQL only understands positional `?`,
//! so the query text is rewritten and the values collected in placeholder
//! order. Quoted strings, quoted identifiers, comments, `::` and `\:` are left
//! alone.

use crate::error::{EngineError, Result};
use crate::table::{Params, Value};

/// Positional form of a named-parameter query
#[derive(Debug, Clone, PartialEq)]
pub struct BoundQuery {
    pub sql: String,
    pub values: Vec<Value>,
}

/// Rewrite `:name` placeholders to `?` and collect their values in order.
pub fn bind_named(sql: &str, params: &Params) -> Result<BoundQuery> {
    let bytes = sql.as_bytes();
    let len = bytes.len();
    let mut out = String::with_capacity(len);
    let mut values = Vec::new();
    let mut last = 0;
    let mut i = 0;

    while i < len {
        let next = bytes.get(i + 1).copied();
        match bytes[i] {
            quote @ (b'\'' | b'"' | b'`') => {
                i = skip_quoted(bytes, i + 1, quote);
            },
            b'-' if next == Some(b'-') => i = skip_line(bytes, i),
            b'#' => i = skip_line(bytes, i),
            b'/' if next == Some(b'*') => {
                i = match sql[i + 2..].find("*/") {
                    Some(end) => i + 2 + end + 2,
                    None => len,
                };
            },
            b'\\' if next == Some(b':') => {
                out.push_str(&sql[last..i]);
                out.push(':');
                i += 2;
                last = i;
            },
            b':' if next == Some(b':') => i += 2,
            b':' if next.is_some_and(is_ident_start) => {
                let start = i + 1;
                let mut end = start;
                while end < len && is_ident_char(bytes[end]) {
                    end += 1;
                }
                let name = &sql[start..end];
                let value = params
                    .get(name)
                    .ok_or_else(|| EngineError::UnboundParameter(name.to_string()))?;

                out.push_str(&sql[last..i]);
                out.push('?');
                values.push(value.clone());
                i = end;
                last = end;
            },
            _ => i += 1,
        }
    }

    out.push_str(&sql[last..]);
    Ok(BoundQuery { sql: out, values })
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Index just past the closing quote; doubled quotes and backslash escapes stay inside.
fn skip_quoted(bytes: &[u8], mut i: usize, quote: u8) -> usize {
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\\' && quote != b'`' {
            i += 2;
        } else if b == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
            } else {
                return i + 1;
            }
        } else {
            i += 1;
        }
    }
    bytes.len()
}

fn skip_line(bytes: &[u8], i: usize) -> usize {
    bytes[i..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |p| i + p + 1)
}
