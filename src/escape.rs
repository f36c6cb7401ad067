//! PARAM-VALUE escaping, RFC 5424 section 6.3.3.
//!
//! Inside a PARAM-VALUE the characters `"`, `\` and `]` MUST be escaped with a
//! backslash. A backslash followed by anything else is kept as is.

use std::borrow::Cow;
use std::fmt::Display;

/// The NILVALUE written for absent fields.
pub const NIL: &str = "-";

#[inline]
fn needs_escape(ch: char) -> bool {
    matches!(ch, '"' | '\\' | ']')
}

/// Insert a backslash in front of every `"`, `\` and `]`.
pub fn escape(value: &str) -> Cow<'_, str> {
    if !value.contains(needs_escape) {
        return Cow::Borrowed(value);
    }

    let mut escaped = String::with_capacity(value.len() + 4);
    for ch in value.chars() {
        if needs_escape(ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }

    Cow::Owned(escaped)
}

/// Inverse of [`escape`], as applied to the content of a quoted PARAM-VALUE.
pub fn unescape(value: &str) -> Cow<'_, str> {
    if !value.contains('\\') {
        return Cow::Borrowed(value);
    }

    let mut unescaped = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(&next) = chars.peek() {
                if needs_escape(next) {
                    unescaped.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        unescaped.push(ch);
    }

    Cow::Owned(unescaped)
}

/// Stringify `value`, or produce the NILVALUE when it is absent.
pub fn str_or_nil<T: Display>(value: Option<T>) -> Cow<'static, str> {
    match value {
        Some(v) => Cow::Owned(v.to_string()),
        None => Cow::Borrowed(NIL),
    }
}
