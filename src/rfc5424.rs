//! Hand written RFC 5424 parser.
//!
//! ```text
//! SYSLOG-MSG = HEADER SP STRUCTURED-DATA [SP MSG]
//! HEADER     = PRI VERSION SP TIMESTAMP SP HOSTNAME SP APP-NAME SP PROCID SP MSGID
//! ```
//!
//! https://datatracker.ietf.org/doc/html/rfc5424#section-6

use std::str::FromStr;

use bytes::Bytes;

use crate::error::{ParseError, ParseErrorKind};
use crate::escape::unescape;
use crate::message::{
    validate_field, Body, Entry, BOM, MAX_APPNAME_LEN, MAX_HOSTNAME_LEN, MAX_MSGID_LEN,
    MAX_PROCID_LEN,
};
use crate::structured_data::{StructuredData, StructuredElement, MAX_SD_NAME_LEN};
use crate::timestamp::parse_rfc3339;
use crate::{Priority, MAX_PRIVAL};

/// Knobs for [`parse_message_with`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ParserOptions {
    /// Accept HOSTNAME, APP-NAME, PROCID and MSGID that are missing
    /// altogether (not even NIL), as emitted by some broken producers.
    pub allow_missing_fields: bool,
}

impl ParserOptions {
    pub const fn strict() -> Self {
        Self {
            allow_missing_fields: false,
        }
    }

    pub const fn lenient() -> Self {
        Self {
            allow_missing_fields: true,
        }
    }
}

type Result<T> = std::result::Result<T, ParseError>;

#[inline]
fn fail<T>(buf: &[u8], kind: ParseErrorKind, offset: usize) -> Result<T> {
    Err(ParseError::new(kind, offset, buf))
}

#[inline]
fn expect(buf: &[u8], offset: &mut usize, ch: u8) -> Result<()> {
    match buf.get(*offset) {
        Some(&b) if b == ch => {
            *offset += 1;
            Ok(())
        }
        Some(_) => fail(buf, ParseErrorKind::ExpectedChar(ch as char), *offset),
        None => fail(buf, ParseErrorKind::UnexpectedEndOfInput, *offset),
    }
}

// Reads up to three digits. The caller decides about leading zeros.
fn parse_number(buf: &[u8], offset: &mut usize) -> Result<u16> {
    let start = *offset;
    let mut value = 0u16;

    while let Some(&ch) = buf.get(*offset) {
        if !ch.is_ascii_digit() {
            break;
        }
        if *offset - start == 3 {
            return fail(buf, ParseErrorKind::TooManyDigits, start);
        }

        value = value * 10 + (ch - b'0') as u16;
        *offset += 1;
    }

    if *offset == start {
        let kind = if *offset == buf.len() {
            ParseErrorKind::UnexpectedEndOfInput
        } else {
            ParseErrorKind::TooFewDigits
        };
        return fail(buf, kind, start);
    }

    Ok(value)
}

// https://datatracker.ietf.org/doc/html/rfc5424#section-6.2.1
fn parse_priority(buf: &[u8], offset: &mut usize) -> Result<Priority> {
    expect(buf, offset, b'<')?;
    let start = *offset;
    let prival = parse_number(buf, offset)?;
    expect(buf, offset, b'>')?;

    if prival > MAX_PRIVAL as u16 {
        return fail(buf, ParseErrorKind::PriorityOutOfRange, start);
    }

    Priority::try_from(prival as u8)
        .or_else(|_| fail(buf, ParseErrorKind::PriorityOutOfRange, start))
}

// https://datatracker.ietf.org/doc/html/rfc5424#section-9.1
fn parse_version(buf: &[u8], offset: &mut usize) -> Result<u16> {
    let start = *offset;
    if buf.get(start) == Some(&b'0') {
        return fail(buf, ParseErrorKind::InvalidVersion, start);
    }

    parse_number(buf, offset)
}

#[inline]
fn take_until_space<'a>(buf: &'a [u8], offset: &mut usize) -> Result<&'a [u8]> {
    let start = *offset;
    match buf[start..].iter().position(|&b| b == b' ') {
        Some(pos) => {
            *offset = start + pos;
            Ok(&buf[start..start + pos])
        }
        None => fail(buf, ParseErrorKind::UnexpectedEndOfInput, buf.len()),
    }
}

fn parse_timestamp(
    buf: &[u8],
    offset: &mut usize,
) -> Result<Option<chrono::DateTime<chrono::Utc>>> {
    let start = *offset;
    let text = take_until_space(buf, offset)?;
    if text == b"-" {
        return Ok(None);
    }

    parse_rfc3339(text)
        .map(Some)
        .or_else(|err| fail(buf, ParseErrorKind::Timestamp(err), start))
}

fn parse_header_field(
    buf: &[u8],
    offset: &mut usize,
    field: &'static str,
    max: usize,
    options: &ParserOptions,
) -> Result<Option<String>> {
    let start = *offset;
    let value = take_until_space(buf, offset)?;

    if value == b"-" || (value.is_empty() && options.allow_missing_fields) {
        return Ok(None);
    }

    if let Err(reason) = validate_field(value, max) {
        return fail(buf, ParseErrorKind::InvalidField { field, reason }, start);
    }

    // validated as printable ASCII above
    Ok(Some(value.iter().map(|&b| b as char).collect()))
}

fn parse_name(
    buf: &[u8],
    offset: &mut usize,
    field: &'static str,
    terminators: &[u8],
) -> Result<String> {
    let start = *offset;
    let end = match buf[start..].iter().position(|b| terminators.contains(b)) {
        Some(pos) => start + pos,
        None => return fail(buf, ParseErrorKind::UnexpectedEndOfInput, buf.len()),
    };

    let name = &buf[start..end];
    if let Err(reason) = validate_field(name, MAX_SD_NAME_LEN) {
        return fail(buf, ParseErrorKind::InvalidField { field, reason }, start);
    }

    *offset = end;
    Ok(name.iter().map(|&b| b as char).collect())
}

// The opening quote is consumed by the caller. On success `offset` points
// just after the closing quote.
fn parse_param_value(buf: &[u8], offset: &mut usize) -> Result<String> {
    let start = *offset;
    let mut pos = start;

    while pos < buf.len() {
        match buf[pos] {
            // an escaped char never terminates the value; unknown escapes are
            // kept by unescape()
            b'\\' => pos += 2,
            b'"' => {
                let raw = match std::str::from_utf8(&buf[start..pos]) {
                    Ok(raw) => raw,
                    Err(err) => {
                        let at = start + err.valid_up_to();
                        return fail(buf, ParseErrorKind::InvalidUtf8, at);
                    }
                };
                *offset = pos + 1;
                return Ok(unescape(raw).into_owned());
            }
            _ => pos += 1,
        }
    }

    fail(buf, ParseErrorKind::UnterminatedValue, start)
}

// example: [exampleSDID@32473 iut="3" eventSource="Application" eventID="1011"]
fn parse_structured_element(buf: &[u8], offset: &mut usize) -> Result<StructuredElement> {
    expect(buf, offset, b'[')?;
    let id = parse_name(buf, offset, "SD-ID", b" ]")?;

    let mut params = Vec::new();
    loop {
        match buf.get(*offset) {
            Some(b']') => {
                *offset += 1;
                break;
            }
            Some(b' ') => {
                *offset += 1;
                let name = parse_name(buf, offset, "param name", b"=")?;
                expect(buf, offset, b'=')?;
                expect(buf, offset, b'"')?;
                let value = parse_param_value(buf, offset)?;
                params.push((name, value));
            }
            Some(_) => return fail(buf, ParseErrorKind::ExpectedChar(']'), *offset),
            None => return fail(buf, ParseErrorKind::UnexpectedEndOfInput, *offset),
        }
    }

    Ok(StructuredElement::from_parts(id, params))
}

fn parse_structured_data(buf: &[u8], offset: &mut usize) -> Result<StructuredData> {
    match buf.get(*offset) {
        Some(b'-') => {
            *offset += 1;
            return Ok(StructuredData::new());
        }
        Some(b'[') => {}
        Some(_) => return fail(buf, ParseErrorKind::ExpectedChar('['), *offset),
        None => return fail(buf, ParseErrorKind::UnexpectedEndOfInput, *offset),
    }

    let mut elements = Vec::with_capacity(2);
    while buf.get(*offset) == Some(&b'[') {
        elements.push(parse_structured_element(buf, offset)?);
    }

    Ok(elements.into())
}

fn parse_body(buf: &[u8], offset: usize) -> Result<Body> {
    let msg = &buf[offset..];
    match msg.strip_prefix(BOM) {
        Some(text) => match std::str::from_utf8(text) {
            Ok(text) => Ok(Body::Text(text.to_owned())),
            Err(err) => fail(
                buf,
                ParseErrorKind::InvalidUtf8,
                offset + BOM.len() + err.valid_up_to(),
            ),
        },
        None => Ok(Body::Bytes(Bytes::copy_from_slice(msg))),
    }
}

/// Parse one message in strict mode.
///
/// Absent fields (NIL) come back as `None`; any grammar violation fails the
/// whole message.
pub fn parse_message(buf: &[u8]) -> std::result::Result<Entry, ParseError> {
    parse_message_with(buf, &ParserOptions::strict())
}

pub fn parse_message_with(
    buf: &[u8],
    options: &ParserOptions,
) -> std::result::Result<Entry, ParseError> {
    let mut offset = 0;

    let priority = parse_priority(buf, &mut offset)?;
    let version = parse_version(buf, &mut offset)?;
    expect(buf, &mut offset, b' ')?;

    let timestamp = parse_timestamp(buf, &mut offset)?;
    expect(buf, &mut offset, b' ')?;

    let hostname = parse_header_field(buf, &mut offset, "hostname", MAX_HOSTNAME_LEN, options)?;
    expect(buf, &mut offset, b' ')?;
    let appname = parse_header_field(buf, &mut offset, "app-name", MAX_APPNAME_LEN, options)?;
    expect(buf, &mut offset, b' ')?;
    let procid = parse_header_field(buf, &mut offset, "procid", MAX_PROCID_LEN, options)?;
    expect(buf, &mut offset, b' ')?;
    let msgid = parse_header_field(buf, &mut offset, "msgid", MAX_MSGID_LEN, options)?;
    expect(buf, &mut offset, b' ')?;

    let structured_data = parse_structured_data(buf, &mut offset)?;

    let body = match buf.get(offset) {
        None => None,
        Some(b' ') => Some(parse_body(buf, offset + 1)?),
        Some(_) => return fail(buf, ParseErrorKind::TrailingData, offset),
    };

    Ok(Entry {
        priority,
        version,
        timestamp,
        hostname,
        appname,
        procid,
        msgid,
        structured_data,
        body,
    })
}

impl FromStr for Entry {
    type Err = ParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        parse_message(s.as_bytes())
    }
}
