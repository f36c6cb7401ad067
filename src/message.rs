//! In-memory representation of a single RFC 5424 syslog entry.

use std::borrow::Cow;
use std::fmt::{self, Write};

use bytes::{BufMut, Bytes, BytesMut};
use chrono::{DateTime, SubsecRound, TimeZone, Utc};

use crate::error::{Error, FieldError};
use crate::escape::str_or_nil;
use crate::structured_data::{StructuredData, StructuredElement};
use crate::{timestamp, Priority};

pub const MAX_HOSTNAME_LEN: usize = 255;
pub const MAX_APPNAME_LEN: usize = 48;
pub const MAX_PROCID_LEN: usize = 128;
pub const MAX_MSGID_LEN: usize = 32;
pub const MAX_VERSION: u16 = 999;

/// The only version defined so far.
pub const VERSION: u16 = 1;

/// UTF-8 byte order mark. A MSG starting with it is explicit Unicode text.
pub const BOM: &[u8; 3] = b"\xEF\xBB\xBF";

/// Bytes allowed in header fields, SD-IDs and PARAM-NAMEs: PRINTUSASCII
/// except `=`, `]` and `"`.
#[inline]
pub(crate) fn is_name_byte(b: u8) -> bool {
    (33..=126).contains(&b) && !matches!(b, b'=' | b']' | b'"')
}

pub(crate) fn validate_field(value: &[u8], max: usize) -> Result<(), FieldError> {
    if value.is_empty() {
        return Err(FieldError::Empty);
    }
    if value.len() > max {
        return Err(FieldError::TooLong {
            len: value.len(),
            max,
        });
    }
    match value.iter().find(|&&b| !is_name_byte(b)) {
        Some(&b) => Err(FieldError::IllegalChar(b as char)),
        None => Ok(()),
    }
}

pub(crate) fn check_field(field: &'static str, value: &str, max: usize) -> Result<(), Error> {
    if let Some(ch) = value.chars().find(|&ch| !ch.is_ascii()) {
        return Err(Error::InvalidField {
            field,
            reason: FieldError::IllegalChar(ch),
        });
    }

    validate_field(value.as_bytes(), max).map_err(|reason| Error::InvalidField { field, reason })
}

fn check_header_field(field: &'static str, value: &str, max: usize) -> Result<(), Error> {
    if value == crate::escape::NIL {
        return Err(Error::InvalidField {
            field,
            reason: FieldError::Nil,
        });
    }
    check_field(field, value, max)
}

/// The free-form MSG part.
///
/// On the wire a leading BOM is what marks text, so an opaque payload can not
/// start with one. [`EntryBuilder::build`] turns `Bytes` that start with the
/// BOM into `Text` of the remainder, or rejects them when the remainder is not
/// UTF-8.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Body {
    /// Unicode text; written with a leading BOM.
    Text(String),
    /// Opaque payload of unknown encoding; written as is.
    Bytes(Bytes),
}

impl Body {
    fn normalize(self) -> Result<Body, Error> {
        let Body::Bytes(bytes) = &self else {
            return Ok(self);
        };
        let Some(rest) = bytes.strip_prefix(BOM) else {
            return Ok(self);
        };

        match std::str::from_utf8(rest) {
            Ok(text) => Ok(Body::Text(text.to_owned())),
            Err(_) => Err(Error::InvalidField {
                field: "msg",
                reason: FieldError::InvalidUtf8AfterBom,
            }),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Body::Text(text) => text.as_bytes(),
            Body::Bytes(bytes) => bytes,
        }
    }

    /// Best effort text view. Opaque payloads are returned when they happen to
    /// be valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Body::Text(text) => Some(text),
            Body::Bytes(bytes) => std::str::from_utf8(bytes).ok(),
        }
    }

    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        match self {
            Body::Text(text) => Cow::Borrowed(text),
            Body::Bytes(bytes) => String::from_utf8_lossy(bytes),
        }
    }

    /// Whether the MSG was (or will be) tagged with the BOM.
    pub fn is_unicode(&self) -> bool {
        matches!(self, Body::Text(_))
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_owned())
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Bytes(Bytes::from(bytes))
    }
}

/// A RFC5424 syslog entry. Immutable once built, either by [`EntryBuilder`]
/// or by the parser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub(crate) priority: Priority,
    pub(crate) version: u16,
    pub(crate) timestamp: Option<DateTime<Utc>>,
    pub(crate) hostname: Option<String>,
    pub(crate) appname: Option<String>,
    pub(crate) procid: Option<String>,
    pub(crate) msgid: Option<String>,
    pub(crate) structured_data: StructuredData,
    pub(crate) body: Option<Body>,
}

impl Entry {
    pub fn builder(priority: Priority) -> EntryBuilder {
        EntryBuilder::new(priority)
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn prival(&self) -> u8 {
        self.priority.prival()
    }

    pub fn version(&self) -> u16 {
        self.version
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    /// The timestamp, or the current time when the entry carried NIL.
    pub fn timestamp_or_now(&self) -> DateTime<Utc> {
        self.timestamp.unwrap_or_else(Utc::now)
    }

    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    pub fn appname(&self) -> Option<&str> {
        self.appname.as_deref()
    }

    pub fn procid(&self) -> Option<&str> {
        self.procid.as_deref()
    }

    /// PROCIDs are usually numeric PIDs, but may be anything.
    pub fn pid(&self) -> Option<i32> {
        self.procid.as_deref().and_then(|s| s.parse().ok())
    }

    pub fn msgid(&self) -> Option<&str> {
        self.msgid.as_deref()
    }

    /// `None` when the entry carries NIL structured data.
    pub fn structured_data(&self) -> Option<&StructuredData> {
        if self.structured_data.is_empty() {
            None
        } else {
            Some(&self.structured_data)
        }
    }

    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    /// Best effort text of the MSG part.
    pub fn msg(&self) -> Option<Cow<'_, str>> {
        self.body.as_ref().map(Body::to_string_lossy)
    }

    fn write_header<W: Write>(&self, w: &mut W) -> fmt::Result {
        write!(
            w,
            "<{}>{} {} {} {} {} {} {}",
            self.priority.prival(),
            self.version,
            str_or_nil(self.timestamp.as_ref().map(timestamp::format)),
            str_or_nil(self.hostname.as_deref()),
            str_or_nil(self.appname.as_deref()),
            str_or_nil(self.procid.as_deref()),
            str_or_nil(self.msgid.as_deref()),
            self.structured_data,
        )
    }

    /// Append the wire form to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        let mut header = String::with_capacity(128);
        // writing into a String never fails
        let _ = self.write_header(&mut header);
        dst.reserve(header.len() + 4 + self.body.as_ref().map_or(0, Body::len));
        dst.put_slice(header.as_bytes());

        if let Some(body) = &self.body {
            dst.put_u8(b' ');
            if body.is_unicode() {
                dst.put_slice(BOM);
            }
            dst.put_slice(body.as_bytes());
        }
    }

    /// The wire form of this entry.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.freeze()
    }
}

/// Text rendering of the wire form; opaque payloads are decoded lossily.
impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_header(f)?;
        if let Some(body) = &self.body {
            f.write_char(' ')?;
            if body.is_unicode() {
                f.write_char('\u{FEFF}')?;
            }
            f.write_str(&body.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Validating constructor for [`Entry`].
#[derive(Clone, Debug)]
pub struct EntryBuilder {
    priority: Priority,
    version: u16,
    timestamp: Option<DateTime<Utc>>,
    hostname: Option<String>,
    appname: Option<String>,
    procid: Option<String>,
    msgid: Option<String>,
    structured_data: StructuredData,
    body: Option<Body>,
}

impl EntryBuilder {
    /// Start an entry with the given priority, `Priority::DEFAULT` when the
    /// producer has no opinion.
    pub fn new(priority: Priority) -> Self {
        Self {
            priority,
            version: VERSION,
            timestamp: None,
            hostname: None,
            appname: None,
            procid: None,
            msgid: None,
            structured_data: StructuredData::new(),
            body: None,
        }
    }

    pub fn version(mut self, version: u16) -> Self {
        self.version = version;
        self
    }

    /// Any time zone is accepted, the entry keeps UTC at microsecond precision.
    pub fn timestamp<Tz: TimeZone>(mut self, ts: DateTime<Tz>) -> Self {
        self.timestamp = Some(ts.with_timezone(&Utc));
        self
    }

    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    pub fn appname(mut self, appname: impl Into<String>) -> Self {
        self.appname = Some(appname.into());
        self
    }

    pub fn procid(mut self, procid: impl Into<String>) -> Self {
        self.procid = Some(procid.into());
        self
    }

    pub fn pid(self, pid: u32) -> Self {
        self.procid(pid.to_string())
    }

    pub fn msgid(mut self, msgid: impl Into<String>) -> Self {
        self.msgid = Some(msgid.into());
        self
    }

    pub fn structured_data(mut self, structured_data: StructuredData) -> Self {
        self.structured_data = structured_data;
        self
    }

    pub fn element(mut self, element: StructuredElement) -> Self {
        self.structured_data.push(element);
        self
    }

    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn build(self) -> Result<Entry, Error> {
        if self.version == 0 || self.version > MAX_VERSION {
            return Err(Error::BadVersion(self.version));
        }

        for (field, value, max) in [
            ("hostname", &self.hostname, MAX_HOSTNAME_LEN),
            ("app-name", &self.appname, MAX_APPNAME_LEN),
            ("procid", &self.procid, MAX_PROCID_LEN),
            ("msgid", &self.msgid, MAX_MSGID_LEN),
        ] {
            if let Some(value) = value {
                check_header_field(field, value, max)?;
            }
        }

        let timestamp = self.timestamp.map(|ts| ts.trunc_subsecs(6));
        if let Some(ts) = &timestamp {
            timestamp::check_year(ts)?;
        }
        let body = self.body.map(Body::normalize).transpose()?;

        Ok(Entry {
            priority: self.priority,
            version: self.version,
            timestamp,
            hostname: self.hostname,
            appname: self.appname,
            procid: self.procid,
            msgid: self.msgid,
            structured_data: self.structured_data,
            body,
        })
    }
}
