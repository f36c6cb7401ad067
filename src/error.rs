use std::fmt;

use crate::framing::FramingError;

/// Longest slice of the offending input kept inside a [`ParseError`].
const PREVIEW_LEN: usize = 256;

/// Crate level error, every fallible operation ends up here.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Framing(#[from] FramingError),
    #[error(transparent)]
    Timestamp(#[from] TimestampError),
    #[error("invalid {field}: {reason}")]
    InvalidField {
        field: &'static str,
        reason: FieldError,
    },
    #[error("version {0} out of range 1..=999")]
    BadVersion(u16),
    #[error("priority value {0} out of range 0..=191")]
    BadPriority(u16),
    #[error("bad severity {0}")]
    BadSeverity(u8),
    #[error("bad facility {0}")]
    BadFacility(u8),
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a header field, SD-ID or PARAM-NAME was rejected.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("value is empty")]
    Empty,
    #[error("value is the NILVALUE")]
    Nil,
    #[error("length {len} exceeds {max}")]
    TooLong { len: usize, max: usize },
    #[error("illegal character {0:?}")]
    IllegalChar(char),
    #[error("starts with a BOM but the rest is not UTF-8")]
    InvalidUtf8AfterBom,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TimestampError {
    #[error("timestamp too short")]
    TooShort,
    #[error("invalid digit in {0}")]
    InvalidDigit(&'static str),
    #[error("invalid date separator")]
    InvalidCharDateSep,
    #[error("invalid date/time separator, expected 'T'")]
    InvalidCharDateTimeSep,
    #[error("invalid time separator")]
    InvalidCharTimeSep,
    #[error("month out of range")]
    OutOfRangeMonth,
    #[error("day out of range")]
    OutOfRangeDay,
    #[error("hour out of range")]
    OutOfRangeHour,
    #[error("minute out of range")]
    OutOfRangeMinute,
    #[error("second out of range")]
    OutOfRangeSecond,
    #[error("second fraction missing after '.'")]
    SecondFractionMissing,
    #[error("second fraction longer than 6 digits")]
    SecondFractionTooLong,
    #[error("invalid timezone sign")]
    InvalidCharTzSign,
    #[error("timezone offset out of range")]
    OutOfRangeTimezone,
    #[error("year {0} out of range 0000..=9999")]
    OutOfRangeYear(i32),
    #[error("extra characters after timestamp")]
    ExtraCharacters,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseErrorKind {
    #[error("unexpected eof")]
    UnexpectedEndOfInput,
    #[error("expected {0:?}")]
    ExpectedChar(char),
    #[error("too few digits in numeric field")]
    TooFewDigits,
    #[error("too many digits in numeric field")]
    TooManyDigits,
    #[error("priority value out of range")]
    PriorityOutOfRange,
    #[error("version must not start with zero")]
    InvalidVersion,
    #[error("invalid timestamp: {0}")]
    Timestamp(#[from] TimestampError),
    #[error("invalid {field}: {reason}")]
    InvalidField {
        field: &'static str,
        reason: FieldError,
    },
    #[error("unterminated parameter value")]
    UnterminatedValue,
    #[error("invalid UTF-8")]
    InvalidUtf8,
    #[error("unexpected trailing data")]
    TrailingData,
}

/// A grammar violation. Parsing is all-or-nothing: when this is returned no
/// part of the entry is available.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseError {
    kind: ParseErrorKind,
    offset: usize,
    input: String,
}

impl ParseError {
    pub(crate) fn new(kind: ParseErrorKind, offset: usize, input: &[u8]) -> Self {
        let end = input.len().min(PREVIEW_LEN);
        Self {
            kind,
            offset,
            input: String::from_utf8_lossy(&input[..end]).into_owned(),
        }
    }

    pub fn kind(&self) -> &ParseErrorKind {
        &self.kind
    }

    /// Approximate byte offset of the failure inside the input.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The offending input, lossily decoded and cut to a short preview.
    pub fn input(&self) -> &str {
        &self.input
    }
}

impl std::error::Error for ParseError {}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at offset {} in {:?}",
            self.kind, self.offset, self.input
        )
    }
}
