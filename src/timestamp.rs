//! RFC 3339 timestamps as restricted by RFC 5424 section 6.2.3.
//!
//! Accepted: `YYYY-MM-DDTHH:MM:SS[.f{1,6}](Z|±HH:MM)`. Everything is normalized
//! to UTC at microsecond precision, and formatting always produces
//! `YYYY-MM-DDTHH:MM:SS.ffffffZ`. The UTC year must stay within 0000..=9999,
//! the range the four digit year can express.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, SubsecRound, TimeZone, Utc};

use crate::error::TimestampError;
use crate::escape::NIL;

/// Years representable on the wire.
pub const YEAR_RANGE: std::ops::RangeInclusive<i32> = 0..=9999;

// get a character from the bytes as as a decimal
macro_rules! get_digit {
    ($bytes:ident, $index:expr, $what:expr) => {
        match $bytes.get($index) {
            Some(c) if c.is_ascii_digit() => (c - b'0') as u32,
            _ => return Err(TimestampError::InvalidDigit($what)),
        }
    };
}

macro_rules! expect_byte {
    ($bytes:ident, $index:expr, $byte:expr, $error:ident) => {
        if $bytes.get($index) != Some(&$byte) {
            return Err(TimestampError::$error);
        }
    };
}

/// Parse the TIMESTAMP field. `-` yields `None`; the caller decides what an
/// absent timestamp means (see `Entry::timestamp_or_now`).
pub fn parse(text: &str) -> Result<Option<DateTime<Utc>>, TimestampError> {
    if text == NIL {
        return Ok(None);
    }

    parse_rfc3339(text.as_bytes()).map(Some)
}

/// Canonical wire representation, always UTC with six fractional digits.
///
/// Only timestamps accepted by [`check_year`] have a four digit year.
pub fn format(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Reject a UTC instant whose year has no four digit form.
pub fn check_year(ts: &DateTime<Utc>) -> Result<(), TimestampError> {
    if YEAR_RANGE.contains(&ts.year()) {
        Ok(())
    } else {
        Err(TimestampError::OutOfRangeYear(ts.year()))
    }
}

pub(crate) fn parse_rfc3339(buf: &[u8]) -> Result<DateTime<Utc>, TimestampError> {
    // 20 is the length of `1990-12-31T23:59:59Z`
    if buf.len() < 20 {
        return Err(TimestampError::TooShort);
    }

    let (year, month, day) = parse_date(buf)?;
    expect_byte!(buf, 10, b'T', InvalidCharDateTimeSep);
    let (hour, minute, second, micros, position) = parse_time(buf, 11)?;
    let (offset, position) = parse_offset(buf, position)?;

    if position != buf.len() {
        return Err(TimestampError::ExtraCharacters);
    }

    let offset = FixedOffset::east_opt(offset).ok_or(TimestampError::OutOfRangeTimezone)?;
    let datetime = NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_micro_opt(hour, minute, second, micros))
        .ok_or(TimestampError::OutOfRangeDay)?;

    // local time minus the offset is UTC; FixedOffset never yields an
    // ambiguous or missing local time.
    let local = offset
        .from_local_datetime(&datetime)
        .single()
        .ok_or(TimestampError::OutOfRangeTimezone)?;

    // offset normalization can step out of the four digit range,
    // e.g. 9999-12-31T23:00:00-02:00
    let utc = local.with_timezone(&Utc).trunc_subsecs(6);
    check_year(&utc)?;

    Ok(utc)
}

fn parse_date(buf: &[u8]) -> Result<(i32, u32, u32), TimestampError> {
    let year = get_digit!(buf, 0, "year") * 1000
        + get_digit!(buf, 1, "year") * 100
        + get_digit!(buf, 2, "year") * 10
        + get_digit!(buf, 3, "year");
    expect_byte!(buf, 4, b'-', InvalidCharDateSep);
    let month = get_digit!(buf, 5, "month") * 10 + get_digit!(buf, 6, "month");
    expect_byte!(buf, 7, b'-', InvalidCharDateSep);
    let day = get_digit!(buf, 8, "day") * 10 + get_digit!(buf, 9, "day");

    let year = year as i32;

    // calculate the maximum number of days in the month, accounting for leap years in the
    // gregorian calendar
    let max_days = match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if year % 4 == 0 && (year % 100 != 0 || year % 400 == 0) {
                29
            } else {
                28
            }
        }
        _ => return Err(TimestampError::OutOfRangeMonth),
    };

    if day < 1 || day > max_days {
        return Err(TimestampError::OutOfRangeDay);
    }

    Ok((year, month, day))
}

/// Parse `HH:MM:SS[.ffffff]` starting at `offset`, returning the fields and
/// the position right after them.
fn parse_time(buf: &[u8], offset: usize) -> Result<(u32, u32, u32, u32, usize), TimestampError> {
    let hour = get_digit!(buf, offset, "hour") * 10 + get_digit!(buf, offset + 1, "hour");
    if hour > 23 {
        return Err(TimestampError::OutOfRangeHour);
    }
    expect_byte!(buf, offset + 2, b':', InvalidCharTimeSep);

    let minute = get_digit!(buf, offset + 3, "minute") * 10 + get_digit!(buf, offset + 4, "minute");
    if minute > 59 {
        return Err(TimestampError::OutOfRangeMinute);
    }
    expect_byte!(buf, offset + 5, b':', InvalidCharTimeSep);

    let second = get_digit!(buf, offset + 6, "second") * 10 + get_digit!(buf, offset + 7, "second");
    if second > 59 {
        return Err(TimestampError::OutOfRangeSecond);
    }

    let mut position = offset + 8;
    let mut micros = 0;
    if buf.get(position) == Some(&b'.') {
        position += 1;
        let mut count = 0;
        while let Some(c) = buf.get(position).filter(|c| c.is_ascii_digit()) {
            count += 1;
            if count > 6 {
                return Err(TimestampError::SecondFractionTooLong);
            }
            micros = micros * 10 + (c - b'0') as u32;
            position += 1;
        }
        if count == 0 {
            return Err(TimestampError::SecondFractionMissing);
        }
        micros *= 10u32.pow(6 - count);
    }

    Ok((hour, minute, second, micros, position))
}

/// Parse `Z` or `±HH:MM`, returning seconds east of UTC.
fn parse_offset(buf: &[u8], position: usize) -> Result<(i32, usize), TimestampError> {
    let sign = match buf.get(position) {
        Some(b'Z') => return Ok((0, position + 1)),
        Some(b'+') => 1,
        Some(b'-') => -1,
        _ => return Err(TimestampError::InvalidCharTzSign),
    };

    let hours = get_digit!(buf, position + 1, "offset hour") * 10
        + get_digit!(buf, position + 2, "offset hour");
    expect_byte!(buf, position + 3, b':', InvalidCharTimeSep);
    let minutes = get_digit!(buf, position + 4, "offset minute") * 10
        + get_digit!(buf, position + 5, "offset minute");

    if hours > 23 || minutes > 59 {
        return Err(TimestampError::OutOfRangeTimezone);
    }

    Ok((sign * (hours * 3600 + minutes * 60) as i32, position + 6))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32, micros: u32) -> DateTime<Utc> {
        Utc.from_utc_datetime(
            &NaiveDate::from_ymd_opt(y, mo, d)
                .unwrap()
                .and_hms_micro_opt(h, mi, s, micros)
                .unwrap(),
        )
    }

    #[test]
    fn nil() {
        assert_eq!(parse("-").unwrap(), None);
    }

    #[test]
    fn zulu() {
        let ts = parse("2015-02-18T23:16:09Z").unwrap().unwrap();
        assert_eq!(ts, utc(2015, 2, 18, 23, 16, 9, 0));
    }

    #[test]
    fn offsets_normalize_to_utc() {
        for (input, want) in [
            ("2003-10-11T12:14:15.003000Z", utc(2003, 10, 11, 12, 14, 15, 3000)),
            ("2003-10-11T12:14:15.003Z", utc(2003, 10, 11, 12, 14, 15, 3000)),
            ("2003-10-11T12:14:15Z", utc(2003, 10, 11, 12, 14, 15, 0)),
            ("2003-10-11T12:14:15.003000+04:00", utc(2003, 10, 11, 8, 14, 15, 3000)),
            ("2003-10-11T12:14:15+04:00", utc(2003, 10, 11, 8, 14, 15, 0)),
            // Pacific/Kiritimati
            ("2003-10-11T12:14:15.003+14:00", utc(2003, 10, 10, 22, 14, 15, 3000)),
            ("2003-10-11T12:14:15+14:00", utc(2003, 10, 10, 22, 14, 15, 0)),
            ("2003-10-11T12:14:15.003-04:00", utc(2003, 10, 11, 16, 14, 15, 3000)),
            ("2003-10-11T12:14:15.003000-12:00", utc(2003, 10, 12, 0, 14, 15, 3000)),
            ("2003-10-11T12:14:15-12:00", utc(2003, 10, 12, 0, 14, 15, 0)),
            ("2019-01-20T00:46:39+05:45", utc(2019, 1, 19, 19, 1, 39, 0)),
        ] {
            assert_eq!(parse(input).unwrap(), Some(want), "input: {input}");
        }
    }

    #[test]
    fn equivalent_representations() {
        assert_eq!(
            parse("2003-10-11T22:14:15.003000Z").unwrap(),
            parse("2003-10-11T22:14:15.003Z").unwrap()
        );
        assert_eq!(
            parse("2003-10-11T15:14:15-07:00").unwrap(),
            parse("2003-10-11T22:14:15Z").unwrap()
        );
    }

    #[test]
    fn compare_with_chrono() {
        for input in [
            "1985-04-12T23:20:50.52Z",
            "1996-12-19T16:39:57-08:00",
            "1990-12-31T23:59:59Z",
            "1990-12-31T15:59:59-08:00",
            "1937-01-01T12:00:27.87+00:20",
            "2003-08-24T05:14:15.000003-07:00",
        ] {
            let got = parse(input).unwrap().unwrap();
            let want = DateTime::parse_from_rfc3339(input).unwrap();
            assert_eq!(got, want, "input: {input}");
        }
    }

    #[test]
    fn rejects_malformed() {
        for (input, want) in [
            ("2003-10-11", TimestampError::TooShort),
            ("2003-1x-11T22:14:15Z", TimestampError::InvalidDigit("month")),
            ("2003/10/11T22:14:15Z", TimestampError::InvalidCharDateSep),
            ("2003-10-11 22:14:15Z", TimestampError::InvalidCharDateTimeSep),
            ("2003-13-11T22:14:15Z", TimestampError::OutOfRangeMonth),
            ("2003-02-29T22:14:15Z", TimestampError::OutOfRangeDay),
            ("2003-10-11T24:14:15Z", TimestampError::OutOfRangeHour),
            ("2003-10-11T22:60:15Z", TimestampError::OutOfRangeMinute),
            ("2003-10-11T22:14:60Z", TimestampError::OutOfRangeSecond),
            ("2003-10-11T22:14:15.Z", TimestampError::SecondFractionMissing),
            ("2003-10-11T22:14:15.0000003Z", TimestampError::SecondFractionTooLong),
            ("2003-10-11T22:14:15", TimestampError::TooShort),
            ("2003-10-11T22:14:15.1", TimestampError::InvalidCharTzSign),
            ("2003-10-11T22:14:15*07:00", TimestampError::InvalidCharTzSign),
            ("2003-10-11T22:14:15+24:00", TimestampError::OutOfRangeTimezone),
            ("2003-10-11T22:14:15+07", TimestampError::InvalidCharTimeSep),
            ("2003-10-11T22:14:15Zjunk", TimestampError::ExtraCharacters),
        ] {
            assert_eq!(parse(input), Err(want), "input: {input}");
        }
    }

    #[test]
    fn leap_day() {
        assert!(parse("2004-02-29T00:00:00Z").unwrap().is_some());
        assert!(parse("2000-02-29T00:00:00Z").unwrap().is_some());
        assert_eq!(
            parse("1900-02-29T00:00:00Z"),
            Err(TimestampError::OutOfRangeDay)
        );
    }

    #[test]
    fn format_canonical() {
        let ts = utc(2003, 10, 11, 22, 14, 15, 3000);
        assert_eq!(format(&ts), "2003-10-11T22:14:15.003000Z");

        let ts = utc(2003, 10, 11, 22, 14, 15, 0) + Duration::nanoseconds(1_999);
        assert_eq!(format(&ts), "2003-10-11T22:14:15.000001Z");
    }

    #[test]
    fn year_must_stay_four_digits_after_normalization() {
        assert_eq!(
            parse("9999-12-31T23:00:00-02:00"),
            Err(TimestampError::OutOfRangeYear(10000))
        );
        assert_eq!(
            parse("0000-01-01T00:30:00+01:00"),
            Err(TimestampError::OutOfRangeYear(-1))
        );

        let last = parse("9999-12-31T21:59:59.999999-02:00").unwrap().unwrap();
        assert_eq!(format(&last), "9999-12-31T23:59:59.999999Z");
        let first = parse("0000-01-01T00:00:00Z").unwrap().unwrap();
        assert_eq!(format(&first), "0000-01-01T00:00:00.000000Z");
    }

    #[test]
    fn format_then_parse() {
        let ts = utc(1999, 12, 31, 23, 59, 59, 999_999);
        assert_eq!(parse(&format(&ts)).unwrap(), Some(ts));
    }
}
