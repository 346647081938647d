//! Text functions shared by the parser functions which do not correspond to
//! anything in the Rust standard library.

use crate::title;
use core::fmt::Write as _;
use html_escape::NAMED_ENTITIES;
use regex::Regex;
use std::{borrow::Cow, sync::LazyLock};
use time::{
    Date, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset,
    format_description::well_known::{Rfc2822, Rfc3339},
    macros::format_description,
};

/// A date formatting error.
#[derive(Debug, thiserror::Error)]
pub enum DateError {
    /// The date argument could not be understood.
    #[error("invalid date '{0}'")]
    Invalid(String),
    /// The date was outside the range of the requested format.
    #[error(transparent)]
    Format(#[from] time::error::Format),
}

/// Encodes section heading text into a format suitable for use as a URL anchor.
pub fn anchor_encode(s: &str) -> String {
    let s = decode_html(s.trim_ascii());
    let id = title::normalize(&s);
    let end = id.floor_char_boundary(1024);
    url_encode(&id[..end].replace(' ', "_")).to_string()
}

/// Decodes HTML entities according to the Wikitext rules.
pub fn decode_html(text: &str) -> Cow<'_, str> {
    const MAX_LEN: usize = {
        let mut max = 0;
        let mut entities = NAMED_ENTITIES.as_slice();
        while let [(name, _), rest @ ..] = entities {
            if name.len() > max {
                max = name.len();
            }
            entities = rest;
        }
        max + b";".len()
    };

    let bytes = text.as_bytes();
    let entity_ranges = memchr::memchr_iter(b'&', bytes).filter_map(|start| {
        let next = start + "&".len();
        memchr::memchr(b';', &bytes[next..(next + MAX_LEN).min(bytes.len())])
            .map(|len| start..(next + len + b";".len()))
    });

    let mut flushed = 0;
    let mut out = String::new();
    for range in entity_ranges {
        if range.start < flushed {
            continue;
        }
        let mut char = [0; 4];
        let name = &text[range.start + 1..range.end - 1];
        let value = if let Some(name) = name.strip_prefix('#') {
            if let Some(name) = name.strip_prefix(|c: char| matches!(c, 'X' | 'x')) {
                u32::from_str_radix(name, 16)
            } else {
                name.parse::<u32>()
            }
            .ok()
            .and_then(char::from_u32)
            .map(|c| &*c.encode_utf8(&mut char))
        } else {
            NAMED_ENTITIES
                .binary_search_by(|(t_name, _)| t_name.cmp(&name.as_bytes()))
                .ok()
                .map(|index| NAMED_ENTITIES[index].1)
        };
        if let Some(value) = value {
            out += &text[flushed..range.start];
            out += value;
            flushed = range.end;
        }
    }

    if flushed != 0 {
        out += &text[flushed..];
        Cow::Owned(out)
    } else {
        Cow::Borrowed(text)
    }
}

/// Inserts thousands separators into every number in `text`, or removes them
/// if `reverse` is true.
pub fn format_number(text: &str, reverse: bool) -> Cow<'_, str> {
    static NUMBER: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(-?)(\d+)((?:\.\d+)?)").unwrap());

    if reverse {
        return if text.contains(',') {
            Cow::Owned(text.replace(',', ""))
        } else {
            Cow::Borrowed(text)
        };
    }

    NUMBER.replace_all(text, |captures: &regex::Captures<'_>| {
        let (_, [sign, digits, fraction]) = captures.extract();
        let mut out = String::from(sign);
        for (index, chunk) in digits.as_bytes().rchunks(3).rev().enumerate() {
            if index != 0 {
                out.push(',');
            }
            // The chunks of an ASCII digit string are ASCII.
            out += core::str::from_utf8(chunk).unwrap_or_default();
        }
        out + fraction
    })
}

/// Formats a date according to the given MediaWiki time `format` string.
///
/// The `date` string is one of the forms accepted by [`parse_date`]. If it is
/// empty, `now` is used. The result is expressed at `offset`.
pub fn format_date(
    now: OffsetDateTime,
    format: &str,
    date: Option<&str>,
    offset: UtcOffset,
) -> Result<String, DateError> {
    let date = match date.map(str::trim) {
        None | Some("" | "now") => now,
        Some(date) => parse_date(now, date)?,
    }
    .to_offset(offset);

    let mut out = String::new();
    let mut chars = format.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(c) = chars.next() {
                    out.push(c);
                } else {
                    out.push('\\');
                }
            }
            '"' => {
                let rest = chars.as_str();
                if let Some(end) = rest.find('"') {
                    out += &rest[..end];
                    chars = rest[end + 1..].chars();
                } else {
                    out.push('"');
                }
            }
            c => format_date_char(&mut out, &date, c)?,
        }
    }
    Ok(out)
}

/// Writes the date component for the format character `c`, or `c` itself if
/// it is not a format character.
fn format_date_char(out: &mut String, date: &OffsetDateTime, c: char) -> Result<(), DateError> {
    let hour12 = match date.hour() % 12 {
        0 => 12,
        hour => hour,
    };
    let (iso_year, iso_week, _) = date.to_iso_week_date();
    let offset = date.offset();
    let (offset_h, offset_m, _) = offset.as_hms();
    let sign = if offset.is_negative() { '-' } else { '+' };

    // Writing to a `String` cannot fail.
    let _ = match c {
        'd' => write!(out, "{:02}", date.day()),
        'D' => write!(out, "{}", &date.weekday().to_string()[..3]),
        'j' => write!(out, "{}", date.day()),
        'l' => write!(out, "{}", date.weekday()),
        'N' => write!(out, "{}", date.weekday().number_from_monday()),
        'w' => write!(out, "{}", date.weekday().number_days_from_sunday()),
        'z' => write!(out, "{}", date.ordinal() - 1),
        'W' => write!(out, "{iso_week:02}"),
        'F' => write!(out, "{}", date.month()),
        'm' => write!(out, "{:02}", u8::from(date.month())),
        'M' => write!(out, "{}", &date.month().to_string()[..3]),
        'n' => write!(out, "{}", u8::from(date.month())),
        't' => write!(out, "{}", days_in_month(date.year(), date.month())),
        'L' => write!(out, "{}", u8::from(time::util::is_leap_year(date.year()))),
        'o' => write!(out, "{iso_year}"),
        'Y' => write!(out, "{}", date.year()),
        'y' => write!(out, "{:02}", date.year().rem_euclid(100)),
        'a' => out.write_str(if date.hour() < 12 { "am" } else { "pm" }),
        'A' => out.write_str(if date.hour() < 12 { "AM" } else { "PM" }),
        'g' => write!(out, "{hour12}"),
        'G' => write!(out, "{}", date.hour()),
        'h' => write!(out, "{hour12:02}"),
        'H' => write!(out, "{:02}", date.hour()),
        'i' => write!(out, "{:02}", date.minute()),
        's' => write!(out, "{:02}", date.second()),
        'U' => write!(out, "{}", date.unix_timestamp()),
        'c' => write!(
            out,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}{sign}{:02}:{:02}",
            date.year(),
            u8::from(date.month()),
            date.day(),
            date.hour(),
            date.minute(),
            date.second(),
            offset_h.unsigned_abs(),
            offset_m.unsigned_abs()
        ),
        'r' => out.write_str(&date.format(&Rfc2822)?),
        'e' | 'T' if offset.is_utc() => out.write_str("UTC"),
        'e' | 'T' | 'P' => write!(
            out,
            "{sign}{:02}:{:02}",
            offset_h.unsigned_abs(),
            offset_m.unsigned_abs()
        ),
        'O' => write!(
            out,
            "{sign}{:02}{:02}",
            offset_h.unsigned_abs(),
            offset_m.unsigned_abs()
        ),
        'Z' => write!(out, "{}", offset.whole_seconds()),
        c => out.write_char(c),
    };
    Ok(())
}

/// Parses a date argument to `#time`.
///
/// Accepted forms are a four-digit year (the current date and midnight in
/// that year), `@` followed by a Unix timestamp, ISO `YYYY-MM-DD` with an
/// optional ` HH:MM[:SS]` or `THH:MM[:SS]`, RFC 3339, `D Month YYYY`, and
/// `Month D, YYYY`. Dates without an offset are UTC.
pub fn parse_date(now: OffsetDateTime, date: &str) -> Result<OffsetDateTime, DateError> {
    let invalid = || DateError::Invalid(date.to_string());

    if date.len() == 4
        && let Ok(year) = date.parse::<i32>()
    {
        let day = now.day().min(days_in_month(year, now.month()));
        return Date::from_calendar_date(year, now.month(), day)
            .map(|day| PrimitiveDateTime::new(day, Time::MIDNIGHT).assume_offset(now.offset()))
            .map_err(|_| invalid());
    }

    if let Some(timestamp) = date.strip_prefix('@') {
        return timestamp
            .parse::<i64>()
            .ok()
            .and_then(|timestamp| OffsetDateTime::from_unix_timestamp(timestamp).ok())
            .ok_or_else(invalid);
    }

    if let Ok(date) = OffsetDateTime::parse(date, &Rfc3339) {
        return Ok(date);
    }

    let (day, time) = date
        .split_once(['T', ' '])
        .filter(|(day, _)| day.contains('-'))
        .unwrap_or((date, ""));
    if let Ok(day) = Date::parse(day, format_description!("[year]-[month]-[day]")) {
        let time = match time.trim() {
            "" => Time::MIDNIGHT,
            time => Time::parse(time, format_description!("[hour]:[minute]:[second]"))
                .or_else(|_| Time::parse(time, format_description!("[hour]:[minute]")))
                .map_err(|_| invalid())?,
        };
        return Ok(PrimitiveDateTime::new(day, time).assume_utc());
    }

    parse_written_date(date)
        .map(|day| PrimitiveDateTime::new(day, Time::MIDNIGHT).assume_utc())
        .ok_or_else(invalid)
}

/// Parses `D Month YYYY` or `Month D, YYYY`.
fn parse_written_date(date: &str) -> Option<Date> {
    let words = date
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>();
    let [first, second, year] = words[..] else {
        return None;
    };
    let (day, month) = match (first.parse::<u8>(), second.parse::<u8>()) {
        (Ok(day), Err(_)) => (day, parse_month(second)?),
        (Err(_), Ok(day)) => (day, parse_month(first)?),
        _ => return None,
    };
    Date::from_calendar_date(year.parse().ok()?, month, day).ok()
}

/// Parses an English month name or three-letter abbreviation.
fn parse_month(name: &str) -> Option<Month> {
    let mut month = Month::January;
    for _ in 0..12 {
        let full = month.to_string();
        if name.eq_ignore_ascii_case(&full)
            || (name.len() == 3 && name.eq_ignore_ascii_case(&full[..3]))
        {
            return Some(month);
        }
        month = month.next();
    }
    None
}

/// The number of days in the given month.
fn days_in_month(year: i32, month: Month) -> u8 {
    match month {
        Month::February if time::util::is_leap_year(year) => 29,
        Month::February => 28,
        Month::April | Month::June | Month::September | Month::November => 30,
        _ => 31,
    }
}

/// The `urlencode` magic word encoding styles.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum UrlEncoding {
    /// Form encoding, with spaces as `+`.
    #[default]
    Query,
    /// Wiki title encoding, with spaces as `_`.
    Wiki,
    /// Path encoding, with spaces as `%20`.
    Path,
}

impl UrlEncoding {
    /// Parses an encoding style name. Unknown names use the default style.
    pub fn from_name(name: &str) -> Self {
        match name.trim() {
            "WIKI" => Self::Wiki,
            "PATH" => Self::Path,
            _ => Self::Query,
        }
    }

    /// Encodes `input` in this style.
    pub fn encode(self, input: &str) -> String {
        match self {
            Self::Query => {
                percent_encoding::utf8_percent_encode(input, &QUERY_ALPHABET)
                    .to_string()
                    .replace("%20", "+")
            }
            Self::Wiki => {
                percent_encoding::utf8_percent_encode(&input.replace(' ', "_"), &WIKI_ALPHABET)
                    .to_string()
            }
            Self::Path => percent_encoding::utf8_percent_encode(input, &PATH_ALPHABET).to_string(),
        }
    }
}

/// Percent-decodes a form-encoded URL part.
pub fn url_decode(input: &str) -> Cow<'_, str> {
    if input.contains('+') {
        Cow::Owned(
            percent_encoding::percent_decode_str(&input.replace('+', " "))
                .decode_utf8_lossy()
                .into_owned(),
        )
    } else {
        percent_encoding::percent_decode_str(input).decode_utf8_lossy()
    }
}

/// Percent-encodes a URL fragment.
#[inline]
pub fn url_encode(input: &str) -> percent_encoding::PercentEncode<'_> {
    percent_encoding::utf8_percent_encode(input, &ALPHABET)
}

/// The alphabet of characters to percent-encode when encoding fragments.
const ALPHABET: percent_encoding::AsciiSet = percent_encoding::CONTROLS
    .add(b'%')
    .add(b'#')
    .add(b'\'')
    .add(b'"')
    .add(b'&')
    .add(b'<')
    .add(b'>')
    .add(b'[')
    .add(b']')
    .add(b' ');

/// Characters encoded by [`UrlEncoding::Query`].
const QUERY_ALPHABET: percent_encoding::AsciiSet = percent_encoding::NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.');

/// Characters encoded by [`UrlEncoding::Path`].
const PATH_ALPHABET: percent_encoding::AsciiSet = QUERY_ALPHABET.remove(b'~');

/// Characters encoded by [`UrlEncoding::Wiki`].
const WIKI_ALPHABET: percent_encoding::AsciiSet = PATH_ALPHABET
    .remove(b':')
    .remove(b'/')
    .remove(b'(')
    .remove(b')')
    .remove(b'!')
    .remove(b',')
    .remove(b';')
    .remove(b'@')
    .remove(b'$')
    .remove(b'*');

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2024-02-29 13:05:09 UTC);

    fn format(format: &str, date: Option<&str>) -> String {
        format_date(NOW, format, date, UtcOffset::UTC).unwrap()
    }

    #[test]
    fn test_decode_html() {
        assert_eq!(
            decode_html("hello & world"),
            Cow::Borrowed("hello & world"),
            "non-entity should remain as-is"
        );
        assert_eq!(
            decode_html("hello&nbsp;world"),
            "hello\u{00a0}world",
            "entity should decode"
        );
        assert_eq!(
            decode_html("hello&oops;world"),
            "hello&oops;world",
            "invalid entity should remain as-is"
        );
        assert_eq!(decode_html("hello&#42;world"), "hello*world");
        assert_eq!(decode_html("hello&#x42;world"), "helloBworld");
        assert_eq!(
            decode_html("hello&&nbsp;world"),
            "hello&\u{00a0}world",
            "incomplete entity should not interfere with later entity"
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(format_number("1234567.891", false), "1,234,567.891");
        assert_eq!(format_number("-1000", false), "-1,000");
        assert_eq!(format_number("999", false), "999");
        assert_eq!(format_number("x 12345 y", false), "x 12,345 y");
        assert_eq!(format_number("1,234,567", true), "1234567");
    }

    #[test]
    fn urls() {
        assert_eq!(UrlEncoding::Query.encode("a b&c/d"), "a+b%26c%2Fd");
        assert_eq!(UrlEncoding::Path.encode("a b~"), "a%20b~");
        assert_eq!(UrlEncoding::Wiki.encode("Talk:a b/c"), "Talk:a_b/c");
        assert_eq!(url_decode("a+b%26c"), "a b&c");
        assert_eq!(anchor_encode(" Section  one &amp; two "), "Section_one_%26_two");
    }

    #[test]
    fn date_formats() {
        assert_eq!(format("Y-m-d H:i:s", None), "2024-02-29 13:05:09");
        assert_eq!(format("j F Y", None), "29 February 2024");
        assert_eq!(format("D, M n y", None), "Thu, Feb 2 24");
        assert_eq!(format("l N w z t L", None), "Thursday 4 4 59 29 1");
        assert_eq!(format("g:i a, h A, G", None), "1:05 pm, 01 PM, 13");
        assert_eq!(format("W o", None), "09 2024");
        assert_eq!(format("U", None), "1709211909");
        assert_eq!(format("c", None), "2024-02-29T13:05:09+00:00");
        assert_eq!(format("r", None), "Thu, 29 Feb 2024 13:05:09 +0000");
        assert_eq!(format("e T P O Z", None), "UTC UTC +00:00 +0000 0");
        assert_eq!(format(r#"\Y "Y-m" Y"#, None), "Y Y-m 2024");
    }

    #[test]
    fn date_inputs() {
        assert_eq!(format("Y-m-d", Some("2001-07-04")), "2001-07-04");
        assert_eq!(format("H:i", Some("2001-07-04 17:30")), "17:30");
        assert_eq!(format("H:i:s", Some("2001-07-04T17:30:15")), "17:30:15");
        assert_eq!(format("Y-m-d", Some("@86400")), "1970-01-02");
        assert_eq!(
            format("Y-m-d H", Some("1999")),
            "1999-02-28 00",
            "a bare year keeps the current date where it exists"
        );
        assert_eq!(format("Y-m-d", Some("4 July 1976")), "1976-07-04");
        assert_eq!(format("Y-m-d", Some("Jul 4, 1976")), "1976-07-04");
        assert_eq!(
            format("Y-m-d H:i", Some("2010-05-01T10:00:00+02:00")),
            "2010-05-01 08:00"
        );
        assert!(format_date(NOW, "Y", Some("not a date"), UtcOffset::UTC).is_err());
    }

    #[test]
    fn local_offset() {
        let offset = UtcOffset::from_hms(-5, -30, 0).unwrap();
        assert_eq!(
            format_date(NOW, "H:i P", None, offset).unwrap(),
            "07:35 -05:30"
        );
    }
}
