//! `%clk` comment decoding.
//!
//! Clock values are kept in tenths of a second throughout the crate. A
//! `[%clk 0:02:59.9]` comment decodes to `2*600 + 59*10 + 9 = 1799`.

use std::error::Error;
use std::fmt;
use std::sync::LazyLock;

static CLOCK_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"%clk\s+(\d+):(\d{1,2}):(\d{1,2})(?:\.(\d+))?")
        .expect("valid clock annotation regex")
});

const TENTHS_PER_SECOND: u64 = 10;
const TENTHS_PER_MINUTE: u64 = 600;
const TENTHS_PER_HOUR: u64 = 36_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClockError {
    /// No `%clk` marker in the comment.
    Missing,
    /// A marker was found but its fields are out of range.
    Malformed(String),
}

impl fmt::Display for ClockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "no %clk annotation"),
            Self::Malformed(raw) => write!(f, "malformed %clk annotation '{raw}'"),
        }
    }
}

impl Error for ClockError {}

/// Decode the remaining clock, in tenths of a second, from one ply's comment.
///
/// Only the first fractional digit is significant; `0:00:09.95` reads as 99.
pub fn parse_clock(comment: &str) -> Result<u32, ClockError> {
    let caps = CLOCK_RE.captures(comment).ok_or(ClockError::Missing)?;
    let malformed = || ClockError::Malformed(caps[0].to_string());

    let hours: u64 = caps[1].parse().map_err(|_| malformed())?;
    let minutes: u64 = caps[2].parse().map_err(|_| malformed())?;
    let seconds: u64 = caps[3].parse().map_err(|_| malformed())?;
    if minutes >= 60 || seconds >= 60 {
        return Err(malformed());
    }

    // `\d` also matches non-ASCII digits; `str::parse` rejects those above.
    let tenths = match caps.get(4).map(|m| m.as_str().as_bytes()) {
        Some(fraction) if !fraction.iter().all(u8::is_ascii_digit) => return Err(malformed()),
        Some(fraction) => fraction.first().map_or(0, |digit| u64::from(digit - b'0')),
        None => 0,
    };

    let total = hours
        .checked_mul(TENTHS_PER_HOUR)
        .and_then(|h| h.checked_add(minutes * TENTHS_PER_MINUTE + seconds * TENTHS_PER_SECOND))
        .and_then(|t| t.checked_add(tenths))
        .ok_or_else(malformed)?;

    u32::try_from(total).map_err(|_| malformed())
}

/// Render tenths of a second as `H:MM:SS.T`, the inverse of [`parse_clock`].
pub fn format_clock(tenths: u32) -> String {
    let tenths = u64::from(tenths);
    let hours = tenths / TENTHS_PER_HOUR;
    let minutes = (tenths % TENTHS_PER_HOUR) / TENTHS_PER_MINUTE;
    let seconds = (tenths % TENTHS_PER_MINUTE) / TENTHS_PER_SECOND;
    let fraction = tenths % TENTHS_PER_SECOND;
    format!("{hours}:{minutes:02}:{seconds:02}.{fraction}")
}

/// Human-readable think duration used in annotated movetext: `1min 3.2sec`
/// or `3.2 sec`.
pub fn format_duration(tenths: u32) -> String {
    let minutes = tenths / 600;
    let rem = tenths % 600;
    let (secs, fraction) = (rem / 10, rem % 10);

    if minutes > 0 {
        format!("{minutes}min {secs}.{fraction}sec")
    } else {
        format!("{secs}.{fraction} sec")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chesscom_clock() {
        assert_eq!(parse_clock("[%clk 0:02:59.9]"), Ok(1799));
    }

    #[test]
    fn test_parse_lichess_clock_without_fraction() {
        assert_eq!(parse_clock("[%eval 0.25] [%clk 0:03:00]"), Ok(1800));
    }

    #[test]
    fn test_parse_clock_with_hours() {
        assert_eq!(parse_clock("[%clk 1:30:43]"), Ok(36_000 + 30 * 600 + 430));
    }

    #[test]
    fn test_parse_clock_truncates_extra_fraction_digits() {
        assert_eq!(parse_clock("[%clk 0:00:09.95]"), Ok(99));
    }

    #[test]
    fn test_parse_clock_ignores_surrounding_text() {
        assert_eq!(parse_clock("blunder! [%clk 0:00:05.1] 12.0 sec"), Ok(51));
    }

    #[test]
    fn test_parse_clock_missing_marker() {
        assert_eq!(parse_clock(""), Err(ClockError::Missing));
        assert_eq!(parse_clock("[%eval 0.25]"), Err(ClockError::Missing));
        assert_eq!(parse_clock("%clk soon"), Err(ClockError::Missing));
    }

    #[test]
    fn test_parse_clock_out_of_range_fields() {
        assert!(matches!(
            parse_clock("[%clk 0:75:00]"),
            Err(ClockError::Malformed(_))
        ));
        assert!(matches!(
            parse_clock("[%clk 0:01:60]"),
            Err(ClockError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_clock_rejects_non_ascii_digits() {
        assert!(matches!(
            parse_clock("[%clk 0:00:05.\u{0663}]"),
            Err(ClockError::Malformed(_))
        ));
        assert!(matches!(
            parse_clock("[%clk 0:\u{0660}1:00]"),
            Err(ClockError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_clock_overflowing_hours() {
        assert!(matches!(
            parse_clock("[%clk 999999999999:00:00]"),
            Err(ClockError::Malformed(_))
        ));
    }

    #[test]
    fn test_format_clock_round_trips() {
        for tenths in [0, 1, 9, 10, 99, 599, 600, 1799, 1800, 35_999, 36_000, 123_456] {
            let text = format!("[%clk {}]", format_clock(tenths));
            assert_eq!(parse_clock(&text), Ok(tenths), "round trip of {tenths}");
        }
    }

    #[test]
    fn test_format_clock_layout() {
        assert_eq!(format_clock(1799), "0:02:59.9");
        assert_eq!(format_clock(36_005), "1:00:00.5");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(152), "15.2 sec");
        assert_eq!(format_duration(632), "1min 3.2sec");
        assert_eq!(format_duration(600), "1min 0.0sec");
    }
}
