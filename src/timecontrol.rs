//! `TimeControl` tag parsing.
//!
//! Only single-stage controls with a real clock (`"180"`, `"180+2"`) can feed
//! think-time reconstruction. Daily (`"1/259200"`), unlimited (`"-"`) and
//! unknown (`"?"`) controls are rejected.

use std::error::Error;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeControl {
    pub base_seconds: u32,
    pub increment_seconds: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeControlError {
    pub raw: String,
    pub message: String,
}

impl fmt::Display for TimeControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: '{}'", self.message, self.raw)
    }
}

impl Error for TimeControlError {}

fn parse_u32(s: &str) -> Option<u32> {
    s.trim().parse().ok()
}

impl TimeControl {
    pub fn new(base_seconds: u32, increment_seconds: u32) -> Self {
        Self {
            base_seconds,
            increment_seconds,
        }
    }

    /// Starting clock for each side, in tenths.
    pub fn base_tenths(&self) -> u32 {
        self.base_seconds.saturating_mul(10)
    }

    pub fn increment_tenths(&self) -> u32 {
        self.increment_seconds.saturating_mul(10)
    }

    /// Time class by estimated game duration (`base + 40 * increment`).
    pub fn category(&self) -> &'static str {
        let estimated_seconds = self.base_seconds as u64 + 40 * self.increment_seconds as u64;

        match estimated_seconds {
            0..=29 => "ultra-bullet",
            30..=179 => "bullet",
            180..=479 => "blitz",
            480..=1499 => "rapid",
            _ => "classical",
        }
    }
}

impl FromStr for TimeControl {
    type Err = TimeControlError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let err = |message: &str| TimeControlError {
            raw: raw.to_string(),
            message: message.to_string(),
        };

        let input = raw.trim();
        match input {
            "" => return Err(err("empty time control")),
            "?" => return Err(err("unknown time control")),
            "-" => return Err(err("unlimited time control")),
            _ => {}
        }
        if input.contains(':') {
            return Err(err("multi-stage time control"));
        }
        if input.contains('/') {
            return Err(err("per-move (daily) time control"));
        }
        if input.starts_with('*') {
            return Err(err("sandclock time control"));
        }

        let (base, increment) = match input.split_once('+') {
            Some((base, inc)) => (base, Some(inc)),
            None => (input, None),
        };

        let base_seconds = parse_u32(base).ok_or_else(|| err("invalid base time"))?;
        let increment_seconds = match increment {
            Some(inc) => parse_u32(inc).ok_or_else(|| err("invalid increment"))?,
            None => 0,
        };

        Ok(Self {
            base_seconds,
            increment_seconds,
        })
    }
}

impl fmt::Display for TimeControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.increment_seconds == 0 {
            write!(f, "{}", self.base_seconds)
        } else {
            write!(f, "{}+{}", self.base_seconds, self.increment_seconds)
        }
    }
}

/// Category for a raw tag, `None` when the control has no usable clock.
pub fn categorize_timecontrol(raw: &str) -> Option<&'static str> {
    raw.parse::<TimeControl>().ok().map(|tc| tc.category())
}
