//! Human-readable time expressions.
//!
//! An expression is either a number of milliseconds or a list of
//! `<digits><unit>` tokens joined by `,` or the word `and`, for example
//! `"5 minutes and 30 s"` or `"1h, 15m"`.

use std::sync::LazyLock;
use std::time::Duration;

use log::warn;
use regex::Regex;

use crate::error::ParseError;
use crate::time::TimeExpr;

static NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(-?)([0-9]+)(?:\.[0-9]*)?$").expect("valid number regex (verified by tests)")
});

static SEPARATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s+and\s+|\s*,\s*").expect("valid separator regex (verified by tests)")
});

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]+)\s*(.*)$").expect("valid token regex (verified by tests)")
});

/// Every recognised unit word and its multiplier in milliseconds.
///
/// Matching is case-sensitive.
pub const UNITS: &[(&str, u64)] = &[
    ("millisecond", 1),
    ("milliseconds", 1),
    ("ms", 1),
    ("centisecond", 10),
    ("centiseconds", 10),
    ("cs", 10),
    ("decisecond", 100),
    ("deciseconds", 100),
    ("ds", 100),
    ("second", 1_000),
    ("seconds", 1_000),
    ("sec", 1_000),
    ("secs", 1_000),
    ("s", 1_000),
    ("decasecond", 10_000),
    ("decaseconds", 10_000),
    ("das", 10_000),
    ("hectasecond", 100_000),
    ("hectaseconds", 100_000),
    ("hs", 100_000),
    ("kilosecond", 1_000_000),
    ("kiloseconds", 1_000_000),
    ("ks", 1_000_000),
    ("minute", 60_000),
    ("minutes", 60_000),
    ("min", 60_000),
    ("mins", 60_000),
    ("m", 60_000),
    ("hour", 3_600_000),
    ("hours", 3_600_000),
    ("h", 3_600_000),
    ("day", 86_400_000),
    ("days", 86_400_000),
    ("d", 86_400_000),
];

/// Look up the millisecond multiplier for a unit word.
pub fn unit_multiplier(unit: &str) -> Option<u64> {
    UNITS
        .iter()
        .find(|(name, _)| *name == unit)
        .map(|(_, multiplier)| *multiplier)
}

/// Converts [`TimeExpr`]s into durations.
///
/// The default parser is strict: an unrecognised unit suffix is an error.
/// A lenient parser instead counts the token as raw milliseconds, so
/// `"5 fortnights"` means five milliseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TimeParser {
    lenient_units: bool,
}

impl TimeParser {
    /// A parser that rejects unknown units
    pub fn strict() -> Self {
        Self { lenient_units: false }
    }

    /// A parser that treats unknown units as milliseconds
    pub fn lenient() -> Self {
        Self { lenient_units: true }
    }

    pub fn is_lenient(&self) -> bool {
        self.lenient_units
    }

    /// Parse any time expression into a duration.
    pub fn parse(&self, expr: &TimeExpr) -> Result<Duration, ParseError> {
        match expr {
            TimeExpr::Absent => Err(ParseError::Absent),
            TimeExpr::Millis(ms) => u64::try_from(*ms)
                .map(Duration::from_millis)
                .map_err(|_| ParseError::Negative(ms.to_string())),
            TimeExpr::Fractional(ms) => {
                if !ms.is_finite() {
                    Err(ParseError::NotFinite(ms.to_string()))
                } else if *ms < 0.0 {
                    Err(ParseError::Negative(ms.to_string()))
                } else if *ms >= u64::MAX as f64 {
                    Err(ParseError::Overflow(ms.to_string()))
                } else {
                    Ok(Duration::from_millis(ms.trunc() as u64))
                }
            }
            TimeExpr::Text(text) => self.parse_str(text),
        }
    }

    /// Parse a textual time expression into a duration.
    pub fn parse_str(&self, text: &str) -> Result<Duration, ParseError> {
        let text = text.trim();

        if text.is_empty() {
            return Err(ParseError::Empty);
        }

        if let Some(cap) = NUMBER.captures(text) {
            if !cap[1].is_empty() {
                return Err(ParseError::Negative(text.to_string()));
            }
            let ms: u64 = cap[2]
                .parse()
                .map_err(|_| ParseError::Overflow(text.to_string()))?;
            return Ok(Duration::from_millis(ms));
        }

        let mut total: u64 = 0;

        for token in SEPARATOR.split(text) {
            let add = self.parse_token(token)?;
            total = total
                .checked_add(add)
                .ok_or_else(|| ParseError::Overflow(text.to_string()))?;
        }

        Ok(Duration::from_millis(total))
    }

    fn parse_token(&self, token: &str) -> Result<u64, ParseError> {
        let cap = TOKEN
            .captures(token)
            .ok_or_else(|| ParseError::InvalidToken(token.to_string()))?;

        let num: u64 = cap[1]
            .parse()
            .map_err(|_| ParseError::Overflow(token.to_string()))?;
        let unit = &cap[2];

        if unit.is_empty() {
            return Ok(num);
        }

        let multiplier = match unit_multiplier(unit) {
            Some(multiplier) => multiplier,
            None if self.lenient_units => {
                warn!("Unknown time unit '{unit}' in '{token}', counting it as milliseconds");
                1
            }
            None => {
                return Err(ParseError::UnknownUnit {
                    token: token.to_string(),
                    unit: unit.to_string(),
                })
            }
        };

        num.checked_mul(multiplier)
            .ok_or_else(|| ParseError::Overflow(token.to_string()))
    }
}

/// Parse a time expression with the default, strict parser.
pub fn parse(expr: impl Into<TimeExpr>) -> Result<Duration, ParseError> {
    TimeParser::default().parse(&expr.into())
}
