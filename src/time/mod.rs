#[doc(hidden)]
pub mod duration;
pub mod parse;

use std::fmt;
use std::time::Duration;

pub use parse::{parse, TimeParser, UNITS};

/// Anything a timer can be scheduled or adjusted with
///
/// Text goes through the time-expression grammar, numbers are taken as
/// milliseconds directly.
#[derive(Clone, Debug, PartialEq)]
pub enum TimeExpr {
    /// No value was supplied.
    Absent,
    /// Whole milliseconds.
    Millis(i64),
    /// Milliseconds with a fractional part, truncated when parsed.
    Fractional(f64),
    /// A human-readable expression such as `"1 minute and 30s"`.
    Text(String),
}

impl fmt::Display for TimeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeExpr::Absent => write!(f, "nothing"),
            TimeExpr::Millis(ms) => write!(f, "{ms}"),
            TimeExpr::Fractional(ms) => write!(f, "{ms}"),
            TimeExpr::Text(text) => write!(f, "{text}"),
        }
    }
}

impl From<&str> for TimeExpr {
    fn from(text: &str) -> Self {
        TimeExpr::Text(text.to_string())
    }
}

impl From<String> for TimeExpr {
    fn from(text: String) -> Self {
        TimeExpr::Text(text)
    }
}

impl From<&String> for TimeExpr {
    fn from(text: &String) -> Self {
        TimeExpr::Text(text.clone())
    }
}

impl From<i64> for TimeExpr {
    fn from(ms: i64) -> Self {
        TimeExpr::Millis(ms)
    }
}

impl From<i32> for TimeExpr {
    fn from(ms: i32) -> Self {
        TimeExpr::Millis(ms.into())
    }
}

impl From<u32> for TimeExpr {
    fn from(ms: u32) -> Self {
        TimeExpr::Millis(ms.into())
    }
}

impl From<u64> for TimeExpr {
    fn from(ms: u64) -> Self {
        i64::try_from(ms)
            .map(TimeExpr::Millis)
            .unwrap_or(TimeExpr::Fractional(ms as f64))
    }
}

impl From<f64> for TimeExpr {
    fn from(ms: f64) -> Self {
        TimeExpr::Fractional(ms)
    }
}

impl From<Duration> for TimeExpr {
    fn from(duration: Duration) -> Self {
        i64::try_from(duration.as_millis())
            .map(TimeExpr::Millis)
            .unwrap_or(TimeExpr::Fractional(duration.as_millis() as f64))
    }
}

impl<T: Into<TimeExpr>> From<Option<T>> for TimeExpr {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(TimeExpr::Absent)
    }
}

/// Extensions to `Duration`
pub trait DurationExt {
    /// Formats the duration as a "kitchen timer" string, e.g. mm:ss.
    ///
    /// If the duration is longer than an hour, it is formatted as hh:mm:ss.
    fn to_kitchen(&self) -> String;

    /// Formats the duration in a humanized way, for example 22m30s.
    fn to_human(&self) -> String;

    /// Whole milliseconds as a signed count, saturating at `i64::MAX`.
    fn as_millis_i64(&self) -> i64;
}

impl DurationExt for Duration {
    fn to_kitchen(&self) -> String {
        let total = self.as_secs();
        let hours = total / 3600;
        let minutes = (total / 60) % 60;
        let seconds = total % 60;

        if hours > 0 {
            format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
        } else {
            format!("{:02}:{:02}", minutes, seconds)
        }
    }

    fn to_human(&self) -> String {
        use std::fmt::Write;

        if self.is_zero() {
            return "0s".to_string();
        }

        let total = self.as_secs();
        let days = total / 86_400;
        let hours = (total / 3600) % 24;
        let minutes = (total / 60) % 60;
        let seconds = total % 60;
        let millis = self.subsec_millis();

        let mut acc = String::new();

        for (value, unit) in [
            (days, "d"),
            (hours, "h"),
            (minutes, "m"),
            (seconds, "s"),
            (u64::from(millis), "ms"),
        ] {
            if value > 0 {
                // Writing into a String cannot fail.
                let _ = write!(acc, "{}{}", value, unit);
            }
        }

        acc
    }

    fn as_millis_i64(&self) -> i64 {
        i64::try_from(self.as_millis()).unwrap_or(i64::MAX)
    }
}
