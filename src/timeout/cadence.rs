use std::time::Duration;

use serde::Serialize;

use crate::platform::TimerKind;

/// How a timeout repeats, fixed when it is scheduled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Fire once and resolve.
    Once,
    /// Fire on a periodic runtime timer, notifying each time.
    Interval,
    /// Fire on a single-shot timer that rearms itself after each
    /// notification, compensating for the time the notification took.
    Recur,
}

/// The callback policy currently in force.
///
/// Mirrors [`Mode`] except for `AdjustingInterval`: an interval whose next
/// expiry was moved off its period runs one single-shot detour, then returns
/// to `Interval`.
///
/// | from                | event                         | to                  |
/// |---------------------|-------------------------------|---------------------|
/// | `Interval`          | rearm at a delay != period    | `AdjustingInterval` |
/// | `AdjustingInterval` | rearm at exactly the period   | `Interval`          |
/// | `AdjustingInterval` | fire                          | `Interval`          |
/// | anything else       | any                           | unchanged           |
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Cadence {
    Once,
    Interval,
    Recur,
    AdjustingInterval,
}

impl From<Mode> for Cadence {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Once => Cadence::Once,
            Mode::Interval => Cadence::Interval,
            Mode::Recur => Cadence::Recur,
        }
    }
}

impl Cadence {
    /// The cadence to use when rearming for `delay` on a timeout whose period is `period`.
    pub(crate) fn for_delay(self, delay: Duration, period: Duration) -> Self {
        match self {
            Cadence::Interval | Cadence::AdjustingInterval if delay != period => {
                Cadence::AdjustingInterval
            }
            Cadence::Interval | Cadence::AdjustingInterval => Cadence::Interval,
            other => other,
        }
    }

    /// The cadence in force once a fire has been handled.
    pub(crate) fn after_fire(self) -> Self {
        match self {
            Cadence::AdjustingInterval => Cadence::Interval,
            other => other,
        }
    }

    /// Whether firing notifies progress instead of resolving.
    pub(crate) fn repeats(self) -> bool {
        !matches!(self, Cadence::Once)
    }

    pub(crate) fn timer_kind(self) -> TimerKind {
        match self {
            Cadence::Interval => TimerKind::Periodic,
            Cadence::Once | Cadence::Recur | Cadence::AdjustingInterval => TimerKind::Delay,
        }
    }
}
