use crate::deferred::Payload;
use crate::time::{TimeExpr, TimeParser};
use crate::timeout::{Mode, Timeout};

/// Creates timeouts that all parse their time expressions the same way.
///
/// The free functions [`after`](crate::after), [`every`](crate::every) and
/// [`recur`](crate::recur) use a default (strict) scheduler.
#[derive(Clone, Copy, Debug, Default)]
pub struct Scheduler {
    parser: TimeParser,
}

impl Scheduler {
    pub fn new(parser: TimeParser) -> Self {
        Self { parser }
    }

    pub fn parser(&self) -> TimeParser {
        self.parser
    }

    /// Schedule a timeout in any mode.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn schedule<A: Payload>(&self, mode: Mode, time: impl Into<TimeExpr>, args: A) -> Timeout<A> {
        Timeout::schedule(mode, self.parser, time.into(), args)
    }

    /// Resolve with `args` once `time` has passed.
    pub fn after<A: Payload>(&self, time: impl Into<TimeExpr>, args: A) -> Timeout<A> {
        self.schedule(Mode::Once, time, args)
    }

    /// Notify every `time` on a periodic timer.
    pub fn every<A: Payload>(&self, time: impl Into<TimeExpr>, args: A) -> Timeout<A> {
        self.schedule(Mode::Interval, time, args)
    }

    /// Notify every `time`, rearming a single-shot timer after each notification.
    pub fn recur<A: Payload>(&self, time: impl Into<TimeExpr>, args: A) -> Timeout<A> {
        self.schedule(Mode::Recur, time, args)
    }
}
