//! The runtime timer backing a timeout.
//!
//! Arming spawns a tokio task that either sleeps once or ticks on a fixed
//! period, calling back on every expiry. Dropping the [`PlatformTimer`]
//! aborts the task, so a disarmed timer can never fire again.

use std::ops::ControlFlow;
use std::time::Duration;

use log::trace;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// tokio refuses zero-length periods.
const MIN_PERIOD: Duration = Duration::from_millis(1);

const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TimerKind {
    /// Fire once after the delay.
    Delay,
    /// Fire every period, first after one period.
    Periodic,
}

/// An armed runtime timer, owned by exactly one timeout.
#[derive(Debug)]
pub(crate) struct PlatformTimer {
    kind: TimerKind,
    generation: u64,
    task: JoinHandle<()>,
}

impl PlatformTimer {
    /// Start a timer. `on_fire` decides after each periodic tick whether to keep going.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub(crate) fn arm<F>(kind: TimerKind, delay: Duration, generation: u64, on_fire: F) -> Self
    where
        F: Fn() -> ControlFlow<()> + Send + 'static,
    {
        trace!("Arming {kind:?} timer #{generation} for {}ms", delay.as_millis());

        // Deadlines count from arming, not from the task's first poll.
        let armed_at = Instant::now();

        let task = tokio::spawn(async move {
            match kind {
                TimerKind::Delay => {
                    time::sleep_until(deadline(armed_at, delay)).await;
                    let _ = on_fire();
                }
                TimerKind::Periodic => {
                    let period = delay.clamp(MIN_PERIOD, FAR_FUTURE);
                    let mut ticks = time::interval_at(deadline(armed_at, period), period);
                    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

                    loop {
                        ticks.tick().await;
                        if on_fire().is_break() {
                            break;
                        }
                    }
                }
            }
        });

        Self {
            kind,
            generation,
            task,
        }
    }

    pub(crate) fn kind(&self) -> TimerKind {
        self.kind
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }
}

/// `from + delay`, capped roughly thirty years out instead of overflowing.
fn deadline(from: Instant, delay: Duration) -> Instant {
    from.checked_add(delay.min(FAR_FUTURE))
        .unwrap_or(from)
}

impl Drop for PlatformTimer {
    fn drop(&mut self) {
        trace!("Disarming {:?} timer #{}", self.kind, self.generation);
        self.task.abort();
    }
}
