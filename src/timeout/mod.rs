//! The timer control core and the [`Timeout`] handle.
//!
//! A timeout owns one platform timer slot. Every control operation goes
//! through the core under its lock, so "time remaining" always comes from the
//! same two fields: when the current timer was armed and what it was armed
//! for (or the paused remainder). Notifications are published with the lock
//! released, so subscribers may call back into the handle.

mod cadence;

use std::fmt;
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use log::{debug, trace};
use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::deferred::{Deferred, Outcome, Payload, Progress, Promise, State};
use crate::error::Rejection;
use crate::platform::PlatformTimer;
use crate::time::{DurationExt, TimeExpr, TimeParser};

pub use cadence::Mode;
use cadence::Cadence;

/// What made the core fire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Source {
    /// The platform timer armed with this generation expired.
    Timer(u64),
    /// `trigger()` was called.
    Manual,
}

#[derive(Clone, Copy, Debug)]
enum Shift {
    Later,
    Sooner,
}

struct Core<A> {
    mode: Mode,
    cadence: Cadence,
    parser: TimeParser,
    args: A,
    /// The period; adjustments only move the current expiry.
    duration: Duration,
    armed_at: Option<Instant>,
    armed_for: Duration,
    paused: Option<Duration>,
    count: u32,
    limit: Option<u32>,
    timer: Option<PlatformTimer>,
    /// Bumped on every arm and disarm.
    generation: u64,
    settled: bool,
}

impl<A: Payload> Core<A> {
    fn new(mode: Mode, parser: TimeParser, args: A) -> Self {
        Self {
            mode,
            cadence: mode.into(),
            parser,
            args,
            duration: Duration::ZERO,
            armed_at: None,
            armed_for: Duration::ZERO,
            paused: None,
            count: 0,
            limit: None,
            timer: None,
            generation: 0,
            settled: false,
        }
    }

    /// Signed so an overdue timer reads negative.
    fn remaining_millis(&self) -> i64 {
        if let Some(paused) = self.paused {
            return paused.as_millis_i64();
        }

        match self.armed_at {
            Some(armed_at) => self
                .armed_for
                .as_millis_i64()
                .saturating_sub(armed_at.elapsed().as_millis_i64()),
            None => 0,
        }
    }

    fn remaining(&self) -> Duration {
        Duration::from_millis(u64::try_from(self.remaining_millis()).unwrap_or(0))
    }

    fn owns(&self, generation: u64) -> bool {
        self.timer
            .as_ref()
            .is_some_and(|timer| timer.generation() == generation)
    }

    fn disarm(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.timer = None;
        self.armed_at = None;
    }

    /// The armed task holds a strong reference, so a timeout that can still
    /// fire stays alive until it settles or is disarmed.
    fn arm(&mut self, me: &Weak<Inner<A>>, delay: Duration) {
        self.disarm();

        let Some(inner) = me.upgrade() else {
            trace!("Not arming a timeout that is being dropped");
            return;
        };

        let generation = self.generation;
        self.timer = Some(PlatformTimer::arm(
            self.cadence.timer_kind(),
            delay,
            generation,
            move || inner.fire(Source::Timer(generation)),
        ));
        self.armed_at = Some(Instant::now());
        self.armed_for = delay;
    }

    fn limit_reached(&self) -> bool {
        self.limit.is_some_and(|limit| self.count >= limit)
    }

    /// Rearm for `delay`, or only remember it while paused.
    fn schedule(&mut self, me: &Weak<Inner<A>>, delay: Duration) {
        self.cadence = self.cadence.for_delay(delay, self.duration);

        match self.paused.as_mut() {
            Some(paused) => *paused = delay,
            None => self.arm(me, delay),
        }
    }

    fn settle(&mut self, outcome: Outcome<A>) -> Option<Outcome<A>> {
        self.disarm();
        self.paused = None;
        self.settled = true;

        match &outcome {
            Outcome::Resolved(_) => debug!("{:?} timeout resolved after {} fires", self.mode, self.count),
            Outcome::Rejected(reason) => debug!("{:?} timeout rejected: {reason}", self.mode),
        }

        Some(outcome)
    }

    fn resolve(&mut self) -> Option<Outcome<A>> {
        let args = self.args.clone();
        self.settle(Outcome::Resolved(args))
    }
}

struct Inner<A: Payload> {
    core: Mutex<Core<A>>,
    deferred: Deferred<A>,
    me: Weak<Inner<A>>,
}

impl<A: Payload> Inner<A> {
    fn lock(&self) -> MutexGuard<'_, Core<A>> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, outcome: Option<Outcome<A>>) {
        if let Some(outcome) = outcome {
            self.deferred.settle(outcome);
        }
    }

    /// Run `op` on a live core, then publish the outcome it settled on, if any.
    ///
    /// Returns false without running `op` once the timeout has settled.
    fn control<F>(&self, operation: &str, op: F) -> bool
    where
        F: FnOnce(&mut Core<A>, &Weak<Self>) -> Option<Outcome<A>>,
    {
        let outcome = {
            let mut core = self.lock();
            if core.settled {
                debug!("Ignoring {operation} on a settled timeout");
                return false;
            }
            trace!("{operation} ({:?}, {}ms left)", core.cadence, core.remaining_millis());
            op(&mut *core, &self.me)
        };

        self.publish(outcome);
        true
    }

    /// Handle one expiry. The return value tells a periodic timer whether to keep ticking.
    fn fire(&self, source: Source) -> ControlFlow<()> {
        let (cadence, progress, generation, fired_at) = {
            let mut core = self.lock();
            if core.settled {
                return ControlFlow::Break(());
            }
            if let Source::Timer(generation) = source {
                if !core.owns(generation) {
                    trace!("Ignoring stale timer #{generation}");
                    return ControlFlow::Break(());
                }
            }

            // Another fire already reached the limit and is still notifying.
            if core.limit_reached() {
                trace!("Ignoring {source:?} fire past the limit");
                return ControlFlow::Break(());
            }

            let cadence = core.cadence;
            if !cadence.repeats() {
                let outcome = core.resolve();
                drop(core);
                self.publish(outcome);
                return ControlFlow::Break(());
            }

            let fired_at = Instant::now();
            core.count = core.count.saturating_add(1);
            if core.paused.is_none() {
                core.armed_at = Some(fired_at);
                core.armed_for = core.duration;
            }
            core.cadence = cadence.after_fire();
            debug!("{cadence:?} timeout fired ({source:?}), count {}", core.count);

            let progress = Progress {
                count: core.count,
                args: core.args.clone(),
            };
            (cadence, progress, core.generation, fired_at)
        };

        self.deferred.notify(progress);
        let processing = fired_at.elapsed();

        let mut core = self.lock();
        if core.settled {
            return ControlFlow::Break(());
        }

        if core.limit_reached() {
            let outcome = core.resolve();
            drop(core);
            self.publish(outcome);
            return ControlFlow::Break(());
        }

        // A subscriber rearmed, paused, or stopped us while being notified.
        if source == Source::Manual || core.generation != generation {
            return ControlFlow::Break(());
        }

        match cadence {
            Cadence::Interval => ControlFlow::Continue(()),
            Cadence::Recur => {
                let delay = core.duration.saturating_sub(processing);
                core.arm(&self.me, delay);
                ControlFlow::Break(())
            }
            Cadence::AdjustingInterval => {
                let period = core.duration;
                core.schedule(&self.me, period);
                ControlFlow::Break(())
            }
            Cadence::Once => ControlFlow::Break(()),
        }
    }
}

impl<A: Payload> Drop for Inner<A> {
    fn drop(&mut self) {
        let outcome = {
            let core = self.core.get_mut().unwrap_or_else(PoisonError::into_inner);
            if core.settled {
                return;
            }
            core.settle(Outcome::Rejected(Rejection::Dropped))
        };

        self.publish(outcome);
    }
}

/// A scheduled timer that can be paused, resumed, adjusted, fired early, or cancelled.
///
/// Cloning is cheap and every clone controls the same timer. An armed timeout
/// keeps running until it settles even when every handle is gone, so
/// `after(..).on_resolve(..)` can be fire-and-forget. A timeout that cannot
/// fire on its own (paused or stopped) is rejected with
/// [`Rejection::Dropped`] once its last handle is dropped.
///
/// All control operations return `&Self` so they can be chained, and all of
/// them are no-ops once the timeout has resolved or been rejected.
pub struct Timeout<A: Payload> {
    inner: Arc<Inner<A>>,
}

impl<A: Payload> Clone for Timeout<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: Payload> fmt::Debug for Timeout<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.inner.lock();
        f.debug_struct("Timeout")
            .field("mode", &core.mode)
            .field("duration", &core.duration)
            .field("timer", &core.timer.as_ref().map(PlatformTimer::kind))
            .field("remaining_ms", &core.remaining_millis())
            .field("paused", &core.paused.is_some())
            .field("count", &core.count)
            .field("limit", &core.limit)
            .field("settled", &core.settled)
            .finish()
    }
}

impl<A: Payload> Timeout<A> {
    /// Parse `time` and arm the first timer, or reject right away if it does not parse.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub(crate) fn schedule(mode: Mode, parser: TimeParser, time: TimeExpr, args: A) -> Self {
        let inner = Arc::new_cyclic(|me| Inner {
            core: Mutex::new(Core::new(mode, parser, args)),
            deferred: Deferred::new(),
            me: me.clone(),
        });

        inner.control("schedule", |core, me| match core.parser.parse(&time) {
            Ok(duration) => {
                core.duration = duration;
                core.arm(me, duration);
                None
            }
            Err(reason) => core.settle(Outcome::Rejected(Rejection::InvalidTime {
                input: time.to_string(),
                reason,
            })),
        });

        Self { inner }
    }

    /// Disarm and reject with [`Rejection::Cleared`].
    pub fn clear(&self) -> &Self {
        self.inner.control("clear", |core, _| {
            core.settle(Outcome::Rejected(Rejection::Cleared))
        });
        self
    }

    /// Disarm and resolve with the payload.
    pub fn complete(&self) -> &Self {
        self.inner.control("complete", |core, _| core.resolve());
        self
    }

    /// Resolve after `n` more fires, counting from zero again.
    ///
    /// `times(0)` removes the limit.
    pub fn times(&self, n: u32) -> &Self {
        self.inner.control("times", |core, _| {
            core.count = 0;
            core.limit = (n > 0).then_some(n);
            None
        });
        self
    }

    /// Fire now, as if the timer had expired, then start a full period over.
    ///
    /// The notification happens synchronously, before this returns.
    pub fn trigger(&self) -> &Self {
        if !self.inner.control("trigger", |core, _| {
            core.disarm();
            None
        }) {
            return self;
        }

        self.inner.fire(Source::Manual);

        self.inner.control("rearm after trigger", |core, me| {
            let period = core.duration;
            core.schedule(me, period);
            None
        });
        self
    }

    /// Start the full duration over.
    pub fn reset(&self) -> &Self {
        self.inner.control("reset", |core, me| {
            core.disarm();
            let period = core.duration;
            core.schedule(me, period);
            None
        });
        self
    }

    /// Push the next expiry back by `time`.
    ///
    /// Rejects the timeout if `time` does not parse.
    pub fn postpone(&self, time: impl Into<TimeExpr>) -> &Self {
        self.shift("postpone", time.into(), Shift::Later)
    }

    /// Bring the next expiry forward by `time`, no earlier than now.
    ///
    /// Rejects the timeout if `time` does not parse.
    pub fn advance(&self, time: impl Into<TimeExpr>) -> &Self {
        self.shift("advance", time.into(), Shift::Sooner)
    }

    fn shift(&self, operation: &str, time: TimeExpr, shift: Shift) -> &Self {
        self.inner.control(operation, |core, me| {
            let delta = match core.parser.parse(&time) {
                Ok(delta) => delta.as_millis_i64(),
                Err(reason) => {
                    return core.settle(Outcome::Rejected(Rejection::InvalidAdjustment {
                        input: time.to_string(),
                        reason,
                    }))
                }
            };

            let remaining = core.remaining_millis();
            let total = match shift {
                Shift::Later => remaining.saturating_add(delta),
                Shift::Sooner => remaining.saturating_sub(delta),
            };

            core.disarm();
            core.schedule(me, Duration::from_millis(u64::try_from(total).unwrap_or(0)));
            None
        });
        self
    }

    /// Disarm and hold on to the time remaining. No-op while paused.
    pub fn pause(&self) -> &Self {
        self.inner.control("pause", |core, _| {
            if core.paused.is_none() {
                let remaining = core.remaining();
                core.disarm();
                core.paused = Some(remaining);
            }
            None
        });
        self
    }

    /// Rearm with the time remaining at pause. No-op unless paused.
    pub fn play(&self) -> &Self {
        self.inner.control("play", |core, me| {
            if let Some(remaining) = core.paused.take() {
                core.schedule(me, remaining);
            }
            None
        });
        self
    }

    /// Disarm and pause with the full duration remaining.
    pub fn stop(&self) -> &Self {
        self.inner.control("stop", |core, _| {
            core.disarm();
            core.cadence = core.cadence.for_delay(core.duration, core.duration);
            core.paused = Some(core.duration);
            None
        });
        self
    }

    /// Milliseconds until the next expiry.
    ///
    /// Negative when the timer is overdue but has not fired yet, and zero once
    /// the timeout has settled.
    pub fn time_remaining(&self) -> i64 {
        self.inner.lock().remaining_millis()
    }

    pub fn is_paused(&self) -> bool {
        self.inner.lock().paused.is_some()
    }

    pub fn is_settled(&self) -> bool {
        self.inner.lock().settled
    }

    /// Fires since scheduling or the last `times()` call.
    pub fn count(&self) -> u32 {
        self.inner.lock().count
    }

    /// The auto-stop count, if one is set.
    pub fn limit(&self) -> Option<u32> {
        self.inner.lock().limit
    }

    pub fn mode(&self) -> Mode {
        self.inner.lock().mode
    }

    /// The parsed period. Zero if the time expression did not parse.
    pub fn duration(&self) -> Duration {
        self.inner.lock().duration
    }

    /// The read-only observable side of this timeout.
    pub fn promise(&self) -> Promise<A> {
        self.inner.deferred.promise()
    }

    /// See [`Promise::on_progress`].
    pub fn on_progress(&self, listener: impl FnMut(&Progress<A>) + Send + 'static) -> &Self {
        self.promise().on_progress(listener);
        self
    }

    /// See [`Promise::on_resolve`].
    pub fn on_resolve(&self, callback: impl FnOnce(&A) + Send + 'static) -> &Self {
        self.promise().on_resolve(callback);
        self
    }

    /// See [`Promise::on_reject`].
    pub fn on_reject(&self, callback: impl FnOnce(&Rejection) + Send + 'static) -> &Self {
        self.promise().on_reject(callback);
        self
    }

    /// See [`Promise::on_settle`].
    pub fn on_settle(&self, callback: impl FnOnce(&Outcome<A>) + Send + 'static) -> &Self {
        self.promise().on_settle(callback);
        self
    }

    /// See [`Promise::subscribe`].
    pub fn subscribe(&self) -> broadcast::Receiver<Progress<A>> {
        self.promise().subscribe()
    }

    /// Wait until the timeout settles.
    pub async fn outcome(&self) -> Outcome<A> {
        self.promise().outcome().await
    }

    pub fn state(&self) -> State {
        self.promise().state()
    }

    /// A handle that does not keep the timeout alive, for use inside its own subscribers.
    pub fn downgrade(&self) -> WeakTimeout<A> {
        WeakTimeout {
            inner: Arc::downgrade(&self.inner),
        }
    }

    #[cfg(test)]
    fn armed_at(&self) -> Option<Instant> {
        self.inner.lock().armed_at
    }

    #[cfg(test)]
    fn armed_kind(&self) -> Option<crate::platform::TimerKind> {
        self.inner.lock().timer.as_ref().map(PlatformTimer::kind)
    }
}

/// A [`Timeout`] reference that does not keep it alive.
pub struct WeakTimeout<A: Payload> {
    inner: Weak<Inner<A>>,
}

impl<A: Payload> Clone for WeakTimeout<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<A: Payload> WeakTimeout<A> {
    pub fn upgrade(&self) -> Option<Timeout<A>> {
        self.inner.upgrade().map(|inner| Timeout { inner })
    }
}

#[cfg(test)]
mod test {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use tokio::time::Instant;

    use crate::deferred::{Outcome, Payload, State};
    use crate::error::{ParseError, Rejection};
    use crate::platform::TimerKind;
    use crate::{after, every, recur};

    use super::{Mode, Timeout};

    #[derive(Clone, Debug, PartialEq)]
    enum Seen<A> {
        Progress(u32, A),
        Resolved(A),
        Rejected(Rejection),
    }

    type Log<A> = Arc<Mutex<Vec<Seen<A>>>>;

    fn record<A: Payload>(timeout: &Timeout<A>) -> Log<A> {
        let log = Arc::new(Mutex::new(Vec::new()));

        let progress = Arc::clone(&log);
        let settled = Arc::clone(&log);
        timeout
            .on_progress(move |p| {
                progress
                    .lock()
                    .unwrap()
                    .push(Seen::Progress(p.count, p.args.clone()))
            })
            .on_settle(move |outcome| {
                settled.lock().unwrap().push(match outcome {
                    Outcome::Resolved(args) => Seen::Resolved(args.clone()),
                    Outcome::Rejected(reason) => Seen::Rejected(reason.clone()),
                })
            });

        log
    }

    fn seen<A: Clone>(log: &Log<A>) -> Vec<Seen<A>> {
        log.lock().unwrap().clone()
    }

    async fn sleep_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn once_resolves_after_its_delay_without_progress() {
        let timeout = after(100, "done");
        let log = record(&timeout);

        assert_eq!(timeout.mode(), Mode::Once);
        assert_eq!(timeout.time_remaining(), 100);

        sleep_ms(99).await;
        assert!(seen(&log).is_empty());

        sleep_ms(2).await;
        assert_eq!(seen(&log), vec![Seen::Resolved("done")]);
        assert_eq!(timeout.state(), State::Resolved);
        assert_eq!(timeout.count(), 0);

        sleep_ms(1_000).await;
        assert_eq!(seen(&log).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn interval_notifies_in_order_then_resolves() {
        let timeout = every("1s", ());
        timeout.times(3);
        let log = record(&timeout);

        sleep_ms(3_001).await;

        assert_eq!(
            seen(&log),
            vec![
                Seen::Progress(1, ()),
                Seen::Progress(2, ()),
                Seen::Progress(3, ()),
                Seen::Resolved(()),
            ]
        );
        assert!(timeout.is_settled());
        assert_eq!(timeout.armed_kind(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn interval_with_compound_expression() {
        let timeout = every("1 second and 500ms", vec!["tick"]);
        assert_eq!(timeout.time_remaining(), 1_500);

        timeout.times(2);
        let log = record(&timeout);

        sleep_ms(3_001).await;

        assert_eq!(
            seen(&log),
            vec![
                Seen::Progress(1, vec!["tick"]),
                Seen::Progress(2, vec!["tick"]),
                Seen::Resolved(vec!["tick"]),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn recur_rearms_from_each_fire() {
        let timeout = recur("1s", 5u8);
        timeout.times(3);
        let log = record(&timeout);

        sleep_ms(1_001).await;
        assert_eq!(seen(&log), vec![Seen::Progress(1, 5)]);
        assert_eq!(timeout.armed_kind(), Some(TimerKind::Delay));
        assert_eq!(timeout.time_remaining(), 999);

        sleep_ms(2_000).await;
        assert_eq!(
            seen(&log),
            vec![
                Seen::Progress(1, 5),
                Seen::Progress(2, 5),
                Seen::Progress(3, 5),
                Seen::Resolved(5),
            ]
        );
    }

    #[tokio::test]
    async fn recur_subtracts_slow_subscribers_from_the_next_delay() {
        let timeout = recur("200ms", ());
        timeout.times(2);
        let fired = Arc::new(Mutex::new(Vec::new()));

        let seen = Arc::clone(&fired);
        timeout.on_progress(move |progress| {
            seen.lock().unwrap().push(Instant::now());
            if progress.count == 1 {
                std::thread::sleep(Duration::from_millis(50));
            }
        });
        let mut channel = timeout.subscribe();

        assert_eq!(channel.recv().await.unwrap().count, 1);
        let remaining = timeout.time_remaining();
        assert!((100..=150).contains(&remaining), "{remaining}ms left after a slow fire");

        assert_eq!(timeout.outcome().await, Outcome::Resolved(()));

        let fired = fired.lock().unwrap();
        let period = fired[1] - fired[0];
        assert!(
            period >= Duration::from_millis(195) && period < Duration::from_millis(240),
            "fires were {period:?} apart"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn pause_then_play_keeps_the_remainder() {
        let timeout = after("1s", ());
        let log = record(&timeout);

        sleep_ms(400).await;
        timeout.pause();
        assert!(timeout.is_paused());
        assert_eq!(timeout.time_remaining(), 600);

        sleep_ms(5_000).await;
        assert!(seen(&log).is_empty());
        assert_eq!(timeout.time_remaining(), 600);

        timeout.play();
        assert!(!timeout.is_paused());
        assert_eq!(timeout.time_remaining(), 600);

        sleep_ms(599).await;
        assert!(seen(&log).is_empty());

        sleep_ms(2).await;
        assert_eq!(seen(&log), vec![Seen::Resolved(())]);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_and_play_are_idempotent() {
        let timeout = after("1s", ());

        timeout.play();
        assert!(!timeout.is_paused());
        assert_eq!(timeout.time_remaining(), 1_000);

        timeout.pause();
        sleep_ms(100).await;
        timeout.pause();
        assert_eq!(timeout.time_remaining(), 1_000);
    }

    #[tokio::test(start_paused = true)]
    async fn postpone_adds_to_the_remainder() {
        let timeout = after("2s", ());
        let log = record(&timeout);

        timeout.postpone("1s");
        assert_eq!(timeout.time_remaining(), 3_000);
        assert_eq!(timeout.duration(), Duration::from_secs(2));

        sleep_ms(2_999).await;
        assert!(seen(&log).is_empty());

        sleep_ms(2).await;
        assert_eq!(seen(&log), vec![Seen::Resolved(())]);
    }

    #[tokio::test(start_paused = true)]
    async fn advance_never_goes_below_zero() {
        let timeout = after("2s", ());
        let log = record(&timeout);

        timeout.advance("500ms");
        assert_eq!(timeout.time_remaining(), 1_500);

        timeout.advance("5s");
        assert_eq!(timeout.time_remaining(), 0);

        sleep_ms(1).await;
        assert_eq!(seen(&log), vec![Seen::Resolved(())]);
    }

    #[tokio::test(start_paused = true)]
    async fn adjusting_while_paused_only_moves_the_remainder() {
        let timeout = after("1s", ());

        timeout.pause().postpone("250ms");
        assert!(timeout.is_paused());
        assert_eq!(timeout.time_remaining(), 1_250);
        assert_eq!(timeout.armed_kind(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn postponing_an_interval_detours_once() {
        let timeout = every("1s", ());
        let log = record(&timeout);

        sleep_ms(200).await;
        timeout.postpone("500ms");
        assert_eq!(timeout.time_remaining(), 1_300);
        assert_eq!(timeout.armed_kind(), Some(TimerKind::Delay));

        sleep_ms(1_299).await;
        assert!(seen(&log).is_empty());

        sleep_ms(2).await;
        assert_eq!(seen(&log), vec![Seen::Progress(1, ())]);
        assert_eq!(timeout.armed_kind(), Some(TimerKind::Periodic));
        assert_eq!(timeout.time_remaining(), 999);

        sleep_ms(2_000).await;
        assert_eq!(
            seen(&log),
            vec![Seen::Progress(1, ()), Seen::Progress(2, ()), Seen::Progress(3, ())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn playing_an_interval_fires_after_the_remainder_then_on_period() {
        let timeout = every("1s", ());
        let log = record(&timeout);

        sleep_ms(700).await;
        timeout.pause();
        sleep_ms(10_000).await;
        timeout.play();
        assert_eq!(timeout.armed_kind(), Some(TimerKind::Delay));

        sleep_ms(301).await;
        assert_eq!(seen(&log), vec![Seen::Progress(1, ())]);

        sleep_ms(1_000).await;
        assert_eq!(seen(&log), vec![Seen::Progress(1, ()), Seen::Progress(2, ())]);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_rejects_once() {
        let timeout = every("1s", ());
        let log = record(&timeout);

        timeout.clear().clear();

        assert_eq!(seen(&log), vec![Seen::Rejected(Rejection::Cleared)]);
        assert_eq!(timeout.state(), State::Rejected);

        sleep_ms(5_000).await;
        assert_eq!(seen(&log).len(), 1);
        assert!(!timeout.is_paused());
        assert_eq!(timeout.time_remaining(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn complete_resolves_with_the_payload() {
        let timeout = every("1s", "payload");

        timeout.complete();

        assert_eq!(timeout.outcome().await, Outcome::Resolved("payload"));
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_notifies_synchronously_and_rearms() {
        let timeout = every("1s", ());
        let log = record(&timeout);

        sleep_ms(300).await;
        timeout.trigger();

        assert_eq!(seen(&log), vec![Seen::Progress(1, ())]);
        assert_eq!(timeout.time_remaining(), 1_000);
        assert_eq!(timeout.armed_kind(), Some(TimerKind::Periodic));

        sleep_ms(999).await;
        assert_eq!(seen(&log).len(), 1);

        sleep_ms(2).await;
        assert_eq!(seen(&log), vec![Seen::Progress(1, ()), Seen::Progress(2, ())]);
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_that_reaches_the_limit_resolves() {
        let timeout = every("1s", ());
        timeout.times(1);
        let log = record(&timeout);

        timeout.trigger();

        assert_eq!(seen(&log), vec![Seen::Progress(1, ()), Seen::Resolved(())]);
        assert_eq!(timeout.armed_kind(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_resolves_a_one_shot() {
        let timeout = after("1h", 1);
        let log = record(&timeout);

        timeout.trigger();

        assert_eq!(seen(&log), vec![Seen::Resolved(1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_while_paused_stays_paused() {
        let timeout = recur("1s", ());
        let log = record(&timeout);

        sleep_ms(600).await;
        timeout.pause().trigger();

        assert_eq!(seen(&log), vec![Seen::Progress(1, ())]);
        assert!(timeout.is_paused());
        assert_eq!(timeout.time_remaining(), 1_000);
        assert_eq!(timeout.armed_kind(), None);
        assert_eq!(timeout.armed_at(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_from_a_subscriber_reaches_every_subscriber() {
        let timeout = every("1s", ());
        let mut channel = timeout.subscribe();
        let weak = timeout.downgrade();
        timeout.on_progress(move |progress| {
            if progress.count == 1 {
                if let Some(timeout) = weak.upgrade() {
                    timeout.trigger();
                }
            }
        });
        let log = record(&timeout);

        sleep_ms(1_001).await;

        assert_eq!(seen(&log), vec![Seen::Progress(1, ()), Seen::Progress(2, ())]);
        assert_eq!(channel.try_recv().unwrap().count, 1);
        assert_eq!(channel.try_recv().unwrap().count, 2);
        assert!(channel.try_recv().is_err());
        assert_eq!(timeout.time_remaining(), 999);
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_on_the_last_fire_does_not_overshoot_the_limit() {
        let timeout = every("1s", ());
        timeout.times(2);
        let weak = timeout.downgrade();
        timeout.on_progress(move |progress| {
            if progress.count == 2 {
                if let Some(timeout) = weak.upgrade() {
                    timeout.trigger();
                }
            }
        });
        let log = record(&timeout);

        sleep_ms(5_000).await;

        assert_eq!(
            seen(&log),
            vec![Seen::Progress(1, ()), Seen::Progress(2, ()), Seen::Resolved(())]
        );
        assert_eq!(timeout.count(), 2);
        assert_eq!(timeout.armed_kind(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_starts_the_full_duration_over() {
        let timeout = after("1s", ());
        let log = record(&timeout);

        sleep_ms(700).await;
        timeout.postpone("3s").reset();
        assert_eq!(timeout.time_remaining(), 1_000);

        sleep_ms(999).await;
        assert!(seen(&log).is_empty());

        sleep_ms(2).await;
        assert_eq!(seen(&log), vec![Seen::Resolved(())]);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_pauses_at_the_full_duration() {
        let timeout = every("1s", ());
        let log = record(&timeout);

        sleep_ms(300).await;
        timeout.postpone("200ms").stop();
        assert!(timeout.is_paused());
        assert_eq!(timeout.time_remaining(), 1_000);

        sleep_ms(5_000).await;
        assert!(seen(&log).is_empty());

        timeout.play();
        assert_eq!(timeout.armed_kind(), Some(TimerKind::Periodic));

        sleep_ms(1_001).await;
        assert_eq!(seen(&log), vec![Seen::Progress(1, ())]);
    }

    #[tokio::test(start_paused = true)]
    async fn times_restarts_the_count() {
        let timeout = every("100ms", ());
        let log = record(&timeout);

        sleep_ms(250).await;
        assert_eq!(timeout.count(), 2);

        timeout.times(2);
        assert_eq!(timeout.count(), 0);
        assert_eq!(timeout.limit(), Some(2));

        sleep_ms(200).await;
        assert_eq!(
            seen(&log),
            vec![
                Seen::Progress(1, ()),
                Seen::Progress(2, ()),
                Seen::Progress(1, ()),
                Seen::Progress(2, ()),
                Seen::Resolved(()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn times_zero_removes_the_limit() {
        let timeout = every("100ms", ());
        timeout.times(1).times(0);

        sleep_ms(350).await;

        assert_eq!(timeout.limit(), None);
        assert_eq!(timeout.count(), 3);
        assert!(!timeout.is_settled());
    }

    #[tokio::test(start_paused = true)]
    async fn unparseable_time_rejects_without_arming() {
        let timeout = after("abc", ());

        assert!(timeout.is_settled());
        assert!(!timeout.is_paused());
        assert_eq!(timeout.armed_kind(), None);
        assert_eq!(timeout.time_remaining(), 0);
        assert_eq!(
            timeout.outcome().await,
            Outcome::Rejected(Rejection::InvalidTime {
                input: "abc".to_string(),
                reason: ParseError::InvalidToken("abc".to_string()),
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unparseable_adjustment_rejects() {
        let timeout = every("1s", ());
        let log = record(&timeout);

        timeout.postpone("soon");

        assert_eq!(
            seen(&log),
            vec![Seen::Rejected(Rejection::InvalidAdjustment {
                input: "soon".to_string(),
                reason: ParseError::InvalidToken("soon".to_string()),
            })]
        );
        assert_eq!(timeout.armed_kind(), None);

        sleep_ms(5_000).await;
        assert_eq!(seen(&log).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn controls_after_settling_do_nothing() {
        let timeout = every("1s", ());
        let log = record(&timeout);
        timeout.complete();

        timeout
            .pause()
            .play()
            .postpone("1s")
            .advance("1s")
            .reset()
            .stop()
            .trigger()
            .times(3)
            .clear();

        sleep_ms(5_000).await;
        assert_eq!(seen(&log), vec![Seen::Resolved(())]);
        assert!(!timeout.is_paused());
        assert_eq!(timeout.limit(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn subscriber_may_pause_during_notification() {
        let timeout = every("1s", ());
        let weak = timeout.downgrade();
        timeout.on_progress(move |progress| {
            if progress.count == 1 {
                if let Some(timeout) = weak.upgrade() {
                    timeout.pause();
                }
            }
        });
        let log = record(&timeout);

        sleep_ms(1_001).await;
        assert!(timeout.is_paused());
        assert_eq!(timeout.time_remaining(), 1_000);

        sleep_ms(5_000).await;
        assert_eq!(seen(&log), vec![Seen::Progress(1, ())]);
        assert_eq!(timeout.armed_kind(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn subscriber_may_clear_a_recurring_timeout() {
        let timeout = recur("1s", ());
        let log = record(&timeout);
        let weak = timeout.downgrade();
        timeout.on_progress(move |_| {
            if let Some(timeout) = weak.upgrade() {
                timeout.clear();
            }
        });

        sleep_ms(5_000).await;

        assert_eq!(
            seen(&log),
            vec![Seen::Progress(1, ()), Seen::Rejected(Rejection::Cleared)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn armed_timeouts_outlive_their_handles() {
        let promise = after(50, "x").promise();
        let resolved = Arc::new(Mutex::new(None));

        let seen = Arc::clone(&resolved);
        promise.on_resolve(move |args| *seen.lock().unwrap() = Some(*args));
        assert_eq!(promise.state(), State::Pending);

        sleep_ms(100).await;

        assert_eq!(promise.state(), State::Resolved);
        assert_eq!(*resolved.lock().unwrap(), Some("x"));
    }

    #[tokio::test(start_paused = true)]
    async fn unowned_intervals_run_to_their_limit() {
        let promise = {
            let timeout = every("1s", ());
            timeout.times(2);
            timeout.promise()
        };
        let mut progress = promise.subscribe();

        sleep_ms(2_001).await;

        assert_eq!(progress.try_recv().unwrap().count, 1);
        assert_eq!(progress.try_recv().unwrap().count, 2);
        assert_eq!(promise.outcome().await, Outcome::Resolved(()));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_last_handle_of_a_paused_timeout_rejects() {
        let timeout = every("1s", ());
        let promise = timeout.promise();
        let mut progress = promise.subscribe();

        timeout.pause();
        drop(timeout);

        assert_eq!(promise.outcome().await, Outcome::Rejected(Rejection::Dropped));
        assert_eq!(promise.state(), State::Rejected);

        sleep_ms(5_000).await;
        assert!(progress.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn channel_subscribers_see_progress() {
        let timeout = every("250ms", "tick");
        timeout.times(2);
        let mut progress = timeout.subscribe();

        assert_eq!(progress.recv().await.unwrap().count, 1);
        assert_eq!(progress.recv().await.unwrap().count, 2);
        assert_eq!(timeout.outcome().await, Outcome::Resolved("tick"));
    }
}
