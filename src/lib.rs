//! Controllable, observable timers driven by human-readable time expressions.
//!
//! ```no_run
//! # async fn demo() {
//! let timeout = postpone::every("1 second and 500ms", "tick");
//!
//! timeout
//!     .times(3)
//!     .on_progress(|progress| println!("fired {} times", progress.count))
//!     .on_resolve(|args| println!("done: {args}"));
//!
//! timeout.postpone("250ms");
//!
//! let outcome = timeout.outcome().await;
//! assert!(outcome.is_resolved());
//! # }
//! ```
//!
//! Each timeout is backed by a tokio task, so these functions must be called
//! from inside a tokio runtime.

pub mod config;
pub mod control;
pub mod deferred;
pub mod error;
pub mod hooks;
mod platform;
pub mod scheduler;
pub mod time;
pub mod timeout;

pub use control::Control;
pub use deferred::{Outcome, Payload, Progress, Promise, State};
pub use error::{CommandError, ParseError, Rejection};
pub use scheduler::Scheduler;
pub use time::{TimeExpr, TimeParser};
pub use timeout::{Mode, Timeout, WeakTimeout};

/// Resolve with `args` once `time` has passed.
///
/// # Panics
///
/// Panics when called outside a tokio runtime.
pub fn after<A: Payload>(time: impl Into<TimeExpr>, args: A) -> Timeout<A> {
    Scheduler::default().after(time, args)
}

/// Notify subscribers with `args` every `time`, on a periodic timer.
///
/// # Panics
///
/// Panics when called outside a tokio runtime.
pub fn every<A: Payload>(time: impl Into<TimeExpr>, args: A) -> Timeout<A> {
    Scheduler::default().every(time, args)
}

/// Notify subscribers with `args` every `time`, rearming after each
/// notification so slow subscribers do not make ticks bunch up.
///
/// # Panics
///
/// Panics when called outside a tokio runtime.
pub fn recur<A: Payload>(time: impl Into<TimeExpr>, args: A) -> Timeout<A> {
    Scheduler::default().recur(time, args)
}
