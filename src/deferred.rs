//! The observable half of a timeout.
//!
//! A [`Deferred`] is the write side: it publishes progress notifications any
//! number of times and settles exactly once. Only the timeout core holds one.
//! A [`Promise`] is the read side handed to callers: it can register
//! callbacks, open a progress channel, or await the final [`Outcome`].

use std::collections::VecDeque;
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::{broadcast, watch};

use crate::error::Rejection;

/// Values a timeout can carry to its subscribers.
pub trait Payload: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> Payload for T {}

/// How many progress notifications a lagging channel subscriber may fall behind.
const PROGRESS_CAPACITY: usize = 64;

/// A repeating timeout fired.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Progress<A> {
    /// How many times the timeout has fired since the last `times()` call
    pub count: u32,
    /// The payload given at scheduling time
    pub args: A,
}

/// How a timeout ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome<A> {
    Resolved(A),
    Rejected(Rejection),
}

impl<A> Outcome<A> {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Outcome::Resolved(_))
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Outcome::Resolved(_) => None,
            Outcome::Rejected(reason) => Some(reason),
        }
    }
}

/// Where a promise is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    Pending,
    Resolved,
    Rejected,
}

type ProgressFn<A> = Box<dyn FnMut(&Progress<A>) + Send>;
type SettleFn<A> = Box<dyn FnOnce(&Outcome<A>) + Send>;

/// An event waiting for the delivery round in progress to finish.
enum Queued<A> {
    Progress(Progress<A>),
    Settle(Outcome<A>),
}

struct Listeners<A> {
    progress: Vec<ProgressFn<A>>,
    settle: Vec<SettleFn<A>>,
    queue: VecDeque<Queued<A>>,
    delivering: bool,
}

struct Shared<A> {
    listeners: Mutex<Listeners<A>>,
    progress_tx: broadcast::Sender<Progress<A>>,
    outcome_tx: watch::Sender<Option<Outcome<A>>>,
}

impl<A: Payload> Shared<A> {
    fn listeners(&self) -> MutexGuard<'_, Listeners<A>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn outcome(&self) -> Option<Outcome<A>> {
        self.outcome_tx.borrow().clone()
    }

    fn is_settled(&self) -> bool {
        self.outcome_tx.borrow().is_some()
    }
}

/// Write side of the observable.
pub(crate) struct Deferred<A> {
    shared: Arc<Shared<A>>,
}

impl<A: Payload> Deferred<A> {
    pub(crate) fn new() -> Self {
        let (progress_tx, _) = broadcast::channel(PROGRESS_CAPACITY);
        let (outcome_tx, _) = watch::channel(None);

        Self {
            shared: Arc::new(Shared {
                listeners: Mutex::new(Listeners {
                    progress: Vec::new(),
                    settle: Vec::new(),
                    queue: VecDeque::new(),
                    delivering: false,
                }),
                progress_tx,
                outcome_tx,
            }),
        }
    }

    pub(crate) fn promise(&self) -> Promise<A> {
        Promise {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Publish a progress notification. Returns false once settled.
    ///
    /// Listeners run on the calling thread without any lock held, so they may
    /// call back into the timeout. Events published from inside a listener are
    /// queued and delivered, in order, once the current round has finished.
    pub(crate) fn notify(&self, progress: Progress<A>) -> bool {
        if self.shared.is_settled() {
            return false;
        }

        self.dispatch(Queued::Progress(progress));
        true
    }

    /// Settle with `outcome` unless already settled. Returns whether this call settled it.
    ///
    /// The outcome is visible to [`Promise::state`] right away. Settle
    /// callbacks run after any progress notifications already queued.
    pub(crate) fn settle(&self, outcome: Outcome<A>) -> bool {
        let settled = self.shared.outcome_tx.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(outcome.clone());
            true
        });

        if settled {
            self.dispatch(Queued::Settle(outcome));
        }

        settled
    }

    /// Queue `event`, then deliver the queue unless an outer call already is.
    fn dispatch(&self, event: Queued<A>) {
        {
            let mut listeners = self.shared.listeners();
            listeners.queue.push_back(event);
            if listeners.delivering {
                return;
            }
            listeners.delivering = true;
        }

        loop {
            let next = {
                let mut listeners = self.shared.listeners();
                let next = listeners.queue.pop_front();
                if next.is_none() {
                    listeners.delivering = false;
                }
                next
            };

            match next {
                Some(Queued::Progress(progress)) => self.deliver_progress(progress),
                Some(Queued::Settle(outcome)) => self.deliver_settle(outcome),
                None => return,
            }
        }
    }

    fn deliver_progress(&self, progress: Progress<A>) {
        // No receivers is fine.
        let _ = self.shared.progress_tx.send(progress.clone());

        let mut running = mem::take(&mut self.shared.listeners().progress);
        for listener in running.iter_mut() {
            listener(&progress);
        }

        let mut listeners = self.shared.listeners();
        running.append(&mut listeners.progress);
        listeners.progress = running;
    }

    fn deliver_settle(&self, outcome: Outcome<A>) {
        let (progress, callbacks) = {
            let mut listeners = self.shared.listeners();
            (
                mem::take(&mut listeners.progress),
                mem::take(&mut listeners.settle),
            )
        };
        drop(progress);

        for callback in callbacks {
            callback(&outcome);
        }
    }
}

/// Read side of the observable.
///
/// Cloning a promise is cheap. Holding one does not keep the timer alive.
pub struct Promise<A> {
    shared: Arc<Shared<A>>,
}

impl<A> Clone for Promise<A> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<A: Payload> Promise<A> {
    /// Call `listener` every time the timeout fires without settling.
    pub fn on_progress(&self, listener: impl FnMut(&Progress<A>) + Send + 'static) -> &Self {
        let mut listeners = self.shared.listeners();
        if !self.shared.is_settled() {
            listeners.progress.push(Box::new(listener));
        }
        self
    }

    /// Call `callback` once the timeout settles, or right away if it already has.
    pub fn on_settle(&self, callback: impl FnOnce(&Outcome<A>) + Send + 'static) -> &Self {
        let mut listeners = self.shared.listeners();
        match self.shared.outcome() {
            Some(outcome) => {
                drop(listeners);
                callback(&outcome);
            }
            None => listeners.settle.push(Box::new(callback)),
        }
        self
    }

    /// Call `callback` with the payload if the timeout resolves.
    pub fn on_resolve(&self, callback: impl FnOnce(&A) + Send + 'static) -> &Self {
        self.on_settle(move |outcome| {
            if let Outcome::Resolved(args) = outcome {
                callback(args);
            }
        })
    }

    /// Call `callback` with the reason if the timeout is rejected.
    pub fn on_reject(&self, callback: impl FnOnce(&Rejection) + Send + 'static) -> &Self {
        self.on_settle(move |outcome| {
            if let Outcome::Rejected(reason) = outcome {
                callback(reason);
            }
        })
    }

    /// Open a channel receiving every progress notification from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Progress<A>> {
        self.shared.progress_tx.subscribe()
    }

    /// Wait until the timeout settles.
    pub async fn outcome(&self) -> Outcome<A> {
        let mut rx = self.shared.outcome_tx.subscribe();
        let outcome = match rx.wait_for(Option::is_some).await {
            Ok(outcome) => Option::clone(&outcome),
            Err(_) => None,
        };
        outcome.unwrap_or(Outcome::Rejected(Rejection::Dropped))
    }

    pub fn state(&self) -> State {
        match &*self.shared.outcome_tx.borrow() {
            None => State::Pending,
            Some(Outcome::Resolved(_)) => State::Resolved,
            Some(Outcome::Rejected(_)) => State::Rejected,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.shared.is_settled()
    }
}
