//! Single-assignment result cell with callback chaining
//!
//! An [`AsyncResult`] is a cloneable handle to one shared cell that starts
//! pending and is settled exactly once with either a value or an [`Error`].
//! Consumers either block on it ([`AsyncResult::wait`]) or register
//! continuations ([`AsyncResult::on_settled`], [`AsyncResult::then`]).
//!
//! Callbacks registered before settlement run on the settling thread, after
//! the cell lock has been released. Callbacks registered afterwards run
//! immediately on the registering thread.

use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::core::{Error, Result};

/// Boxed continuation receiving the settled outcome
pub type Callback<T> = Box<dyn FnOnce(Result<T>) + Send + 'static>;

enum State<T> {
    Pending(Vec<Callback<T>>),
    Settled(Result<T>),
}

struct Shared<T> {
    state: Mutex<State<T>>,
    settled: Condvar,
}

/// Handle to a value-or-error that is settled at most once
pub struct AsyncResult<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for AsyncResult<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone + Send + 'static> AsyncResult<T> {
    /// Create an unsettled result
    pub fn pending() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::Pending(Vec::new())),
                settled: Condvar::new(),
            }),
        }
    }

    /// Create a result already settled with `value`
    pub fn resolved(value: T) -> Self {
        Self::settled_with(Ok(value))
    }

    /// Create a result already settled with `error`
    pub fn failed(error: Error) -> Self {
        Self::settled_with(Err(error))
    }

    fn settled_with(outcome: Result<T>) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::Settled(outcome)),
                settled: Condvar::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.shared.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the outcome
    ///
    /// The pending callback list is swapped out under the lock, so a callback
    /// registered concurrently either lands in that list or observes the
    /// settled state; it can never be lost or fired twice.
    ///
    /// A second settlement is rejected with [`Error::AlreadySettled`] and the
    /// first outcome is kept.
    pub fn set_value(&self, outcome: Result<T>) -> Result<()> {
        let callbacks = {
            let mut state = self.lock();
            match std::mem::replace(&mut *state, State::Settled(outcome.clone())) {
                State::Pending(callbacks) => callbacks,
                State::Settled(previous) => {
                    *state = State::Settled(previous);
                    log::warn!("Ignoring second settlement of an AsyncResult");
                    return Err(Error::AlreadySettled);
                }
            }
        };
        self.shared.settled.notify_all();

        for callback in callbacks {
            fire(callback, outcome.clone());
        }
        Ok(())
    }

    /// Settle with a value
    pub fn resolve(&self, value: T) -> Result<()> {
        self.set_value(Ok(value))
    }

    /// Settle with an error
    pub fn reject(&self, error: Error) -> Result<()> {
        self.set_value(Err(error))
    }

    /// Register a callback that fires exactly once with the outcome
    pub fn on_settled<F>(&self, callback: F)
    where
        F: FnOnce(Result<T>) + Send + 'static,
    {
        let outcome = {
            let mut state = self.lock();
            match &mut *state {
                State::Pending(callbacks) => {
                    callbacks.push(Box::new(callback));
                    return;
                }
                State::Settled(outcome) => outcome.clone(),
            }
        };
        fire(Box::new(callback), outcome);
    }

    /// Derive a result by mapping the value once this one settles
    ///
    /// Errors pass through unchanged. If `map` fails, the derived result
    /// settles with that error, except [`Error::Ignored`], which leaves the
    /// derived result pending for good.
    pub fn then<U, F>(&self, map: F) -> AsyncResult<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Result<U> + Send + 'static,
    {
        let derived = AsyncResult::pending();
        let target = derived.clone();
        self.on_settled(move |outcome| {
            let mapped = match outcome {
                Ok(value) => panic::catch_unwind(AssertUnwindSafe(move || map(value)))
                    .unwrap_or_else(|payload| Err(Error::from_panic(payload))),
                Err(error) => Err(error),
            };
            match mapped {
                Err(Error::Ignored) => log::trace!("Derived AsyncResult ignored"),
                other => {
                    let _ = target.set_value(other);
                }
            }
        });
        derived
    }

    /// Observe the error, if any, without changing the outcome
    pub fn catch<F>(&self, handler: F) -> &Self
    where
        F: FnOnce(&Error) + Send + 'static,
    {
        self.on_settled(move |outcome| {
            if let Err(error) = &outcome {
                handler(error);
            }
        });
        self
    }

    /// Block the calling thread until settled
    ///
    /// Must not be called from the thread responsible for settling this
    /// result.
    pub fn wait(&self) -> Result<T> {
        let mut state = self.lock();
        loop {
            if let State::Settled(outcome) = &*state {
                return outcome.clone();
            }
            state = self
                .shared
                .settled
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Block for at most `timeout`, returning [`Error::Timeout`] on expiry
    pub fn wait_timeout(&self, timeout: Duration) -> Result<T> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        loop {
            if let State::Settled(outcome) = &*state {
                return outcome.clone();
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::Timeout);
            }
            let (guard, _) = self
                .shared
                .settled
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
        }
    }

    /// Outcome if already settled
    pub fn try_get(&self) -> Option<Result<T>> {
        match &*self.lock() {
            State::Settled(outcome) => Some(outcome.clone()),
            State::Pending(_) => None,
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(&*self.lock(), State::Settled(_))
    }

    /// Await the outcome from async code
    pub fn into_future(self) -> impl Future<Output = Result<T>> + Send + 'static {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.on_settled(move |outcome| {
            let _ = tx.send(outcome);
        });
        async move { rx.await.unwrap_or(Err(Error::Abandoned)) }
    }

    /// Producer-side guard that settles with [`Error::Abandoned`] if dropped
    pub fn settler(&self) -> Settler<T> {
        Settler {
            target: Some(self.clone()),
        }
    }

    /// Whether both handles refer to the same cell
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl<T: Clone + Send + 'static> Default for AsyncResult<T> {
    fn default() -> Self {
        Self::pending()
    }
}

impl<T> fmt::Debug for AsyncResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.shared.state.try_lock() {
            Ok(guard) => match &*guard {
                State::Pending(callbacks) => format!("Pending({} callbacks)", callbacks.len()),
                State::Settled(Ok(_)) => "Resolved".to_string(),
                State::Settled(Err(e)) => format!("Failed({e})"),
            },
            Err(_) => "Locked".to_string(),
        };
        f.debug_struct("AsyncResult").field("state", &state).finish()
    }
}

fn fire<T>(callback: Callback<T>, outcome: Result<T>) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(move || callback(outcome))) {
        log::error!("AsyncResult callback panicked: {}", Error::from_panic(payload));
    }
}

/// Owned completion handle for whoever produces an [`AsyncResult`]
///
/// Dropping it without calling [`Settler::complete`] settles the result with
/// [`Error::Abandoned`], so waiters are never stranded by a lost job.
pub struct Settler<T: Clone + Send + 'static> {
    target: Option<AsyncResult<T>>,
}

impl<T: Clone + Send + 'static> Settler<T> {
    pub fn complete(mut self, outcome: Result<T>) -> Result<()> {
        match self.target.take() {
            Some(target) => target.set_value(outcome),
            None => Err(Error::AlreadySettled),
        }
    }
}

impl<T: Clone + Send + 'static> Drop for Settler<T> {
    fn drop(&mut self) {
        if let Some(target) = self.target.take() {
            if !target.is_settled() {
                log::warn!("AsyncResult producer dropped without settling");
                let _ = target.reject(Error::Abandoned);
            }
        }
    }
}
