pub mod elements;
pub mod facade;

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use crate::document::QueryError;
use crate::timer::{Timer, TimerHandle, DEFAULT_CHECK_INTERVAL};

pub use facade::Waiters;

/// A callback that runs once its condition holds.
///
/// The waiter is consumed by whichever `execute_when*` method starts it, so a
/// callback fires at most once and never outlives its timer.
pub struct ConditionWaiter {
    callback: Box<dyn FnOnce()>,
    timer: Rc<dyn Timer>,
    interval: Duration,
}

impl ConditionWaiter {
    pub fn new(timer: Rc<dyn Timer>, callback: impl FnOnce() + 'static) -> Self {
        Self {
            callback: Box::new(callback),
            timer,
            interval: DEFAULT_CHECK_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run the callback as soon as `predicate` returns true.
    ///
    /// A predicate that is already true fires the callback before this returns
    /// and no timer is created. Otherwise the predicate is polled every
    /// interval, forever if it never becomes true.
    pub fn execute_when(self, mut predicate: impl FnMut() -> bool + 'static) {
        self.try_execute_when(move || Ok(predicate()))
    }

    /// Like [`execute_when`](Self::execute_when) with a fallible predicate.
    ///
    /// The first error stops polling and drops the callback unfired.
    pub fn try_execute_when<P>(self, mut predicate: P)
    where
        P: FnMut() -> Result<bool, QueryError> + 'static,
    {
        match predicate() {
            Ok(true) => {
                (self.callback)();
                return;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!("Condition check failed, waiter dropped: {}", e);
                return;
            }
        }

        let Self {
            callback,
            timer,
            interval,
        } = self;
        tracing::debug!("Condition not met, polling every {}ms", interval.as_millis());

        // The handle is only known once `schedule` returns; ticks start later.
        let slot: Rc<Cell<Option<TimerHandle>>> = Rc::default();
        let tick_slot = slot.clone();
        let tick_timer = timer.clone();
        let mut callback = Some(callback);

        let handle = timer.schedule(
            interval,
            Box::new(move || {
                if callback.is_none() {
                    return;
                }
                let stop = |slot: &Cell<Option<TimerHandle>>| {
                    if let Some(handle) = slot.take() {
                        tick_timer.cancel(handle);
                    }
                };
                match predicate() {
                    Ok(false) => {}
                    Ok(true) => {
                        stop(&tick_slot);
                        tracing::debug!("Condition met, running callback");
                        if let Some(callback) = callback.take() {
                            callback();
                        }
                    }
                    Err(e) => {
                        stop(&tick_slot);
                        callback = None;
                        tracing::warn!("Condition check failed, waiter dropped: {}", e);
                    }
                }
            }),
        );
        slot.set(Some(handle));
    }
}
