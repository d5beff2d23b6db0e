use std::cell::RefCell;
use std::collections::BTreeMap;
use std::time::Duration;

use super::{clamp_interval, Timer, TimerHandle};

struct Entry {
    interval: Duration,
    next_due: Duration,
    // Taken out while the tick runs so the tick may schedule or cancel.
    tick: Option<Box<dyn FnMut()>>,
}

#[derive(Default)]
struct ClockState {
    now: Duration,
    next_id: u64,
    scheduled: usize,
    entries: BTreeMap<u64, Entry>,
}

/// Virtual clock that only moves when told to.
///
/// Ticks fire in deadline order, ties broken by registration order. Timers
/// registered by a tick during [`ManualTimer::advance`] fire in the same
/// advance if they fall due before its end.
#[derive(Default)]
pub struct ManualTimer {
    state: RefCell<ClockState>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time elapsed since creation.
    pub fn now(&self) -> Duration {
        self.state.borrow().now
    }

    /// Number of timers still running.
    pub fn active_count(&self) -> usize {
        self.state.borrow().entries.len()
    }

    /// Number of timers ever scheduled on this clock.
    pub fn scheduled_count(&self) -> usize {
        self.state.borrow().scheduled
    }

    /// Earliest pending deadline, if any timer is running.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.state
            .borrow()
            .entries
            .values()
            .map(|entry| entry.next_due)
            .min()
    }

    /// Drop every running timer without firing it.
    pub fn clear(&self) {
        let entries = std::mem::take(&mut self.state.borrow_mut().entries);
        drop(entries);
    }

    /// Move the clock forward by `by`, firing every tick that falls due.
    pub fn advance(&self, by: Duration) {
        let target = self.now() + by;

        while let Some((id, mut tick)) = self.take_due(target) {
            tick();

            let mut state = self.state.borrow_mut();
            if let Some(entry) = state.entries.get_mut(&id) {
                entry.tick = Some(tick);
            }
        }

        self.state.borrow_mut().now = target;
    }

    fn take_due(&self, target: Duration) -> Option<(u64, Box<dyn FnMut()>)> {
        let mut state = self.state.borrow_mut();
        let (id, due) = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.tick.is_some() && entry.next_due <= target)
            .map(|(id, entry)| (*id, entry.next_due))
            .min_by_key(|(id, due)| (*due, *id))?;

        state.now = due;
        let entry = state.entries.get_mut(&id)?;
        entry.next_due = due + entry.interval;
        let tick = entry.tick.take()?;
        Some((id, tick))
    }
}

impl Timer for ManualTimer {
    fn schedule(&self, interval: Duration, tick: Box<dyn FnMut()>) -> TimerHandle {
        let mut state = self.state.borrow_mut();
        let interval = clamp_interval(interval);
        let id = state.next_id;
        state.next_id += 1;
        state.scheduled += 1;
        let next_due = state.now + interval;
        state.entries.insert(
            id,
            Entry {
                interval,
                next_due,
                tick: Some(tick),
            },
        );
        TimerHandle(id)
    }

    fn cancel(&self, handle: TimerHandle) {
        let removed = self.state.borrow_mut().entries.remove(&handle.0);
        drop(removed);
    }
}
