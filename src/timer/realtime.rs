use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::{clamp_interval, Timer, TimerHandle};

struct Running {
    task: JoinHandle<()>,
    cancelled: Rc<Cell<bool>>,
}

/// Wall-clock timer backed by tokio interval tasks.
///
/// Ticks are `!Send`, so every timer is a `spawn_local` task: scheduling must
/// happen inside a [`tokio::task::LocalSet`].
#[derive(Default)]
pub struct TokioTimer {
    next_id: Cell<u64>,
    running: RefCell<HashMap<u64, Running>>,
}

impl TokioTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of timers still running.
    pub fn active_count(&self) -> usize {
        self.running.borrow().len()
    }
}

impl Timer for TokioTimer {
    fn schedule(&self, interval: Duration, mut tick: Box<dyn FnMut()>) -> TimerHandle {
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let period = clamp_interval(interval);
        let cancelled = Rc::new(Cell::new(false));
        let task_cancelled = cancelled.clone();
        let task = tokio::task::spawn_local(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                // Abort only lands at the next yield; an overdue tick may not yield.
                if task_cancelled.get() {
                    return;
                }
                tick();
            }
        });

        self.running
            .borrow_mut()
            .insert(id, Running { task, cancelled });
        TimerHandle(id)
    }

    fn cancel(&self, handle: TimerHandle) {
        let removed = self.running.borrow_mut().remove(&handle.0);
        if let Some(running) = removed {
            running.cancelled.set(true);
            running.task.abort();
        }
    }
}

impl Drop for TokioTimer {
    fn drop(&mut self) {
        for (_, running) in self.running.get_mut().drain() {
            running.cancelled.set(true);
            running.task.abort();
        }
    }
}
