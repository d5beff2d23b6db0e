pub mod manual;
pub mod realtime;

use std::time::Duration;

pub use self::manual::ManualTimer;
pub use self::realtime::TokioTimer;

/// Interval between two predicate checks of a waiting callback.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(10);

/// Opaque token for a periodic timer, used to cancel it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(pub(crate) u64);

/// Periodic timer capability injected into waiters.
///
/// Implementations run every tick on the thread that scheduled it. A timer
/// cancelled from inside its own tick must never fire again.
pub trait Timer {
    /// Call `tick` every `interval`, first after one full interval.
    fn schedule(&self, interval: Duration, tick: Box<dyn FnMut()>) -> TimerHandle;

    /// Stop a timer. Unknown or already cancelled handles are ignored.
    fn cancel(&self, handle: TimerHandle);
}

// Zero periods would spin forever on a virtual clock and panic in tokio.
pub(crate) fn clamp_interval(interval: Duration) -> Duration {
    interval.max(Duration::from_millis(1))
}
