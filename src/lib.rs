pub mod browser;
pub mod config;
pub mod document;
pub mod script;
pub mod timer;
pub mod waiter;

pub use config::WaitConfig;
pub use document::{NodeMatch, QueryError, SelectorQuery};
pub use timer::{Timer, TimerHandle, DEFAULT_CHECK_INTERVAL};
pub use waiter::{ConditionWaiter, Waiters};
