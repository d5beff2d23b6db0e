use std::rc::Rc;
use std::time::Duration;

use super::ConditionWaiter;
use crate::config::WaitConfig;
use crate::document::SelectorQuery;
use crate::timer::{Timer, DEFAULT_CHECK_INTERVAL};

/// Entry points for page scripts: each call starts an independent,
/// uncancellable wait and returns at once.
#[derive(Clone)]
pub struct Waiters {
    timer: Rc<dyn Timer>,
    query: Rc<dyn SelectorQuery>,
    check_interval: Duration,
}

impl Waiters {
    pub fn new(timer: Rc<dyn Timer>, query: Rc<dyn SelectorQuery>) -> Self {
        Self {
            timer,
            query,
            check_interval: DEFAULT_CHECK_INTERVAL,
        }
    }

    pub fn with_config(mut self, config: &WaitConfig) -> Self {
        self.check_interval = config.check_interval();
        self
    }

    fn waiter(&self, callback: impl FnOnce() + 'static) -> ConditionWaiter {
        ConditionWaiter::new(self.timer.clone(), callback).with_interval(self.check_interval)
    }

    /// Run `callback` once an element matching `selector` exists.
    pub fn on_element_available(&self, selector: &str, callback: impl FnOnce() + 'static) {
        self.waiter(callback)
            .execute_when_element_available(self.query.clone(), selector);
    }

    /// Run `callback` once every selector has at least one match.
    pub fn all_elements_available<S: AsRef<str>>(
        &self,
        selectors: &[S],
        callback: impl FnOnce() + 'static,
    ) {
        self.waiter(callback)
            .execute_when_all_elements_available(self.query.clone(), selectors);
    }

    /// Run `callback` once the input matching `selector` holds `value`.
    pub fn on_input_has_value(
        &self,
        selector: &str,
        value: &str,
        callback: impl FnOnce() + 'static,
    ) {
        self.waiter(callback)
            .execute_when_input_has_value(self.query.clone(), selector, value);
    }
}
