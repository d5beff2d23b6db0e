use std::rc::Rc;

use super::ConditionWaiter;
use crate::document::SelectorQuery;

impl ConditionWaiter {
    /// Fire once `selector` matches at least one node.
    pub fn execute_when_element_available(self, query: Rc<dyn SelectorQuery>, selector: &str) {
        let selector = selector.to_string();
        self.try_execute_when(move || Ok(!query.select(&selector)?.is_empty()))
    }

    /// Fire once every selector has matched, awaiting them one at a time in
    /// list order.
    ///
    /// The wait for a selector does not start polling until all selectors
    /// before it have matched, so latency adds up across the list.
    pub fn execute_when_all_elements_available<S: AsRef<str>>(
        self,
        query: Rc<dyn SelectorQuery>,
        selectors: &[S],
    ) {
        match selectors {
            [] => (self.callback)(),
            [only] => self.execute_when_element_available(query, only.as_ref()),
            [rest @ .., last] => {
                let last = last.as_ref().to_string();
                let timer = self.timer.clone();
                let interval = self.interval;
                let last_query = query.clone();
                let before_last = ConditionWaiter::new(timer, move || {
                    self.execute_when_element_available(last_query, &last)
                })
                .with_interval(interval);
                before_last.execute_when_all_elements_available(query, rest);
            }
        }
    }

    /// Fire once the first node matching `selector` has exactly `value`.
    ///
    /// No trimming or case folding. Nodes without a value never match.
    pub fn execute_when_input_has_value(
        self,
        query: Rc<dyn SelectorQuery>,
        selector: &str,
        value: &str,
    ) {
        let selector = selector.to_string();
        let value = value.to_string();
        self.try_execute_when(move || {
            let matches = query.select(&selector)?;
            Ok(matches
                .first()
                .and_then(|node| node.value.as_deref())
                .is_some_and(|current| current == value))
        })
    }
}
