use chromiumoxide::page::Page;
use tokio::runtime::Handle;

use super::{NodeMatch, QueryError, SelectorQuery};

/// Selector queries against a live Chrome page over CDP.
///
/// Every `select` blocks on the runtime, so this must live on a blocking
/// thread (`spawn_blocking`), never on a runtime worker.
pub struct ChromeDocument {
    handle: Handle,
    page: Page,
}

impl ChromeDocument {
    pub fn new(handle: Handle, page: Page) -> Self {
        Self { handle, page }
    }
}

impl SelectorQuery for ChromeDocument {
    fn select(&self, selector: &str) -> Result<Vec<NodeMatch>, QueryError> {
        let js = select_js(selector)?;
        let page = self.page.clone();
        let value: serde_json::Value = self
            .handle
            .block_on(async move { page.evaluate(js).await })
            .map_err(|e| QueryError::Page(format!("Failed to evaluate selector {}: {}", selector, e)))?
            .into_value()
            .map_err(|e| QueryError::Page(format!("Failed to read selector result: {}", e)))?;

        serde_json::from_value(value)
            .map_err(|e| QueryError::Page(format!("Unexpected selector result: {}", e)))
    }
}

fn select_js(selector: &str) -> Result<String, QueryError> {
    let sel = serde_json::to_string(selector).map_err(|e| QueryError::InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })?;
    Ok(format!(
        r#"(() => {{
            const elements = document.querySelectorAll({sel});
            return Array.from(elements).map((el) => ({{
                tag: el.tagName.toLowerCase(),
                value: ('value' in el) && typeof el.value === 'string' ? el.value : null
            }}));
        }})()"#,
        sel = sel
    ))
}
