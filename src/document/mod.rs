pub mod chrome;
pub mod html;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use chrome::ChromeDocument;
pub use html::HtmlDocument;

/// A node matched by a selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMatch {
    pub tag: String,
    /// Current value for form controls, `None` for anything else.
    pub value: Option<String>,
}

impl NodeMatch {
    pub fn new(tag: impl Into<String>, value: Option<String>) -> Self {
        Self {
            tag: tag.into(),
            value,
        }
    }
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },
    #[error("page query failed: {0}")]
    Page(String),
}

/// Resolves selectors against the current state of a document.
///
/// Every call must look at the document afresh. Matches come back in
/// document order.
pub trait SelectorQuery {
    fn select(&self, selector: &str) -> Result<Vec<NodeMatch>, QueryError>;
}
