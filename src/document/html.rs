use std::cell::RefCell;
use std::collections::HashMap;

use scraper::{ElementRef, Html, Selector};

use super::{NodeMatch, QueryError, SelectorQuery};

/// An HTML snapshot that stands in for a live page.
///
/// `load` swaps the whole tree, the way a re-render would. `set_value` types
/// into form controls without touching their markup; typed values are keyed by
/// element position and lost on the next `load`.
pub struct HtmlDocument {
    html: RefCell<Html>,
    typed: RefCell<HashMap<usize, String>>,
}

impl HtmlDocument {
    pub fn parse(source: &str) -> Self {
        Self {
            html: RefCell::new(Html::parse_document(source)),
            typed: RefCell::new(HashMap::new()),
        }
    }

    pub fn empty() -> Self {
        Self::parse("")
    }

    /// Replace the document with freshly parsed `source`.
    pub fn load(&self, source: &str) {
        *self.html.borrow_mut() = Html::parse_document(source);
        self.typed.borrow_mut().clear();
    }

    /// Set the value of every form control matching `selector`.
    ///
    /// Returns how many controls were updated.
    pub fn set_value(&self, selector: &str, value: &str) -> Result<usize, QueryError> {
        let parsed = parse_selector(selector)?;
        let html = self.html.borrow();
        let mut typed = self.typed.borrow_mut();
        let mut updated = 0;
        for (position, el) in matching(&html, &parsed) {
            if is_form_control(&el) {
                typed.insert(position, value.to_string());
                updated += 1;
            }
        }
        tracing::debug!("Set value on {} element(s) matching {}", updated, selector);
        Ok(updated)
    }

    fn value_of(&self, position: usize, el: &ElementRef) -> Option<String> {
        if let Some(typed) = self.typed.borrow().get(&position) {
            return Some(typed.clone());
        }
        match el.value().name() {
            "input" => Some(el.value().attr("value").unwrap_or_default().to_string()),
            "textarea" => Some(el.text().collect()),
            "select" => {
                let options: Vec<ElementRef> = el
                    .descendants()
                    .filter_map(ElementRef::wrap)
                    .filter(|node| node.value().name() == "option")
                    .collect();
                options
                    .iter()
                    .find(|option| option.value().attr("selected").is_some())
                    .or_else(|| options.first())
                    .map(option_value)
            }
            _ => None,
        }
    }
}

impl SelectorQuery for HtmlDocument {
    fn select(&self, selector: &str) -> Result<Vec<NodeMatch>, QueryError> {
        let parsed = parse_selector(selector)?;
        let html = self.html.borrow();
        Ok(matching(&html, &parsed)
            .map(|(position, el)| NodeMatch::new(el.value().name(), self.value_of(position, &el)))
            .collect())
    }
}

fn parse_selector(selector: &str) -> Result<Selector, QueryError> {
    Selector::parse(selector).map_err(|e| QueryError::InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

// Elements in document order, paired with their position among all elements.
fn matching<'a>(
    html: &'a Html,
    selector: &'a Selector,
) -> impl Iterator<Item = (usize, ElementRef<'a>)> + 'a {
    html.root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .enumerate()
        .filter(move |(_, el)| selector.matches(el))
}

fn is_form_control(el: &ElementRef) -> bool {
    matches!(el.value().name(), "input" | "textarea" | "select")
}

fn option_value(option: &ElementRef) -> String {
    match option.value().attr("value") {
        Some(value) => value.to_string(),
        None => option.text().collect::<String>().trim().to_string(),
    }
}
