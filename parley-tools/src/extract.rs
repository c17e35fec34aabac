//! HTML → (text, links) extraction used by the content fetcher.

use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Elements whose text never renders.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// What the assistant receives for a scraped page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedPage {
    pub content: String,
    /// Distinct `href` targets, sorted ascending.
    pub links: Vec<String>,
}

impl ScrapedPage {
    pub fn from_html(html: &str) -> Self {
        let doc = Html::parse_document(html);
        Self {
            content: visible_text(&doc),
            links: distinct_links(&doc),
        }
    }
}

/// Every rendered text node, trimmed, empties dropped, joined by `\n`.
pub fn visible_text(doc: &Html) -> String {
    let mut lines = Vec::new();
    for node in doc.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|el| HIDDEN_ELEMENTS.contains(&el.name()))
        });
        if hidden {
            continue;
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            lines.push(trimmed);
        }
    }
    lines.join("\n")
}

/// Distinct non-empty `href` values of anchors, in lexicographic order.
pub fn distinct_links(doc: &Html) -> Vec<String> {
    let sel = match Selector::parse("a[href]") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };
    let mut out = BTreeSet::new();
    for el in doc.select(&sel) {
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if !href.is_empty() {
            out.insert(href.to_string());
        }
    }
    out.into_iter().collect()
}
