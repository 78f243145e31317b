//! Numbered-list extraction from free-form model output
//!
//! Model responses are treated as a best-effort contract: anything that looks
//! like `<n>. <content>` is taken as an item, everything else is ignored, and
//! a response with no list at all simply yields no items.

use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// `<digits>.` followed by whitespace, then the rest of the line
static LIST_ITEM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+\.\s+(.*)").expect("list item pattern is valid"));

/// Extract numbered list items from text, in document order
///
/// Matches may appear anywhere, including mid-line after surrounding prose.
/// The numeric prefix is stripped. Never fails; no match yields an empty vec.
pub fn extract_list_items(text: &str) -> Vec<String> {
    debug!(text_len = text.len(), "extract_list_items: called");
    let items: Vec<String> = LIST_ITEM
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim_end_matches('\r').to_string())
        .collect();

    if items.is_empty() {
        warn!("extract_list_items: no numbered items found in response");
    } else {
        debug!(count = items.len(), "extract_list_items: done");
    }
    items
}

/// Split an item into `(name, description)` on its first `:`
///
/// The description keeps everything after the colon verbatim, including a
/// leading space. Later colons are kept as written rather than rejoined
/// with spaces. Without a colon the whole item is the name.
pub fn split_list_item(item: &str) -> (String, String) {
    match item.split_once(':') {
        Some((name, description)) => (name.to_string(), description.to_string()),
        None => (item.to_string(), String::new()),
    }
}
