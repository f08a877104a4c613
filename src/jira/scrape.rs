//! Extraction of handshake tokens from identity-provider pages.
//!
//! The login flow never sees a JSON API; each step hands back an HTML
//! page carrying the token for the next step. The pages that carry the
//! `SAMLRequest` textarea and the credential form are shallow, so those
//! extractors do a single document-order scan. The assertion page buries
//! its `SAMLResponse` input inside nested layout markup at no fixed
//! depth, so that extractor walks the whole tree.
//!
//! All three return `None` for "not present"; the caller decides which
//! absences are fatal.

use ego_tree::NodeRef;
use scraper::{Html, Node};

/// Find the first `element` whose `name` attribute is `name` and return
/// the text directly inside it.
///
/// Elements that match but hold no text are passed over; a page can
/// carry an empty placeholder field ahead of the populated one.
pub fn field_value(document: &str, element: &str, name: &str) -> Option<String> {
    let html = Html::parse_document(document);
    for node in html.tree.root().descendants() {
        let Some(el) = node.value().as_element() else {
            continue;
        };
        if el.name() != element || el.attr("name") != Some(name) {
            continue;
        }
        let mut value = String::new();
        for child in node.children() {
            if let Some(text) = child.value().as_text() {
                value.push_str(&text.text);
            }
        }
        if !value.is_empty() {
            return Some(value);
        }
    }
    None
}

/// Find the submission URL of the first form that declares one.
pub fn form_action(document: &str) -> Option<String> {
    let html = Html::parse_document(document);
    html.tree.root().descendants().find_map(|node| {
        let el = node.value().as_element()?;
        if el.name() != "form" {
            return None;
        }
        el.attr("action").map(str::to_string)
    })
}

/// Find the `value` attribute of an `<input>` named `name`, searching
/// the full document tree.
pub fn input_value(document: &str, name: &str) -> Option<String> {
    let html = Html::parse_document(document);
    input_value_under(html.tree.root(), name)
}

fn input_value_under(node: NodeRef<'_, Node>, name: &str) -> Option<String> {
    if let Some(el) = node.value().as_element()
        && el.name() == "input"
        && el.attr("name") == Some(name)
        && let Some(value) = el.attr("value")
    {
        // A matching input with no value attribute falls through here;
        // the page can render the real one later in the tree.
        return Some(value.to_string());
    }
    node.children()
        .find_map(|child| input_value_under(child, name))
}
