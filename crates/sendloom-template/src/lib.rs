//! # Sendloom Template
//! Pure placeholder substitution for message templates.
//!
//! Three placeholder styles are accepted so templates written for other
//! tools keep working: `{name}`, `{{name}}`, and `[name]`. Placeholders
//! whose field is absent render as the empty string.

use std::collections::BTreeSet;

use regex::Regex;
use sendloom_core::types::Contact;

fn placeholder_regex() -> Regex {
    // Double braces first so `{{name}}` is not consumed as `{name}`.
    Regex::new(r"\{\{(\w+)\}\}|\{(\w+)\}|\[(\w+)\]").unwrap()
}

/// Extract the set of placeholder names present in a template, for
/// pre-flight validation against the available contact fields.
pub fn placeholders(template: &str) -> BTreeSet<String> {
    let re = placeholder_regex();
    re.captures_iter(template)
        .filter_map(|caps| {
            caps.get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .map(|m| m.as_str().to_string())
        })
        .collect()
}

/// Render a template for one contact. Every placeholder occurrence, in any
/// of the three styles, is replaced by the contact's field value; absent
/// fields become empty strings.
pub fn render(template: &str, contact: &Contact) -> String {
    let re = placeholder_regex();
    re.replace_all(template, |caps: &regex::Captures| {
        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .or_else(|| caps.get(3))
            .map(|m| m.as_str())
            .unwrap_or_default();
        contact.get(name).unwrap_or("").to_string()
    })
    .into_owned()
}
