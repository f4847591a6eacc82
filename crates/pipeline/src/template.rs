//! `{parameter}` placeholder rendering for task descriptions.
//!
//! A placeholder is `{` + identifier (`[A-Za-z_][A-Za-z0-9_]*`) + `}`. Any
//! other brace is literal text, so JSON snippets or code in a description pass
//! through untouched. `{{` and `}}` render as a single literal brace.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{|\}\}|\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
});

/// Returns the distinct placeholder names in `template`, in first-use order.
pub fn placeholders(template: &str) -> Vec<&str> {
    let mut names: Vec<&str> = Vec::new();
    for caps in TOKEN.captures_iter(template) {
        if let Some(name) = caps.get(1) {
            if !names.contains(&name.as_str()) {
                names.push(name.as_str());
            }
        }
    }
    names
}

/// Substitutes every placeholder in `template` from `parameters`.
///
/// Returns the first unbound placeholder name as the error.
pub fn render(template: &str, parameters: &BTreeMap<String, String>) -> Result<String, String> {
    if let Some(missing) = placeholders(template)
        .into_iter()
        .find(|name| !parameters.contains_key(*name))
    {
        return Err(missing.to_string());
    }

    let rendered = TOKEN.replace_all(template, |caps: &Captures<'_>| match caps.get(1) {
        Some(name) => parameters
            .get(name.as_str())
            .cloned()
            .unwrap_or_default(),
        None => caps[0][..1].to_string(),
    });
    Ok(rendered.into_owned())
}
