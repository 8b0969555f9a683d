//! Site-root prefixing for rooted URLs.
//!
//! Pages are written with root-relative links (`/about/`, `/img/logo.svg`).
//! When the site is published under a base URL, each configured
//! `(tag, attribute)` pair has its rooted values rewritten to
//! `prefix + value`:
//!
//! ```text
//! <a href="/about/">   →   <a href="https://example.com/about/">
//! <img src="logo.svg"> →   unchanged (relative, convert_relatives = false)
//! ```
//!
//! Values that already carry a scheme, are protocol-relative, or already
//! start with the prefix are left alone, so rewriting is idempotent. An empty
//! prefix turns the whole stage into a no-op.

use crate::files::Files;
use crate::links::has_scheme;
use crate::markup;
use crate::pipeline::StageError;
use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixRule {
    pub tag: String,
    pub attr: String,
    pub prefix: String,
    /// Also prefix relative values (`logo.svg` → `prefix/logo.svg`).
    #[serde(default)]
    pub convert_relatives: bool,
}

impl PrefixRule {
    pub fn new(tag: &str, attr: &str, prefix: &str) -> Self {
        Self {
            tag: tag.to_string(),
            attr: attr.to_string(),
            prefix: prefix.to_string(),
            convert_relatives: false,
        }
    }
}

/// `value` already starts with `prefix` as a whole path component.
fn is_prefixed(value: &str, prefix: &str) -> bool {
    value
        .strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(['/', '?', '#']))
}

/// The rewritten value, or `None` if `value` should stay as it is.
pub fn rewrite_value(value: &str, prefix: &str, convert_relatives: bool) -> Option<String> {
    if prefix.is_empty() || value.is_empty() || is_prefixed(value, prefix) || has_scheme(value) {
        return None;
    }
    if value.starts_with('/') {
        return Some(format!("{prefix}{value}"));
    }
    if convert_relatives && !value.starts_with(['#', '?']) {
        return Some(format!("{prefix}/{value}"));
    }
    None
}

/// Apply `rules` to one document. Returns `None` when nothing changed.
pub fn rewrite_html(html: &str, rules: &[PrefixRule]) -> Option<String> {
    let edits: Vec<_> = markup::start_tags(html)
        .flat_map(|tag| {
            rules
                .iter()
                .filter(|rule| tag.is(&rule.tag))
                .filter_map(|rule| {
                    let attr = tag.attr(&rule.attr)?;
                    let value = attr.value?;
                    let range = attr.value_range.clone()?;
                    let rewritten = rewrite_value(value, &rule.prefix, rule.convert_relatives)?;
                    Some((range, rewritten))
                })
                .collect::<Vec<_>>()
        })
        .collect();

    if edits.is_empty() {
        None
    } else {
        Some(markup::apply_edits(html, edits))
    }
}

/// Rewrite every `.html` file. Returns the number of files changed.
pub fn apply_prefix(files: &mut Files, rules: &[PrefixRule]) -> Result<usize, StageError> {
    if rules.iter().all(|r| r.prefix.is_empty()) {
        return Ok(0);
    }
    files
        .par_iter_mut()
        .filter(|(path, _)| path.ends_with(".html"))
        .map(|(path, file)| {
            let html = file.text().ok_or_else(|| StageError::NotUtf8 {
                path: path.clone(),
            })?;
            match rewrite_html(html, rules) {
                Some(updated) => {
                    debug!("prefixed URLs in {path}");
                    file.set_text(updated);
                    Ok(1)
                }
                None => Ok(0),
            }
        })
        .sum()
}
