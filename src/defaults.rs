//! Cascading metadata defaults.
//!
//! Each [`DefaultsRule`] pairs a glob with a map of default values. Rules are
//! applied in declaration order, and a value is only written when the file's
//! metadata does not already have that key. Frontmatter therefore always
//! wins, and an earlier rule wins over a later one:
//!
//! ```toml
//! [[defaults]]
//! pattern = "**/*.{html,md,hbs,md.hbs,fakechild}"
//! values = { nav_show = true, order_id = 50 }
//!
//! [[defaults]]
//! pattern = "error/**/*"
//! values = { nav_show = false }   # no effect: nav_show is already set above
//! ```
//!
//! Re-applying the same rules is a no-op.

use crate::files::Files;
use crate::glob::{Glob, GlobError};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct DefaultsRule {
    pattern: Glob,
    values: BTreeMap<String, Value>,
}

impl DefaultsRule {
    pub fn new(pattern: &str, values: BTreeMap<String, Value>) -> Result<Self, GlobError> {
        Ok(Self {
            pattern: Glob::new(pattern)?,
            values,
        })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    pub fn matches(&self, path: &str) -> bool {
        self.pattern.is_match(path)
    }
}

/// Apply `rules` in order. Returns the number of keys filled in.
pub fn apply_defaults(files: &mut Files, rules: &[DefaultsRule]) -> usize {
    let mut filled = 0;
    for rule in rules {
        for (path, file) in files.iter_mut() {
            if !rule.matches(path) {
                continue;
            }
            for (key, value) in &rule.values {
                if file.metadata.insert_default(key, value) {
                    filled += 1;
                }
            }
        }
    }
    filled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use serde_json::json;

    fn rule(pattern: &str, values: Value) -> DefaultsRule {
        let values = values
            .as_object()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        DefaultsRule::new(pattern, values).unwrap()
    }

    #[test]
    fn fills_only_missing_keys() {
        let mut files = files_from(&[("index.md", json!({"title": "Home"}))]);
        let rules = [rule("**/*.md", json!({"title": "Site", "nav_show": true}))];

        let filled = apply_defaults(&mut files, &rules);

        assert_eq!(filled, 1);
        let meta = &find_file(&files, "index.md").metadata;
        assert_eq!(meta.title(), Some("Home"));
        assert!(meta.nav_show());
    }

    #[test]
    fn earlier_rule_wins_over_later_rule() {
        let mut files = files_from(&[
            ("index.md", json!({})),
            ("error/404.md", json!({})),
        ]);
        let rules = [
            rule("**/*.md", json!({"nav_show": true})),
            rule("error/**/*", json!({"nav_show": false, "layout": "error"})),
        ];

        apply_defaults(&mut files, &rules);

        let err_page = &find_file(&files, "error/404.md").metadata;
        assert!(err_page.nav_show());
        assert_eq!(err_page.layout(), Some("error"));
        assert_eq!(find_file(&files, "index.md").metadata.layout(), None);
    }

    #[test]
    fn frontmatter_false_is_not_overwritten() {
        let mut files = files_from(&[("error/404.md", json!({"nav_show": false}))]);
        apply_defaults(&mut files, &[rule("**/*.md", json!({"nav_show": true}))]);
        assert!(!find_file(&files, "error/404.md").metadata.nav_show());
    }

    #[test]
    fn unmatched_files_are_untouched() {
        let mut files = files_from(&[("css/base.scss", json!({}))]);
        let filled = apply_defaults(&mut files, &[rule("**/*.md", json!({"title": "x"}))]);
        assert_eq!(filled, 0);
        assert!(find_file(&files, "css/base.scss").metadata.is_empty());
    }

    #[test]
    fn reapplying_is_a_no_op() {
        let mut files = files_from(&[("a.md", json!({"order_id": 1})), ("b.md", json!({}))]);
        let rules = [rule("**/*.md", json!({"order_id": 50, "title": "t"}))];

        apply_defaults(&mut files, &rules);
        let once = files.clone();
        let filled = apply_defaults(&mut files, &rules);

        assert_eq!(filled, 0);
        assert_eq!(files, once);
    }
}
