//! Metadata computed from a file's path and tree position.
//!
//! Runs after [`crate::ancestry`] and before anything renders links, so
//! layouts can rely on every page having a canonical `uri`. Like cascade
//! defaults, computed values never overwrite keys the file already has.

use crate::files::{Files, keys};
use crate::glob::Glob;
use serde_json::Value;

/// Source suffixes that render to `.html`, longest first.
const RENDERED_SUFFIXES: &[&str] = &[".md.hbs", ".md", ".hbs"];

/// Derive the public URI of a source path.
///
/// - `guide/setup.md` → `/guide/setup.html`
/// - `guide/index.md` → `/guide/`
/// - `index.hbs` → `/`
pub fn derive_uri(path: &str) -> String {
    let mut uri = RENDERED_SUFFIXES
        .iter()
        .find_map(|suffix| path.strip_suffix(suffix))
        .map(|stem| format!("{stem}.html"))
        .unwrap_or_else(|| path.to_string());

    let name_start = uri.rfind('/').map(|i| i + 1).unwrap_or(0);
    if is_index_name(&uri[name_start..]) {
        uri.truncate(name_start);
    }

    format!("/{}", uri.trim_start_matches('/'))
}

/// Extensions a directory index may carry, as a glob alternation would list them.
pub const INDEX_EXTENSIONS: &[&str] = &["html", "md", "hbs", "md.hbs"];

/// `index` or `index.` plus exactly one renderable extension.
///
/// `indexing.md` and `index.old.md` are ordinary pages.
pub fn is_index_name(name: &str) -> bool {
    name == "index"
        || name
            .strip_prefix("index.")
            .is_some_and(|ext| INDEX_EXTENSIONS.contains(&ext))
}

/// Fill `uri`, `top_level` and `depth` for every participating file.
///
/// `top_level` means the page has no parent in the tree, not that it lives
/// in the top directory: `contact.md` next to a root `index.md` has that
/// index as its parent and gets `top_level = false`.
///
/// Returns the number of keys filled in.
pub fn apply_auto_defaults(
    files: &mut Files,
    participants: &Glob,
    derive_uri: fn(&str) -> String,
) -> usize {
    let mut filled = 0;
    for (path, file) in files.iter_mut() {
        if !participants.is_match(path) {
            continue;
        }
        let meta = &mut file.metadata;

        if !meta.contains_key(keys::URI) {
            meta.insert(keys::URI, derive_uri(path));
            filled += 1;
        }
        if !meta.contains_key(keys::DEPTH) {
            meta.insert(keys::DEPTH, path.matches('/').count());
            filled += 1;
        }
        if let Some(ancestry) = meta.ancestry() {
            let top_level = Value::Bool(ancestry.parent.is_none());
            if meta.insert_default(keys::TOP_LEVEL, &top_level) {
                filled += 1;
            }
        }
    }
    filled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ancestry::{self, AncestryOptions};
    use crate::test_helpers::*;
    use serde_json::json;

    #[test]
    fn uri_for_index_is_directory() {
        assert_eq!(derive_uri("guide/index.md"), "/guide/");
        assert_eq!(derive_uri("index.hbs"), "/");
        assert_eq!(derive_uri("a/b/index.md.hbs"), "/a/b/");
        assert_eq!(derive_uri("about/index.html"), "/about/");
    }

    #[test]
    fn uri_for_page_swaps_extension() {
        assert_eq!(derive_uri("guide/setup.md"), "/guide/setup.html");
        assert_eq!(derive_uri("download.md.hbs"), "/download.html");
        assert_eq!(derive_uri("faq.hbs"), "/faq.html");
        assert_eq!(derive_uri("plain.html"), "/plain.html");
    }

    #[test]
    fn uri_has_exactly_one_leading_slash() {
        assert_eq!(derive_uri("/guide/setup.md"), "/guide/setup.html");
        assert_eq!(derive_uri("//index.md"), "/");
    }

    #[test]
    fn index_name_is_exact() {
        assert!(is_index_name("index.md"));
        assert!(is_index_name("index.md.hbs"));
        assert!(is_index_name("index"));
        assert!(!is_index_name("index.old.md"));
        assert!(!is_index_name("index.scss"));
        assert!(!is_index_name("indexing.md"));
        assert!(!is_index_name("index-old.md"));
        assert_eq!(derive_uri("indexing.md"), "/indexing.html");
        assert_eq!(derive_uri("guide/index.old.md"), "/guide/index.old.html");
    }

    #[test]
    fn explicit_uri_is_kept() {
        let mut files = files_from(&[("old.md", json!({"uri": "/legacy/"}))]);
        let glob = Glob::new("**/*.md").unwrap();
        apply_auto_defaults(&mut files, &glob, derive_uri);
        assert_eq!(find_file(&files, "old.md").metadata.uri(), Some("/legacy/"));
    }

    #[test]
    fn position_defaults_read_ancestry() {
        let mut files = files_from(&[
            ("index.md", json!({})),
            ("contact.md", json!({})),
            ("about/index.md", json!({})),
            ("about/team.md", json!({})),
        ]);
        let glob = Glob::new("**/*.md").unwrap();
        ancestry::resolve(
            &mut files,
            &AncestryOptions {
                sort_by: vec!["order_id".into()],
                sort_files_first: Glob::new("**/index.{html,md,hbs,md.hbs}").unwrap(),
                participants: glob.clone(),
            },
        )
        .unwrap();

        apply_auto_defaults(&mut files, &glob, derive_uri);

        let home = &find_file(&files, "index.md").metadata;
        assert_eq!(home.get("top_level"), Some(&json!(true)));
        assert_eq!(home.get("depth"), Some(&json!(0)));
        let contact = &find_file(&files, "contact.md").metadata;
        assert_eq!(contact.get("top_level"), Some(&json!(false)));
        assert_eq!(contact.get("depth"), Some(&json!(0)));
        let team = &find_file(&files, "about/team.md").metadata;
        assert_eq!(team.get("top_level"), Some(&json!(false)));
        assert_eq!(team.get("depth"), Some(&json!(1)));
        assert_eq!(team.uri(), Some("/about/team.html"));
    }

    #[test]
    fn files_without_ancestry_still_get_uri() {
        let mut files = files_from(&[("solo.md", json!({}))]);
        apply_auto_defaults(&mut files, &Glob::new("**/*.md").unwrap(), derive_uri);
        let meta = &find_file(&files, "solo.md").metadata;
        assert_eq!(meta.uri(), Some("/solo.html"));
        assert!(meta.get("top_level").is_none());
    }
}
