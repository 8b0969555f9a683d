//! External link classification.
//!
//! A link is **external** when it carries a scheme (`https:`, `mailto:`, ...)
//! or is protocol-relative (`//host/...`) *and* matches none of the
//! configured exclusion patterns. Exclusions describe the site's own hosts,
//! so an absolute link back to the site still counts as internal:
//!
//! | URL | Exclusions: `^https?://([^/]*\.)?example\.com.*` |
//! |-----|------|
//! | `https://example.com/about` | internal |
//! | `https://other.org` | external |
//! | `/relative/path` | internal |
//! | `#top` | internal |
//!
//! Classification is pure. The `external-links` stage uses it to open
//! external anchors in a new tab with `rel="noopener noreferrer"`.

use crate::files::Files;
use crate::markup::{self, Tag};
use crate::pipeline::StageError;
use log::debug;
use rayon::prelude::*;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Internal,
    External,
}

/// A URL-bearing attribute found in rendered markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRecord {
    pub tag: String,
    pub attr: String,
    pub url: String,
}

/// Whether `url` starts with a URI scheme (`scheme:`) or is protocol-relative.
pub fn has_scheme(url: &str) -> bool {
    if url.starts_with("//") {
        return true;
    }
    let Some(colon) = url.find(':') else {
        return false;
    };
    let scheme = &url[..colon];
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

#[derive(Debug, Clone, Default)]
pub struct LinkClassifier {
    exclusions: Vec<Regex>,
}

impl LinkClassifier {
    pub fn new<S: AsRef<str>>(match_negative: &[S]) -> Result<Self, regex::Error> {
        let exclusions = match_negative
            .iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { exclusions })
    }

    pub fn classify(&self, url: &str) -> LinkKind {
        let url = url.trim();
        if has_scheme(url) && !self.exclusions.iter().any(|re| re.is_match(url)) {
            LinkKind::External
        } else {
            LinkKind::Internal
        }
    }

    pub fn is_external(&self, url: &str) -> bool {
        self.classify(url) == LinkKind::External
    }
}

/// All `<a href>` links in `html`, in document order.
pub fn extract_links(html: &str) -> Vec<LinkRecord> {
    markup::start_tags(html)
        .filter(|tag| tag.is("a"))
        .filter_map(|tag| {
            let href = tag.attr("href")?.value?;
            Some(LinkRecord {
                tag: tag.name.to_ascii_lowercase(),
                attr: "href".to_string(),
                url: href.to_string(),
            })
        })
        .collect()
}

fn external_anchor(tag: &Tag<'_>, classifier: &LinkClassifier) -> bool {
    tag.is("a")
        && tag
            .attr("href")
            .and_then(|a| a.value)
            .is_some_and(|href| classifier.is_external(href))
}

/// Add `target` and `rel` to external anchors that lack them.
///
/// Returns `None` when nothing changed.
pub fn mark_external_links(html: &str, classifier: &LinkClassifier) -> Option<String> {
    let edits: Vec<_> = markup::start_tags(html)
        .filter(|tag| external_anchor(tag, classifier))
        .filter_map(|tag| {
            let mut extra = String::new();
            if !tag.has_attr("target") {
                extra.push_str(r#" target="_blank""#);
            }
            if !tag.has_attr("rel") {
                extra.push_str(r#" rel="noopener noreferrer""#);
            }
            (!extra.is_empty()).then(|| (tag.insert_at..tag.insert_at, extra))
        })
        .collect();

    if edits.is_empty() {
        None
    } else {
        Some(markup::apply_edits(html, edits))
    }
}

/// Decorate external links in every `.html` file. Returns files changed.
pub fn decorate_external_links(
    files: &mut Files,
    classifier: &LinkClassifier,
) -> Result<usize, StageError> {
    files
        .par_iter_mut()
        .filter(|(path, _)| path.ends_with(".html"))
        .map(|(path, file)| {
            let html = file.text().ok_or_else(|| StageError::NotUtf8 {
                path: path.clone(),
            })?;
            match mark_external_links(html, classifier) {
                Some(updated) => {
                    debug!("marked external links in {path}");
                    file.set_text(updated);
                    Ok(1)
                }
                None => Ok(0),
            }
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::File;

    fn classifier() -> LinkClassifier {
        LinkClassifier::new(&[r"^https?://(.*\.)?example\.com.*"]).unwrap()
    }

    #[test]
    fn classification_examples() {
        let c = classifier();
        assert_eq!(c.classify("https://example.com/about"), LinkKind::Internal);
        assert_eq!(c.classify("https://www.example.com"), LinkKind::Internal);
        assert_eq!(c.classify("https://other.org"), LinkKind::External);
        assert_eq!(c.classify("/relative/path"), LinkKind::Internal);
        assert_eq!(c.classify("relative.html"), LinkKind::Internal);
        assert_eq!(c.classify("#top"), LinkKind::Internal);
    }

    #[test]
    fn schemes_and_protocol_relative_are_absolute() {
        let c = LinkClassifier::default();
        assert!(c.is_external("mailto:hello@example.com"));
        assert!(c.is_external("//cdn.other.org/x.js"));
        assert!(c.is_external("git+ssh://host/repo"));
    }

    #[test]
    fn malformed_links_are_internal() {
        let c = LinkClassifier::default();
        assert!(!c.is_external(""));
        assert!(!c.is_external(":nothing"));
        assert!(!c.is_external("1http://x"));
        assert!(!c.is_external("path/with:colon"));
    }

    #[test]
    fn invalid_exclusion_is_an_error() {
        assert!(LinkClassifier::new(&["(unclosed"]).is_err());
    }

    #[test]
    fn extracts_anchor_links_only() {
        let html = r#"<a href="/a">A</a><img src="/i.png"><A HREF="https://x.org">X</A><a name="n">"#;
        let links = extract_links(html);
        let urls: Vec<&str> = links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(urls, ["/a", "https://x.org"]);
        assert_eq!(links[1].tag, "a");
    }

    #[test]
    fn marks_only_external_anchors() {
        let html = r#"<a href="https://other.org">o</a> <a href="https://example.com/x">s</a> <a href="/y">y</a>"#;
        let out = mark_external_links(html, &classifier()).unwrap();
        assert_eq!(
            out,
            r#"<a href="https://other.org" target="_blank" rel="noopener noreferrer">o</a> <a href="https://example.com/x">s</a> <a href="/y">y</a>"#
        );
    }

    #[test]
    fn unquoted_href_with_trailing_slash_is_kept_whole() {
        let out = mark_external_links("<a href=https://other.org/>o</a>", &classifier()).unwrap();
        assert_eq!(
            out,
            r#"<a href=https://other.org/ target="_blank" rel="noopener noreferrer">o</a>"#
        );
    }

    #[test]
    fn anchors_in_comments_are_not_marked() {
        let html = r#"<!-- <a href="https://other.org">o</a> -->"#;
        assert_eq!(mark_external_links(html, &classifier()), None);
    }

    #[test]
    fn existing_target_and_rel_are_kept() {
        let html = r#"<a href="https://other.org" target="_self" rel="me">o</a>"#;
        assert_eq!(mark_external_links(html, &classifier()), None);
    }

    #[test]
    fn stage_skips_non_html_and_rejects_binary_html() {
        let mut files = Files::new();
        files
            .insert("page.html", File::new(r#"<a href="https://other.org">o</a>"#))
            .unwrap();
        files
            .insert("notes.md", File::new(r#"<a href="https://other.org">o</a>"#))
            .unwrap();

        let changed = decorate_external_links(&mut files, &classifier()).unwrap();
        assert_eq!(changed, 1);
        assert!(files.get("notes.md").unwrap().text().unwrap().ends_with("o</a>"));
        assert!(!files.get("notes.md").unwrap().text().unwrap().contains("_blank"));

        files.insert("bad.html", File::new(vec![0xff, 0xfe])).unwrap();
        let err = decorate_external_links(&mut files, &classifier()).unwrap_err();
        assert!(matches!(err, StageError::NotUtf8 { ref path } if path == "bad.html"));
    }
}
