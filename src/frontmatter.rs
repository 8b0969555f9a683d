//! YAML frontmatter extraction.
//!
//! A text file may open with a metadata block fenced by `---` lines:
//!
//! ```text
//! ---
//! title: About
//! order_id: 20
//! ---
//! # About us
//! ```
//!
//! The block is parsed into [`Metadata`] and removed from the body. Files
//! without an opening fence, or whose fence is never closed, have no
//! frontmatter and keep their contents untouched.

use crate::files::Metadata;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrontmatterError {
    #[error("invalid YAML frontmatter: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
    #[error("frontmatter must be a mapping of keys to values")]
    NotAMapping,
}

const FENCE: &str = "---";

/// Split `text` into `(frontmatter, body)` if it opens with a closed fence.
pub fn split(text: &str) -> Option<(&str, &str)> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let rest = strip_fence_line(text)?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']) == FENCE {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Some((yaml, body));
        }
        offset += line.len();
    }
    None
}

/// The text after an opening `---` line, if `text` starts with one.
fn strip_fence_line(text: &str) -> Option<&str> {
    let after = text.strip_prefix(FENCE)?;
    after
        .strip_prefix("\r\n")
        .or_else(|| after.strip_prefix('\n'))
}

/// Parse frontmatter from `text`, returning the metadata and remaining body.
///
/// An empty block yields empty metadata. A block that is not a YAML mapping
/// is an error.
pub fn parse(text: &str) -> Result<Option<(Metadata, &str)>, FrontmatterError> {
    let Some((yaml, body)) = split(text) else {
        return Ok(None);
    };
    let value: Value = if yaml.trim().is_empty() {
        Value::Null
    } else {
        serde_yaml_ng::from_str(yaml)?
    };
    let metadata = match value {
        Value::Null => Metadata::new(),
        Value::Object(map) => Metadata::from_map(map),
        _ => return Err(FrontmatterError::NotAMapping),
    };
    Ok(Some((metadata, body)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mapping_and_strips_block() {
        let text = "---\ntitle: About\norder_id: 20\nnav_show: false\n---\n# About\n";
        let (meta, body) = parse(text).unwrap().unwrap();
        assert_eq!(meta.title(), Some("About"));
        assert_eq!(meta.order_id(), Some(20.0));
        assert_eq!(meta.bool("nav_show"), Some(false));
        assert_eq!(body, "# About\n");
    }

    #[test]
    fn crlf_fences() {
        let text = "---\r\ntitle: Win\r\n---\r\nbody";
        let (meta, body) = parse(text).unwrap().unwrap();
        assert_eq!(meta.title(), Some("Win"));
        assert_eq!(body, "body");
    }

    #[test]
    fn nested_values_survive() {
        let text = "---\nlinks:\n  github: https://github.com\ntags: [a, b]\n---\n";
        let (meta, body) = parse(text).unwrap().unwrap();
        assert_eq!(meta.get("links").unwrap()["github"], "https://github.com");
        assert_eq!(meta.get("tags").unwrap()[1], "b");
        assert_eq!(body, "");
    }

    #[test]
    fn no_fence_means_no_frontmatter() {
        assert!(parse("# Just markdown\n").unwrap().is_none());
        assert!(parse("--- not a fence\n").unwrap().is_none());
    }

    #[test]
    fn unclosed_fence_means_no_frontmatter() {
        assert!(parse("---\ntitle: x\n").unwrap().is_none());
    }

    #[test]
    fn empty_block_is_empty_metadata() {
        let (meta, body) = parse("---\n---\nhello").unwrap().unwrap();
        assert!(meta.is_empty());
        assert_eq!(body, "hello");
    }

    #[test]
    fn scalar_block_is_rejected() {
        assert!(matches!(
            parse("---\njust a string\n---\n"),
            Err(FrontmatterError::NotAMapping)
        ));
    }

    #[test]
    fn invalid_yaml_is_rejected() {
        assert!(matches!(
            parse("---\ntitle: [unclosed\n---\n"),
            Err(FrontmatterError::Yaml(_))
        ));
    }
}
