//! Glob patterns compiled to path predicates.
//!
//! Every path-selecting option in `config.toml` (defaults rules, ancestry
//! participation, ignore lists) uses the same minimatch-style syntax:
//!
//! | Syntax | Matches |
//! |--------|---------|
//! | `*` | any run of characters except `/` |
//! | `**` (whole segment) | zero or more path segments |
//! | `?` | one character except `/` |
//! | `{md,hbs,md.hbs}` | any of the comma-separated alternatives |
//! | `[abc]`, `[a-z]`, `[!a]` | character classes |
//!
//! Patterns are compiled once into an anchored [`Regex`] and matched against
//! normalized relative paths (`/` separators, no leading `/`). Matching is
//! case-sensitive and dotfiles are not special: `**/.gitignore` matches
//! `.gitignore` at any depth.

use regex::Regex;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GlobError {
    #[error("empty glob pattern")]
    Empty,
    #[error("unclosed '{delimiter}' in glob pattern `{pattern}`")]
    Unclosed { pattern: String, delimiter: char },
    #[error("nested braces are not supported in glob pattern `{0}`")]
    NestedBrace(String),
    #[error("glob pattern `{pattern}` compiles to an invalid regex: {source}")]
    Regex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// A compiled glob pattern.
#[derive(Clone)]
pub struct Glob {
    pattern: String,
    regex: Regex,
}

impl Glob {
    pub fn new(pattern: &str) -> Result<Self, GlobError> {
        if pattern.is_empty() {
            return Err(GlobError::Empty);
        }
        let source = translate(pattern)?;
        let regex = Regex::new(&source).map_err(|source| GlobError::Regex {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// The pattern as written in configuration.
    pub fn as_str(&self) -> &str {
        &self.pattern
    }
}

impl fmt::Debug for Glob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Glob").field(&self.pattern).finish()
    }
}

/// A list of globs; a path matches the set if it matches any member.
#[derive(Debug, Clone, Default)]
pub struct GlobSet {
    globs: Vec<Glob>,
}

impl GlobSet {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, GlobError> {
        let globs = patterns
            .iter()
            .map(|p| Glob::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { globs })
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.globs.iter().any(|g| g.is_match(path))
    }

    pub fn is_empty(&self) -> bool {
        self.globs.is_empty()
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.globs.iter().map(Glob::as_str)
    }
}

/// Translate a glob into anchored regex source.
fn translate(pattern: &str) -> Result<String, GlobError> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2);
    out.push('^');

    let mut in_brace = false;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '*' if chars.get(i + 1) == Some(&'*') => {
                let segment_start = i == 0 || chars[i - 1] == '/';
                match chars.get(i + 2) {
                    Some('/') if segment_start => {
                        out.push_str("(?:.*/)?");
                        i += 3;
                    }
                    None if segment_start => {
                        out.push_str(".*");
                        i += 2;
                    }
                    // `**` inside a segment behaves like `*`
                    _ => {
                        out.push_str("[^/]*");
                        i += 2;
                    }
                }
                continue;
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '{' => {
                if in_brace {
                    return Err(GlobError::NestedBrace(pattern.to_string()));
                }
                in_brace = true;
                out.push_str("(?:");
            }
            '}' if in_brace => {
                in_brace = false;
                out.push(')');
            }
            ',' if in_brace => out.push('|'),
            '[' => {
                let (class, consumed) = translate_class(&chars[i..]).ok_or_else(|| {
                    GlobError::Unclosed {
                        pattern: pattern.to_string(),
                        delimiter: '[',
                    }
                })?;
                out.push_str(&class);
                i += consumed;
                continue;
            }
            '\\' if i + 1 < chars.len() => {
                out.push_str(&regex::escape(&chars[i + 1].to_string()));
                i += 2;
                continue;
            }
            other => out.push_str(&regex::escape(&other.to_string())),
        }
        i += 1;
    }

    if in_brace {
        return Err(GlobError::Unclosed {
            pattern: pattern.to_string(),
            delimiter: '{',
        });
    }
    out.push('$');
    Ok(out)
}

/// Translate a `[...]` class starting at `chars[0]`.
///
/// Returns the regex class and the number of glob characters consumed, or
/// `None` when the class is never closed.
fn translate_class(chars: &[char]) -> Option<(String, usize)> {
    let mut i = 1;
    let negated = matches!(chars.get(i), Some('!') | Some('^'));
    if negated {
        i += 1;
    }
    let body_start = i;
    // A `]` right after the opening bracket is a literal member.
    if chars.get(i) == Some(&']') {
        i += 1;
    }
    while i < chars.len() && chars[i] != ']' {
        i += 1;
    }
    if i >= chars.len() {
        return None;
    }

    let mut class = String::from(if negated { "[^" } else { "[" });
    for &c in &chars[body_start..i] {
        if c == '-' {
            class.push('-');
        } else {
            class.push_str(&regex::escape(&c.to_string()));
        }
    }
    class.push(']');
    Some((class, i + 1))
}
