//! Start-tag scanner for rendered HTML.
//!
//! Link classification and prefix rewriting only need to find start tags and
//! read or replace attribute values, so this scanner works on byte offsets in
//! the original string instead of building a DOM. Edits are collected as
//! `(range, replacement)` pairs and applied in one pass by [`apply_edits`],
//! which leaves every untouched byte of the document exactly as it was.
//!
//! A lenient `quick-xml` reader walks the document and skips comments,
//! doctypes, CDATA and end tags. Each start tag it reports is then lexed
//! here with HTML attribute rules: quoted values may contain `>`, and an
//! unquoted value keeps a trailing `/`. The contents of `<script>`,
//! `<style>` and `<textarea>` are raw text and never scanned.

use quick_xml::Reader;
use quick_xml::events::Event;
use std::ops::Range;

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea"];

/// A start tag found in a document.
#[derive(Debug, Clone)]
pub struct Tag<'a> {
    pub name: &'a str,
    pub attrs: Vec<Attr<'a>>,
    /// Byte offset where new attributes can be inserted (before `>` or `/>`).
    pub insert_at: usize,
    pub self_closing: bool,
}

/// An attribute of a start tag. `value_range` is absolute in the document.
#[derive(Debug, Clone)]
pub struct Attr<'a> {
    pub name: &'a str,
    pub value: Option<&'a str>,
    pub value_range: Option<Range<usize>>,
}

impl<'a> Tag<'a> {
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    pub fn attr(&self, name: &str) -> Option<&Attr<'a>> {
        self.attrs.iter().find(|a| a.name.eq_ignore_ascii_case(name))
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }
}

fn create_reader(content: &[u8]) -> Reader<&[u8]> {
    let mut reader = Reader::from_reader(content);
    reader.config_mut().trim_text(false);
    reader.config_mut().enable_all_checks(false);
    reader
}

/// Every start tag in `html`, in document order.
pub fn start_tags(html: &str) -> impl Iterator<Item = Tag<'_>> {
    StartTags {
        html,
        base: 0,
        reader: create_reader(html.as_bytes()),
        done: false,
    }
}

struct StartTags<'a> {
    html: &'a str,
    /// Offset of the reader's input within `html`.
    base: usize,
    reader: Reader<&'a [u8]>,
    done: bool,
}

impl<'a> StartTags<'a> {
    fn position(&self) -> usize {
        self.base + self.reader.buffer_position() as usize
    }

    fn resume_at(&mut self, offset: usize) {
        self.base = offset;
        self.reader = create_reader(&self.html.as_bytes()[offset..]);
    }

    /// Resume at the `<` following the first one at or after `from`.
    fn skip_markup_at(&mut self, from: usize) {
        let bytes = self.html.as_bytes();
        let next = bytes[from..]
            .iter()
            .position(|&b| b == b'<')
            .map(|first| from + first + 1)
            .and_then(|after| {
                bytes[after..]
                    .iter()
                    .position(|&b| b == b'<')
                    .map(|next| after + next)
            });
        match next {
            Some(offset) => self.resume_at(offset),
            None => self.done = true,
        }
    }
}

impl<'a> Iterator for StartTags<'a> {
    type Item = Tag<'a>;

    fn next(&mut self) -> Option<Tag<'a>> {
        while !self.done {
            let before = StartTags::position(self);
            // Bytes of `<` and `>` (and `/` for an empty element) around the content.
            let (content_len, delimiters) = match self.reader.read_event() {
                Ok(Event::Start(e)) => (e.len(), 2),
                Ok(Event::Empty(e)) => (e.len(), 3),
                Ok(Event::Eof) => {
                    self.done = true;
                    continue;
                }
                Ok(_) => continue,
                Err(_) => {
                    self.skip_markup_at(before);
                    continue;
                }
            };
            let after = StartTags::position(self);
            let Some(start) = after.checked_sub(content_len + delimiters) else {
                self.skip_markup_at(before);
                continue;
            };

            let Some((tag, end)) = lex_tag(self.html, start) else {
                self.skip_markup_at(start);
                continue;
            };
            if end != after {
                self.resume_at(end);
            }
            if !tag.self_closing && RAW_TEXT_ELEMENTS.iter().any(|name| tag.is(name)) {
                match find_end_tag(self.html, end, tag.name) {
                    Some(close) => self.resume_at(close),
                    None => self.done = true,
                }
            }
            return Some(tag);
        }
        None
    }
}

/// Offset of the `</name` that closes a raw text element opened before `from`.
fn find_end_tag(html: &str, from: usize, name: &str) -> Option<usize> {
    let needle = format!("</{}", name.to_ascii_lowercase());
    html[from..]
        .to_ascii_lowercase()
        .find(&needle)
        .map(|i| from + i)
}

/// Lex the start tag whose `<` is at `start`. Returns the tag and the offset
/// just past its closing `>`.
fn lex_tag(html: &str, start: usize) -> Option<(Tag<'_>, usize)> {
    let bytes = html.as_bytes();
    let name_start = start + 1;
    if !bytes.get(name_start)?.is_ascii_alphabetic() {
        return None;
    }
    let mut i = name_start;
    while bytes
        .get(i)
        .is_some_and(|&b| b.is_ascii_alphanumeric() || b == b'-' || b == b':')
    {
        i += 1;
    }
    let name = &html[name_start..i];

    let mut attrs = Vec::new();
    loop {
        while bytes.get(i)?.is_ascii_whitespace() {
            i += 1;
        }
        match bytes[i] {
            b'>' => {
                let tag = Tag {
                    name,
                    attrs,
                    insert_at: i,
                    self_closing: false,
                };
                return Some((tag, i + 1));
            }
            b'/' if bytes.get(i + 1) == Some(&b'>') => {
                let tag = Tag {
                    name,
                    attrs,
                    insert_at: i,
                    self_closing: true,
                };
                return Some((tag, i + 2));
            }
            b'/' => i += 1,
            _ => {
                let (attr, next) = lex_attr(html, i)?;
                attrs.push(attr);
                i = next;
            }
        }
    }
}

/// Lex one attribute starting at `start`. Returns it and the offset after it.
fn lex_attr(html: &str, start: usize) -> Option<(Attr<'_>, usize)> {
    let bytes = html.as_bytes();
    // The first character always belongs to the name, even `=`.
    let mut i = start + html[start..].chars().next()?.len_utf8();
    while bytes
        .get(i)
        .is_some_and(|&b| !b.is_ascii_whitespace() && !matches!(b, b'/' | b'>' | b'='))
    {
        i += 1;
    }
    let name = &html[start..i];

    let mut j = i;
    while bytes.get(j).is_some_and(u8::is_ascii_whitespace) {
        j += 1;
    }
    if bytes.get(j) != Some(&b'=') {
        let attr = Attr {
            name,
            value: None,
            value_range: None,
        };
        return Some((attr, i));
    }
    j += 1;
    while bytes.get(j)?.is_ascii_whitespace() {
        j += 1;
    }

    let (range, next) = match bytes[j] {
        quote @ (b'"' | b'\'') => {
            let close = j + 1 + bytes[j + 1..].iter().position(|&b| b == quote)?;
            (j + 1..close, close + 1)
        }
        _ => {
            let end = bytes[j..]
                .iter()
                .position(|&b| b.is_ascii_whitespace() || b == b'>')
                .map_or(bytes.len(), |p| j + p);
            (j..end, end)
        }
    };
    let attr = Attr {
        name,
        value: Some(&html[range.clone()]),
        value_range: Some(range),
    };
    Some((attr, next))
}

/// Apply non-overlapping edits to `html`.
pub fn apply_edits(html: &str, mut edits: Vec<(Range<usize>, String)>) -> String {
    edits.sort_by_key(|(range, _)| range.start);
    let mut out = String::with_capacity(html.len() + edits.len() * 16);
    let mut cursor = 0;
    for (range, replacement) in edits {
        if range.start < cursor {
            continue;
        }
        out.push_str(&html[cursor..range.start]);
        out.push_str(&replacement);
        cursor = range.end;
    }
    out.push_str(&html[cursor..]);
    out
}
