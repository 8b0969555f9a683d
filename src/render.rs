//! Page rendering.
//!
//! Two stages turn source documents into pages:
//!
//! - **markdown**: Markdown bodies (`.md`, `.md.hbs`) are converted to HTML
//!   fragments with [pulldown-cmark](https://docs.rs/pulldown-cmark), and
//!   every renderable source is moved to its `.html` path
//!   (`about/index.md` → `about/index.html`). Template sources (`.hbs`) are
//!   passed through as HTML.
//! - **layouts**: every `.html` page with a `layout` gets wrapped in the site
//!   shell, rendered with [Maud](https://maud.lambda.xyz/): head, top-level
//!   navigation, breadcrumb, page title, optional sub-page list and footer.
//!
//! Navigation, breadcrumbs and sub-page lists are driven entirely by the
//! ancestry nodes and canonical URIs computed by the earlier stages. Ancestry
//! refers to files by their *source* path, so the markdown stage records the
//! original path under `source_path` when it moves a file.

use crate::ancestry::Ancestry;
use crate::auto_defaults::derive_uri;
use crate::files::{Files, Metadata, keys};
use crate::pipeline::StageError;
use log::debug;
use maud::{DOCTYPE, Markup, PreEscaped, html};
use pulldown_cmark::{Options, Parser, html as md_html};
use rayon::prelude::*;
use serde_json::Value;
use std::collections::HashMap;

/// Site-wide values available to every layout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteInfo {
    pub name: String,
    /// Public base URL without trailing slash; empty when served from root.
    pub url: String,
}

const MARKDOWN_SUFFIXES: &[&str] = &[".md.hbs", ".md"];
const TEMPLATE_SUFFIXES: &[&str] = &[".hbs"];

/// The `.html` path a source renders to, or `None` if it is not rendered.
pub fn rendered_path(path: &str) -> Option<String> {
    MARKDOWN_SUFFIXES
        .iter()
        .chain(TEMPLATE_SUFFIXES)
        .find_map(|suffix| path.strip_suffix(suffix))
        .map(|stem| format!("{stem}.html"))
}

fn is_markdown(path: &str) -> bool {
    MARKDOWN_SUFFIXES.iter().any(|s| path.ends_with(s))
}

pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_FOOTNOTES);
    let parser = Parser::new_ext(markdown, options);
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    md_html::push_html(&mut out, parser);
    out
}

/// Render Markdown bodies and move every renderable source to its `.html`
/// path. Returns the number of files rendered.
pub fn render_in_place(files: &mut Files) -> Result<usize, StageError> {
    files
        .par_iter_mut()
        .filter(|(path, _)| is_markdown(path))
        .try_for_each(|(path, file)| {
            let markdown = file.text().ok_or_else(|| StageError::NotUtf8 {
                path: path.clone(),
            })?;
            let html = markdown_to_html(markdown);
            file.set_text(html);
            Ok::<(), StageError>(())
        })?;

    let moves: Vec<(String, String)> = files
        .paths()
        .filter_map(|path| rendered_path(path).map(|to| (path.to_string(), to)))
        .collect();
    for (from, to) in &moves {
        files.rename(from, to)?;
        if let Some(file) = files.get_mut(to) {
            file.metadata.insert(keys::SOURCE_PATH, from.as_str());
        }
        debug!("rendered {from} -> {to}");
    }
    Ok(moves.len())
}

/// What a layout needs to know about other pages.
#[derive(Debug, Clone)]
struct PageRef {
    title: String,
    uri: String,
    description: Option<String>,
    nav_show: bool,
    parent: Option<String>,
    children: Vec<String>,
}

/// Pages keyed by source path, plus the top-level navigation order.
#[derive(Debug, Default)]
struct PageIndex {
    pages: HashMap<String, PageRef>,
    nav: Vec<String>,
}

impl PageIndex {
    fn build(files: &Files) -> Self {
        let mut pages = HashMap::new();
        let mut top: Vec<String> = Vec::new();
        for (path, file) in files.iter() {
            let meta = &file.metadata;
            let Some(ancestry) = meta.ancestry() else {
                continue;
            };
            let source = meta.str(keys::SOURCE_PATH).unwrap_or(path).to_string();
            if top.is_empty() {
                top = ancestry.root.clone();
            }
            let page = PageRef {
                title: meta.title().unwrap_or(&source).to_string(),
                uri: meta
                    .uri()
                    .map(str::to_string)
                    .unwrap_or_else(|| derive_uri(&source)),
                description: meta.description().map(str::to_string),
                nav_show: meta.nav_show(),
                parent: ancestry.parent.clone(),
                children: ancestry.children.clone(),
            };
            pages.insert(source, page);
        }

        // Home page first, then its children; without a home page, the top level.
        let home_children = top
            .first()
            .and_then(|first| pages.get(first))
            .filter(|home| home.parent.is_none())
            .map(|home| home.children.clone())
            .unwrap_or_default();
        let nav = if home_children.is_empty() {
            top
        } else {
            top.into_iter().take(1).chain(home_children).collect()
        };

        Self { pages, nav }
    }

    fn get(&self, source: &str) -> Option<&PageRef> {
        self.pages.get(source)
    }

    /// Ancestors of a page from the top down, excluding the page itself.
    fn trail(&self, ancestry: Option<&Ancestry>) -> Vec<&PageRef> {
        let mut trail = Vec::new();
        let mut next = ancestry.and_then(|a| a.parent.as_deref());
        while let Some(source) = next {
            let Some(page) = self.get(source) else { break };
            if trail.len() > self.pages.len() {
                break;
            }
            trail.push(page);
            next = page.parent.as_deref();
        }
        trail.reverse();
        trail
    }
}

fn wants_layout(meta: &Metadata) -> bool {
    match meta.get(keys::LAYOUT) {
        Some(Value::String(s)) => !s.is_empty() && s != "none",
        Some(Value::Bool(b)) => *b,
        _ => false,
    }
}

fn copyright(meta: &Metadata) -> Option<String> {
    match meta.get(keys::COPYRIGHT_DATE)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn render_nav(index: &PageIndex, current_uri: &str) -> Markup {
    html! {
        ul {
            @for source in &index.nav {
                @if let Some(page) = index.get(source).filter(|p| p.nav_show) {
                    @let is_current = page.uri == current_uri;
                    li class=[is_current.then_some("current")] {
                        a href=(page.uri) { (page.title) }
                    }
                }
            }
        }
    }
}

fn render_breadcrumb(trail: &[&PageRef], title: &str) -> Markup {
    html! {
        @if !trail.is_empty() {
            nav.breadcrumb {
                @for page in trail {
                    a href=(page.uri) { (page.title) }
                    " › "
                }
                span { (title) }
            }
        }
    }
}

/// Links to the page's children; an overview list adds their descriptions.
fn render_subpages(index: &PageIndex, ancestry: Option<&Ancestry>, overview: bool) -> Markup {
    let children: Vec<&PageRef> = ancestry
        .map(|a| a.children.iter().filter_map(|c| index.get(c)).collect())
        .unwrap_or_default();
    html! {
        @if !children.is_empty() {
            ul.subpages.overview[overview] {
                @for child in children {
                    li {
                        a href=(child.uri) { (child.title) }
                        @if let (true, Some(desc)) = (overview, &child.description) {
                            p { (desc) }
                        }
                    }
                }
            }
        }
    }
}

fn render_page(meta: &Metadata, body: &str, index: &PageIndex, site: &SiteInfo) -> Markup {
    let title = meta.title().unwrap_or(&site.name);
    let uri = meta.uri().unwrap_or("");
    let ancestry = meta.ancestry();
    let trail = index.trail(ancestry);
    let head_title = if site.name.is_empty() || title == site.name {
        title.to_string()
    } else {
        format!("{title} · {}", site.name)
    };

    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (head_title) }
                @if let Some(desc) = meta.description() {
                    meta name="description" content=(desc);
                }
                @if !site.url.is_empty() && !uri.is_empty() {
                    link rel="canonical" href={ (site.url) (uri) };
                }
                @if let Some(css) = meta.str(keys::STYLESHEET) {
                    link rel="stylesheet" href={ "/" (css.trim_start_matches('/')) };
                }
            }
            body.main-page[meta.main_page()] id="top" {
                header.site-header {
                    (render_breadcrumb(&trail, title))
                    nav.site-nav { (render_nav(index, uri)) }
                }
                main {
                    @if !meta.hide_page_title() {
                        h1 { (title) }
                    }
                    (PreEscaped(body))
                    @if meta.parent_subpages() || meta.overview_list() {
                        (render_subpages(index, ancestry, meta.overview_list()))
                    }
                }
                footer.site-footer {
                    @if meta.needs_link_to_top() {
                        a.to-top href="#top" { "Back to top" }
                    }
                    @if let Some(year) = copyright(meta) {
                        p.copyright { "© " (year) " " (site.name) }
                    }
                }
            }
        }
    }
}

/// Wrap every `.html` page that has a layout. Returns the number wrapped.
pub fn apply_layouts(files: &mut Files, site: &SiteInfo) -> Result<usize, StageError> {
    let index = PageIndex::build(files);
    files
        .par_iter_mut()
        .filter(|(path, file)| path.ends_with(".html") && wants_layout(&file.metadata))
        .map(|(path, file)| {
            let body = file.text().ok_or_else(|| StageError::NotUtf8 {
                path: path.clone(),
            })?;
            let page = render_page(&file.metadata, body, &index, site).into_string();
            file.set_text(page);
            Ok(1)
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ancestry::{self, AncestryOptions};
    use crate::auto_defaults::apply_auto_defaults;
    use crate::glob::Glob;
    use crate::test_helpers::*;
    use serde_json::json;

    fn prepare(files: &mut Files) {
        let pages = Glob::new("**/*.{html,md,hbs,md.hbs}").unwrap();
        ancestry::resolve(
            files,
            &AncestryOptions {
                sort_by: vec!["order_id".into(), "title".into()],
                sort_files_first: Glob::new("**/index.{html,md,hbs,md.hbs}").unwrap(),
                participants: pages.clone(),
            },
        )
        .unwrap();
        apply_auto_defaults(files, &pages, derive_uri);
    }

    fn site() -> SiteInfo {
        SiteInfo {
            name: "Example".into(),
            url: String::new(),
        }
    }

    #[test]
    fn rendered_paths() {
        assert_eq!(rendered_path("index.md").as_deref(), Some("index.html"));
        assert_eq!(rendered_path("a/b.md.hbs").as_deref(), Some("a/b.html"));
        assert_eq!(rendered_path("faq.hbs").as_deref(), Some("faq.html"));
        assert_eq!(rendered_path("page.html"), None);
        assert_eq!(rendered_path("css/base.scss"), None);
    }

    #[test]
    fn markdown_renders_inline_and_tables() {
        let html = markdown_to_html("This is **bold**.\n\n| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(html.contains("<strong>bold</strong>"));
        assert!(html.contains("<table>"));
    }

    #[test]
    fn render_in_place_moves_and_records_source() {
        let mut files = files_from(&[
            ("about/index.md", json!({"title": "About"})),
            ("faq.hbs", json!({})),
            ("img/logo.svg", json!({})),
        ]);
        files.get_mut("about/index.md").unwrap().set_text("*hi*".into());
        files.get_mut("faq.hbs").unwrap().set_text("<p>raw</p>".into());

        let rendered = render_in_place(&mut files).unwrap();

        assert_eq!(rendered, 2);
        let about = find_file(&files, "about/index.html");
        assert_eq!(about.text(), Some("<p><em>hi</em></p>\n"));
        assert_eq!(about.metadata.str(keys::SOURCE_PATH), Some("about/index.md"));
        assert_eq!(find_file(&files, "faq.html").text(), Some("<p>raw</p>"));
        assert!(files.contains("img/logo.svg"));
        assert!(!files.contains("about/index.md"));
    }

    #[test]
    fn render_in_place_refuses_collisions() {
        let mut files = files_from(&[("page.md", json!({})), ("page.html", json!({}))]);
        let err = render_in_place(&mut files).unwrap_err();
        assert!(matches!(err, StageError::Files(_)));
    }

    #[test]
    fn layout_wraps_page_with_nav_and_title() {
        let mut files = files_from(&[
            ("index.md", json!({"title": "Home", "layout": "default", "nav_show": true, "order_id": 1})),
            ("about/index.md", json!({"title": "About", "layout": "default", "nav_show": true, "order_id": 2})),
            ("secret.md", json!({"title": "Secret", "layout": "default", "nav_show": false})),
        ]);
        prepare(&mut files);
        render_in_place(&mut files).unwrap();

        let wrapped = apply_layouts(&mut files, &site()).unwrap();

        assert_eq!(wrapped, 3);
        let about = find_file(&files, "about/index.html").text().unwrap();
        assert!(about.starts_with("<!DOCTYPE html>"));
        assert!(about.contains("<title>About · Example</title>"));
        assert!(about.contains(r#"<a href="/about/">About</a>"#));
        assert!(about.contains(r#"<a href="/">Home</a>"#));
        assert!(about.contains("<h1>About</h1>"));
        assert!(!about.contains("Secret"));
        // breadcrumb back to the home page
        assert!(about.contains(r#"<nav class="breadcrumb">"#));
    }

    #[test]
    fn layout_respects_page_flags() {
        let mut files = files_from(&[
            ("index.md", json!({
                "title": "Home", "layout": "default", "hide_page_title": true,
                "overview_list": true, "needs_link_to_top": true, "copyright_date": 2024,
                "main_page": true
            })),
            ("guide.md", json!({"title": "Guide", "description": "How to"})),
        ]);
        prepare(&mut files);
        render_in_place(&mut files).unwrap();
        apply_layouts(&mut files, &site()).unwrap();

        let home = find_file(&files, "index.html").text().unwrap();
        assert!(!home.contains("<h1>"));
        assert!(home.contains(r#"<body class="main-page" id="top">"#));
        assert!(home.contains(r#"<ul class="subpages overview">"#));
        assert!(home.contains(r#"<a href="/guide.html">Guide</a>"#));
        assert!(home.contains("<p>How to</p>"));
        assert!(home.contains(r##"href="#top""##));
        assert!(home.contains("© 2024 Example"));

        // guide.md has no layout and stays a fragment
        assert!(!find_file(&files, "guide.html").text().unwrap().contains("<html"));
    }

    #[test]
    fn canonical_link_only_with_site_url() {
        let mut files = files_from(&[("about/index.md", json!({"title": "About", "layout": "default"}))]);
        prepare(&mut files);
        render_in_place(&mut files).unwrap();
        let mut served = files.clone();

        apply_layouts(&mut files, &site()).unwrap();
        let hosted = SiteInfo {
            url: "https://example.com".into(),
            ..site()
        };
        apply_layouts(&mut served, &hosted).unwrap();

        assert!(!find_file(&files, "about/index.html").text().unwrap().contains("canonical"));
        assert!(
            find_file(&served, "about/index.html")
                .text()
                .unwrap()
                .contains(r#"<link rel="canonical" href="https://example.com/about/">"#)
        );
    }

    #[test]
    fn layout_none_is_skipped() {
        let mut meta = Metadata::new();
        meta.insert("layout", "none");
        assert!(!wants_layout(&meta));
        meta.insert("layout", false);
        assert!(!wants_layout(&meta));
        meta.insert("layout", "default.hbs");
        assert!(wants_layout(&meta));
    }
}
