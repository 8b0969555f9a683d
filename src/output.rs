//! CLI output formatting for builds and checks.
//!
//! # Information-First Display
//!
//! Output is **information-centric, not file-centric**. Pages are listed by
//! their place in the page tree, title first, with the output path next to
//! it and the source path as indented context. Stage lines lead with what the
//! stage did, not how it is implemented.
//!
//! # Output Format
//!
//! ```text
//! Stages
//! 001 ignore              0 touched    4 → 4 files  0ms
//! 002 defaults           20 touched    4 → 4 files  0ms
//! ...
//!
//! Pages
//! 001 Home → index.html
//!     Source: index.md
//!     001 Contact → contact.html
//!         Source: contact.md
//!     002 About → about/index.html
//!         Source: about/index.md
//!         Description: Who we are
//!
//! Built 4 files (3 pages) in 12ms → build
//! ```
//!
//! # Architecture
//!
//! Each section has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::files::{Files, Metadata, keys};
use crate::pipeline::{BuildOutcome, RunReport};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Format an entity header: positional index + title, with optional target.
///
/// ```text
/// 001 About → about/index.html
/// 002 Drafts
/// ```
fn entity_header(index: usize, title: &str, target: Option<&str>) -> String {
    match target {
        Some(t) => format!("{} {} → {}", format_index(index), title, t),
        None => format!("{} {}", format_index(index), title),
    }
}

/// Truncate text to `max` characters, appending `...` if truncated.
fn truncate_desc(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        None => text.to_string(),
        Some((cut, _)) => format!("{}...", &text[..cut]),
    }
}

fn format_duration(d: Duration) -> String {
    if d < Duration::from_secs(1) {
        format!("{}ms", d.as_millis())
    } else {
        format!("{:.2}s", d.as_secs_f64())
    }
}

// ============================================================================
// Stages
// ============================================================================

/// One line per stage: what it touched and how the file count changed.
pub fn format_stage_reports(report: &RunReport) -> Vec<String> {
    let mut lines = vec!["Stages".to_string()];
    for (i, stage) in report.stages.iter().enumerate() {
        lines.push(format!(
            "{} {:<16} {:>4} touched  {:>3} → {} files  {}",
            format_index(i + 1),
            stage.name,
            stage.touched,
            stage.files_before,
            stage.files_after,
            format_duration(stage.duration)
        ));
    }
    lines
}

// ============================================================================
// Page tree
// ============================================================================

/// A page as the tree walker sees it.
struct PageEntry<'a> {
    output: &'a str,
    source: &'a str,
    meta: &'a Metadata,
}

impl PageEntry<'_> {
    fn title(&self) -> &str {
        self.meta.title().unwrap_or(self.source)
    }
}

/// Pages keyed by their source path.
fn collect_pages(files: &Files) -> HashMap<&str, PageEntry<'_>> {
    files
        .iter()
        .filter(|(_, file)| file.metadata.ancestry().is_some())
        .map(|(path, file)| {
            let source = file.metadata.str(keys::SOURCE_PATH).unwrap_or(path);
            (
                source,
                PageEntry {
                    output: path,
                    source,
                    meta: &file.metadata,
                },
            )
        })
        .collect()
}

/// Top of the tree: parentless pages, top-level group order first.
fn tree_roots<'a>(pages: &HashMap<&'a str, PageEntry<'a>>) -> Vec<&'a str> {
    let top: Vec<&str> = pages
        .values()
        .find_map(|p| p.meta.ancestry())
        .map(|a| a.root.iter().map(String::as_str).collect())
        .unwrap_or_default();
    let mut roots: Vec<&str> = pages
        .iter()
        .filter(|(_, p)| p.meta.ancestry().is_some_and(|a| a.parent.is_none()))
        .map(|(source, _)| *source)
        .collect();
    roots.sort_by_key(|s| (top.iter().position(|t| t == s).unwrap_or(usize::MAX), *s));
    roots
}

fn walk_pages(
    sources: &[&str],
    depth: usize,
    pages: &HashMap<&str, PageEntry<'_>>,
    visited: &mut HashSet<String>,
    lines: &mut Vec<String>,
) {
    let mut position = 0;
    for source in sources {
        let Some(page) = pages.get(source) else {
            continue;
        };
        if !visited.insert(source.to_string()) {
            continue;
        }
        position += 1;
        lines.push(format!(
            "{}{}",
            indent(depth),
            entity_header(position, page.title(), Some(page.output))
        ));
        if page.source != page.output {
            lines.push(format!("{}Source: {}", indent(depth + 1), page.source));
        }
        if let Some(desc) = page.meta.description() {
            lines.push(format!(
                "{}Description: {}",
                indent(depth + 1),
                truncate_desc(desc, 40)
            ));
        }
        let children: Vec<&str> = page
            .meta
            .ancestry()
            .map(|a| a.children.iter().map(String::as_str).collect())
            .unwrap_or_default();
        walk_pages(&children, depth + 1, pages, visited, lines);
    }
}

/// The page tree, walked from the top-level pages down.
pub fn format_page_tree(files: &Files) -> Vec<String> {
    let pages = collect_pages(files);
    if pages.is_empty() {
        return Vec::new();
    }
    let mut lines = vec!["Pages".to_string()];
    let roots = tree_roots(&pages);
    let mut visited = HashSet::new();
    walk_pages(&roots, 0, &pages, &mut visited, &mut lines);
    lines
}

// ============================================================================
// Build / check summary
// ============================================================================

/// Full report of a build. `destination` is `None` for a check.
pub fn format_build_output(outcome: &BuildOutcome, destination: Option<&Path>) -> Vec<String> {
    let mut lines = format_stage_reports(&outcome.report);

    let tree = format_page_tree(&outcome.files);
    let page_count = collect_pages(&outcome.files).len();
    if !tree.is_empty() {
        lines.push(String::new());
        lines.extend(tree);
    }

    lines.push(String::new());
    let duration = format_duration(outcome.report.duration);
    lines.push(match destination {
        Some(dest) => format!(
            "Built {} files ({} pages) in {} → {}",
            outcome.written,
            page_count,
            duration,
            dest.display()
        ),
        None => format!(
            "Checked {} files ({} pages) in {}, nothing written",
            outcome.files.len(),
            page_count,
            duration
        ),
    });
    lines
}

pub fn print_build_output(outcome: &BuildOutcome, destination: Option<&Path>) {
    for line in format_build_output(outcome, destination) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ancestry::{self, AncestryOptions};
    use crate::glob::Glob;
    use crate::pipeline::StageReport;
    use crate::test_helpers::*;
    use serde_json::json;

    fn resolved(entries: &[(&str, serde_json::Value)]) -> Files {
        let mut files = files_from(entries);
        ancestry::resolve(
            &mut files,
            &AncestryOptions {
                sort_by: vec!["order_id".into(), "title".into()],
                sort_files_first: Glob::new("**/index.{html,md,hbs,md.hbs}").unwrap(),
                participants: Glob::new("**/*.md").unwrap(),
            },
        )
        .unwrap();
        files
    }

    // =========================================================================
    // Helper tests
    // =========================================================================

    #[test]
    fn truncate_desc_short() {
        assert_eq!(truncate_desc("Short text", 40), "Short text");
    }

    #[test]
    fn truncate_desc_exact() {
        let text = "a".repeat(40);
        assert_eq!(truncate_desc(&text, 40), text);
    }

    #[test]
    fn truncate_desc_long() {
        let text = "a".repeat(50);
        let expected = format!("{}...", "a".repeat(40));
        assert_eq!(truncate_desc(&text, 40), expected);
    }

    #[test]
    fn truncate_desc_multibyte() {
        assert_eq!(truncate_desc("ééé", 2), "éé...");
    }

    #[test]
    fn format_index_pads_to_three() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(100), "100");
    }

    #[test]
    fn entity_header_with_target() {
        assert_eq!(
            entity_header(1, "About", Some("about/index.html")),
            "001 About → about/index.html"
        );
        assert_eq!(entity_header(2, "Drafts", None), "002 Drafts");
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(Duration::from_millis(12)), "12ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    }

    // =========================================================================
    // Stage reports
    // =========================================================================

    #[test]
    fn stage_lines_show_counts() {
        let report = RunReport {
            stages: vec![StageReport {
                name: "remove",
                files_before: 5,
                files_after: 3,
                touched: 2,
                duration: Duration::from_millis(4),
            }],
            duration: Duration::from_millis(4),
        };
        let lines = format_stage_reports(&report);
        assert_eq!(lines[0], "Stages");
        assert_eq!(lines[1], "001 remove              2 touched    5 → 3 files  4ms");
    }

    // =========================================================================
    // Page tree
    // =========================================================================

    #[test]
    fn page_tree_nests_children() {
        let files = resolved(&[
            ("index.md", json!({"title": "Home"})),
            ("contact.md", json!({"title": "Contact", "order_id": 1})),
            ("about/index.md", json!({"title": "About", "order_id": 2, "description": "Who we are"})),
            ("about/team.md", json!({"title": "Team"})),
            ("img/logo.svg", json!({})),
        ]);

        let lines = format_page_tree(&files);

        assert_eq!(
            lines,
            [
                "Pages",
                "001 Home → index.md",
                "    001 Contact → contact.md",
                "    002 About → about/index.md",
                "        Description: Who we are",
                "        001 Team → about/team.md",
            ]
        );
    }

    #[test]
    fn page_tree_shows_source_of_moved_files() {
        let mut files = resolved(&[("index.md", json!({"title": "Home"}))]);
        crate::render::render_in_place(&mut files).unwrap();

        let lines = format_page_tree(&files);

        assert_eq!(lines[1], "001 Home → index.html");
        assert_eq!(lines[2], "    Source: index.md");
    }

    #[test]
    fn orphan_directories_are_listed_at_top_level() {
        let files = resolved(&[
            ("index.md", json!({"title": "Home"})),
            ("drafts/one.md", json!({"title": "One"})),
        ]);
        let lines = format_page_tree(&files);
        assert_eq!(lines[1], "001 Home → index.md");
        assert_eq!(lines[2], "002 One → drafts/one.md");
    }

    #[test]
    fn no_pages_no_section() {
        let files = files_from(&[("img/logo.svg", json!({}))]);
        assert!(format_page_tree(&files).is_empty());
    }

    #[test]
    fn check_summary_mentions_nothing_written() {
        let files = resolved(&[("index.md", json!({"title": "Home"}))]);
        let outcome = BuildOutcome {
            report: RunReport::default(),
            files,
            written: 0,
        };
        let lines = format_build_output(&outcome, None);
        assert_eq!(
            lines.last().unwrap(),
            "Checked 1 files (1 pages) in 0ms, nothing written"
        );

        let lines = format_build_output(&outcome, Some(Path::new("build")));
        assert!(lines.last().unwrap().ends_with("→ build"));
    }
}
