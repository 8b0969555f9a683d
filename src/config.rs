//! Site configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! serialized to a TOML value, the project's `config.toml` is merged on top,
//! and the result is deserialized with unknown keys rejected.
//!
//! ## Config File Location
//!
//! `config.toml` lives in the project root, next to the source directory:
//!
//! ```text
//! site/
//! ├── config.toml          # Overrides stock defaults
//! ├── src/                 # Source tree (`source`)
//! │   ├── index.md
//! │   └── about/index.md
//! └── build/               # Output (`destination`), replaced on each build
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! source = "src"
//! destination = "build"
//! site_name = "My Site"
//! ignore = ["**/.gitignore", "**/.DS_Store"]
//! remove_after_render = ["**/*.fakechild", "img/icons/orig/**"]
//!
//! [[defaults]]
//! pattern = "**/*.{html,md,hbs,md.hbs,fakechild}"
//! [defaults.values]
//! title = "My Site"
//! nav_show = true
//!
//! [ancestry]
//! sort_by = ["order_id", "title"]
//! sort_files_first = "**/index.{html,md,hbs,md.hbs}"
//! match = "**/*.{html,md,hbs,md.hbs,fakechild}"
//!
//! [external_links]
//! match_negative = ["^https?://([^/]*\\.)?example\\.com.*"]
//!
//! [[prefix]]
//! tag = "a"
//! attr = "href"
//!
//! [processing]
//! max_threads = 4
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse: tables merge key by key, everything else
//! (including the `[[defaults]]` and `[[prefix]]` arrays) replaces the stock
//! value wholesale.
//!
//! ```toml
//! # Only rename the site
//! site_name = "Example"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::ancestry::AncestryOptions;
use crate::defaults::DefaultsRule;
use crate::files::keys;
use crate::glob::{Glob, GlobError, GlobSet};
use crate::links::LinkClassifier;
use crate::prefix::PrefixRule;
use crate::render::SiteInfo;
use chrono::{Datelike, Local};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("Invalid glob: {0}")]
    Glob(#[from] GlobError),
    #[error("Invalid regex: {0}")]
    Regex(#[from] regex::Error),
}

/// Pages, templates and fake children: everything that becomes a page.
const PAGE_PATTERN: &str = "**/*.{html,md,hbs,md.hbs,fakechild}";

/// Directory index files: `index` plus exactly one renderable extension.
/// Must agree with [`crate::auto_defaults::INDEX_EXTENSIONS`].
const INDEX_PATTERN: &str = "**/index.{html,md,hbs,md.hbs}";

/// Site configuration loaded from `config.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Source directory, relative to the project root.
    pub source: String,
    /// Output directory, relative to the project root.
    pub destination: String,
    /// Site name shown in page titles and the footer.
    pub site_name: String,
    /// Globs excluded before any stage runs.
    pub ignore: Vec<String>,
    /// Build-only files dropped after rendering.
    pub remove_after_render: Vec<String>,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
    pub ancestry: AncestryConfig,
    pub external_links: ExternalLinksConfig,
    /// Cascade rules, applied in order.
    pub defaults: Vec<DefaultsConfig>,
    /// `(tag, attr)` pairs whose rooted URLs get the site URL prepended.
    pub prefix: Vec<PrefixConfig>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            source: "src".to_string(),
            destination: "build".to_string(),
            site_name: "My Site".to_string(),
            ignore: vec!["**/.gitignore".to_string(), "**/.DS_Store".to_string()],
            remove_after_render: vec![
                "**/*.fakechild".to_string(),
                "img/icons/orig/**".to_string(),
            ],
            processing: ProcessingConfig::default(),
            ancestry: AncestryConfig::default(),
            external_links: ExternalLinksConfig::default(),
            defaults: default_rules(),
            prefix: [("link", "href"), ("a", "href"), ("object", "data"), ("img", "src")]
                .into_iter()
                .map(|(tag, attr)| PrefixConfig {
                    tag: tag.to_string(),
                    attr: attr.to_string(),
                    convert_relatives: false,
                })
                .collect(),
        }
    }
}

fn default_rules() -> Vec<DefaultsConfig> {
    let mut page = toml::Table::new();
    page.insert("title".into(), "My Site".into());
    page.insert("layout".into(), "default".into());
    page.insert("stylesheet".into(), "base.css".into());
    page.insert("nav_show".into(), true.into());
    page.insert("parent_subpages".into(), false.into());
    page.insert("main_page".into(), false.into());
    page.insert("needs_link_to_top".into(), true.into());
    page.insert("order_id".into(), 50_i64.into());
    page.insert("overview_list".into(), false.into());
    page.insert("hide_page_title".into(), false.into());

    let mut error_pages = toml::Table::new();
    error_pages.insert("nav_show".into(), false.into());

    // Earlier rules win, so the narrower rule goes first.
    vec![
        DefaultsConfig {
            pattern: "error/**/*".to_string(),
            values: error_pages,
        },
        DefaultsConfig {
            pattern: PAGE_PATTERN.to_string(),
            values: page,
        },
    ]
}

impl SiteConfig {
    /// Validate config values and make sure every pattern compiles.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.trim().is_empty() || self.destination.trim().is_empty() {
            return Err(ConfigError::Validation(
                "source and destination must not be empty".into(),
            ));
        }
        if Path::new(&self.source) == Path::new(&self.destination) {
            return Err(ConfigError::Validation(
                "source and destination must differ".into(),
            ));
        }
        if self.ancestry.sort_by.is_empty() {
            return Err(ConfigError::Validation(
                "ancestry.sort_by must not be empty".into(),
            ));
        }
        let mut seen = HashSet::new();
        for key in &self.ancestry.sort_by {
            if key.is_empty() {
                return Err(ConfigError::Validation(
                    "ancestry.sort_by keys must not be empty".into(),
                ));
            }
            if !seen.insert(key) {
                return Err(ConfigError::Validation(format!(
                    "ancestry.sort_by lists `{key}` twice"
                )));
            }
        }
        for rule in &self.prefix {
            if rule.tag.is_empty() || rule.attr.is_empty() {
                return Err(ConfigError::Validation(
                    "prefix entries need a non-empty tag and attr".into(),
                ));
            }
        }
        if self.processing.max_threads == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_threads must be at least 1".into(),
            ));
        }

        GlobSet::new(&self.ignore)?;
        GlobSet::new(&self.remove_after_render)?;
        Glob::new(&self.ancestry.sort_files_first)?;
        Glob::new(&self.ancestry.pattern)?;
        for rule in &self.defaults {
            Glob::new(&rule.pattern)?;
        }
        LinkClassifier::new(&self.external_links.match_negative)?;
        Ok(())
    }

    /// Compile into the immutable configuration a build runs with.
    ///
    /// Relative `source`/`destination` are resolved against `root`. The site
    /// URL is normalized with [`normalize_site_url`] and becomes the prefix
    /// of every `[[prefix]]` rule.
    pub fn compile(&self, root: &Path, site_url: &str) -> Result<BuildConfig, ConfigError> {
        self.validate()?;
        let site_url = normalize_site_url(site_url);

        let mut defaults = self
            .defaults
            .iter()
            .map(|rule| {
                let values = rule
                    .values
                    .iter()
                    .map(|(k, v)| (k.clone(), toml_to_json(v)))
                    .collect::<BTreeMap<_, _>>();
                DefaultsRule::new(&rule.pattern, values)
            })
            .collect::<Result<Vec<_>, _>>()?;
        defaults.push(copyright_rule(&self.ancestry.pattern, current_year())?);

        let prefix = self
            .prefix
            .iter()
            .map(|rule| PrefixRule {
                tag: rule.tag.clone(),
                attr: rule.attr.clone(),
                prefix: site_url.clone(),
                convert_relatives: rule.convert_relatives,
            })
            .collect();

        Ok(BuildConfig {
            source: root.join(&self.source),
            destination: root.join(&self.destination),
            site: SiteInfo {
                name: self.site_name.clone(),
                url: site_url,
            },
            ignore: GlobSet::new(&self.ignore)?,
            remove_after_render: GlobSet::new(&self.remove_after_render)?,
            defaults,
            ancestry: AncestryOptions {
                sort_by: self.ancestry.sort_by.clone(),
                sort_files_first: Glob::new(&self.ancestry.sort_files_first)?,
                participants: Glob::new(&self.ancestry.pattern)?,
            },
            external_links: LinkClassifier::new(&self.external_links.match_negative)?,
            prefix,
            threads: effective_threads(&self.processing),
        })
    }
}

/// The year stamped into page footers when nothing else sets one.
pub fn current_year() -> i32 {
    Local::now().year()
}

/// Last cascade rule: every page gets `copyright_date = year` unless
/// frontmatter or an earlier `[[defaults]]` rule already set it.
fn copyright_rule(pattern: &str, year: i32) -> Result<DefaultsRule, GlobError> {
    let values = BTreeMap::from([(
        keys::COPYRIGHT_DATE.to_string(),
        serde_json::Value::from(year),
    )]);
    DefaultsRule::new(pattern, values)
}

/// One `[[defaults]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefaultsConfig {
    pub pattern: String,
    #[serde(default)]
    pub values: toml::Table,
}

/// Page tree settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AncestryConfig {
    /// Metadata keys siblings are sorted by, in priority order.
    pub sort_by: Vec<String>,
    /// Files matching this glob lead their directory and act as its index.
    pub sort_files_first: String,
    /// Only matching paths take part in the tree.
    #[serde(rename = "match")]
    pub pattern: String,
}

impl Default for AncestryConfig {
    fn default() -> Self {
        Self {
            sort_by: vec!["order_id".to_string(), "title".to_string()],
            sort_files_first: INDEX_PATTERN.to_string(),
            pattern: PAGE_PATTERN.to_string(),
        }
    }
}

/// External link decoration settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExternalLinksConfig {
    /// Regexes for absolute URLs that still count as internal.
    pub match_negative: Vec<String>,
}

/// One `[[prefix]]` entry. The prefix itself is the site URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrefixConfig {
    pub tag: String,
    pub attr: String,
    #[serde(default)]
    pub convert_relatives: bool,
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of worker threads.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_threads: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_threads.map(|n| n.min(cores)).unwrap_or(cores)
}

/// Everything a build needs, compiled and validated.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub site: SiteInfo,
    pub ignore: GlobSet,
    pub remove_after_render: GlobSet,
    pub defaults: Vec<DefaultsRule>,
    pub ancestry: AncestryOptions,
    pub external_links: LinkClassifier,
    pub prefix: Vec<PrefixRule>,
    pub threads: usize,
}

/// Strip one trailing `/` from the site URL.
///
/// `https://example.com/` → `https://example.com`; an empty URL means the
/// site is served from the root and no prefixing happens.
pub fn normalize_site_url(url: &str) -> String {
    let url = url.trim();
    url.strip_suffix('/').unwrap_or(url).to_string()
}

/// Convert a TOML value to the JSON value stored in metadata.
///
/// Datetimes become their RFC 3339 string.
pub fn toml_to_json(value: &toml::Value) -> serde_json::Value {
    use serde_json::Value as Json;
    match value {
        toml::Value::String(s) => Json::String(s.clone()),
        toml::Value::Integer(i) => Json::from(*i),
        toml::Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(Json::Number)
            .unwrap_or(Json::Null),
        toml::Value::Boolean(b) => Json::Bool(*b),
        toml::Value::Datetime(dt) => Json::String(dt.to_string()),
        toml::Value::Array(items) => Json::Array(items.iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Json::Object(
            table
                .iter()
                .map(|(k, v)| (k.clone(), toml_to_json(v)))
                .collect(),
        ),
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(SiteConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely, arrays of
///   tables included.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config_file(config_path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Load `config.toml` from a directory as a raw TOML value.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    load_raw_config_file(&path.join("config.toml"))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the given directory.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(root: &Path) -> Result<SiteConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(root)?;
    resolve_config(base, overlay)
}

/// Load config from an explicit file. Unlike [`load_config`], the file must exist.
pub fn load_config_file(path: &Path) -> Result<SiteConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let overlay: toml::Value = toml::from_str(&content)?;
    resolve_config(stock_defaults_value(), Some(overlay))
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# cascade-ssg Configuration
# =========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Tables merge key by key with the stock defaults. Arrays, including the
# [[defaults]] and [[prefix]] lists, replace the stock value entirely.
# Unknown keys will cause an error.

# Source tree and output directory, relative to the project root.
source = "src"
destination = "build"

# Shown in page titles and the footer.
site_name = "My Site"

# Files that never enter the build.
ignore = ["**/.gitignore", "**/.DS_Store"]

# Build-only files removed after rendering: nav stubs and icon sources.
remove_after_render = ["**/*.fakechild", "img/icons/orig/**"]

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum worker threads.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_threads = 4

# ---------------------------------------------------------------------------
# Page tree
# ---------------------------------------------------------------------------
[ancestry]
# Siblings sort by these metadata keys in order; missing values sort last.
sort_by = ["order_id", "title"]

# Matching files lead their directory and act as its index.
# Keep this to exact index names: `index.old.md` would otherwise compete
# with `index.md` for the directory.
sort_files_first = "**/index.{html,md,hbs,md.hbs}"

# Only matching files take part in the tree.
match = "**/*.{html,md,hbs,md.hbs,fakechild}"

# ---------------------------------------------------------------------------
# External links
# ---------------------------------------------------------------------------
[external_links]
# Absolute URLs matching any of these regexes still count as internal.
# match_negative = ["^https?://([^/]*\\.)?example\\.com.*"]
match_negative = []

# ---------------------------------------------------------------------------
# Metadata defaults
# ---------------------------------------------------------------------------
# Rules apply in order and never overwrite a value a file already has,
# so frontmatter always wins and earlier rules win over later ones.
[[defaults]]
pattern = "error/**/*"

[defaults.values]
nav_show = false

[[defaults]]
pattern = "**/*.{html,md,hbs,md.hbs,fakechild}"

[defaults.values]
title = "My Site"
layout = "default"
stylesheet = "base.css"
nav_show = true
parent_subpages = false
main_page = false
needs_link_to_top = true
order_id = 50
overview_list = false
hide_page_title = false
# description = "..."
# Pages without a copyright_date get the current year.
# copyright_date = 2024

# ---------------------------------------------------------------------------
# URL prefixing
# ---------------------------------------------------------------------------
# Rooted values of these attributes get the site URL (the SITE_URL argument)
# prepended. Set convert_relatives = true to prefix relative values too.
[[prefix]]
tag = "link"
attr = "href"
convert_relatives = false

[[prefix]]
tag = "a"
attr = "href"
convert_relatives = false

[[prefix]]
tag = "object"
attr = "data"
convert_relatives = false

[[prefix]]
tag = "img"
attr = "src"
convert_relatives = false
"##
}
