//! # cascade-ssg
//!
//! A static site generator built around a metadata cascade. The source tree
//! is loaded into memory once, passed through a fixed list of stages that
//! enrich metadata and rewrite contents, and written out in one atomic step.
//!
//! # Architecture: One Collection, Ordered Stages
//!
//! ```text
//! src/ ──load──► Files ──ignore──► defaults ──► ancestry ──► auto-defaults
//!                      ──► markdown ──► layouts ──► external-links ──► prefix
//!                      ──► remove ──write──► build/
//! ```
//!
//! Every stage is a function from `&mut Files` to a count of what it touched.
//! Stages run strictly in order, and the first failure aborts the build
//! before anything is written.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`files`] | The path-keyed file collection and its open metadata map |
//! | [`glob`] | Glob patterns (`**`, `{a,b}`, `[!x]`) compiled to anchored regexes |
//! | [`frontmatter`] | YAML frontmatter splitting and parsing |
//! | [`scan`] | Loads the source tree into a collection |
//! | [`defaults`] | Pattern-matched metadata defaults that never overwrite |
//! | [`ancestry`] | Parent, children, siblings and previous/next per page |
//! | [`auto_defaults`] | Canonical URI and position-dependent defaults |
//! | [`render`] | Markdown rendering and the Maud page shell |
//! | [`markup`] | Start-tag scanner shared by the link stages |
//! | [`links`] | Internal/external link classification and decoration |
//! | [`prefix`] | Prepends the site URL to rooted attribute values |
//! | [`pipeline`] | Stage list, runner and per-stage reports |
//! | [`write`] | Atomic output via a staging directory |
//! | [`config`] | `config.toml` loading, merging and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## A Static Stage List
//!
//! The pipeline is an enum of known stages fixed when the configuration is
//! compiled, not a registry of plugins discovered at runtime. Collaborators
//! the crate does not ship (favicons, Sass, bundling) are closures wrapped
//! in [`pipeline::ExternalStage`] and inserted with
//! [`pipeline::Pipeline::with_stage_after`].
//!
//! ## Open Metadata, Typed Edges
//!
//! Frontmatter is user-defined, so metadata is an open map of JSON values
//! with typed accessors for the keys the stages care about. The page tree is
//! the exception: ancestry lives in a typed slot and is only flattened into
//! the map on export.
//!
//! ## Frontmatter Always Wins
//!
//! Cascade defaults and computed defaults only fill keys that are missing.
//! A page can always opt out of a default by setting the key itself, even to
//! `false`.
//!
//! ## Nothing Half-Written
//!
//! Output goes to a sibling staging directory first and is swapped in only
//! after every file is on disk. A failed stage writes nothing at all.

pub mod ancestry;
pub mod auto_defaults;
pub mod config;
pub mod defaults;
pub mod files;
pub mod frontmatter;
pub mod glob;
pub mod links;
pub mod markup;
pub mod output;
pub mod pipeline;
pub mod prefix;
pub mod render;
pub mod scan;
pub mod write;

#[cfg(test)]
pub(crate) mod test_helpers;
