//! The build pipeline.
//!
//! A [`Pipeline`] is a fixed, ordered list of [`Stage`]s decided once at
//! configuration time. Every stage receives the whole [`Files`] collection
//! and finishes before the next one starts; the first failing stage aborts
//! the run and nothing is written.
//!
//! ```text
//! load ─► ignore ─► defaults ─► ancestry ─► auto-defaults ─► markdown
//!      ─► layouts ─► external-links ─► prefix ─► remove ─► write
//! ```
//!
//! Collaborators the crate does not provide (favicon generation, Sass, JS
//! bundling) plug in as [`Stage::External`] entries via
//! [`Pipeline::with_stage`] and [`Pipeline::with_stage_after`].

use crate::ancestry::{self, AncestryError, AncestryOptions};
use crate::auto_defaults::{self, apply_auto_defaults};
use crate::config::{BuildConfig, ConfigError};
use crate::defaults::{DefaultsRule, apply_defaults};
use crate::files::{Files, FilesError};
use crate::glob::{Glob, GlobSet};
use crate::links::{LinkClassifier, decorate_external_links};
use crate::prefix::{PrefixRule, apply_prefix};
use crate::render::{self, SiteInfo};
use crate::scan::{self, ScanError};
use crate::write::{WriteError, write_output};
use log::debug;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Failure inside a single stage.
#[derive(Error, Debug)]
pub enum StageError {
    #[error(transparent)]
    Ancestry(#[from] AncestryError),
    #[error(transparent)]
    Files(#[from] FilesError),
    #[error("{path}: contents are not valid UTF-8")]
    NotUtf8 { path: String },
    #[error("{path}: {message}")]
    Render { path: String, message: String },
    #[error("{0}")]
    External(String),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Loading source tree failed: {0}")]
    Load(#[from] ScanError),
    #[error("Stage `{stage}` failed: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: StageError,
    },
    #[error("Writing output failed: {0}")]
    Write(#[from] WriteError),
    #[error("No stage named `{0}`")]
    UnknownStage(String),
}

/// An external collaborator: may add, remove or modify files.
///
/// Wraps a closure so collaborators can carry their own options (source
/// and destination paths, tool arguments) into the static stage list.
#[derive(Clone)]
pub struct ExternalStage(Arc<dyn Fn(&mut Files) -> Result<(), StageError> + Send + Sync>);

impl ExternalStage {
    pub fn new(run: impl Fn(&mut Files) -> Result<(), StageError> + Send + Sync + 'static) -> Self {
        Self(Arc::new(run))
    }

    pub fn call(&self, files: &mut Files) -> Result<(), StageError> {
        (self.0)(files)
    }
}

impl fmt::Debug for ExternalStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ExternalStage(..)")
    }
}

/// One step of the pipeline.
#[derive(Debug, Clone)]
pub enum Stage {
    Ignore(GlobSet),
    Defaults(Vec<DefaultsRule>),
    Ancestry(AncestryOptions),
    AutoDefaults {
        participants: Glob,
        derive_uri: fn(&str) -> String,
    },
    Markdown,
    Layouts(SiteInfo),
    ExternalLinks(LinkClassifier),
    Prefix(Vec<PrefixRule>),
    Remove(GlobSet),
    External {
        name: &'static str,
        run: ExternalStage,
    },
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Ignore(_) => "ignore",
            Stage::Defaults(_) => "defaults",
            Stage::Ancestry(_) => "ancestry",
            Stage::AutoDefaults { .. } => "auto-defaults",
            Stage::Markdown => "markdown",
            Stage::Layouts(_) => "layouts",
            Stage::ExternalLinks(_) => "external-links",
            Stage::Prefix(_) => "prefix",
            Stage::Remove(_) => "remove",
            Stage::External { name, .. } => *name,
        }
    }

    /// Run the stage. Returns how many files (or keys) it touched.
    pub fn apply(&self, files: &mut Files) -> Result<usize, StageError> {
        match self {
            Stage::Ignore(globs) | Stage::Remove(globs) => Ok(drop_matching(files, globs)),
            Stage::Defaults(rules) => Ok(apply_defaults(files, rules)),
            Stage::Ancestry(options) => Ok(ancestry::resolve(files, options)?),
            Stage::AutoDefaults {
                participants,
                derive_uri,
            } => Ok(apply_auto_defaults(files, participants, *derive_uri)),
            Stage::Markdown => render::render_in_place(files),
            Stage::Layouts(site) => render::apply_layouts(files, site),
            Stage::ExternalLinks(classifier) => decorate_external_links(files, classifier),
            Stage::Prefix(rules) => apply_prefix(files, rules),
            Stage::External { run, .. } => {
                let before = files.len();
                run.call(files)?;
                Ok(files.len().abs_diff(before))
            }
        }
    }
}

fn drop_matching(files: &mut Files, globs: &GlobSet) -> usize {
    if globs.is_empty() {
        return 0;
    }
    let before = files.len();
    files.retain(|path, _| !globs.is_match(path));
    before - files.len()
}

/// What one stage did.
#[derive(Debug, Clone, PartialEq)]
pub struct StageReport {
    pub name: &'static str,
    pub files_before: usize,
    pub files_after: usize,
    pub touched: usize,
    pub duration: Duration,
}

/// Per-stage reports of a complete run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub stages: Vec<StageReport>,
    pub duration: Duration,
}

/// Result of [`Pipeline::build`] or [`Pipeline::check`].
#[derive(Debug)]
pub struct BuildOutcome {
    pub report: RunReport,
    /// The final collection, as written (or as it would be written).
    pub files: Files,
    /// Files written to the destination; zero for a check.
    pub written: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    /// The standard stage list for a compiled configuration.
    pub fn standard(config: &BuildConfig) -> Self {
        Self::new(vec![
            Stage::Ignore(config.ignore.clone()),
            Stage::Defaults(config.defaults.clone()),
            Stage::Ancestry(config.ancestry.clone()),
            Stage::AutoDefaults {
                participants: config.ancestry.participants.clone(),
                derive_uri: auto_defaults::derive_uri,
            },
            Stage::Markdown,
            Stage::Layouts(config.site.clone()),
            Stage::ExternalLinks(config.external_links.clone()),
            Stage::Prefix(config.prefix.clone()),
            Stage::Remove(config.remove_after_render.clone()),
        ])
    }

    /// Append a stage.
    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Insert a stage right after the stage named `after`.
    pub fn with_stage_after(mut self, after: &str, stage: Stage) -> Result<Self, PipelineError> {
        let position = self
            .stages
            .iter()
            .position(|s| s.name() == after)
            .ok_or_else(|| PipelineError::UnknownStage(after.to_string()))?;
        self.stages.insert(position + 1, stage);
        Ok(self)
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Run every stage in order, stopping at the first failure.
    pub fn run(&self, files: &mut Files) -> Result<RunReport, PipelineError> {
        let started = Instant::now();
        let mut stages = Vec::with_capacity(self.stages.len());
        for stage in &self.stages {
            let name = stage.name();
            let files_before = files.len();
            let stage_started = Instant::now();
            let touched = stage
                .apply(files)
                .map_err(|source| PipelineError::Stage { stage: name, source })?;
            let report = StageReport {
                name,
                files_before,
                files_after: files.len(),
                touched,
                duration: stage_started.elapsed(),
            };
            debug!(
                "stage {name}: {} -> {} files, {touched} touched in {:?}",
                report.files_before, report.files_after, report.duration
            );
            stages.push(report);
        }
        Ok(RunReport {
            stages,
            duration: started.elapsed(),
        })
    }

    /// Load the source tree and run every stage without writing anything.
    pub fn check(&self, config: &BuildConfig) -> Result<BuildOutcome, PipelineError> {
        let mut files = scan::scan(&config.source, &config.ignore)?;
        let report = self.run(&mut files)?;
        Ok(BuildOutcome {
            report,
            files,
            written: 0,
        })
    }

    /// Load, run every stage, then replace the destination with the result.
    pub fn build(&self, config: &BuildConfig) -> Result<BuildOutcome, PipelineError> {
        let mut outcome = self.check(config)?;
        outcome.written = write_output(&outcome.files, &config.destination)?;
        debug!(
            "wrote {} files to {}",
            outcome.written,
            config.destination.display()
        );
        Ok(outcome)
    }
}
