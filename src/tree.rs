//! Site tree building: walk a source root, render every document, write
//! the results under an output root.
//!
//! # Path mapping
//!
//! | Source | Output |
//! |--------|--------|
//! | `docs/intro.md` | `<output>/docs/intro/index.html` |
//! | `docs/table.html` | `<output>/docs/table.html` |
//!
//! # Skip rule
//!
//! A document is skipped when its output path already exists. Several trees
//! are built into the same output root one after another (a locale's own
//! tree, then the shared tree), so a page written by an earlier tree is
//! never overwritten by a later one. A document that writes nothing
//! (unmappable or failed) leaves its path free for later trees.
//!
//! Within one tree, documents mapping to the same output path are tried in
//! walk order, files of a directory before its subdirectories, until one of
//! them writes the page.

use crate::{
    context::Context,
    log,
    render::{Rendered, Renderer, SourceKind},
    utils::minify::minify_html,
};
use anyhow::{Context as _, Result, bail};
use parking_lot::Mutex;
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use std::{
    fs,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

/// Output file name for Markdown documents
const INDEX_FILE: &str = "index.html";

/// Output paths claimed during one build.
#[derive(Debug, Default)]
pub struct OutputClaims {
    claimed: Mutex<FxHashSet<PathBuf>>,
}

impl OutputClaims {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically claim `path` for writing.
    ///
    /// Returns false when the path was claimed earlier in this build or
    /// already exists on disk.
    pub fn claim(&self, path: &Path) -> bool {
        let mut claimed = self.claimed.lock();
        if claimed.contains(path) || path.exists() {
            return false;
        }
        claimed.insert(path.to_path_buf())
    }

    /// Give up a claim whose document wrote nothing.
    pub fn release(&self, path: &Path) {
        self.claimed.lock().remove(path);
    }
}

/// Compute where a document lands in the output tree.
pub fn output_path(relative: &Path, output_root: &Path, kind: SourceKind) -> PathBuf {
    match kind {
        SourceKind::Markdown => output_root.join(relative.with_extension("")).join(INDEX_FILE),
        SourceKind::Html => output_root.join(relative),
    }
}

/// One source root to build into one output root.
#[derive(Debug, Clone, Copy)]
pub struct TreeJob<'a> {
    pub source: &'a Path,
    pub output: &'a Path,
    pub context: &'a Context,
    /// Top-level directory names not walked (locale subtrees)
    pub exclude: &'a [String],
    /// Locale label for progress lines; `None` for the default locale
    pub locale: Option<&'a str>,
}

/// Per-tree document counts.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TreeReport {
    pub written: usize,
    /// Output path already written
    pub skipped: usize,
    /// Markdown without a leading `extends` directive
    pub unmappable: usize,
    /// Documents whose render failed, with the error message
    pub failed: Vec<(PathBuf, String)>,
}

impl TreeReport {
    pub fn merge(&mut self, other: Self) {
        self.written += other.written;
        self.skipped += other.skipped;
        self.unmappable += other.unmappable;
        self.failed.extend(other.failed);
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Written => self.written += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Unmappable => self.unmappable += 1,
            Outcome::Failed(path, message) => self.failed.push((path, message)),
        }
    }
}

enum Outcome {
    Written,
    Skipped,
    Unmappable,
    Failed(PathBuf, String),
}

/// Renders source trees into output trees, sharing one set of claims.
pub struct TreeBuilder<'a> {
    renderer: &'a Renderer<'a>,
    claims: &'a OutputClaims,
    minify: bool,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(renderer: &'a Renderer<'a>, claims: &'a OutputClaims, minify: bool) -> Self {
        Self {
            renderer,
            claims,
            minify,
        }
    }

    /// Build every document of `job.source` into `job.output`.
    ///
    /// Document-level render failures are logged and reported; I/O failures
    /// abort the build.
    pub fn build(&self, job: &TreeJob<'_>) -> Result<TreeReport> {
        if !job.source.is_dir() {
            bail!("source root `{}` is not a directory", job.source.display());
        }

        let targets = plan_targets(collect_documents(job.source, job.exclude)?, job)?;
        let outcomes = targets
            .par_iter()
            .map(|target| self.build_target(target, job))
            .collect::<Result<Vec<_>>>()?;

        let mut report = TreeReport::default();
        outcomes
            .into_iter()
            .flatten()
            .for_each(|outcome| report.record(outcome));
        Ok(report)
    }

    /// Try the documents of one output path in order until one is written.
    fn build_target(&self, target: &Target, job: &TreeJob<'_>) -> Result<Vec<Outcome>> {
        let mut outcomes = Vec::with_capacity(target.documents.len());
        let mut documents = target.documents.iter();

        for (path, kind) in documents.by_ref() {
            let outcome = self.build_document(path, *kind, &target.output, job)?;
            let settled = matches!(outcome, Outcome::Written | Outcome::Skipped);
            outcomes.push(outcome);
            if settled {
                break;
            }
        }
        for (path, _) in documents {
            log!("render"; "{}: {} already written, skipped", path.display(), target.output.display());
            outcomes.push(Outcome::Skipped);
        }
        Ok(outcomes)
    }

    fn build_document(
        &self,
        path: &Path,
        kind: SourceKind,
        output: &Path,
        job: &TreeJob<'_>,
    ) -> Result<Outcome> {
        if !self.claims.claim(output) {
            log!("render"; "{}: {} already written, skipped", path.display(), output.display());
            return Ok(Outcome::Skipped);
        }

        let source = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let html = match self.renderer.render(&source, job.context, kind) {
            Ok(Rendered::Page(html)) => html,
            Ok(Rendered::Unmappable) => {
                self.claims.release(output);
                log!("warn"; "{}: markdown without a leading extends directive, skipped", path.display());
                return Ok(Outcome::Unmappable);
            }
            Err(err) => {
                self.claims.release(output);
                log!("error"; "{}: {:#}", path.display(), err);
                return Ok(Outcome::Failed(path.to_path_buf(), err.to_string()));
            }
        };

        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        match job.locale {
            Some(locale) => log!("render"; "[{}] {} -> {}", locale, path.display(), output.display()),
            None => log!("render"; "{} -> {}", path.display(), output.display()),
        }

        fs::write(output, minify_html(html.as_bytes(), self.minify))
            .with_context(|| format!("Failed to write {}", output.display()))?;
        Ok(Outcome::Written)
    }
}

/// One output path and the documents that map to it, in walk order.
struct Target {
    output: PathBuf,
    documents: Vec<(PathBuf, SourceKind)>,
}

/// Group documents by output path, keeping the first-seen order.
fn plan_targets(documents: Vec<(PathBuf, SourceKind)>, job: &TreeJob<'_>) -> Result<Vec<Target>> {
    let mut index: FxHashMap<PathBuf, usize> = FxHashMap::default();
    let mut targets: Vec<Target> = Vec::with_capacity(documents.len());

    for (path, kind) in documents {
        let output = output_path(path.strip_prefix(job.source)?, job.output, kind);
        match index.get(&output) {
            Some(&i) => targets[i].documents.push((path, kind)),
            None => {
                index.insert(output.clone(), targets.len());
                targets.push(Target {
                    output,
                    documents: vec![(path, kind)],
                });
            }
        }
    }
    Ok(targets)
}

/// Collect `.md` and `.html` files under `source`, skipping the excluded
/// top-level directories.
///
/// Each directory lists its files (by name) before its subdirectories.
fn collect_documents(source: &Path, exclude: &[String]) -> Result<Vec<(PathBuf, SourceKind)>> {
    let is_excluded = |entry: &walkdir::DirEntry| {
        entry.depth() == 1
            && entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| exclude.iter().any(|x| x == name))
    };

    let mut documents = Vec::new();
    for entry in WalkDir::new(source)
        .sort_by(|a, b| {
            a.file_type()
                .is_dir()
                .cmp(&b.file_type().is_dir())
                .then_with(|| a.file_name().cmp(b.file_name()))
        })
        .into_iter()
        .filter_entry(|e| !is_excluded(e))
    {
        let entry = entry.with_context(|| format!("Failed to walk {}", source.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(kind) = SourceKind::from_path(entry.path()) {
            documents.push((entry.into_path(), kind));
        }
    }
    Ok(documents)
}
