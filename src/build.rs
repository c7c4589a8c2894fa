//! Site building orchestration.
//!
//! # Architecture
//!
//! ```text
//! build_site()
//!     │
//!     ├── reset_output()        ──► remove + recreate the output root
//!     ├── copy_static()         ──► static/ → <output>/static
//!     ├── LocaleCatalog::load() ──► translations.json
//!     ├── start_highlighter()   ──► engine pool (or plain fallback)
//!     │
//!     ├── compose_all() per source root
//!     │       │
//!     │       └── default tree, then per locale: own tree, shared tree
//!     │
//!     └── shutdown + summary    ──► non-zero exit when any document failed
//! ```

use crate::{
    config::SiteConfig,
    highlight::{CommandHighlighter, DisabledHighlighter, Highlight},
    locale::{LocaleCatalog, compose_all},
    log,
    render::Renderer,
    template::TemplateStore,
    tree::{OutputClaims, TreeBuilder, TreeReport},
};
use anyhow::{Context, Result, bail};
use std::{fs, path::Path};
use walkdir::WalkDir;

/// Output subdirectory receiving the static files
const STATIC_OUTPUT: &str = "static";

/// Build the entire site into `config.build.output`.
pub fn build_site(config: &SiteConfig) -> Result<TreeReport> {
    let build = &config.build;

    for source in &build.sources {
        if !source.is_dir() {
            bail!("source root `{}` not found", source.display());
        }
    }

    reset_output(&build.output)?;
    copy_static(&build.static_dir, &build.output.join(STATIC_OUTPUT))?;

    let catalog = LocaleCatalog::load(&build.translations)?;
    let templates = TemplateStore::new(&build.templates);
    let engine = start_highlighter(config);
    let highlighter: &dyn Highlight = match &engine {
        Some(engine) => engine,
        None => &DisabledHighlighter,
    };

    let renderer = Renderer::new(&templates, highlighter);
    let claims = OutputClaims::new();
    let builder = TreeBuilder::new(&renderer, &claims, build.minify);

    let mut report = TreeReport::default();
    let composed = build.sources.iter().try_for_each(|source| {
        log!("build"; "composing {}", source.display());
        report.merge(compose_all(&catalog, source, &build.output, &builder)?);
        Ok::<_, anyhow::Error>(())
    });

    if let Some(engine) = &engine {
        let stats = engine.shutdown();
        log!(
            "highlight";
            "{} calls, {} fallbacks ({} timeouts)",
            stats.calls, stats.failures, stats.timeouts
        );
    }
    composed?;

    log!(
        "build";
        "{} written, {} skipped, {} unmappable, {} failed",
        report.written, report.skipped, report.unmappable, report.failed.len()
    );

    if !report.is_success() {
        for (path, message) in &report.failed {
            log!("error"; "{}: {}", path.display(), message);
        }
        bail!("{} document(s) failed to render", report.failed.len());
    }

    if report.written == 0 {
        log!("warn"; "output is empty, check that sources contain .md or .html files");
    } else {
        log!("build"; "done");
    }

    Ok(report)
}

/// Start the highlighting engine, or `None` when disabled or unavailable.
fn start_highlighter(config: &SiteConfig) -> Option<CommandHighlighter> {
    if !config.highlight.enable {
        log!("highlight"; "disabled, code blocks are left plain");
        return None;
    }
    match CommandHighlighter::start(&config.highlight) {
        Ok(engine) => Some(engine),
        Err(err) => {
            log!("warn"; "{}, code blocks are left plain", err);
            None
        }
    }
}

/// Remove the output root and create it empty.
fn reset_output(output: &Path) -> Result<()> {
    if output.exists() {
        fs::remove_dir_all(output)
            .with_context(|| format!("Failed to clear output directory: {}", output.display()))?;
    }
    fs::create_dir_all(output)
        .with_context(|| format!("Failed to create output directory: {}", output.display()))
}

/// Copy `source` recursively into `dest`. A missing `source` is not an error.
fn copy_static(source: &Path, dest: &Path) -> Result<()> {
    if !source.is_dir() {
        log!("static"; "no static directory at {}, skipping", source.display());
        return Ok(());
    }

    let mut copied = 0usize;
    for entry in WalkDir::new(source) {
        let entry = entry.with_context(|| format!("Failed to walk {}", source.display()))?;
        let target = dest.join(entry.path().strip_prefix(source)?);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create {}", target.display()))?;
        } else {
            fs::copy(entry.path(), &target).with_context(|| {
                format!("Failed to copy {} to {}", entry.path().display(), target.display())
            })?;
            copied += 1;
        }
    }

    log!("static"; "copied {} files to {}", copied, dest.display());
    Ok(())
}
