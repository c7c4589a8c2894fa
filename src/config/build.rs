//! `[build]` section configuration.
//!
//! Site layout: where sources, templates, static files and translations
//! live, and where the rendered tree goes.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `[build]` section in folio.toml.
///
/// # Example
/// ```toml
/// [build]
/// sources = ["src", "docs"]   # Composed into the output one after another
/// templates = "templates"
/// static = "static"           # Copied to <output>/static
/// output = "build"
/// translations = "translations.json"
/// minify = false
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Project root directory (usually set via CLI `--root`).
    #[serde(default = "defaults::build::root", skip_serializing_if = "Option::is_none")]
    #[educe(Default = defaults::build::root())]
    pub root: Option<PathBuf>,

    /// Source roots, each holding shared pages plus one subtree per locale.
    #[serde(default = "defaults::build::sources")]
    #[educe(Default = defaults::build::sources())]
    pub sources: Vec<PathBuf>,

    /// Template directory; `{% extends name %}` loads `<templates>/name.html`.
    #[serde(default = "defaults::build::templates")]
    #[educe(Default = defaults::build::templates())]
    pub templates: PathBuf,

    /// Static files copied verbatim.
    #[serde(rename = "static", default = "defaults::build::static_dir")]
    #[educe(Default = defaults::build::static_dir())]
    pub static_dir: PathBuf,

    /// Build output directory, cleared before every build.
    #[serde(default = "defaults::build::output")]
    #[educe(Default = defaults::build::output())]
    pub output: PathBuf,

    /// Locale catalog (JSON).
    #[serde(default = "defaults::build::translations")]
    #[educe(Default = defaults::build::translations())]
    pub translations: PathBuf,

    /// Minify HTML output.
    #[serde(default = "defaults::r#false")]
    #[educe(Default = false)]
    pub minify: bool,
}
