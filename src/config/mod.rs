//! Site configuration management for `folio.toml`.
//!
//! # Sections
//!
//! | Section       | Purpose                                         |
//! |---------------|-------------------------------------------------|
//! | `[build]`     | Site layout: sources, templates, output, etc.   |
//! | `[highlight]` | External code highlighter command and limits    |
//!
//! # Example
//!
//! ```toml
//! [build]
//! sources = ["src"]
//! output = "build"
//! minify = true
//!
//! [highlight]
//! command = ["pygmentize", "-f", "html", "-l", "{lang}"]
//! timeout_ms = 2000
//! ```

mod build;
pub mod defaults;
mod error;
mod highlight;

pub use build::BuildConfig;
pub use error::ConfigError;
pub use highlight::HighlightConfig;

use crate::cli::{Cli, Commands};
use anyhow::{Result, bail};
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Root configuration structure representing folio.toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// Absolute path to the config file (set after loading)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Build settings
    #[serde(default)]
    pub build: BuildConfig,

    /// Code highlighting settings
    #[serde(default)]
    pub highlight: HighlightConfig,
}

impl SiteConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Read(path.to_path_buf(), err))?;
        let config = toml::from_str(&content)
            .map_err(|err| ConfigError::Parse(path.to_path_buf(), err))?;
        Ok(config)
    }

    /// Get the root directory path
    pub fn get_root(&self) -> &Path {
        self.build.root.as_deref().unwrap_or(Path::new("./"))
    }

    /// Set the root directory path
    pub fn set_root(&mut self, path: &Path) {
        self.build.root = Some(path.to_path_buf())
    }

    /// Update configuration with CLI arguments
    pub fn update_with_cli(&mut self, cli: &Cli) {
        let base = cli
            .root
            .clone()
            .unwrap_or_else(|| self.get_root().to_owned());
        let root = match &cli.command {
            Commands::Init { name: Some(name) } => base.join(name),
            _ => base,
        };

        Self::update_option(&mut self.build.output, cli.output.as_ref());

        if let Commands::Build { build_args } = &cli.command {
            Self::update_option(&mut self.build.minify, build_args.minify.as_ref());
            Self::update_option(&mut self.highlight.enable, build_args.highlight.as_ref());
            Self::update_option(&mut self.highlight.timeout_ms, build_args.timeout.as_ref());
        }

        self.update_path_with_root(&root, &cli.config);
    }

    /// Update config option if CLI value is provided
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Resolve all paths against the root directory and normalize to absolute paths
    fn update_path_with_root(&mut self, root: &Path, config_file: &Path) {
        let root = Self::normalize_path(&Self::expand_tilde(root));
        self.set_root(&root);

        self.config_path = Self::normalize_path(&root.join(config_file));

        let resolve = |path: &Path| Self::normalize_path(&root.join(Self::expand_tilde(path)));
        self.build.sources = self.build.sources.iter().map(|p| resolve(p)).collect();
        self.build.templates = resolve(&self.build.templates);
        self.build.static_dir = resolve(&self.build.static_dir);
        self.build.output = resolve(&self.build.output);
        self.build.translations = resolve(&self.build.translations);
    }

    /// Expand a leading `~` to the home directory
    fn expand_tilde(path: &Path) -> PathBuf {
        match path.to_str() {
            Some(s) => PathBuf::from(shellexpand::tilde(s).into_owned()),
            None => path.to_path_buf(),
        }
    }

    /// Normalize a path to absolute, using canonicalize if the path exists
    fn normalize_path(path: &Path) -> PathBuf {
        path.canonicalize().unwrap_or_else(|_| {
            // For non-existent paths, manually make them absolute
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                std::env::current_dir()
                    .map(|cwd| cwd.join(path))
                    .unwrap_or_else(|_| path.to_path_buf())
            }
        })
    }

    /// Validate configuration before a build
    pub fn validate(&self) -> Result<()> {
        if !self.config_path.exists() {
            bail!(ConfigError::NotFound(self.config_path.clone()));
        }

        if self.build.sources.is_empty() {
            bail!(ConfigError::Invalid {
                key: "build.sources",
                reason: "must have at least one element",
            });
        }

        if self.highlight.workers == 0 {
            bail!(ConfigError::Invalid {
                key: "highlight.workers",
                reason: "must be at least 1",
            });
        }

        if self.highlight.timeout_ms == 0 {
            bail!(ConfigError::Invalid {
                key: "highlight.timeout_ms",
                reason: "must be at least 1",
            });
        }

        if self.highlight.enable && self.highlight.command.is_empty() {
            bail!(ConfigError::Invalid {
                key: "highlight.command",
                reason: "must have at least one element",
            });
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
