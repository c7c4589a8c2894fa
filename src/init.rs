//! Site initialization module.
//!
//! Creates a new site structure with default configuration and a starter
//! template, page and translation catalog.

use crate::{config::SiteConfig, log};
use anyhow::{Context, Result, bail};
use std::{fs, path::Path};

/// Files to write ignore patterns to
const IGNORE_FILES: &[&str] = &[".gitignore", ".ignore"];

/// Default config filename
const CONFIG_FILE: &str = "folio.toml";

/// Default site directory structure
const SITE_DIRS: &[&str] = &["src", "templates", "static"];

/// Starter files, relative to the site root
const SITE_FILES: &[(&str, &str)] = &[
    (
        "templates/base.html",
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>{{ t.title }}</title>
  <link rel="stylesheet" href="/static/style.css">
</head>
<body>
  <nav><a href="{{ page.base }}/index/">{{ t.home }}</a></nav>
  <aside>{{ toc }}</aside>
  <main>{{ content }}</main>
</body>
</html>
"#,
    ),
    (
        "src/index.md",
        "{% extends base %}\n# Welcome\n\nEdit `src/index.md` to get started.\n",
    ),
    ("static/style.css", "body { max-width: 48rem; margin: auto; }\n"),
    (
        "translations.json",
        r#"{
  "default": { "title": "My Site", "home": "Home" }
}
"#,
    ),
];

/// Create a new site with default structure
pub fn new_site(config: &SiteConfig, has_name: bool) -> Result<()> {
    let root = config.get_root();

    // With no name (init in current dir) the directory must be completely empty
    if !has_name && !is_dir_empty(root)? {
        bail!(
            "Current directory is not empty. Use `folio init <SITE_NAME>` to create in a subdirectory."
        );
    }

    init_site_structure(root)?;
    init_default_config(root)?;
    init_site_files(root)?;
    init_ignored_files(root, &[Path::new("/build/")])?;

    log!("init"; "created site at {}", root.display());
    Ok(())
}

/// Check if a directory is completely empty
fn is_dir_empty(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(true);
    }
    Ok(fs::read_dir(path)?.next().is_none())
}

/// Write default configuration file
fn init_default_config(root: &Path) -> Result<()> {
    let content = toml::to_string_pretty(&SiteConfig::default())?;
    fs::write(root.join(CONFIG_FILE), content)?;
    Ok(())
}

/// Create site directory structure
fn init_site_structure(root: &Path) -> Result<()> {
    for dir in SITE_DIRS {
        let path = root.join(dir);
        if path.exists() {
            bail!(
                "Path `{}` already exists. Try `folio init <SITE_NAME>` instead.",
                path.display()
            );
        }
        fs::create_dir_all(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
    }
    Ok(())
}

/// Write the starter template, page, stylesheet and catalog
fn init_site_files(root: &Path) -> Result<()> {
    for (relative, content) in SITE_FILES {
        let path = root.join(relative);
        fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(())
}

/// Initialize .gitignore and .ignore files with specified paths
fn init_ignored_files(root: &Path, paths: &[&Path]) -> Result<()> {
    let content = paths
        .iter()
        .filter_map(|p| p.to_str())
        .collect::<Vec<_>>()
        .join("\n");

    for filename in IGNORE_FILES {
        let path = root.join(filename);
        if !path.exists() {
            fs::write(&path, &content)?;
        }
    }

    Ok(())
}
