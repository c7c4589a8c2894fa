//! Locale catalog and multi-locale tree composition.
//!
//! The catalog is a JSON object mapping locale names to translation tables.
//! `default` is always present and is built at the output root; every other
//! locale gets its own output subdirectory:
//!
//! ```text
//! src/index.md       ──► build/index/index.html       (default, shared)
//! src/index.md       ──► build/fr/index/index.html    (fr, shared)
//! src/fr/index.md    ──► build/fr/index/index.html    (fr, override wins)
//! ```
//!
//! A locale's own subtree is built before the shared tree, so the output
//! claims make locale-authored files take precedence.

use crate::{
    context::{Context, ContextError},
    log,
    tree::{TreeBuilder, TreeJob, TreeReport},
};
use anyhow::{Context as _, Result};
use std::{
    collections::BTreeMap,
    fs, io,
    path::{Component, Path},
    sync::Arc,
};
use thiserror::Error;

/// Name of the mandatory locale built at the output root
pub const DEFAULT_LOCALE: &str = "default";

/// Catalog loading errors
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read translations `{path}`")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse translations `{path}`")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("translations must be a JSON object of locale tables")]
    NotAnObject,

    #[error("translations have no `default` locale")]
    MissingDefault,

    #[error("invalid locale name `{0}`: must be a single directory name")]
    InvalidName(String),

    #[error("invalid translation table for locale `{locale}`")]
    Table {
        locale: String,
        #[source]
        source: ContextError,
    },
}

/// Translation tables per locale.
#[derive(Debug, Clone)]
pub struct LocaleCatalog {
    default: Arc<Context>,
    locales: BTreeMap<String, Arc<Context>>,
}

impl LocaleCatalog {
    /// Catalog with only an empty `default` table.
    pub fn empty() -> Self {
        Self {
            default: Arc::new(Context::new()),
            locales: BTreeMap::new(),
        }
    }

    /// Load the catalog from a JSON file.
    ///
    /// A missing file yields [`LocaleCatalog::empty`].
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                log!("locale"; "no translations at {}, building default locale only", path.display());
                return Ok(Self::empty());
            }
            Err(source) => {
                return Err(CatalogError::Io {
                    path: path.display().to_string(),
                    source,
                });
            }
        };
        Self::from_str(&content).map_err(|err| match err {
            CatalogError::Json { source, .. } => CatalogError::Json {
                path: path.display().to_string(),
                source,
            },
            other => other,
        })
    }

    /// Parse a catalog from JSON text.
    pub fn from_str(content: &str) -> Result<Self, CatalogError> {
        let value: serde_json::Value =
            serde_json::from_str(content).map_err(|source| CatalogError::Json {
                path: "<inline>".to_owned(),
                source,
            })?;
        let serde_json::Value::Object(object) = value else {
            return Err(CatalogError::NotAnObject);
        };

        let mut default = None;
        let mut locales = BTreeMap::new();
        for (name, table) in object {
            let table = Context::try_from(table).map_err(|source| CatalogError::Table {
                locale: name.clone(),
                source,
            })?;
            if name == DEFAULT_LOCALE {
                default = Some(Arc::new(table));
                continue;
            }
            if !is_valid_locale_name(&name) {
                return Err(CatalogError::InvalidName(name));
            }
            locales.insert(name, Arc::new(table));
        }

        Ok(Self {
            default: default.ok_or(CatalogError::MissingDefault)?,
            locales,
        })
    }

    /// Non-default locale names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.locales.keys().map(String::as_str)
    }

    /// Translation table for `locale`.
    pub fn table(&self, locale: &str) -> Option<&Arc<Context>> {
        if locale == DEFAULT_LOCALE {
            Some(&self.default)
        } else {
            self.locales.get(locale)
        }
    }

    /// Rendering context `{ t, page: { base } }` for `locale`.
    pub fn context_for(&self, locale: &str) -> Option<Context> {
        let table = self.table(locale)?;
        let base = if locale == DEFAULT_LOCALE {
            String::new()
        } else {
            format!("/{locale}")
        };

        let mut context = Context::new();
        context.insert("t", Arc::clone(table));
        context.insert("page", Context::new().with("base", base));
        Some(context)
    }
}

/// A locale name becomes an output directory; it must be one plain component.
fn is_valid_locale_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(components.next(), Some(Component::Normal(_))) && components.next().is_none()
}

/// Build every locale of `source_root` into `output_root`.
///
/// The default locale goes first, then the others in name order.
pub fn compose_all(
    catalog: &LocaleCatalog,
    source_root: &Path,
    output_root: &Path,
    builder: &TreeBuilder<'_>,
) -> Result<TreeReport> {
    let exclude: Vec<String> = catalog.names().map(str::to_owned).collect();
    let mut report = TreeReport::default();

    let context = context_of(catalog, DEFAULT_LOCALE)?;
    log!("locale"; "{} -> {}", source_root.display(), output_root.display());
    report.merge(builder.build(&TreeJob {
        source: source_root,
        output: output_root,
        context: &context,
        exclude: &exclude,
        locale: None,
    })?);

    for locale in catalog.names() {
        let context = context_of(catalog, locale)?;
        let output = output_root.join(locale);
        let own_tree = source_root.join(locale);
        log!("locale"; "[{}] {} -> {}", locale, source_root.display(), output.display());

        if own_tree.is_dir() {
            report.merge(builder.build(&TreeJob {
                source: &own_tree,
                output: &output,
                context: &context,
                exclude: &[],
                locale: Some(locale),
            })?);
        } else {
            log!("locale"; "[{}] no {} directory, using shared pages only", locale, own_tree.display());
        }

        report.merge(builder.build(&TreeJob {
            source: source_root,
            output: &output,
            context: &context,
            exclude: &exclude,
            locale: Some(locale),
        })?);
    }

    Ok(report)
}

fn context_of(catalog: &LocaleCatalog, locale: &str) -> Result<Context> {
    catalog
        .context_for(locale)
        .with_context(|| format!("locale `{locale}` is not in the catalog"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        highlight::DisabledHighlighter,
        render::Renderer,
        template::TemplateStore,
        tree::OutputClaims,
    };
    use tempfile::TempDir;

    const CATALOG: &str = r#"{
        "default": { "hello": "Hello", "nav": { "home": "Home" } },
        "fr": { "hello": "Bonjour", "nav": { "home": "Accueil" } }
    }"#;

    fn write(root: &Path, relative: &str, text: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    fn compose(root: &Path, catalog: &LocaleCatalog) -> TreeReport {
        let templates = TemplateStore::new(root.join("templates"));
        let renderer = Renderer::new(&templates, &DisabledHighlighter);
        let claims = OutputClaims::new();
        let builder = TreeBuilder::new(&renderer, &claims, false);
        compose_all(catalog, &root.join("src"), &root.join("build"), &builder).unwrap()
    }

    fn read(root: &Path, relative: &str) -> String {
        fs::read_to_string(root.join(relative)).unwrap()
    }

    #[test]
    fn test_from_str_requires_default() {
        let err = LocaleCatalog::from_str(r#"{ "fr": {} }"#).unwrap_err();
        assert!(matches!(err, CatalogError::MissingDefault));
    }

    #[test]
    fn test_from_str_rejects_non_object() {
        let err = LocaleCatalog::from_str("[1, 2]").unwrap_err();
        assert!(matches!(err, CatalogError::NotAnObject));
    }

    #[test]
    fn test_from_str_rejects_path_like_names() {
        for name in ["../up", "a/b", ".", ""] {
            let json = format!(r#"{{ "default": {{}}, "{name}": {{}} }}"#);
            let err = LocaleCatalog::from_str(&json).unwrap_err();
            assert!(matches!(err, CatalogError::InvalidName(_)), "{name}");
        }
    }

    #[test]
    fn test_from_str_rejects_arrays() {
        let err = LocaleCatalog::from_str(r#"{ "default": { "list": [1] } }"#).unwrap_err();
        assert!(matches!(err, CatalogError::Table { locale, .. } if locale == "default"));
    }

    #[test]
    fn test_load_missing_file_is_default_only() {
        let dir = TempDir::new().unwrap();
        let catalog = LocaleCatalog::load(&dir.path().join("translations.json")).unwrap();
        assert_eq!(catalog.names().count(), 0);
        let context = catalog.context_for(DEFAULT_LOCALE).unwrap();
        assert!(matches!(
            context.resolve_text("t.title"),
            Err(ContextError::MissingKey { .. })
        ));
    }

    #[test]
    fn test_load_reports_parse_errors_with_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("translations.json");
        fs::write(&path, "{ not json").unwrap();
        let err = LocaleCatalog::load(&path).unwrap_err();
        assert!(err.to_string().contains("translations.json"));
    }

    #[test]
    fn test_context_for_sets_base() {
        let catalog = LocaleCatalog::from_str(CATALOG).unwrap();

        let default = catalog.context_for(DEFAULT_LOCALE).unwrap();
        assert_eq!(default.resolve_text("page.base").unwrap(), "");
        assert_eq!(default.resolve_text("t.nav.home").unwrap(), "Home");

        let fr = catalog.context_for("fr").unwrap();
        assert_eq!(fr.resolve_text("page.base").unwrap(), "/fr");
        assert_eq!(fr.resolve_text("t.hello").unwrap(), "Bonjour");

        assert!(catalog.context_for("de").is_none());
    }

    #[test]
    fn test_names_are_sorted() {
        let catalog =
            LocaleCatalog::from_str(r#"{ "zh": {}, "default": {}, "de": {}, "fr": {} }"#).unwrap();
        assert_eq!(catalog.names().collect::<Vec<_>>(), ["de", "fr", "zh"]);
    }

    #[test]
    fn test_compose_override_and_shared_pages() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "templates/page.html", "<a href=\"{{ page.base }}/\">{{ t.nav.home }}</a>{{ content }}");
        write(root, "src/index.html", "{% extends page %}\nshared {{ t.hello }}");
        write(root, "src/about.md", "{% extends page %}\nAbout\n");
        write(root, "src/fr/index.html", "{% extends page %}\nfrançais {{ t.hello }}");

        let catalog = LocaleCatalog::from_str(CATALOG).unwrap();
        let report = compose(root, &catalog);

        assert_eq!(read(root, "build/index.html"), "<a href=\"/\">Home</a>shared Hello");
        assert_eq!(read(root, "build/fr/index.html"), "<a href=\"/fr/\">Accueil</a>français Bonjour");
        assert_eq!(
            read(root, "build/fr/about/index.html"),
            "<a href=\"/fr/\">Accueil</a><p>About</p>\n"
        );
        assert!(!root.join("build/fr/fr").exists());
        assert_eq!(report.written, 4);
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn test_compose_locale_without_own_tree() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "templates/page.html", "{{ page.base }}|{{ content }}");
        write(root, "src/a.html", "{% extends page %}\n{{ t.hello }}");

        let catalog = LocaleCatalog::from_str(CATALOG).unwrap();
        let report = compose(root, &catalog);

        assert_eq!(read(root, "build/a.html"), "|Hello");
        assert_eq!(read(root, "build/fr/a.html"), "/fr|Bonjour");
        assert_eq!(report.written, 2);
    }

    #[test]
    fn test_compose_missing_translation_fails_only_that_locale() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "src/only.html", "{{ t.extra }}");

        let catalog = LocaleCatalog::from_str(
            r#"{ "default": { "extra": "yes" }, "fr": {} }"#,
        )
        .unwrap();
        let report = compose(root, &catalog);

        assert_eq!(read(root, "build/only.html"), "yes");
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, root.join("src/only.html"));
        assert!(!root.join("build/fr/only.html").exists());
    }

    #[test]
    fn test_compose_unmappable_override_falls_back_to_shared_page() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "templates/page.html", "{{ page.base }}|{{ content }}");
        write(root, "src/x.md", "{% extends page %}\nshared");
        write(root, "src/fr/x.md", "# fr draft without template");

        let catalog = LocaleCatalog::from_str(CATALOG).unwrap();
        let report = compose(root, &catalog);

        assert_eq!(read(root, "build/x/index.html"), "|<p>shared</p>\n");
        assert_eq!(read(root, "build/fr/x/index.html"), "/fr|<p>shared</p>\n");
        assert_eq!(report.unmappable, 1);
        assert_eq!(report.written, 2);
    }

    #[test]
    fn test_compose_failed_override_falls_back_to_shared_page() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "templates/page.html", "{{ page.base }}|{{ content }}");
        write(root, "src/x.html", "{% extends page %}\nshared");
        write(root, "src/fr/x.html", "{% extends ghost %}\nbroken");

        let catalog = LocaleCatalog::from_str(CATALOG).unwrap();
        let report = compose(root, &catalog);

        assert_eq!(read(root, "build/fr/x.html"), "/fr|shared");
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.written, 2);
    }

    #[test]
    fn test_compose_default_directory_is_ordinary_content() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "templates/page.html", "{{ page.base }}|{{ content }}");
        write(root, "src/default/x.html", "{% extends page %}\n{{ t.hello }}");

        let catalog = LocaleCatalog::from_str(CATALOG).unwrap();
        let report = compose(root, &catalog);

        assert_eq!(read(root, "build/default/x.html"), "|Hello");
        assert_eq!(read(root, "build/fr/default/x.html"), "/fr|Bonjour");
        assert_eq!(report.written, 2);
    }
}
