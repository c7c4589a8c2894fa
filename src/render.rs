//! Document rendering.
//!
//! HTML documents are template text themselves and go straight through the
//! inheritance resolver. Markdown documents always decorate a template:
//!
//! ```text
//! {% extends doc %}          strip directive
//! # Title            ──►     pulldown-cmark ──► {html, toc}
//! (fenced code)              highlight code blocks
//!                            resolve `doc` with content = html, toc = toc
//! ```

use crate::{
    context::{Context, ContextError},
    highlight::{Highlight, highlight_html},
    markdown,
    template::{TemplateStore, parse_extends},
};
use std::{io, path::Path, path::PathBuf};
use thiserror::Error;

/// Errors that abort rendering a single document.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Context(#[from] ContextError),

    #[error("template `{name}` not found (looked for `{}`)", path.display())]
    TemplateNotFound { name: String, path: PathBuf },

    #[error("template inheritance cycle: {}", chain.join(" -> "))]
    TemplateCycle { chain: Vec<String> },

    #[error("failed to read template `{}`", path.display())]
    TemplateIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Kind of a source document, decided by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Markdown,
    Html,
}

impl SourceKind {
    /// `.md` is Markdown, `.html` is HTML, anything else is not a document.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "md" => Some(Self::Markdown),
            "html" => Some(Self::Html),
            _ => None,
        }
    }
}

/// Outcome of rendering one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    /// Final page markup
    Page(String),
    /// Markdown without a leading `extends` directive; nothing to write
    Unmappable,
}

/// Renders documents against a shared template store and highlighter.
pub struct Renderer<'a> {
    templates: &'a TemplateStore,
    highlighter: &'a dyn Highlight,
}

impl<'a> Renderer<'a> {
    pub fn new(templates: &'a TemplateStore, highlighter: &'a dyn Highlight) -> Self {
        Self {
            templates,
            highlighter,
        }
    }

    pub fn render(
        &self,
        source: &str,
        context: &Context,
        kind: SourceKind,
    ) -> Result<Rendered, RenderError> {
        match kind {
            SourceKind::Html => self.templates.resolve(source, context).map(Rendered::Page),
            SourceKind::Markdown => self.render_markdown(source, context),
        }
    }

    fn render_markdown(&self, source: &str, context: &Context) -> Result<Rendered, RenderError> {
        let Some(directive) = parse_extends(source) else {
            return Ok(Rendered::Unmappable);
        };

        let converted = markdown::to_html(directive.rest);
        let body = highlight_html(&converted.html, self.highlighter);

        let context = context.with("content", body).with("toc", converted.toc);
        self.templates
            .resolve_named(directive.template, &context)
            .map(Rendered::Page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highlight::{DisabledHighlighter, HighlightError};
    use std::fs;
    use tempfile::TempDir;

    struct Tagged;

    impl Highlight for Tagged {
        fn highlight(&self, code: &str, language: Option<&str>) -> Result<String, HighlightError> {
            Ok(format!("<pre data-lang=\"{}\">{}</pre>", language.unwrap_or("-"), code.trim()))
        }
    }

    fn setup() -> (TempDir, TemplateStore) {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("doc.html"),
            "<title>{{ t.title }}</title><aside>{{ toc }}</aside><main>{{ content }}</main>",
        )
        .unwrap();
        fs::write(dir.path().join("page.html"), "<body>{{ content }}</body>").unwrap();
        let store = TemplateStore::new(dir.path());
        (dir, store)
    }

    fn context() -> Context {
        let mut t = Context::new();
        t.insert("title", "Guide");
        t.insert("hello", "Hallo");
        let mut context = Context::new();
        context.insert("t", t);
        context
    }

    #[test]
    fn test_source_kind_from_path() {
        assert_eq!(SourceKind::from_path(Path::new("a/b.md")), Some(SourceKind::Markdown));
        assert_eq!(SourceKind::from_path(Path::new("a/b.html")), Some(SourceKind::Html));
        assert_eq!(SourceKind::from_path(Path::new("a/b.css")), None);
        assert_eq!(SourceKind::from_path(Path::new("Makefile")), None);
    }

    #[test]
    fn test_render_html_substitutes_and_extends() {
        let (_dir, store) = setup();
        let renderer = Renderer::new(&store, &DisabledHighlighter);
        let rendered = renderer
            .render("{% extends page %}\n<p>{{ t.hello }}</p>", &context(), SourceKind::Html)
            .unwrap();
        assert_eq!(rendered, Rendered::Page("<body><p>Hallo</p></body>".into()));
    }

    #[test]
    fn test_render_html_standalone() {
        let (_dir, store) = setup();
        let renderer = Renderer::new(&store, &DisabledHighlighter);
        let rendered = renderer
            .render("<h1>{{ t.title }}</h1>", &context(), SourceKind::Html)
            .unwrap();
        assert_eq!(rendered, Rendered::Page("<h1>Guide</h1>".into()));
    }

    #[test]
    fn test_render_markdown_fills_content_and_toc() {
        let (_dir, store) = setup();
        let renderer = Renderer::new(&store, &DisabledHighlighter);
        let Rendered::Page(html) = renderer
            .render("{% extends doc %}\n# Install\n\nRun it.\n", &context(), SourceKind::Markdown)
            .unwrap()
        else {
            panic!("expected a page");
        };

        assert!(html.starts_with("<title>Guide</title>"));
        assert!(html.contains("<aside><div class=\"toc\">"));
        assert!(html.contains("<a href=\"#install\">Install</a>"));
        assert!(html.contains("<main><h1 id=\"install\">Install</h1>\n<p>Run it.</p>\n</main>"));
    }

    #[test]
    fn test_render_markdown_body_is_not_substituted() {
        let (_dir, store) = setup();
        let renderer = Renderer::new(&store, &DisabledHighlighter);
        let Rendered::Page(html) = renderer
            .render("{% extends page %}\nUse `{{ t.missing }}` here.\n", &context(), SourceKind::Markdown)
            .unwrap()
        else {
            panic!("expected a page");
        };
        assert!(html.contains("<code>{{ t.missing }}</code>"));
    }

    #[test]
    fn test_render_markdown_highlights_code() {
        let (_dir, store) = setup();
        let renderer = Renderer::new(&store, &Tagged);
        let Rendered::Page(html) = renderer
            .render("{% extends page %}\n```rust\nfn main() {}\n```\n", &context(), SourceKind::Markdown)
            .unwrap()
        else {
            panic!("expected a page");
        };
        assert_eq!(html, "<body><pre data-lang=\"rust\">fn main() {}</pre>\n</body>");
    }

    #[test]
    fn test_render_markdown_without_directive_is_unmappable() {
        let (_dir, store) = setup();
        let renderer = Renderer::new(&store, &DisabledHighlighter);
        let rendered = renderer
            .render("# Orphan\n", &context(), SourceKind::Markdown)
            .unwrap();
        assert_eq!(rendered, Rendered::Unmappable);
    }

    #[test]
    fn test_render_markdown_missing_template() {
        let (_dir, store) = setup();
        let renderer = Renderer::new(&store, &DisabledHighlighter);
        let err = renderer
            .render("{% extends nowhere %}\ntext", &context(), SourceKind::Markdown)
            .unwrap_err();
        assert!(matches!(err, RenderError::TemplateNotFound { name, .. } if name == "nowhere"));
    }

    #[test]
    fn test_render_missing_key_aborts_document() {
        let (_dir, store) = setup();
        let renderer = Renderer::new(&store, &DisabledHighlighter);
        let err = renderer
            .render("<p>{{ page.base }}</p>", &context(), SourceKind::Html)
            .unwrap_err();
        assert!(err.to_string().contains("missing context key `page`"));
    }
}
