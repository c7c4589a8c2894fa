//! Template inheritance and variable substitution.
//!
//! The template syntax has exactly two token forms:
//!
//! - `{{ path.to.value }}`: replaced by the context value at that path
//! - `{% extends name %}`: only at the very start of a document (leading
//!   whitespace allowed); the document becomes the `content` slot of
//!   `<templates>/name.html`
//!
//! # Resolution
//!
//! ```text
//! child.html                 page.html                 base.html
//! {% extends page %}   ──►   {% extends base %}   ──►   <html>{{ content }}</html>
//! <p>{{ t.hi }}</p>          <main>{{ content }}</main>
//!
//! result: <html><main><p>Bonjour</p>\n</main>\n</html>
//! ```
//!
//! Each step substitutes variables first, then checks for a directive. The
//! chain of visited template names is tracked so that a template extending
//! itself, directly or transitively, fails with a cycle error.

use crate::{
    context::{Context, ContextError},
    render::RenderError,
};
use parking_lot::RwLock;
use regex::Regex;
use rustc_hash::FxHashMap;
use std::{
    borrow::Cow,
    fs, io,
    path::PathBuf,
    sync::{Arc, LazyLock},
};

/// `{{ path }}` with insignificant inner whitespace
static VARIABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([\w.-]+)\s*\}\}").unwrap());

/// Leading `{% extends name %}`, consuming the rest of its line
static EXTENDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\{%\s*extends\s+(\w+)\s*%\}[^\S\n]*\n?").unwrap());

/// Template file extension
const TEMPLATE_EXT: &str = "html";

/// A leading `extends` directive split off a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Directive<'a> {
    /// Name of the template being extended
    pub template: &'a str,
    /// Document body with the directive line removed
    pub rest: &'a str,
}

/// Parse a leading `extends` directive.
///
/// Directives anywhere but the start of the document are plain text.
pub fn parse_extends(body: &str) -> Option<Directive<'_>> {
    let caps = EXTENDS.captures(body)?;
    let whole = caps.get(0)?;
    let template = caps.get(1)?.as_str();
    Some(Directive {
        template,
        rest: &body[whole.end()..],
    })
}

/// Replace every `{{ path }}` with its context value.
///
/// Single pass: substituted values are never scanned again.
pub fn substitute(body: &str, context: &Context) -> Result<String, ContextError> {
    let mut out = String::with_capacity(body.len());
    let mut last = 0;

    for caps in VARIABLE.captures_iter(body) {
        let (Some(whole), Some(path)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        out.push_str(&body[last..whole.start()]);
        out.push_str(context.resolve_text(path.as_str())?);
        last = whole.end();
    }

    out.push_str(&body[last..]);
    Ok(out)
}

/// Loads templates from a root directory and resolves inheritance chains.
///
/// Template text is read once and cached for the lifetime of the store, so
/// one store can be shared by every worker of a build.
#[derive(Debug)]
pub struct TemplateStore {
    root: PathBuf,
    cache: RwLock<FxHashMap<String, Arc<str>>>,
}

impl TemplateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: RwLock::new(FxHashMap::default()),
        }
    }

    /// File path a template name resolves to.
    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name).with_extension(TEMPLATE_EXT)
    }

    /// Load a template's raw text, reading it from disk on first use.
    pub fn load(&self, name: &str) -> Result<Arc<str>, RenderError> {
        if let Some(text) = self.cache.read().get(name) {
            return Ok(Arc::clone(text));
        }

        let path = self.path_of(name);
        let text: Arc<str> = match fs::read_to_string(&path) {
            Ok(text) => text.into(),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(RenderError::TemplateNotFound {
                    name: name.to_owned(),
                    path,
                });
            }
            Err(source) => return Err(RenderError::TemplateIo { path, source }),
        };

        self.cache
            .write()
            .entry(name.to_owned())
            .or_insert_with(|| Arc::clone(&text));
        Ok(text)
    }

    /// Resolve a document body against a context.
    ///
    /// A body without a leading directive is returned with its variables
    /// substituted; otherwise the body fills the `content` slot of the
    /// extended template, recursively.
    pub fn resolve(&self, body: &str, context: &Context) -> Result<String, RenderError> {
        self.expand(Arc::from(body), Cow::Borrowed(context), Vec::new())
    }

    /// Resolve the named template itself against a context.
    ///
    /// Used when the caller has already filled the slots, e.g. Markdown
    /// documents whose converted body is placed in `content` and `toc`.
    pub fn resolve_named(&self, name: &str, context: &Context) -> Result<String, RenderError> {
        let body = self.load(name)?;
        self.expand(body, Cow::Borrowed(context), vec![name.to_owned()])
    }

    fn expand(
        &self,
        mut body: Arc<str>,
        mut context: Cow<'_, Context>,
        mut chain: Vec<String>,
    ) -> Result<String, RenderError> {
        loop {
            let substituted = substitute(&body, &context)?;
            let Some(directive) = parse_extends(&substituted) else {
                return Ok(substituted);
            };

            let name = directive.template.to_owned();
            if chain.contains(&name) {
                chain.push(name);
                return Err(RenderError::TemplateCycle { chain });
            }

            let parent = self.load(&name)?;
            chain.push(name);
            context = Cow::Owned(context.with("content", directive.rest));
            body = parent;
        }
    }
}
