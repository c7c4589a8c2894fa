//! Rendering context and dotted-path variable resolution.
//!
//! A [`Context`] is a nested string-keyed mapping. Templates reference its
//! values with `{{ path.to.value }}`; lookups walk the nested maps one
//! segment at a time and fail loudly on the first segment that cannot be
//! resolved.
//!
//! ```text
//! { t: { title: "Docs" }, page: { base: "/fr" } }
//!
//! "t.title"   -> "Docs"
//! "page.base" -> "/fr"
//! "t.missing" -> MissingKey { segment: "missing" }
//! ```

use std::{collections::BTreeMap, sync::Arc};
use thiserror::Error;

/// Context lookup errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("missing context key `{segment}` in `{path}`")]
    MissingKey { segment: String, path: String },

    #[error("`{segment}` in `{path}` is text, not a nested map")]
    NotAMap { segment: String, path: String },

    #[error("`{path}` is a nested map and cannot be substituted as text")]
    NotText { path: String },

    #[error("invalid context path `{0}`")]
    InvalidPath(String),

    #[error("unsupported value for key `{0}`: only strings, numbers, booleans and objects are allowed")]
    Unsupported(String),
}

/// A single context value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Plain text or an already rendered HTML fragment
    Text(String),
    /// Nested mapping, shared between derived contexts
    Map(Arc<Context>),
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Context> for Value {
    fn from(value: Context) -> Self {
        Self::Map(Arc::new(value))
    }
}

impl From<Arc<Context>> for Value {
    fn from(value: Arc<Context>) -> Self {
        Self::Map(value)
    }
}

/// Nested key-value environment used for `{{ path }}` substitution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    entries: BTreeMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a top-level key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Derive a new context with `key` overwritten.
    ///
    /// Nested maps are shared, so only the top level is copied.
    #[must_use]
    pub fn with(&self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut derived = self.clone();
        derived.insert(key, value);
        derived
    }

    /// Resolve a dotted path to the value it names.
    ///
    /// Fails on the first segment that is absent, or that has to be
    /// traversed but holds text.
    pub fn lookup(&self, path: &str) -> Result<&Value, ContextError> {
        if path.is_empty() || path.split('.').any(str::is_empty) {
            return Err(ContextError::InvalidPath(path.to_owned()));
        }

        let mut segments = path.split('.');
        // Non-empty path always yields a first segment
        let first = segments.next().unwrap_or_default();
        let start = self.entries.get(first).ok_or_else(|| missing(first, path))?;

        segments.try_fold(start, |current, segment| match current {
            Value::Map(map) => map.entries.get(segment).ok_or_else(|| missing(segment, path)),
            Value::Text(_) => Err(ContextError::NotAMap {
                segment: segment.to_owned(),
                path: path.to_owned(),
            }),
        })
    }

    /// Resolve a dotted path that must end on text.
    pub fn resolve_text(&self, path: &str) -> Result<&str, ContextError> {
        match self.lookup(path)? {
            Value::Text(text) => Ok(text),
            Value::Map(_) => Err(ContextError::NotText {
                path: path.to_owned(),
            }),
        }
    }
}

fn missing(segment: &str, path: &str) -> ContextError {
    ContextError::MissingKey {
        segment: segment.to_owned(),
        path: path.to_owned(),
    }
}

impl TryFrom<serde_json::Value> for Context {
    type Error = ContextError;

    /// Convert a JSON object into a context.
    ///
    /// Numbers and booleans are stringified; `null` and arrays are rejected.
    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        from_json_object(value, "")
    }
}

fn from_json_object(value: serde_json::Value, prefix: &str) -> Result<Context, ContextError> {
    let serde_json::Value::Object(object) = value else {
        let key = if prefix.is_empty() { "<root>" } else { prefix };
        return Err(ContextError::Unsupported(key.to_owned()));
    };

    let mut context = Context::new();
    for (key, value) in object {
        let full_key = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        let value = match value {
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Number(n) => Value::Text(n.to_string()),
            serde_json::Value::Bool(b) => Value::Text(b.to_string()),
            object @ serde_json::Value::Object(_) => {
                Value::from(from_json_object(object, &full_key)?)
            }
            serde_json::Value::Null | serde_json::Value::Array(_) => {
                return Err(ContextError::Unsupported(full_key));
            }
        };
        context.insert(key, value);
    }
    Ok(context)
}
