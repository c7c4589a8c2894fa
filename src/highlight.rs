//! Code block highlighting through an external engine.
//!
//! Converted Markdown contains fenced code as
//! `<pre><code class="language-X">…</code></pre>`. Each block is handed to a
//! [`Highlight`] implementation; when that fails for any reason the block is
//! replaced by an escaped, unhighlighted `<pre><code>` fallback so a broken
//! or slow engine never fails the document.
//!
//! # Engine pool
//!
//! [`CommandHighlighter`] runs the configured command once per block, with
//! the code on stdin and the markup read from stdout. At most `workers`
//! engine processes run at the same time; every call is bounded by a
//! timeout. The pool is started and shut down together with the build:
//!
//! ```text
//! start() ──► acquire permit ──► spawn engine ──► release permit ──► ... ──► shutdown()
//!                                    │                                         │
//!                                    └── timeout: kill + fallback              └── waits for in-flight calls
//! ```

use crate::{
    config::HighlightConfig,
    log,
    utils::{
        exec::{ExecError, exec_with_timeout},
        html::{escape_html, unescape_html},
    },
};
use parking_lot::{Condvar, Mutex};
use regex::Regex;
use std::{
    ffi::OsString,
    sync::{
        LazyLock,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use thiserror::Error;

/// Fenced code block as emitted by the Markdown converter
static CODE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<pre><code(?:\s+class="language-([^"]+)")?>(.*?)</code></pre>"#).unwrap()
});

/// First `<pre>` element in engine output
static ENGINE_PRE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<pre[^>]*>(.*?)</pre>").unwrap());

/// Placeholder replaced by the block language in command arguments
const LANG_PLACEHOLDER: &str = "{lang}";

/// Highlighting failures. All of them are recovered with the plain fallback.
#[derive(Debug, Error)]
pub enum HighlightError {
    #[error("highlighting is disabled")]
    Disabled,

    #[error("highlighter has been shut down")]
    ShutDown,

    #[error("highlight command `{0}` not found")]
    NotInstalled(String),

    #[error("highlight command is empty")]
    EmptyCommand,

    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// A highlighting engine.
pub trait Highlight: Sync {
    /// Highlight `code`, returning markup that replaces the whole code block.
    fn highlight(&self, code: &str, language: Option<&str>) -> Result<String, HighlightError>;
}

/// Engine used when highlighting is turned off or unavailable.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledHighlighter;

impl Highlight for DisabledHighlighter {
    fn highlight(&self, _code: &str, _language: Option<&str>) -> Result<String, HighlightError> {
        Err(HighlightError::Disabled)
    }
}

/// Escaped, unhighlighted replacement for a code block.
pub fn plain_fallback(code: &str) -> String {
    format!("<pre><code>{}</code></pre>", escape_html(code))
}

/// Replace every fenced code block in `html` with highlighted markup.
pub fn highlight_html(html: &str, highlighter: &dyn Highlight) -> String {
    let mut out = String::with_capacity(html.len());
    let mut last = 0;

    for caps in CODE_BLOCK.captures_iter(html) {
        let (Some(whole), Some(body)) = (caps.get(0), caps.get(2)) else {
            continue;
        };
        let language = caps.get(1).map(|m| m.as_str());
        let code = unescape_html(body.as_str());

        out.push_str(&html[last..whole.start()]);
        match highlighter.highlight(&code, language) {
            Ok(markup) => out.push_str(&markup),
            Err(HighlightError::Disabled) => out.push_str(&plain_fallback(&code)),
            Err(err) => {
                log!("highlight"; "{} block: {:#}, using plain text", language.unwrap_or("plain"), err);
                out.push_str(&plain_fallback(&code));
            }
        }
        last = whole.end();
    }

    out.push_str(&html[last..]);
    out
}

/// Counters reported when the pool shuts down.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HighlightStats {
    /// Engine invocations
    pub calls: usize,
    /// Invocations that failed or timed out
    pub failures: usize,
    /// Subset of failures caused by the timeout
    pub timeouts: usize,
}

/// Bounded engine pool with explicit shutdown.
#[derive(Debug)]
struct Pool {
    state: Mutex<PoolState>,
    changed: Condvar,
}

#[derive(Debug)]
struct PoolState {
    free: usize,
    in_flight: usize,
    closed: bool,
}

/// Scoped right to run one engine process.
struct Permit<'a> {
    pool: &'a Pool,
}

impl Pool {
    fn new(workers: usize) -> Self {
        Self {
            state: Mutex::new(PoolState {
                free: workers.max(1),
                in_flight: 0,
                closed: false,
            }),
            changed: Condvar::new(),
        }
    }

    fn acquire(&self) -> Result<Permit<'_>, HighlightError> {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return Err(HighlightError::ShutDown);
            }
            if state.free > 0 {
                state.free -= 1;
                state.in_flight += 1;
                return Ok(Permit { pool: self });
            }
            self.changed.wait(&mut state);
        }
    }

    /// Refuse new calls and wait for running ones to finish.
    fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        self.changed.notify_all();
        while state.in_flight > 0 {
            self.changed.wait(&mut state);
        }
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        let mut state = self.pool.state.lock();
        state.free += 1;
        state.in_flight -= 1;
        self.pool.changed.notify_all();
    }
}

/// Highlighter that runs an external command per code block.
#[derive(Debug)]
pub struct CommandHighlighter {
    command: Vec<String>,
    fallback_lang: String,
    timeout: Duration,
    pool: Pool,
    calls: AtomicUsize,
    failures: AtomicUsize,
    timeouts: AtomicUsize,
}

impl CommandHighlighter {
    /// Start the pool, checking that the engine executable exists.
    pub fn start(config: &HighlightConfig) -> Result<Self, HighlightError> {
        let program = config.command.first().ok_or(HighlightError::EmptyCommand)?;
        which::which(program).map_err(|_| HighlightError::NotInstalled(program.clone()))?;

        Ok(Self {
            command: config.command.clone(),
            fallback_lang: config.fallback_lang.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
            pool: Pool::new(config.workers),
            calls: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
            timeouts: AtomicUsize::new(0),
        })
    }

    /// Stop accepting calls, wait for in-flight ones and report counters.
    pub fn shutdown(&self) -> HighlightStats {
        self.pool.close();
        HighlightStats {
            calls: self.calls.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
        }
    }

    /// Command line for one block, with `{lang}` substituted.
    fn command_for(&self, language: Option<&str>) -> Vec<OsString> {
        let language = language.unwrap_or(&self.fallback_lang);
        self.command
            .iter()
            .map(|arg| OsString::from(arg.replace(LANG_PLACEHOLDER, language)))
            .collect()
    }

    fn run(&self, code: &str, language: Option<&str>) -> Result<String, HighlightError> {
        let _permit = self.pool.acquire()?;
        self.calls.fetch_add(1, Ordering::Relaxed);

        let output = exec_with_timeout(&self.command_for(language), code.as_bytes(), self.timeout)?;
        if !output.stderr.is_empty() {
            log!("highlight"; "{}", String::from_utf8_lossy(&output.stderr).trim());
        }
        Ok(extract_pre(&String::from_utf8_lossy(&output.stdout)))
    }
}

impl Highlight for CommandHighlighter {
    fn highlight(&self, code: &str, language: Option<&str>) -> Result<String, HighlightError> {
        let result = self.run(code, language);
        match &result {
            Err(HighlightError::Exec(ExecError::Timeout { .. })) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                self.timeouts.fetch_add(1, Ordering::Relaxed);
            }
            Err(HighlightError::Exec(_)) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
        result
    }
}

/// Keep the inside of the engine's first `<pre>`, or all of its output.
fn extract_pre(output: &str) -> String {
    let inner = ENGINE_PRE
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map_or(output, |m| m.as_str());
    format!("<pre>{}</pre>", inner.trim())
}
