//! `[highlight]` section configuration.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};

/// `[highlight]` section in folio.toml - external code highlighter.
///
/// The command receives the code on stdin and prints HTML on stdout; the
/// inside of its first `<pre>` element is kept. `{lang}` in any argument is
/// replaced by the fenced block's language, or `fallback_lang`.
///
/// # Example
/// ```toml
/// [highlight]
/// command = ["pygmentize", "-f", "html", "-l", "{lang}"]
/// timeout_ms = 5000
/// workers = 4
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct HighlightConfig {
    /// Run the highlighter at all; when off every block is plain escaped code.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub enable: bool,

    /// Engine command line.
    #[serde(default = "defaults::highlight::command")]
    #[educe(Default = defaults::highlight::command())]
    pub command: Vec<String>,

    /// Language used for blocks without one.
    #[serde(default = "defaults::highlight::fallback_lang")]
    #[educe(Default = defaults::highlight::fallback_lang())]
    pub fallback_lang: String,

    /// Per-block time limit in milliseconds.
    #[serde(default = "defaults::highlight::timeout_ms")]
    #[educe(Default = defaults::highlight::timeout_ms())]
    pub timeout_ms: u64,

    /// Maximum number of concurrent engine processes.
    #[serde(default = "defaults::highlight::workers")]
    #[educe(Default = defaults::highlight::workers())]
    pub workers: usize,
}
