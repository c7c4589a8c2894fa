//! Markdown to HTML conversion with a generated table of contents.
//!
//! Wraps `pulldown-cmark`: every heading gets a slug id, and the headings
//! are collected into a nested `<div class="toc">` list that templates can
//! place through the `toc` slot. Fenced code blocks come out as
//! `<pre><code class="language-X">` and are highlighted afterwards.

use crate::utils::html::{escape_html, slugify};
use pulldown_cmark::{CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd, html};
use rustc_hash::FxHashMap;

/// Result of converting one Markdown document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkdownOutput {
    /// Converted body
    pub html: String,
    /// Table of contents markup
    pub toc: String,
}

/// A heading collected for the table of contents.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TocEntry {
    level: u8,
    id: String,
    title: String,
}

/// Heading being buffered until its end tag.
struct PendingHeading<'a> {
    level: HeadingLevel,
    id: Option<CowStr<'a>>,
    classes: Vec<CowStr<'a>>,
    attrs: Vec<(CowStr<'a>, Option<CowStr<'a>>)>,
    title: String,
    inner: Vec<Event<'a>>,
}

/// Hands out unique fragment ids, suffixing repeats with `_1`, `_2`, ...
#[derive(Default)]
struct IdRegistry {
    seen: FxHashMap<String, usize>,
}

impl IdRegistry {
    fn unique(&mut self, base: String) -> String {
        let base = if base.is_empty() { "section".to_owned() } else { base };
        match self.seen.get_mut(&base) {
            None => {
                self.seen.insert(base.clone(), 0);
                base
            }
            Some(count) => {
                *count += 1;
                let id = format!("{base}_{count}");
                self.seen.insert(id.clone(), 0);
                id
            }
        }
    }
}

fn parser_options() -> Options {
    Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS
}

/// Convert Markdown to HTML and a table of contents.
pub fn to_html(source: &str) -> MarkdownOutput {
    let mut events = Vec::new();
    let mut entries = Vec::new();
    let mut ids = IdRegistry::default();
    let mut pending: Option<PendingHeading<'_>> = None;

    for event in Parser::new_ext(source, parser_options()) {
        match event {
            Event::Start(Tag::Heading {
                level,
                id,
                classes,
                attrs,
            }) => {
                pending = Some(PendingHeading {
                    level,
                    id,
                    classes,
                    attrs,
                    title: String::new(),
                    inner: Vec::new(),
                });
            }
            Event::End(TagEnd::Heading(_)) if pending.is_some() => {
                let Some(heading) = pending.take() else {
                    continue;
                };
                let id = match heading.id {
                    Some(explicit) => ids.unique(explicit.into_string()),
                    None => ids.unique(slugify(&heading.title)),
                };

                entries.push(TocEntry {
                    level: heading_level_to_num(heading.level),
                    id: id.clone(),
                    title: heading.title.trim().to_owned(),
                });

                events.push(Event::Start(Tag::Heading {
                    level: heading.level,
                    id: Some(id.into()),
                    classes: heading.classes,
                    attrs: heading.attrs,
                }));
                events.extend(heading.inner);
                events.push(Event::End(TagEnd::Heading(heading.level)));
            }
            event => match pending.as_mut() {
                Some(heading) => {
                    if let Event::Text(text) | Event::Code(text) = &event {
                        heading.title.push_str(text);
                    }
                    heading.inner.push(event);
                }
                None => events.push(event),
            },
        }
    }

    let mut body = String::with_capacity(source.len() * 3 / 2);
    html::push_html(&mut body, events.into_iter());

    MarkdownOutput {
        html: body,
        toc: render_toc(&entries),
    }
}

/// Nesting depth of every heading in the table of contents.
///
/// A heading nests under the closest preceding heading of a lower level.
/// After a skipped level (`#`, `###`, `##`) the shallower heading joins the
/// list the deeper one opened instead of starting a second one.
fn toc_depths(entries: &[TocEntry]) -> Vec<usize> {
    let Some(first) = entries.first() else {
        return Vec::new();
    };

    let mut depths = vec![0];
    let mut levels = vec![first.level];
    let mut parents: Vec<u8> = Vec::new();
    let mut last = first.level;

    for entry in &entries[1..] {
        let level = entry.level;
        if levels.last().is_some_and(|&open| level < open) {
            levels.pop();
            let closed = parents.iter().rev().take_while(|&&p| level <= p).count();
            levels.truncate(levels.len().saturating_sub(closed));
            parents.truncate(parents.len() - closed);
            levels.push(level);
        }
        if levels.last() != Some(&level) {
            parents.push(last);
            levels.push(level);
        }
        depths.push(parents.len());
        last = level;
    }
    depths
}

/// Render collected headings as a nested list.
fn render_toc(entries: &[TocEntry]) -> String {
    let mut out = String::from("<div class=\"toc\">\n");
    let mut open = 0usize;

    for (entry, depth) in entries.iter().zip(toc_depths(entries)) {
        if open == 0 || depth >= open {
            out.push_str("<ul>\n");
            open += 1;
        } else {
            while open > depth + 1 {
                out.push_str("</li>\n</ul>\n");
                open -= 1;
            }
            out.push_str("</li>\n");
        }
        out.push_str(&format!(
            "<li><a href=\"#{}\">{}</a>",
            entry.id,
            escape_html(&entry.title)
        ));
    }

    if open == 0 {
        out.push_str("<ul></ul>\n");
    }
    for _ in 0..open {
        out.push_str("</li>\n</ul>\n");
    }

    out.push_str("</div>\n");
    out
}

/// Convert heading level enum to number (1-6).
fn heading_level_to_num(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headings_get_ids() {
        let out = to_html("# Getting Started\n\ntext\n");
        assert!(out.html.contains("<h1 id=\"getting-started\">Getting Started</h1>"));
        assert!(out.html.contains("<p>text</p>"));
    }

    #[test]
    fn test_duplicate_heading_ids() {
        let out = to_html("## Usage\n\n## Usage\n\n## Usage\n");
        assert!(out.html.contains("id=\"usage\""));
        assert!(out.html.contains("id=\"usage_1\""));
        assert!(out.html.contains("id=\"usage_2\""));
    }

    #[test]
    fn test_heading_with_inline_code() {
        let out = to_html("## The `extends` directive\n");
        assert!(out.html.contains("id=\"the-extends-directive\""));
        assert!(out.html.contains("<code>extends</code>"));
        assert!(out.toc.contains("<a href=\"#the-extends-directive\">The extends directive</a>"));
    }

    #[test]
    fn test_fenced_code_block_language_class() {
        let out = to_html("```rust\nfn main() {}\n```\n");
        assert!(out.html.contains("<pre><code class=\"language-rust\">fn main() {}\n</code></pre>"));
    }

    #[test]
    fn test_fenced_code_block_escapes_content() {
        let out = to_html("```\na < b && c\n```\n");
        assert!(out.html.contains("<pre><code>a &lt; b &amp;&amp; c\n</code></pre>"));
    }

    #[test]
    fn test_toc_nesting() {
        let out = to_html("# A\n## B\n## C\n# D\n");
        let expected = concat!(
            "<div class=\"toc\">\n",
            "<ul>\n",
            "<li><a href=\"#a\">A</a>",
            "<ul>\n",
            "<li><a href=\"#b\">B</a>",
            "</li>\n",
            "<li><a href=\"#c\">C</a>",
            "</li>\n</ul>\n",
            "</li>\n",
            "<li><a href=\"#d\">D</a>",
            "</li>\n</ul>\n",
            "</div>\n",
        );
        assert_eq!(out.toc, expected);
    }

    #[test]
    fn test_toc_skipped_level_shares_one_sub_list() {
        let out = to_html("# A\n### Deep\n## Mid\n");
        let expected = concat!(
            "<div class=\"toc\">\n",
            "<ul>\n",
            "<li><a href=\"#a\">A</a>",
            "<ul>\n",
            "<li><a href=\"#deep\">Deep</a>",
            "</li>\n",
            "<li><a href=\"#mid\">Mid</a>",
            "</li>\n</ul>\n",
            "</li>\n</ul>\n",
            "</div>\n",
        );
        assert_eq!(out.toc, expected);
    }

    #[test]
    fn test_toc_depths() {
        let entry = |level| TocEntry {
            level,
            id: String::new(),
            title: String::new(),
        };
        let levels = |ls: &[u8]| ls.iter().map(|&l| entry(l)).collect::<Vec<_>>();

        assert_eq!(toc_depths(&levels(&[1, 2, 2, 1])), [0, 1, 1, 0]);
        assert_eq!(toc_depths(&levels(&[1, 3, 2, 1])), [0, 1, 1, 0]);
        assert_eq!(toc_depths(&levels(&[1, 2, 3, 2, 3])), [0, 1, 2, 1, 2]);
        // a deeper first heading does not nest the shallower one under it
        assert_eq!(toc_depths(&levels(&[3, 1, 2])), [0, 0, 1]);
        assert!(toc_depths(&[]).is_empty());
    }

    #[test]
    fn test_toc_ascii_fragment_ids() {
        let out = to_html("## Déjà vu\n");
        assert!(out.html.contains("<h2 id=\"deja-vu\">"));
        assert!(out.toc.contains("<a href=\"#deja-vu\">Déjà vu</a>"));
    }

    #[test]
    fn test_toc_without_headings() {
        let out = to_html("just text\n");
        assert_eq!(out.toc, "<div class=\"toc\">\n<ul></ul>\n</div>\n");
    }

    #[test]
    fn test_toc_escapes_titles() {
        let out = to_html("# Fish & Chips\n");
        assert!(out.toc.contains(">Fish &amp; Chips</a>"));
    }
}
