//! Markup helpers
//!
//! The editor widget produces HTML-ish markup. Word counts, suggestion
//! prompts, and image prompts all work on the plain text left after
//! stripping every tag.

use regex::Regex;
use std::sync::OnceLock;

fn tag_pattern() -> &'static Regex {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    TAGS.get_or_init(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"))
}

/// Remove every `<...>` tag, keeping the text between tags untouched.
pub fn strip_markup(markup: &str) -> String {
    tag_pattern().replace_all(markup, "").into_owned()
}

/// Count whitespace-delimited words in the plain text of `markup`.
///
/// Tags are removed without inserting a separator, so `<p>a</p><p>b</p>`
/// counts as one word, matching what the editor displays.
pub fn count_words(markup: &str) -> usize {
    strip_markup(markup).split_whitespace().count()
}

/// True when the markup has no visible text.
///
/// An empty editor still emits markup such as `<p><br></p>`, so both the
/// raw markup and the stripped text are checked.
pub fn is_blank(markup: &str) -> bool {
    markup.trim().is_empty() || strip_markup(markup).trim().is_empty()
}

/// Wrap a line of plain text as a paragraph, escaping the characters the
/// markup reserves.
pub fn paragraph(text: &str) -> String {
    let escaped = text
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    format!("<p>{}</p>", escaped)
}
