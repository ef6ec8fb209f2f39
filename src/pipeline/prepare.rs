//! Preparation: deterministic cleanup of caller-supplied Markdown.
//!
//! ## Why is preparation necessary?
//!
//! Markdown handed to the exporter usually comes from a language model or
//! a chat client. It is valid enough for a human reader but carries quirks a
//! parser treats literally:
//!
//! - Windows `\r\n` line endings
//! - Zero-width spaces and BOMs pasted from rich text
//! - `![alt](image_query: red fox)`, where the space stops the parser from
//!   seeing an image destination at all
//! - `:rocket:`-style shortcodes that would print verbatim
//!
//! Every rule is a pure `&str → String` function so they can be tested in
//! isolation.
//!
//! ## Rule Order
//!
//! Line endings are normalised first so the later regexes only deal with
//! `\n`. Invisible characters go before the image-query rewrite because a
//! zero-width space inside `image_query:` would otherwise defeat it.

use crate::tree::IMAGE_QUERY_PREFIX;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Apply all preparation rules to raw Markdown.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF / CR → LF)
/// 2. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 3. Wrap `image_query:` destinations in `<…>` so they parse as image URLs
/// 4. Expand known `:alias:` emoji shortcodes outside code
pub fn prepare_markdown(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    let s = wrap_image_queries(&s);
    expand_emoji_shortcodes(&s)
}

/// Join a list of lines into one Markdown document, then prepare it.
pub fn prepare_lines<S: AsRef<str>>(lines: &[S]) -> String {
    let joined = lines
        .iter()
        .map(|l| l.as_ref())
        .collect::<Vec<_>>()
        .join("\n");
    prepare_markdown(&joined)
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 3: Wrap image-query destinations ───────────────────────────────────
//
// `![alt](image_query: a red fox)` is not an image to CommonMark: a link
// destination may not contain spaces unless it is wrapped in angle brackets.
// The rewrite also drops the whitespace after the colon so the marker is
// always `image_query:<text>`, which is what the resolver expects.

static RE_IMAGE_QUERY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"!\[([^\]\n]*)\]\(\s*<?\s*image_query:\s*([^)>\n]*?)\s*>?\s*\)").unwrap()
});

fn wrap_image_queries(input: &str) -> String {
    RE_IMAGE_QUERY
        .replace_all(input, |caps: &Captures| {
            let alt = &caps[1];
            let query = caps[2].trim();
            let alt = if alt.trim().is_empty() { query } else { alt };
            format!("![{alt}](<{IMAGE_QUERY_PREFIX}{query}>)")
        })
        .to_string()
}

// ── Rule 4: Expand emoji shortcodes ─────────────────────────────────────────

static RE_SHORTCODE: Lazy<Regex> = Lazy::new(|| Regex::new(r":([a-z0-9_+\-]+):").unwrap());

/// Shortcodes commonly emitted by chat models. Anything else stays as typed.
const EMOJI_ALIASES: &[(&str, &str)] = &[
    ("smile", "😄"),
    ("grin", "😁"),
    ("wink", "😉"),
    ("heart", "❤️"),
    ("thumbsup", "👍"),
    ("+1", "👍"),
    ("thumbsdown", "👎"),
    ("rocket", "🚀"),
    ("star", "⭐"),
    ("fire", "🔥"),
    ("tada", "🎉"),
    ("warning", "⚠️"),
    ("check", "✔️"),
    ("white_check_mark", "✅"),
    ("x", "❌"),
    ("bulb", "💡"),
    ("memo", "📝"),
    ("chart_with_upwards_trend", "📈"),
    ("calendar", "📅"),
    ("point_right", "👉"),
];

/// Fenced code blocks and inline code spans. Shortcodes inside them stay
/// literal, so `a::x::b` is never touched.
static RE_CODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?ms)^[ \t]*```[^\n]*\n.*?^[ \t]*```[ \t]*$|^[ \t]*~~~[^\n]*\n.*?^[ \t]*~~~[ \t]*$|`[^`\n]+`",
    )
    .unwrap()
});

fn expand_emoji_shortcodes(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last = 0;
    for code in RE_CODE.find_iter(input) {
        out.push_str(&expand_in_prose(&input[last..code.start()]));
        out.push_str(code.as_str());
        last = code.end();
    }
    out.push_str(&expand_in_prose(&input[last..]));
    out
}

fn expand_in_prose(input: &str) -> String {
    RE_SHORTCODE
        .replace_all(input, |caps: &Captures| {
            EMOJI_ALIASES
                .iter()
                .find(|(alias, _)| *alias == &caps[1])
                .map(|(_, emoji)| (*emoji).to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_remove_invisible_chars() {
        assert_eq!(remove_invisible_chars("\u{FEFF}he\u{200B}llo"), "hello");
    }

    #[test]
    fn test_wrap_image_query_with_spaces() {
        assert_eq!(
            wrap_image_queries("see ![fox](image_query: a red fox) here"),
            "see ![fox](<image_query:a red fox>) here"
        );
    }

    #[test]
    fn test_wrap_image_query_empty_alt_uses_query() {
        assert_eq!(
            wrap_image_queries("![](image_query:sunset)"),
            "![sunset](<image_query:sunset>)"
        );
    }

    #[test]
    fn test_wrap_image_query_is_idempotent() {
        let once = wrap_image_queries("![a](image_query: b c)");
        assert_eq!(wrap_image_queries(&once), once);
    }

    #[test]
    fn test_regular_images_untouched() {
        let md = "![logo](https://example.com/logo.png)";
        assert_eq!(wrap_image_queries(md), md);
    }

    #[test]
    fn test_emoji_known_and_unknown() {
        assert_eq!(expand_emoji_shortcodes("go :rocket:"), "go 🚀");
        assert_eq!(expand_emoji_shortcodes("time 10:30:00"), "time 10:30:00");
        assert_eq!(expand_emoji_shortcodes(":not_an_alias:"), ":not_an_alias:");
    }

    #[test]
    fn test_emoji_left_alone_in_fenced_code() {
        let md = "```rust\nuse a::x::b;\n```\n\ndone :x:";
        assert_eq!(
            expand_emoji_shortcodes(md),
            "```rust\nuse a::x::b;\n```\n\ndone ❌"
        );

        let tilde = "~~~\nstd::x::y\n~~~";
        assert_eq!(expand_emoji_shortcodes(tilde), tilde);
    }

    #[test]
    fn test_emoji_left_alone_in_inline_code() {
        assert_eq!(
            expand_emoji_shortcodes("call `std::x::y` :rocket:"),
            "call `std::x::y` 🚀"
        );
    }

    #[test]
    fn test_prepare_lines_joins() {
        assert_eq!(prepare_lines(&["# T", "", "body\r"]), "# T\n\nbody\n");
    }
}
