//! HTML cleanup for generated documents.
//!
//! Models wrap HTML in markdown fences, emit whole `<html>` pages, or fall
//! back to plain prose. [`sanitize_html`] normalizes all of these into a
//! body fragment that starts with a heading. Applying it twice gives the
//! same result as applying it once.

use std::sync::LazyLock;

use regex::Regex;

/// Heading added when the content has none of its own.
pub const DEFAULT_HEADING: &str = "<h1>Document</h1>";

/// Page-level wrappers that never belong in a document fragment.
static WRAPPERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)<!doctype[^>]*>",
        r"(?is)<head\b[^>]*>.*?</head\s*>",
        r"(?i)</?html\b[^>]*>",
        r"(?i)</?body\b[^>]*>",
    ]
    .into_iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Normalize model output into a document fragment.
pub fn sanitize_html(raw: &str) -> String {
    let text = strip_wrappers(raw);
    if text.is_empty() {
        return DEFAULT_HEADING.to_string();
    }
    if !contains_tag(&text) {
        return plain_text_to_html(&text);
    }
    if starts_with_heading(&text) {
        text
    } else {
        format!("{}\n{}", DEFAULT_HEADING, text)
    }
}

/// Remove markdown fences and page wrappers, leaving trimmed content.
///
/// Only the markers go; text before, between and after fences is kept.
/// Removal repeats until nothing changes, since deleting one marker can
/// splice the pieces of another together. Used on its own for section
/// bodies, which must not gain a heading.
pub fn strip_wrappers(raw: &str) -> String {
    let mut text = raw.trim().to_string();
    loop {
        let next = strip_once(&text);
        if next == text {
            return text;
        }
        text = next;
    }
}

fn strip_once(text: &str) -> String {
    let kept = text
        .lines()
        .filter(|line| !is_fence_line(line))
        .collect::<Vec<_>>()
        .join("\n");
    let mut text = strip_inline_fences(&kept);
    for pattern in WRAPPERS.iter() {
        text = pattern.replace_all(&text, "").into_owned();
    }
    text.trim().to_string()
}

/// Drop every run of three or more backticks, plus the language tag of an
/// opening fence (```html<h1>, ```sh followed by a newline).
fn strip_inline_fences(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("```") {
        out.push_str(&rest[..start]);
        let after = rest[start..].trim_start_matches('`');
        let tag_len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | '_')))
            .unwrap_or(after.len());
        let tag_ends_marker = match after[tag_len..].chars().next() {
            None | Some('<') => true,
            Some(c) => c.is_whitespace(),
        };
        rest = if tag_ends_marker { &after[tag_len..] } else { after };
    }
    out.push_str(rest);
    out
}

/// Escape text for use inside an element.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Blank-line separated paragraphs; single newlines become `<br>`.
fn plain_text_to_html(text: &str) -> String {
    let mut paragraphs: Vec<Vec<&str>> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            if !current.is_empty() {
                paragraphs.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }

    let mut html = String::from(DEFAULT_HEADING);
    for lines in paragraphs {
        let body: Vec<String> = lines.into_iter().map(escape_html).collect();
        html.push_str("\n<p>");
        html.push_str(&body.join("<br>"));
        html.push_str("</p>");
    }
    html
}

fn is_fence_line(line: &str) -> bool {
    let line = line.trim();
    line.starts_with("```")
        && line
            .trim_start_matches('`')
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | '_'))
}

/// Whether the text has anything that looks like an element tag.
fn contains_tag(text: &str) -> bool {
    text.match_indices('<').any(|(i, _)| {
        let rest = &text[i + 1..];
        let name = rest.strip_prefix('/').unwrap_or(rest);
        name.starts_with(|c: char| c.is_ascii_alphabetic()) && rest.contains('>')
    })
}

fn starts_with_heading(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes.len() >= 4
        && bytes[0] == b'<'
        && bytes[1].eq_ignore_ascii_case(&b'h')
        && (b'1'..=b'6').contains(&bytes[2])
        && (bytes[3] == b'>' || bytes[3].is_ascii_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_paragraphs() {
        assert_eq!(
            sanitize_html("Hello\n\nWorld"),
            "<h1>Document</h1>\n<p>Hello</p>\n<p>World</p>"
        );
        assert_eq!(
            sanitize_html("line one\nline two\n\n\n  a < b & c  "),
            "<h1>Document</h1>\n<p>line one<br>line two</p>\n<p>a &lt; b &amp; c</p>"
        );
    }

    #[test]
    fn test_fenced_page() {
        let raw = "```html\n<!DOCTYPE html>\n<html><head><title>x</title></head><body>\n<h2>Intro</h2><p>Hi</p>\n</body></html>\n```";
        assert_eq!(sanitize_html(raw), "<h2>Intro</h2><p>Hi</p>");
    }

    #[test]
    fn test_heading_prefixed_when_missing() {
        assert_eq!(sanitize_html("<p>Body</p>"), "<h1>Document</h1>\n<p>Body</p>");
        assert_eq!(sanitize_html("<H3 class=\"t\">T</H3>"), "<H3 class=\"t\">T</H3>");
        // <header> is not a heading.
        assert!(sanitize_html("<header>x</header>").starts_with(DEFAULT_HEADING));
    }

    #[test]
    fn test_empty() {
        assert_eq!(sanitize_html("  \n```\n```"), DEFAULT_HEADING);
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "Hello\n\nWorld",
            "plain & simple\nsecond line",
            "```html\n<html><body><p>x</p></body></html>\n```",
            "<h1>Title</h1><p>ok</p>",
            "<section><p>no heading</p></section>",
            "",
            "```\nfenced prose only\n```",
            "<h2>T</h2><ht<html>ml>x",
            "<bo<body>dy><p>nested</p>",
            "``<html>`html\n<p>spliced</p>",
            "```<h1>X</h1><p>body</p>```",
        ];
        for input in inputs {
            let once = sanitize_html(input);
            assert_eq!(sanitize_html(&once), once, "input: {input:?}");
        }
    }

    #[test]
    fn test_spliced_wrappers_removed() {
        assert_eq!(sanitize_html("<h2>T</h2><ht<html>ml>x"), "<h2>T</h2>x");
    }

    #[test]
    fn test_fence_markers_removed_content_kept() {
        assert_eq!(sanitize_html("```<h1>X</h1><p>body</p>```"), "<h1>X</h1><p>body</p>");
        assert_eq!(sanitize_html("```html\n<h1>A</h1>\n```\n<p>more</p>"), "<h1>A</h1>\n<p>more</p>");
        assert_eq!(
            sanitize_html("Intro text\n```html\n<h2>B</h2>\n```"),
            "<h1>Document</h1>\nIntro text\n<h2>B</h2>"
        );
        assert_eq!(strip_wrappers("````\n<p>four ticks</p>\n````"), "<p>four ticks</p>");
    }

    #[test]
    fn test_strip_wrappers_keeps_section_body() {
        assert_eq!(strip_wrappers("```html\n<h2>Usage</h2>\n<p>Run it.</p>\n```"), "<h2>Usage</h2>\n<p>Run it.</p>");
        assert_eq!(WRAPPERS.len(), 4);
    }
}
