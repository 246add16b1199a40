//! JSON extraction from free-form model text.
//!
//! Models asked for "one JSON object" reply with prose around it, wrap it in
//! a fence, leave trailing commas, or emit two candidates. Extraction runs a
//! fixed, ordered list of pure [`Strategy`] values; the first one that yields
//! a JSON object wins.
//!
//! A fence is only unwrapped when it opens before the JSON does; a fence
//! mentioned inside a string value is content. The fence body is tried
//! first, then the raw text.
//!
//! ```text
//! text ──fenced body, raw text──▶ candidate
//!        ├─ ObjectSpan      first balanced {...}, strict
//!        ├─ RepairedSpan    same span, trailing commas stripped
//!        ├─ RepairedWhole   whole candidate, repaired
//!        └─ LineScan        each line on its own, strict then repaired
//! ```

use serde_json::{Map, Value};

/// One extraction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// First balanced `{...}` span, parsed strictly.
    ObjectSpan,
    /// First balanced span with trailing commas removed.
    RepairedSpan,
    /// The whole candidate with trailing commas removed.
    RepairedWhole,
    /// Each line tried independently.
    LineScan,
}

/// Strategies in the order they are attempted.
pub const STRATEGIES: [Strategy; 4] = [
    Strategy::ObjectSpan,
    Strategy::RepairedSpan,
    Strategy::RepairedWhole,
    Strategy::LineScan,
];

impl Strategy {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::ObjectSpan => "object_span",
            Strategy::RepairedSpan => "repaired_span",
            Strategy::RepairedWhole => "repaired_whole",
            Strategy::LineScan => "line_scan",
        }
    }

    /// Apply this strategy to an already fence-unwrapped candidate.
    pub fn apply(&self, candidate: &str) -> Option<Map<String, Value>> {
        match self {
            Strategy::ObjectSpan => first_object_span(candidate).and_then(parse_object),
            Strategy::RepairedSpan => first_object_span(candidate)
                .and_then(|span| parse_object(&strip_trailing_commas(span))),
            Strategy::RepairedWhole => parse_object(&strip_trailing_commas(candidate)),
            Strategy::LineScan => parse_lines(candidate),
        }
    }
}

/// A successfully extracted object and the strategy that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub object: Map<String, Value>,
    pub strategy: Strategy,
}

/// Extract the first JSON object from model text.
pub fn extract_json_object(text: &str) -> Option<Extracted> {
    candidates(text, &['{']).into_iter().find_map(|candidate| {
        STRATEGIES.iter().find_map(|strategy| {
            strategy.apply(candidate).map(|object| Extracted {
                object,
                strategy: *strategy,
            })
        })
    })
}

/// Texts to search, in order: the body of a fence that opens before the
/// first of `openers`, then the whole text.
fn candidates<'a>(text: &'a str, openers: &[char]) -> Vec<&'a str> {
    let mut out = Vec::with_capacity(2);
    if let Some(fence) = text.find("```") {
        let json_start = text.find(|c| openers.contains(&c));
        if json_start.is_none_or(|start| fence < start)
            && let Some(body) = unwrap_fence(text)
        {
            out.push(body);
        }
    }
    out.push(text.trim());
    out
}

/// Extract a JSON array from model text.
///
/// Accepts a bare array, or an object carrying an array under one of
/// `wrapper_keys` (e.g. `{"files": [...]}`).
pub fn extract_json_array(text: &str, wrapper_keys: &[&str]) -> Option<Vec<Value>> {
    candidates(text, &['[', '{'])
        .into_iter()
        .find_map(|candidate| array_from(candidate, wrapper_keys))
}

fn array_from(candidate: &str, wrapper_keys: &[&str]) -> Option<Vec<Value>> {
    let bare_array = || {
        first_span(candidate, '[', ']').and_then(|span| {
            parse_array(span).or_else(|| parse_array(&strip_trailing_commas(span)))
        })
    };
    let wrapped = || {
        extract_json_object(candidate).and_then(|extracted| {
            wrapper_keys.iter().find_map(|key| match extracted.object.get(*key) {
                Some(Value::Array(items)) => Some(items.clone()),
                _ => None,
            })
        })
    };

    let array_first = match (candidate.find('['), candidate.find('{')) {
        (Some(bracket), Some(brace)) => bracket < brace,
        (Some(_), None) => true,
        _ => false,
    };

    if array_first {
        bare_array().or_else(wrapped)
    } else {
        wrapped().or_else(bare_array)
    }
}

/// Flatten array items into strings.
///
/// Strings are taken as-is; objects contribute their `path`, `name` or
/// `title` field. Blank entries are dropped.
pub fn string_items(items: &[Value]) -> Vec<String> {
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Object(obj) => ["path", "name", "title"]
                .iter()
                .find_map(|k| obj.get(*k).and_then(Value::as_str))
                .map(|s| s.trim().to_string()),
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .collect()
}

/// Return the body of the first fenced code block, if the text has one.
///
/// The language tag after the opening fence is dropped. An unterminated
/// fence yields everything after the opening line.
pub fn unwrap_fence(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_ticks = &text[start + 3..];
    let body_start = after_ticks.find('\n').map(|i| i + 1).unwrap_or(after_ticks.len());
    let body = &after_ticks[body_start..];
    let body = match body.find("```") {
        Some(end) => &body[..end],
        None => body,
    };
    Some(body.trim())
}

/// First balanced `{...}` span in the text.
pub fn first_object_span(text: &str) -> Option<&str> {
    first_span(text, '{', '}')
}

/// Try every line on its own, strictly and then repaired.
pub fn parse_lines(text: &str) -> Option<Map<String, Value>> {
    text.lines().find_map(|line| {
        let line = line.trim();
        parse_object(line).or_else(|| parse_object(&strip_trailing_commas(line)))
    })
}

/// Extract a balanced fragment between matching delimiters.
///
/// Delimiters inside string literals are ignored.
pub fn first_span(text: &str, open: char, close: char) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;
    let mut start_idx = None;

    for (i, c) in text.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        if in_string {
            match c {
                '\\' => escape_next = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        if c == '"' && start_idx.is_some() {
            in_string = true;
        } else if c == open {
            if depth == 0 {
                start_idx = Some(i);
            }
            depth += 1;
        } else if c == close && depth > 0 {
            depth -= 1;
            if depth == 0
                && let Some(start) = start_idx
            {
                return Some(&text[start..i + c.len_utf8()]);
            }
        }
    }

    None
}

/// Repair common model mistakes: trailing commas before `}`/`]` and
/// typographic quotes. String literals are left untouched.
pub fn strip_trailing_commas(json: &str) -> String {
    let normalized: String = json
        .chars()
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' => '"',
            other => other,
        })
        .collect();

    let chars: Vec<char> = normalized.chars().collect();
    let mut out = String::with_capacity(normalized.len());
    let mut in_string = false;
    let mut escape_next = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            if escape_next {
                escape_next = false;
            } else if c == '\\' {
                escape_next = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }

    out
}

fn parse_object(s: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(s.trim()) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn parse_array(s: &str) -> Option<Vec<Value>> {
    match serde_json::from_str::<Value>(s.trim()) {
        Ok(Value::Array(items)) => Some(items),
        _ => None,
    }
}
