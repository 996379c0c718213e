//! Prompt title cleanup and width-aware truncation
//!
//! Title width is measured in display units: ideographs count 2, everything
//! else 1. A title is at most [`TITLE_UNIT_BUDGET`] units including the
//! trailing ellipsis.

use std::sync::OnceLock;

use regex::Regex;

use crate::matching::{contains_cjk, is_cjk};
use crate::surface::char_len;

pub const TITLE_UNIT_BUDGET: usize = 34;
const ELLIPSIS: &str = "...";
const ELLIPSIS_UNITS: usize = 3;
/// Chars of content kept by the fallback title before truncation
const FALLBACK_PREFIX_CHARS: usize = 30;
pub const UNTITLED: &str = "Untitled Prompt";

fn units(c: char) -> usize {
    if is_cjk(c) {
        2
    } else {
        1
    }
}

pub fn display_units(text: &str) -> usize {
    text.chars().map(units).sum()
}

fn is_break_char(c: char) -> bool {
    c.is_whitespace() || ",.;，。；、！？!?".contains(c)
}

/// Cut `title` to `max_units`, preferring a word boundary, and append "..."
///
/// Titles already within budget are returned unchanged.
pub fn smart_truncate(title: &str, max_units: usize) -> String {
    if title.is_empty() {
        return UNTITLED.to_string();
    }
    if display_units(title) <= max_units {
        return title.to_string();
    }

    let budget = max_units.saturating_sub(ELLIPSIS_UNITS);
    let mut kept: Vec<char> = Vec::new();
    let mut used = 0;
    let mut last_break = None;
    for c in title.chars() {
        if is_break_char(c) {
            last_break = Some(kept.len());
        }
        let cost = units(c);
        if used + cost > budget {
            break;
        }
        kept.push(c);
        used += cost;
    }

    // Back off to the last boundary when it costs only a few chars
    let ends_in_word = kept.last().is_some_and(|c| c.is_ascii_alphanumeric());
    if let Some(boundary) = last_break.filter(|b| *b > 0) {
        let tail = kept.len().saturating_sub(boundary);
        if ends_in_word && tail <= 5.min(kept.len() / 3) {
            kept.truncate(boundary + 1);
        }
    }

    let mut result: String = kept.into_iter().collect::<String>().trim().to_string();
    if contains_cjk(title) && result.ends_with([',', '，', ';', '；']) {
        result.pop();
    }
    result.push_str(ELLIPSIS);
    result
}

fn quote_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"^["'“”「」【】《》]+|["'“”「」【】《》]+$"#).ok())
        .as_ref()
}

fn label_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:标题|主题|title|theme)\s*[:：]\s*|^(?:关于|相关|有关|(?:regarding|about|on)\s+)").ok()
    })
    .as_ref()
}

/// Normalize a model-generated title
pub fn clean_title(raw: &str) -> String {
    let mut title = raw.trim().to_string();
    for re in [quote_re(), label_re(), quote_re()].into_iter().flatten() {
        title = re.replace_all(&title, "").trim().to_string();
    }
    if display_units(&title) > TITLE_UNIT_BUDGET {
        title = smart_truncate(&title, TITLE_UNIT_BUDGET);
    }
    title
}

/// Title derived from the content alone
pub fn fallback_title(content: &str) -> String {
    let content = content.trim();
    if content.is_empty() {
        return UNTITLED.to_string();
    }
    let prefix = if char_len(content) > FALLBACK_PREFIX_CHARS {
        let head: String = content.chars().take(FALLBACK_PREFIX_CHARS).collect();
        format!("{}{}", head.trim_end(), ELLIPSIS)
    } else {
        content.to_string()
    };
    smart_truncate(&prefix, TITLE_UNIT_BUDGET)
}
