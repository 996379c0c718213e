//! Match confidence for the closing heuristic, plus keyword highlighting
//!
//! The store decides *which* prompts come back for a term. This module
//! decides whether a returned set (possibly empty) still looks like what the
//! user is typing toward. A set that is "matched" keeps the overlay open even
//! when the term grows long.
//!
//! Case folding is per char and never changes char counts, so offsets found
//! in folded text index the original text directly.

use serde::{Deserialize, Serialize};

use crate::prompt::PromptRecord;

/// Share of the term's chars that must appear in a field
const CHAR_COVERAGE_RATIO: f64 = 0.7;

/// Minimum term length (chars) for the forced ideograph rule
const FORCED_CJK_MIN_CHARS: usize = 3;

/// Why a candidate set counted as matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchReason {
    EmptyTerm,
    Substring,
    CharCoverage,
    Initialism,
    IdeographRun,
    DigitsStripped,
    Tag,
    HalfTerm,
    LeadingPair,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "reason")]
pub enum MatchConfidence {
    Matched(MatchReason),
    /// Ideograph input kept alive without any actual match
    Forced,
    NoMatch,
}

impl MatchConfidence {
    /// True only for a real match, never for a forced one
    pub fn is_genuine(&self) -> bool {
        matches!(self, MatchConfidence::Matched(_))
    }

    pub fn keeps_open(&self) -> bool {
        !matches!(self, MatchConfidence::NoMatch)
    }
}

/// CJK Unified Ideographs, Extension A, and Compatibility Ideographs
pub fn is_cjk(c: char) -> bool {
    matches!(c, '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}' | '\u{F900}'..='\u{FAFF}')
}

pub fn contains_cjk(text: &str) -> bool {
    text.chars().any(is_cjk)
}

#[inline]
fn fold_char(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

/// Lowercase `text` one char at a time, keeping the char count
pub fn fold_case(text: &str) -> String {
    text.chars().map(fold_char).collect()
}

/// Case-insensitive substring test; `needle_folded` must already be folded
pub fn contains_folded(haystack: &str, needle_folded: &str) -> bool {
    needle_folded.is_empty() || fold_case(haystack).contains(needle_folded)
}

/// Substring match of a term against title, content, or any tag
pub fn record_matches_term(record: &PromptRecord, term: &str) -> bool {
    let needle = fold_case(term.trim());
    if needle.is_empty() {
        return true;
    }
    contains_folded(&record.title, &needle)
        || contains_folded(&record.content, &needle)
        || record.tags.iter().any(|t| contains_folded(t, &needle))
}

struct FoldedRecord<'a> {
    title: String,
    content: String,
    record: &'a PromptRecord,
}

impl FoldedRecord<'_> {
    fn either_contains(&self, needle: &str) -> bool {
        self.title.contains(needle) || self.content.contains(needle)
    }
}

fn char_coverage(field: &str, term_chars: &[char], threshold: usize) -> bool {
    term_chars.iter().filter(|c| field.contains(**c)).count() >= threshold
}

fn initialism(term: &str) -> Option<String> {
    let latin_only = term
        .chars()
        .all(|c| c.is_ascii_alphabetic() || c.is_whitespace());
    if !latin_only {
        return None;
    }
    let acronym: String = term.split_whitespace().filter_map(|w| w.chars().next()).collect();
    (!acronym.is_empty()).then_some(acronym)
}

/// Ideograph run of a pinyin-in-progress term such as "润色r"
fn ideograph_run(term: &str) -> Option<String> {
    let ends_latin = term.chars().last().is_some_and(|c| c.is_ascii_alphabetic());
    if !ends_latin || !contains_cjk(term) {
        return None;
    }
    Some(term.chars().filter(|c| is_cjk(*c)).collect())
}

/// First half of `term`, rounded up; `None` below two chars
fn half_term(term: &str) -> Option<String> {
    let len = term.chars().count();
    let half: String = term.chars().take(len.div_ceil(2)).collect();
    (half.chars().count() >= 2).then_some(half)
}

fn direct_reason(candidate: &FoldedRecord<'_>, term: &str) -> Option<MatchReason> {
    if candidate.either_contains(term) {
        return Some(MatchReason::Substring);
    }

    let term_chars: Vec<char> = term.chars().collect();
    let threshold = ((term_chars.len() as f64 * CHAR_COVERAGE_RATIO).floor() as usize).max(1);
    if char_coverage(&candidate.title, &term_chars, threshold)
        || char_coverage(&candidate.content, &term_chars, threshold)
    {
        return Some(MatchReason::CharCoverage);
    }

    if let Some(acronym) = initialism(term) {
        if candidate.either_contains(&acronym) {
            return Some(MatchReason::Initialism);
        }
    }

    if let Some(run) = ideograph_run(term) {
        if candidate.either_contains(&run) {
            return Some(MatchReason::IdeographRun);
        }
    }

    if term.chars().any(|c| c.is_ascii_digit()) {
        let residual: String = term.chars().filter(|c| !c.is_ascii_digit()).collect();
        if !residual.is_empty() && candidate.either_contains(&residual) {
            return Some(MatchReason::DigitsStripped);
        }
    }

    if candidate
        .record
        .tags
        .iter()
        .any(|tag| fold_case(tag).contains(term))
    {
        return Some(MatchReason::Tag);
    }

    None
}

/// Decide whether `candidates` still match what the user is typing
pub fn match_confidence(term: &str, candidates: &[PromptRecord]) -> MatchConfidence {
    let term = fold_case(term.trim());
    if term.is_empty() {
        return MatchConfidence::Matched(MatchReason::EmptyTerm);
    }

    let folded: Vec<FoldedRecord<'_>> = candidates
        .iter()
        .map(|record| FoldedRecord {
            title: fold_case(&record.title),
            content: fold_case(&record.content),
            record,
        })
        .collect();

    if let Some(reason) = folded.iter().find_map(|c| direct_reason(c, &term)) {
        return MatchConfidence::Matched(reason);
    }

    // Degraded retries
    let term_len = term.chars().count();
    if let Some(half) = half_term(&term) {
        if folded.iter().any(|c| c.either_contains(&half)) {
            return MatchConfidence::Matched(MatchReason::HalfTerm);
        }
    }

    if term_len >= 2 {
        let pair: String = term.chars().take(2).collect();
        if folded.iter().any(|c| c.either_contains(&pair)) {
            return MatchConfidence::Matched(MatchReason::LeadingPair);
        }
    }

    if contains_cjk(&term) && term_len >= FORCED_CJK_MIN_CHARS {
        return MatchConfidence::Forced;
    }

    MatchConfidence::NoMatch
}

/// One run of highlighted or plain text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightedPart {
    pub text: String,
    pub is_highlight: bool,
}

/// Split `text` into runs, marking case-insensitive occurrences of `term`
pub fn highlight(text: &str, term: &str) -> Vec<HighlightedPart> {
    let needle: Vec<char> = fold_case(term.trim()).chars().collect();
    let chars: Vec<char> = text.chars().collect();
    if needle.is_empty() || chars.is_empty() {
        return vec![HighlightedPart {
            text: text.to_string(),
            is_highlight: false,
        }];
    }

    let folded: Vec<char> = chars.iter().map(|c| fold_char(*c)).collect();
    let mut parts = Vec::new();
    let mut plain_start = 0;
    let mut i = 0;
    while i + needle.len() <= folded.len() {
        if folded[i..i + needle.len()] == needle[..] {
            if plain_start < i {
                parts.push(HighlightedPart {
                    text: chars[plain_start..i].iter().collect(),
                    is_highlight: false,
                });
            }
            parts.push(HighlightedPart {
                text: chars[i..i + needle.len()].iter().collect(),
                is_highlight: true,
            });
            i += needle.len();
            plain_start = i;
        } else {
            i += 1;
        }
    }
    if plain_start < chars.len() {
        parts.push(HighlightedPart {
            text: chars[plain_start..].iter().collect(),
            is_highlight: false,
        });
    }
    parts
}
