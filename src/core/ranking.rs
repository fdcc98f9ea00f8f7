//! Search result ranking
//!
//! Picks the instrument page that best matches an ISIN and/or free-text hint out of a
//! quote site's search result page. Candidates are scored by section priority, ISIN
//! proximity, hint token overlap and a penalty for listing pages.

use crate::core::html::window;
use crate::core::identifier::Section;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

pub const MAX_CANDIDATES: usize = 50;
pub const CONTEXT_CHARS: usize = 220;
const ISIN_BONUS: i32 = 50;
const HINT_TOKEN_BONUS: i32 = 6;
const LISTING_PENALTY: i32 = 10;
const LISTING_MARKERS: [&str; 3] = ["world-", "most-", "top-"];

static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"href=["']((?:https?://[^"'/\s]+)?/(funds|etfs|bonds|rates-bonds|equities|indices|currencies|crypto|certificates|commodities)/[^"'#?\s<>]+)["']"#,
    )
    .expect("valid search link regex")
});

#[derive(Debug, Clone, PartialEq)]
pub struct SearchCandidate {
    pub href: String,
    pub section: Section,
    pub position: usize,
}

/// Every instrument link in a search page, in document order, capped at [`MAX_CANDIDATES`].
pub fn extract_candidates(search_html: &str) -> Vec<SearchCandidate> {
    LINK_RE
        .captures_iter(search_html)
        .filter_map(|caps| {
            let href = caps.get(1)?;
            Some(SearchCandidate {
                href: href.as_str().to_string(),
                section: Section::from_segment(&caps[2]),
                position: href.start(),
            })
        })
        .take(MAX_CANDIDATES)
        .collect()
}

fn fold_char(c: char) -> char {
    match c {
        'á' | 'à' | 'ä' | 'â' | 'ã' => 'a',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' | 'õ' => 'o',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        other => other,
    }
}

/// Lowercases and strips common Latin diacritics.
pub fn fold_diacritics(s: &str) -> String {
    s.to_lowercase().chars().map(fold_char).collect()
}

/// Hint tokens used for matching: folded, split on non-alphanumerics, at least 3 chars.
pub fn hint_tokens(hint: &str) -> Vec<String> {
    fold_diacritics(hint)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 3)
        .map(str::to_string)
        .collect()
}

/// Cache-key form of a hint: trimmed, lowercased, whitespace runs joined with `-`.
pub fn hint_key(hint: &str) -> String {
    hint.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

fn slug_tokens(href: &str) -> Vec<String> {
    let path = href.split("://").last().unwrap_or(href);
    fold_diacritics(path)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Score of a single candidate within its source document.
pub fn score_candidate(
    candidate: &SearchCandidate,
    search_html: &str,
    isin: &str,
    tokens: &[String],
) -> i32 {
    let mut score = candidate.section.priority();
    let end = candidate.position + candidate.href.len();
    let context = window(search_html, candidate.position, end, CONTEXT_CHARS, CONTEXT_CHARS);

    if !isin.is_empty() && context.to_uppercase().contains(&isin.to_uppercase()) {
        score += ISIN_BONUS;
    }

    if !tokens.is_empty() {
        let folded_context = fold_diacritics(context);
        let slug = slug_tokens(&candidate.href);
        for token in tokens {
            if folded_context.contains(token.as_str()) || slug.iter().any(|s| s == token) {
                score += HINT_TOKEN_BONUS;
            }
        }
    }

    let lower_href = candidate.href.to_lowercase();
    if LISTING_MARKERS.iter().any(|m| lower_href.contains(m)) {
        score -= LISTING_PENALTY;
    }

    score
}

/// Best matching link of a search page, or `None` when there are no candidates.
/// Ties go to the earliest candidate in the document.
pub fn pick_best_link(search_html: &str, isin: &str, hint: &str) -> Option<String> {
    if search_html.trim().is_empty() {
        return None;
    }
    let tokens = hint_tokens(hint);
    let mut best: Option<(i32, SearchCandidate)> = None;
    for candidate in extract_candidates(search_html) {
        let score = score_candidate(&candidate, search_html, isin, &tokens);
        debug!(href = %candidate.href, score, "Scored search candidate");
        if best.as_ref().is_none_or(|(top, _)| score > *top) {
            best = Some((score, candidate));
        }
    }
    best.map(|(_, candidate)| candidate.href)
}
