//! Small HTML helpers for pattern-based extraction
//!
//! Field extraction is written as ordered lists of independent [`Matcher`]s that are
//! tried in sequence until one produces a value.

use regex::{Captures, Regex};
use std::sync::LazyLock;

static ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(#?[A-Za-z0-9]+);").expect("valid entity regex"));
static SCRIPT_STYLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b.*?</script>|<style\b.*?</style>").expect("valid script regex")
});
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid tag regex"));
static SPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// A single extraction strategy over a raw document.
pub type Matcher<T> = fn(&str) -> Option<T>;

/// Runs matchers in priority order and returns the first value produced.
pub fn first_match<T>(html: &str, matchers: &[Matcher<T>]) -> Option<T> {
    matchers.iter().find_map(|matcher| matcher(html))
}

fn decode_entity(entity: &str) -> Option<&'static str> {
    let decoded = match entity {
        "amp" => "&",
        "quot" => "\"",
        "apos" | "#39" | "#039" => "'",
        "lt" => "<",
        "gt" => ">",
        "nbsp" => " ",
        "aacute" => "á",
        "eacute" => "é",
        "iacute" => "í",
        "oacute" => "ó",
        "uacute" => "ú",
        "Aacute" => "Á",
        "Eacute" => "É",
        "Iacute" => "Í",
        "Oacute" => "Ó",
        "Uacute" => "Ú",
        "ntilde" => "ñ",
        "Ntilde" => "Ñ",
        "uuml" => "ü",
        "Uuml" => "Ü",
        "ordf" => "ª",
        "ordm" => "º",
        "iexcl" => "¡",
        "iquest" => "¿",
        "euro" => "€",
        _ => return None,
    };
    Some(decoded)
}

/// Decodes a fixed set of named entities in a single pass. Unknown entities are kept.
pub fn html_decode(s: &str) -> String {
    ENTITY_RE
        .replace_all(s, |caps: &Captures| {
            decode_entity(&caps[1])
                .map(str::to_string)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Visible text of a fragment: scripts and tags removed, entities decoded.
pub fn strip_tags(html: &str) -> String {
    let without_scripts = SCRIPT_STYLE_RE.replace_all(html, " ");
    let without_tags = TAG_RE.replace_all(&without_scripts, " ");
    html_decode(&without_tags)
}

/// Visible text with whitespace collapsed and trimmed.
pub fn clean_text(html: &str) -> String {
    SPACE_RE.replace_all(&strip_tags(html), " ").trim().to_string()
}

/// Cleaned text of the first capture group of the first match, if non-empty.
pub fn capture_text(re: &Regex, html: &str) -> Option<String> {
    re.captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| clean_text(m.as_str()))
        .filter(|s| !s.is_empty())
}

fn floor_boundary(s: &str, mut idx: usize) -> usize {
    idx = idx.min(s.len());
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_boundary(s: &str, mut idx: usize) -> usize {
    idx = idx.min(s.len());
    while !s.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

/// Slice of `s` spanning `before` bytes ahead of `start` to `after` bytes past `end`,
/// widened to the nearest char boundaries.
pub fn window(s: &str, start: usize, end: usize, before: usize, after: usize) -> &str {
    let from = floor_boundary(s, start.saturating_sub(before));
    let to = ceil_boundary(s, end.saturating_add(after));
    &s[from..to]
}

/// Prefix of at most `max` bytes, cut on a char boundary.
pub fn head(s: &str, max: usize) -> &str {
    &s[..floor_boundary(s, max)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_decode() {
        assert_eq!(html_decode("Fondo &amp; Cia"), "Fondo & Cia");
        assert_eq!(html_decode("Renta Variable Espa&ntilde;a"), "Renta Variable España");
        assert_eq!(html_decode("&quot;Bolsa&quot;&nbsp;&lt;1&gt;"), "\"Bolsa\" <1>");
        assert_eq!(html_decode("Gesti&oacute;n &#39;A&#39;"), "Gestión 'A'");
        assert_eq!(html_decode("&amp;lt;"), "&lt;");
        assert_eq!(html_decode("&copy; 2024"), "&copy; 2024");
    }

    #[test]
    fn test_clean_text() {
        let html = "<h1>\n  Apple <b>Inc</b>\n</h1><script>var a = '<b>';</script>";
        assert_eq!(clean_text(html), "Apple Inc");
    }

    #[test]
    fn test_first_match_respects_order() {
        fn none(_: &str) -> Option<u32> {
            None
        }
        fn one(_: &str) -> Option<u32> {
            Some(1)
        }
        fn two(_: &str) -> Option<u32> {
            Some(2)
        }
        assert_eq!(first_match("", &[none, one, two]), Some(1));
        assert_eq!(first_match("", &[none, two, one]), Some(2));
        assert_eq!(first_match::<u32>("", &[none]), None);
    }

    #[test]
    fn test_window_respects_char_boundaries() {
        let s = "ññññ€abc€ññññ";
        let start = s.find("abc").unwrap();
        let w = window(s, start, start + 3, 2, 2);
        assert!(w.contains("abc"));
        assert_eq!(window("abc", 1, 2, 10, 10), "abc");
        assert_eq!(head("añb", 2), "a");
    }
}
