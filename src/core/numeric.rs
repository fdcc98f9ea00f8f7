//! Tolerant number parsing for scraped and loosely typed values

use crate::core::html::strip_tags;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static NUMBER_LIKE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"-?\b\d{1,3}(?:[ \x{a0}\x{202f}]\d{3}\b)+(?:[.,]\d+)?|-?\d+(?:[.,]\d+)+")
        .expect("valid number regex")
});

fn is_group_space(c: char) -> bool {
    matches!(c, ' ' | '\u{a0}' | '\u{202f}')
}

/// A group space only separates thousands when exactly three digits follow it.
fn starts_digit_group(rest: &[char]) -> bool {
    rest.len() >= 3
        && rest[..3].iter().all(char::is_ascii_digit)
        && !rest.get(3).is_some_and(char::is_ascii_digit)
}

/// Parses a number written in European (`1.234,56`) or plain (`1234.56`) notation.
///
/// Only the first contiguous run of digits and separators is considered, so trailing
/// units such as `EUR` or `%` are ignored. Spaces count as thousands separators when
/// they sit between digit groups. When both `.` and `,` are present the one that occurs
/// last is the decimal separator; a lone `,` is a decimal separator.
/// Returns `None` for anything that does not yield a finite number.
pub fn parse_european_number(raw: &str) -> Option<f64> {
    let first_digit = raw.find(|c: char| c.is_ascii_digit())?;
    let negative = raw[..first_digit]
        .trim_end()
        .ends_with(['-', '\u{2212}']);

    let chars: Vec<char> = raw[first_digit..].chars().collect();
    let mut run = String::new();
    for (i, c) in chars.iter().enumerate() {
        if c.is_ascii_digit() || matches!(c, '.' | ',') {
            run.push(*c);
        } else if is_group_space(*c)
            && run.ends_with(|p: char| p.is_ascii_digit())
            && starts_digit_group(&chars[i + 1..])
        {
            continue;
        } else {
            break;
        }
    }
    let run = run.trim_end_matches(['.', ',']);

    // Mixed separators: the later one is the decimal. This departs from a strict
    // `.`-thousands reading so that English pages (`$1,234.56`) still parse.
    let normalized = match (run.rfind('.'), run.rfind(',')) {
        (Some(dot), Some(comma)) if comma > dot => run.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => run.replace(',', ""),
        (None, Some(_)) if run.matches(',').count() > 1 => run.replace(',', ""),
        (None, Some(_)) => run.replace(',', "."),
        (Some(_), None) if run.matches('.').count() > 1 => run.replace('.', ""),
        _ => run.to_string(),
    };

    let value: f64 = normalized.parse().ok()?;
    let value = if negative { -value } else { value };
    value.is_finite().then_some(value)
}

/// Coerces a string to a number, accepting plain and European notation.
pub fn to_number_str(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => parse_european_number(trimmed),
    }
}

/// Coerces a JSON value to a number. Strings are parsed, `{"raw": ..}` wrappers are
/// unwrapped, null and NaN yield `None`.
pub fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => to_number_str(s),
        Value::Object(map) => map.get("raw").and_then(to_number),
        _ => None,
    }
}

/// Last-resort scan for the first grouped or decimal number in the visible text of a page.
pub fn first_number_like(html: &str) -> Option<f64> {
    let text = strip_tags(html);
    NUMBER_LIKE_RE
        .find_iter(&text)
        .find_map(|m| parse_european_number(m.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_european_number() {
        assert_eq!(parse_european_number("1.234,56"), Some(1234.56));
        assert_eq!(parse_european_number("-123,45"), Some(-123.45));
        assert_eq!(parse_european_number("12,345678 EUR"), Some(12.345678));
        assert_eq!(parse_european_number("1.234.567"), Some(1234567.0));
        assert_eq!(parse_european_number("1,234.56"), Some(1234.56));
        assert_eq!(parse_european_number("€ 98,10"), Some(98.10));
        assert_eq!(parse_european_number("1\u{a0}234,5"), Some(1234.5));
        assert_eq!(parse_european_number("1 234,56"), Some(1234.56));
        assert_eq!(parse_european_number("-1 234 567,8 EUR"), Some(-1234567.8));
        assert_eq!(parse_european_number("12 3456"), Some(12.0));
        assert_eq!(parse_european_number("42"), Some(42.0));
    }

    #[test]
    fn test_parse_european_number_failures() {
        assert_eq!(parse_european_number("abc"), None);
        assert_eq!(parse_european_number(""), None);
        assert_eq!(parse_european_number("-"), None);
        assert_eq!(parse_european_number("n/a"), None);
    }

    #[test]
    fn test_to_number() {
        assert_eq!(to_number(&json!(190.5)), Some(190.5));
        assert_eq!(to_number(&json!("190.5")), Some(190.5));
        assert_eq!(to_number(&json!("1.234,5")), Some(1234.5));
        assert_eq!(to_number(&json!({"raw": 12.0, "fmt": "12.00"})), Some(12.0));
        assert_eq!(to_number(&json!(null)), None);
        assert_eq!(to_number(&json!("")), None);
        assert_eq!(to_number(&json!("NaN")), None);
        assert_eq!(to_number(&json!(true)), None);
    }

    #[test]
    fn test_first_number_like_skips_markup() {
        let html = r#"<html><head><script>var x = 3.5;</script></head>
            <body><div data-v="9.9">Precio</div><p>Cierre 1.234,56 EUR</p></body></html>"#;
        assert_eq!(first_number_like(html), Some(1234.56));
        assert_eq!(first_number_like("<p>no numbers here 2024</p>"), None);
        assert_eq!(first_number_like("<p>Precio 1 234,56 EUR</p>"), Some(1234.56));
        assert_eq!(first_number_like("<p>Año 2023 123,45</p>"), Some(123.45));
    }
}
