//! Identifier classification

use regex::Regex;
use std::sync::LazyLock;

static ISIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{2}[A-Z0-9]{10}$").expect("valid ISIN regex"));
// Embedded codes must end in the check digit, which keeps words like "ESTABLISHMENT" out.
static EMBEDDED_ISIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z]{2}[A-Z0-9]{9}[0-9]\b").expect("valid ISIN scan regex"));

/// Instrument section of a quote site path, e.g. `funds` in `/funds/some-fund`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Funds,
    Etfs,
    Bonds,
    Equities,
    Indices,
    Currencies,
    Crypto,
    Certificates,
    Unknown,
}

impl Section {
    pub const KNOWN: [Section; 8] = [
        Section::Funds,
        Section::Etfs,
        Section::Bonds,
        Section::Equities,
        Section::Indices,
        Section::Currencies,
        Section::Crypto,
        Section::Certificates,
    ];

    pub fn from_segment(segment: &str) -> Self {
        match segment.to_lowercase().as_str() {
            "funds" => Section::Funds,
            "etfs" => Section::Etfs,
            "bonds" | "rates-bonds" => Section::Bonds,
            "equities" => Section::Equities,
            "indices" => Section::Indices,
            "currencies" => Section::Currencies,
            "crypto" => Section::Crypto,
            "certificates" => Section::Certificates,
            _ => Section::Unknown,
        }
    }

    pub fn path_segment(&self) -> &'static str {
        match self {
            Section::Funds => "funds",
            Section::Etfs => "etfs",
            Section::Bonds => "bonds",
            Section::Equities => "equities",
            Section::Indices => "indices",
            Section::Currencies => "currencies",
            Section::Crypto => "crypto",
            Section::Certificates => "certificates",
            Section::Unknown => "",
        }
    }

    /// Base ranking score. Equities (60) deliberately sits above certificates (50).
    pub fn priority(&self) -> i32 {
        match self {
            Section::Funds => 90,
            Section::Etfs => 80,
            Section::Bonds => 70,
            Section::Equities => 60,
            Section::Certificates => 50,
            Section::Indices => 40,
            Section::Currencies => 30,
            Section::Crypto => 20,
            Section::Unknown => 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    Url(String),
    Isin(String),
    Slug(String),
    FreeText(String),
}

impl Identifier {
    pub fn as_str(&self) -> &str {
        match self {
            Identifier::Url(s)
            | Identifier::Isin(s)
            | Identifier::Slug(s)
            | Identifier::FreeText(s) => s,
        }
    }
}

/// Trims and uppercases a candidate ISIN.
pub fn normalize_isin(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Whether `raw` is an ISIN once normalized.
pub fn is_isin(raw: &str) -> bool {
    ISIN_RE.is_match(&normalize_isin(raw))
}

/// First ISIN-shaped code embedded in a larger text.
pub fn find_isin(text: &str) -> Option<String> {
    EMBEDDED_ISIN_RE
        .find(text)
        .map(|m| m.as_str().to_string())
}

fn is_url(raw: &str) -> bool {
    let lower = raw.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn is_slug(raw: &str) -> bool {
    if raw.starts_with('/') {
        return true;
    }
    let lower = raw.to_lowercase();
    Section::KNOWN
        .iter()
        .any(|section| lower.starts_with(&format!("{}/", section.path_segment())))
}

/// Classifies a raw identifier. Pure and infallible: anything unrecognized is `FreeText`.
pub fn classify(raw: &str) -> Identifier {
    let trimmed = raw.trim();
    if is_url(trimmed) {
        return Identifier::Url(trimmed.to_string());
    }
    if is_isin(trimmed) {
        return Identifier::Isin(normalize_isin(trimmed));
    }
    if is_slug(trimmed) {
        return Identifier::Slug(trimmed.to_string());
    }
    Identifier::FreeText(trimmed.to_string())
}
