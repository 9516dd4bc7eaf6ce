//! Lexical patterns for menu text: prices, numerals, list punctuation.

use std::sync::LazyLock;

use regex::Regex;

/// A price amount: `12`, `12.5`, `1,200`, `1.200,50`.
const PRICE_NUMBER: &str = r"(?:\d{1,3}(?:[.,]\d{3})+|\d{1,4})(?:[.,]\d{1,2})?";
const CURRENCY_PREFIX: &str = r"(?:[$€£¥]\s*)?";
const CURRENCY_SUFFIX: &str = r"(?:\s?(?:usd|eur|gbp|cad|aud|cny|rmb|円))?";

fn compile(pattern: String) -> Regex {
    Regex::new(&pattern).expect("price patterns are valid regexes")
}

static PRICE_ONLY: LazyLock<Regex> = LazyLock::new(|| {
    compile(format!(
        r"(?i)^{CURRENCY_PREFIX}{PRICE_NUMBER}{CURRENCY_SUFFIX}$"
    ))
});

static TRAILING_PRICE: LazyLock<Regex> = LazyLock::new(|| {
    compile(format!(
        r"(?i)[-–—:]\s*{CURRENCY_PREFIX}{PRICE_NUMBER}{CURRENCY_SUFFIX}\s*$"
    ))
});

static TRAILING_PRICE_AFTER_SPACE: LazyLock<Regex> = LazyLock::new(|| {
    compile(format!(
        r"(?i)\s+({CURRENCY_PREFIX}{PRICE_NUMBER}{CURRENCY_SUFFIX})\s*$"
    ))
});

static PRICE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| compile(format!(r"(?i){CURRENCY_PREFIX}{PRICE_NUMBER}{CURRENCY_SUFFIX}")));

static NUMERIC_TOKEN: LazyLock<Regex> = LazyLock::new(|| compile(PRICE_NUMBER.to_string()));

/// Inline separators that glue independent items onto one OCR line.
pub(crate) static SEGMENT_DELIMITER: LazyLock<Regex> =
    LazyLock::new(|| compile(r"\s*(?:\||•|·|;|；)\s*".to_string()));

/// Characters stripped before testing whether text is a bare number.
const NUMERIC_NOISE: &[char] = &['$', '€', '£', '¥', '円', '.', ',', '-', '–', '—', ':'];

/// Separators that may sit between a dish name and its price.
pub(crate) const PRICE_SEPARATORS: &[char] = &['-', '–', '—', ':'];

const LIST_PUNCTUATION: &[char] = &[',', ';', '，', '；', '、', '。'];

/// Words that almost only show up in dish descriptions.
const DESCRIPTION_HINTS: &[&str] = &[
    "with",
    "served",
    "fresh",
    "crispy",
    "grilled",
    "roasted",
    "sauce",
    "cheese",
    "tomato",
    "chicken",
    "beef",
    "pork",
    "fish",
    "vegetable",
];

/// True if the whole (trimmed) text is a price.
pub fn is_price_only(text: &str) -> bool {
    PRICE_ONLY.is_match(text.trim())
}

/// True if the text ends in a separator followed by a price (`Soup - 4.50`).
pub fn has_trailing_price(text: &str) -> bool {
    TRAILING_PRICE.is_match(text.trim())
}

/// Byte offset where a trailing price begins inside `text`, if any.
///
/// A separator-led price wins; otherwise a whitespace-separated price at the
/// end of the text is accepted. The returned offset points at the separator
/// in the first case and at the price itself in the second.
pub fn trailing_price_start(text: &str) -> Option<usize> {
    if let Some(m) = TRAILING_PRICE.find(text) {
        return Some(m.start());
    }
    TRAILING_PRICE_AFTER_SPACE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.start())
}

/// Byte ranges of every price token in `text`.
pub fn price_token_ends(text: &str) -> Vec<usize> {
    PRICE_TOKEN.find_iter(text).map(|m| m.end()).collect()
}

/// Whitespace-separated word count.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// True if the text contains comma/semicolon style list punctuation.
pub fn has_list_punctuation(text: &str) -> bool {
    text.contains(LIST_PUNCTUATION)
}

/// True if the text contains an ASCII comma or semicolon.
pub fn has_ascii_list_punctuation(text: &str) -> bool {
    text.contains([',', ';'])
}

/// True if the lowercased text mentions a description hint word.
pub fn has_description_hint(text: &str) -> bool {
    let lowered = text.to_lowercase();
    DESCRIPTION_HINTS.iter().any(|hint| lowered.contains(hint))
}

/// True if the text is nothing but a number once whitespace, currency and
/// punctuation are removed.
pub fn is_numeric_only(text: &str) -> bool {
    let mut digits = text
        .chars()
        .filter(|c| !c.is_whitespace() && !NUMERIC_NOISE.contains(c))
        .peekable();
    digits.peek().is_some() && digits.all(is_decimal_digit)
}

/// ASCII and full-width decimal digits. Fractions, superscripts and CJK
/// numerals like `〇` do not count.
fn is_decimal_digit(c: char) -> bool {
    c.is_ascii_digit() || ('０'..='９').contains(&c)
}

/// Price-like: a full price, a separator-led trailing price, or a single
/// numeric token inside a fragment of at most three words.
pub fn has_price_like_pattern(text: &str) -> bool {
    let stripped = text.trim();
    if is_price_only(stripped) || has_trailing_price(stripped) {
        return true;
    }
    NUMERIC_TOKEN.find_iter(stripped).count() == 1 && word_count(stripped) <= 3
}
