//! Role classification of menu text fragments.
//!
//! Two granularities share the same vocabulary:
//! - segments (sub-line fragments) are classified from text alone;
//! - whole lines are classified from their [`LineFeatures`], where a line
//!   carrying a dish name and its price counts as a title.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::features::LineFeatures;
use crate::lexical::{
    has_ascii_list_punctuation, has_description_hint, has_list_punctuation, is_numeric_only,
    is_price_only, word_count,
};

/// What a piece of menu text is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Title,
    Description,
    Price,
    Unknown,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Title => "title",
            Role::Description => "description",
            Role::Price => "price",
            Role::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Segments at least this long read as descriptions.
const DESCRIPTION_MIN_CHARS: usize = 42;
const DESCRIPTION_MIN_WORDS: usize = 7;
const TITLE_MAX_WORDS: usize = 5;

/// Classifies a segment from its text.
pub fn classify_segment(text: &str) -> Role {
    let stripped = text.trim();
    if stripped.is_empty() {
        return Role::Unknown;
    }
    if is_price_only(stripped) {
        return Role::Price;
    }
    if is_numeric_only(stripped) {
        return Role::Unknown;
    }

    let words = word_count(stripped);
    let chars = stripped.chars().count();
    if words >= DESCRIPTION_MIN_WORDS || chars >= DESCRIPTION_MIN_CHARS {
        return Role::Description;
    }
    if has_list_punctuation(stripped) {
        return Role::Description;
    }
    if words <= TITLE_MAX_WORDS {
        return Role::Title;
    }
    Role::Unknown
}

/// Description-like test used by the geometry clusterer.
///
/// Trusts a `description` hint, rejects prices, and otherwise re-checks the
/// text so an OCR-mislabelled title/unknown fragment can still qualify.
pub fn is_description_like(role_hint: Role, text: &str) -> bool {
    match role_hint {
        Role::Description => return true,
        Role::Price => return false,
        Role::Title | Role::Unknown => {}
    }
    let stripped = text.trim();
    if stripped.is_empty() {
        return false;
    }
    let words = word_count(stripped);
    if words >= DESCRIPTION_MIN_WORDS || has_list_punctuation(stripped) {
        return true;
    }
    stripped.chars().count() >= DESCRIPTION_MIN_CHARS && words >= 4
}

/// Line-level description test.
pub fn is_description_candidate(feature: &LineFeatures) -> bool {
    if feature.is_numeric_only || feature.has_price_like_pattern {
        return false;
    }
    if feature.word_count >= 6 || has_ascii_list_punctuation(&feature.text) {
        return true;
    }
    if has_description_hint(&feature.text) {
        return true;
    }
    feature.text.chars().count() > 45 && feature.word_count >= 4
}

/// Line-level title test. Price-like lines are dish + price, hence titles.
pub fn is_title_candidate(feature: &LineFeatures) -> bool {
    if feature.is_numeric_only {
        return false;
    }
    if feature.has_price_like_pattern {
        return true;
    }
    if is_description_candidate(feature) {
        return false;
    }
    if feature.word_count <= TITLE_MAX_WORDS {
        return true;
    }
    feature.text.chars().count() <= 30 && feature.word_count <= 7
}

/// Folds the line-level tests into one role. Numeric-only lines are prices.
pub fn classify_line(feature: &LineFeatures) -> Role {
    if feature.is_numeric_only {
        Role::Price
    } else if is_title_candidate(feature) {
        Role::Title
    } else if is_description_candidate(feature) {
        Role::Description
    } else {
        Role::Unknown
    }
}
