//! Typed snapshot of one scraped kiosk page.
//!
//! A [`Snapshot`] lives for a single scrape cycle. It is what the reconciler
//! consumes and what the recovery sink dumps when reconciliation fails, so its
//! JSON form doubles as the recovery artifact format.

pub mod parser;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Fallback used for missing game titles and header images.
pub const UNKNOWN: &str = "Unknown";

/// Game name → leaderboard block, in first-seen page order.
pub type Snapshot = IndexMap<String, GameBlock>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameBlock {
    pub header_url: String,
    #[serde(default)]
    pub scores: Vec<ScoreRow>,
}

impl GameBlock {
    pub fn new(header_url: impl Into<String>) -> Self {
        Self {
            header_url: header_url.into(),
            scores: Vec::new(),
        }
    }
}

/// One leaderboard row. `score` keeps the page text (commas already stripped);
/// integer coercion happens at persistence time via [`ScoreRow::score_value`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRow {
    pub username: String,
    pub score: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    #[serde(default)]
    pub color_rgb: Option<String>,
}

impl ScoreRow {
    pub fn score_value(&self) -> Result<i64, ParseError> {
        parse_score(&self.score)
    }
}

/// Coerce score text into an integer.
///
/// Commas are stripped, surrounding whitespace ignored, and only the leading
/// run of decimal digits (after an optional sign) is read, so `"12abc"` is 12.
pub fn parse_score(text: &str) -> Result<i64, ParseError> {
    let cleaned = text.replace(',', "");
    let trimmed = cleaned.trim();

    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return Err(ParseError::InvalidScore(text.to_string()));
    }

    let magnitude: i64 = digits[..end]
        .parse()
        .map_err(|_| ParseError::InvalidScore(text.to_string()))?;
    Ok(if negative { -magnitude } else { magnitude })
}
