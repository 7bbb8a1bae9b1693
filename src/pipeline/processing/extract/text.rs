use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use std::collections::HashSet;

use crate::constants::{
    BLOCK_RANGE_PATTERN, COURSE_CODE_PATTERN, DEPENDENT_COURSES_MARKER, SINGLE_BLOCK_PATTERN,
};

static COURSE_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(COURSE_CODE_PATTERN).expect("valid course code pattern"));
static DEPENDENT_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(DEPENDENT_COURSES_MARKER).expect("valid marker pattern"));
static BLOCK_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(BLOCK_RANGE_PATTERN).expect("valid block range pattern"));
static SINGLE_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(SINGLE_BLOCK_PATTERN).expect("valid block pattern"));
static DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid digits pattern"));

/// Start and end teaching block of a course
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockRange {
    pub start: Option<String>,
    pub end: Option<String>,
}

/// Plain text of an HTML fragment. Text on either side of a tag is joined
/// with a single space so adjacent tokens never fuse.
pub fn strip_markup(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    fragment.root_element().text().collect::<Vec<_>>().join(" ")
}

/// Prerequisite course codes mentioned in a course description.
///
/// Only the text before "is required for" is scanned; codes after it name
/// courses that depend on this one. Duplicates are dropped, first occurrence
/// order is kept.
pub fn prerequisite_codes(html: &str) -> Vec<String> {
    let text = strip_markup(html);
    let prerequisites = match DEPENDENT_MARKER.find(&text) {
        Some(marker) => &text[..marker.start()],
        None => text.as_str(),
    };

    let mut seen = HashSet::new();
    COURSE_CODE
        .find_iter(prerequisites)
        .map(|m| m.as_str())
        .filter(|code| seen.insert(*code))
        .map(str::to_string)
        .collect()
}

/// Parse an enrollment period description such as "Block BLOK4 until Block BLOK5"
pub fn parse_block_range(description: &str) -> BlockRange {
    if let Some(caps) = BLOCK_RANGE.captures(description) {
        return BlockRange {
            start: Some(caps[1].to_string()),
            end: Some(caps[2].to_string()),
        };
    }
    if let Some(caps) = SINGLE_BLOCK.captures(description) {
        let block = caps[1].to_string();
        return BlockRange {
            start: Some(block.clone()),
            end: Some(block),
        };
    }
    BlockRange::default()
}

/// Credits from a value like "4 EC", or from a plain integer
pub fn parse_credits(value: &serde_json::Value) -> Option<u32> {
    match value {
        serde_json::Value::String(text) => DIGITS
            .find(text)
            .and_then(|m| m.as_str().parse::<u32>().ok()),
        serde_json::Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        _ => None,
    }
}

/// Whether a course code denotes a preparatory-track course
pub fn is_premaster(id: Option<&str>) -> bool {
    id.map_or(false, |id| id.ends_with(crate::constants::PREMASTER_SUFFIX))
}
