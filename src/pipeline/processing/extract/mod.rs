//! Field extraction from raw catalogue records.
//!
//! `extract` never fails: every attribute is looked up independently and an
//! attribute that is missing or unparseable simply stays unknown.

pub mod index;
pub mod text;

use tracing::debug;

use crate::constants::{
    CONTENT_KEY, CONTENT_SECTION, COURSE_CODE_KEY, COURSE_NAME_KEY, COURSE_URL_KEY,
    CREDITS_LABEL, ENROLLMENT_PERIODS_KEY, ENROLLMENT_SECTION, HEADER_SECTION,
    PERIOD_DESCRIPTION_KEY, SEARCH_SECTION,
};
use crate::types::{CourseRecord, RawRecord};

pub use index::RecordIndex;
pub use text::{
    is_premaster, parse_block_range, parse_credits, prerequisite_codes, strip_markup, BlockRange,
};

/// Build a normalized course record from a raw catalogue record
pub fn extract(record: &RawRecord) -> CourseRecord {
    let index = RecordIndex::new(record);

    let id = header_text(&index, COURSE_CODE_KEY);
    let name = header_text(&index, COURSE_NAME_KEY);
    let url = header_text(&index, COURSE_URL_KEY);
    let credits = index
        .labelled(SEARCH_SECTION, CREDITS_LABEL)
        .and_then(|field| parse_credits(&field.value));
    let blocks = block_range(&index);
    let dependencies = index
        .field(CONTENT_SECTION, CONTENT_KEY)
        .and_then(|field| field.text())
        .map(prerequisite_codes)
        .unwrap_or_default();
    let premaster = is_premaster(id.as_deref());

    debug!(
        "Extracted course {} with {} dependencies",
        id.as_deref().unwrap_or(crate::constants::UNKNOWN),
        dependencies.len()
    );

    CourseRecord {
        id,
        name,
        credits,
        block_start: blocks.start,
        block_end: blocks.end,
        url,
        dependencies,
        premaster,
    }
}

fn header_text(index: &RecordIndex<'_>, key: &str) -> Option<String> {
    index
        .field(HEADER_SECTION, key)
        .and_then(|field| field.text())
        .map(str::to_string)
}

/// Block range of the first enrollment period only
fn block_range(index: &RecordIndex<'_>) -> BlockRange {
    index
        .field(ENROLLMENT_SECTION, ENROLLMENT_PERIODS_KEY)
        .and_then(|field| field.entries())
        .and_then(|periods| periods.first())
        .and_then(|period| period.get(PERIOD_DESCRIPTION_KEY))
        .and_then(|description| description.as_str())
        .map(parse_block_range)
        .unwrap_or_default()
}
