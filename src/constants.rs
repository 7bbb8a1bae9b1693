//! Section and field names used by the university catalogue export.
//! The export is Dutch-keyed: `rubriek` is a section, `veld` a field key.

/// Literal written wherever a scalar could not be extracted
pub const UNKNOWN: &str = "Unknown";

// Header section: course code, short name, external deep link
pub const HEADER_SECTION: &str = "rubriek-kop";
pub const COURSE_CODE_KEY: &str = "cursus";
pub const COURSE_NAME_KEY: &str = "cursus_korte_naam";
pub const COURSE_URL_KEY: &str = "deeplink_detailscherm_extern";

// Search section: study points are looked up by label, not by key
pub const SEARCH_SECTION: &str = "rubriek-zoek";
pub const CREDITS_LABEL: &str = "Study points";

// Content section: free HTML describing prerequisites
pub const CONTENT_SECTION: &str = "rubriek-inhoud";
pub const CONTENT_KEY: &str = "item-inhoud-1";

// Enrollment section: table of enrollment periods
pub const ENROLLMENT_SECTION: &str = "rubriek-inschrijven";
pub const ENROLLMENT_PERIODS_KEY: &str = "tabel-inschrijfperiodes";
pub const PERIOD_DESCRIPTION_KEY: &str = "omschrijving";

/// Canonical course code, e.g. FEB22002X
pub const COURSE_CODE_PATTERN: &str = r"FEB\d{5}[A-Z\d]";

/// Course codes after this phrase are downstream courses, not prerequisites
pub const DEPENDENT_COURSES_MARKER: &str = r"(?i)is required for";

pub const BLOCK_RANGE_PATTERN: &str = r"Block\s+(\S+)\s+until\s+Block\s+(\S+)";
pub const SINGLE_BLOCK_PATTERN: &str = r"Block\s+(\S+)";

/// Suffix of preparatory-track course codes
pub const PREMASTER_SUFFIX: char = 'S';

/// Separator for list values inside a single CSV cell
pub const LIST_SEPARATOR: &str = ";";

// Column names shared by the flag table, the aggregate table and the legacy table
pub const ID_COLUMN: &str = "id";
pub const COURSE_COLUMN: &str = "course";
pub const DEPENDENCIES_COLUMN: &str = "dependencies";
pub const ALTERNATIVE_COLUMN: &str = "alternative";
pub const ALTERNATIVE_COLUMN_SUFFIX: &str = "_alternative";

/// Get the default programme categories, in aggregate column order
pub fn default_categories() -> Vec<String> {
    ["core", "qf", "or", "econ", "marketing", "extracurricular"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
