use serde::Serialize;
use tracing::{info, warn};

use super::extract::RecordIndex;
use crate::constants::{COURSE_CODE_KEY, HEADER_SECTION};
use crate::storage::RawSource;
use crate::types::RawRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationStatus {
    Ok { code: String },
    Mismatch { expected: String, actual: String },
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub file: String,
    #[serde(flatten)]
    pub status: ValidationStatus,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub results: Vec<ValidationResult>,
}

impl ValidationReport {
    pub fn all_valid(&self) -> bool {
        self.results
            .iter()
            .all(|r| matches!(r.status, ValidationStatus::Ok { .. }))
    }

    pub fn failures(&self) -> impl Iterator<Item = &ValidationResult> {
        self.results
            .iter()
            .filter(|r| !matches!(r.status, ValidationStatus::Ok { .. }))
    }
}

/// Check that every raw record's course code matches its file name
pub fn validate(sources: &[RawSource]) -> ValidationReport {
    let results: Vec<ValidationResult> = sources
        .iter()
        .map(|source| ValidationResult {
            file: source.name.clone(),
            status: check(source),
        })
        .collect();

    let report = ValidationReport { results };
    let failed = report.failures().count();
    if failed == 0 {
        info!("All {} files valid", report.results.len());
    } else {
        warn!("{} of {} files have issues", failed, report.results.len());
    }
    report
}

fn check(source: &RawSource) -> ValidationStatus {
    let record = match RawRecord::from_slice(&source.name, &source.bytes) {
        Ok(record) => record,
        Err(e) => {
            return ValidationStatus::Error {
                message: e.to_string(),
            }
        }
    };

    let index = RecordIndex::new(&record);
    let Some(header) = index.section(HEADER_SECTION) else {
        return ValidationStatus::Error {
            message: format!("No {} found", HEADER_SECTION),
        };
    };
    let Some(field) = header.by_key(COURSE_CODE_KEY) else {
        return ValidationStatus::Error {
            message: format!("No {} field found in {}", COURSE_CODE_KEY, HEADER_SECTION),
        };
    };

    let expected = source.stem().to_string();
    let actual = match &field.value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if actual == expected {
        ValidationStatus::Ok { code: actual }
    } else {
        ValidationStatus::Mismatch { expected, actual }
    }
}
