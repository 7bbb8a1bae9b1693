//! One-time migration of the legacy course table into the canonical
//! course-code id space.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::io::{Read, Write};
use tracing::{debug, info, instrument, warn};

use crate::config::ReconcileConfig;
use crate::constants::{
    ALTERNATIVE_COLUMN, COURSE_COLUMN, DEPENDENCIES_COLUMN, ID_COLUMN, LIST_SEPARATOR,
};
use crate::error::{CatalogError, Result};
use crate::types::CourseRecord;

/// A delimited table read verbatim; only the reconciled columns are touched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl LegacyTable {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers: Vec<String> = csv.headers()?.iter().map(str::to_string).collect();

        let mut rows = Vec::new();
        for record in csv.records() {
            let mut row: Vec<String> = record?.iter().map(str::to_string).collect();
            if row.len() < headers.len() {
                row.resize(headers.len(), String::new());
            }
            rows.push(row);
        }
        Ok(Self { headers, rows })
    }

    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv = csv::WriterBuilder::new().flexible(true).from_writer(writer);
        csv.write_record(&self.headers)?;
        for row in &self.rows {
            csv.write_record(row)?;
        }
        csv.flush()?;
        Ok(())
    }

    pub fn column(&self, name: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| CatalogError::MissingField(format!("'{}' column in legacy table", name)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    Normalized,
    Fuzzy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameMatch {
    pub id: String,
    pub kind: MatchKind,
}

/// Matches free-text course names against canonical course names.
///
/// Fuzzy matching walks the canonical names in the order they were first
/// seen, so the same input always picks the same course. When two courses
/// share a name, the later course owns it.
#[derive(Debug)]
pub struct NameMatcher {
    exact: HashMap<String, String>,
    ordered: Vec<(String, String)>,
    strip_prefix: String,
    variants: Vec<(String, String)>,
}

impl NameMatcher {
    pub fn new(courses: &[CourseRecord], config: &ReconcileConfig) -> Self {
        let mut exact: HashMap<String, String> = HashMap::new();
        let mut ordered: Vec<(String, String)> = Vec::new();

        for course in courses {
            let (Some(id), Some(name)) = (course.id.as_deref(), course.name.as_deref()) else {
                continue;
            };
            let name = name.trim().to_lowercase();
            if name.is_empty() {
                continue;
            }
            match exact.insert(name.clone(), id.to_string()) {
                Some(previous) => {
                    warn!(
                        "Canonical name '{}' shared by {} and {}; keeping the later course",
                        name, previous, id
                    );
                    if let Some(entry) = ordered.iter_mut().find(|(n, _)| *n == name) {
                        entry.1 = id.to_string();
                    }
                }
                None => ordered.push((name, id.to_string())),
            }
        }

        Self {
            exact,
            ordered,
            strip_prefix: config.strip_prefix.to_lowercase(),
            variants: config
                .variants
                .iter()
                .filter(|v| !v.from.trim().is_empty())
                .map(|v| (v.from.to_lowercase(), v.to.to_lowercase()))
                .collect(),
        }
    }

    /// Lowercase, trim and apply the configured spelling variants
    pub fn normalize(&self, name: &str) -> String {
        self.variants
            .iter()
            .fold(name.trim().to_lowercase(), |acc, (from, to)| acc.replacen(from.as_str(), to, 1))
    }

    pub fn find(&self, name: &str) -> Option<NameMatch> {
        let raw = name.trim().to_lowercase();
        if raw.is_empty() {
            return None;
        }
        if let Some(id) = self.exact.get(&raw) {
            return Some(NameMatch {
                id: id.clone(),
                kind: MatchKind::Exact,
            });
        }

        let normalized = self.normalize(&raw);
        if normalized.is_empty() {
            return None;
        }
        if let Some(id) = self.exact.get(&normalized) {
            return Some(NameMatch {
                id: id.clone(),
                kind: MatchKind::Normalized,
            });
        }

        self.ordered.iter().find_map(|(canonical, id)| {
            let stripped = canonical
                .strip_prefix(self.strip_prefix.as_str())
                .unwrap_or(canonical);
            let matches = !stripped.is_empty()
                && (stripped.contains(normalized.as_str()) || normalized.contains(stripped));
            matches.then(|| NameMatch {
                id: id.clone(),
                kind: MatchKind::Fuzzy,
            })
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub row: usize,
    pub legacy_id: String,
    pub canonical_id: String,
    pub kind: MatchKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedRow {
    pub row: usize,
    pub legacy_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedAlternative {
    pub row: usize,
    pub reference: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub generated_at: DateTime<Utc>,
    pub resolved: Vec<Resolution>,
    pub unresolved: Vec<UnresolvedRow>,
    pub unresolved_alternatives: Vec<UnresolvedAlternative>,
}

#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub table: LegacyTable,
    pub report: ReconcileReport,
}

/// Rewrite a legacy table into canonical course codes.
///
/// Rows are numbered from 1 (the first row after the header). Matches for
/// the whole batch are computed before any row is rewritten, so an
/// `alternative` may reference any row by legacy id or row number.
#[instrument(skip_all, fields(rows = table.rows.len(), canonical = canonical.len()))]
pub fn reconcile(
    mut table: LegacyTable,
    canonical: &[CourseRecord],
    config: &ReconcileConfig,
) -> Result<ReconcileOutcome> {
    let id_col = table.column(ID_COLUMN)?;
    let course_col = table.column(COURSE_COLUMN)?;
    let deps_col = table.column(DEPENDENCIES_COLUMN)?;
    let alt_col = table.column(ALTERNATIVE_COLUMN)?;

    let matcher = NameMatcher::new(canonical, config);
    let courses_by_id: HashMap<&str, &CourseRecord> = canonical
        .iter()
        .filter_map(|c| c.id.as_deref().map(|id| (id, c)))
        .collect();

    let matches: Vec<Option<NameMatch>> = table
        .rows
        .iter()
        .map(|row| matcher.find(&row[course_col]))
        .collect();

    let mut legacy_to_canonical: HashMap<String, String> = HashMap::new();
    let mut row_to_canonical: HashMap<String, String> = HashMap::new();
    for (i, (row, found)) in table.rows.iter().zip(&matches).enumerate() {
        if let Some(found) = found {
            let legacy_id = row[id_col].trim();
            if !legacy_id.is_empty() {
                legacy_to_canonical.insert(legacy_id.to_string(), found.id.clone());
            }
            row_to_canonical.insert((i + 1).to_string(), found.id.clone());
        }
    }

    let mut resolved = Vec::new();
    let mut unresolved = Vec::new();
    let mut unresolved_alternatives = Vec::new();

    for (i, (row, found)) in table.rows.iter_mut().zip(matches).enumerate() {
        let row_number = i + 1;
        let Some(found) = found else {
            let err = CatalogError::UnresolvedReference {
                row: row_number,
                name: row[course_col].clone(),
            };
            warn!("{}", err);
            unresolved.push(UnresolvedRow {
                row: row_number,
                legacy_id: row[id_col].clone(),
                name: row[course_col].clone(),
            });
            continue;
        };

        info!("{} -> {}: {}", row[id_col], found.id, row[course_col]);
        resolved.push(Resolution {
            row: row_number,
            legacy_id: row[id_col].clone(),
            canonical_id: found.id.clone(),
            kind: found.kind,
        });
        row[id_col] = found.id.clone();

        if let Some(course) = courses_by_id.get(found.id.as_str()) {
            if !course.dependencies.is_empty() {
                row[deps_col] = course.dependencies.join(LIST_SEPARATOR);
            }
        }

        let reference = row[alt_col].trim().to_string();
        if reference.is_empty() {
            continue;
        }
        match legacy_to_canonical
            .get(&reference)
            .or_else(|| row_to_canonical.get(&reference))
        {
            Some(alternative) => {
                debug!("Alternative: {} -> {}", reference, alternative);
                row[alt_col] = alternative.clone();
            }
            None => {
                warn!("Row {}: alternative '{}' does not resolve", row_number, reference);
                unresolved_alternatives.push(UnresolvedAlternative {
                    row: row_number,
                    reference,
                });
            }
        }
    }

    info!(
        "Reconciled {} rows ({} unresolved)",
        resolved.len(),
        unresolved.len()
    );

    Ok(ReconcileOutcome {
        table,
        report: ReconcileReport {
            generated_at: Utc::now(),
            resolved,
            unresolved,
            unresolved_alternatives,
        },
    })
}
