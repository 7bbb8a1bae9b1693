// Catalogue pipeline: extraction, categories, aggregation, reconciliation

pub mod processing;

use metrics::{counter, gauge, histogram};
use serde::Serialize;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

use crate::config::Config;
use crate::error::{CatalogError, Result};
use crate::observability::MetricName;
use crate::storage::Storage;
use crate::types::RawRecord;
use processing::categories::{build_categories, Categories, FlagTable, RequirementSet};
use processing::cross_reference::{join, AggregateLayout};
use processing::extract::extract;
use processing::reconcile::{reconcile, LegacyTable, ReconcileOutcome};
use processing::validate::{validate, ValidationReport};

/// Result of an extraction run
#[derive(Debug, Default, Serialize)]
pub struct ExtractResult {
    pub total_records: usize,
    pub extracted: usize,
    pub without_id: usize,
    pub errors: Vec<String>,
}

/// Result of writing the aggregate table
#[derive(Debug, Default, Serialize)]
pub struct AggregateResult {
    pub total_courses: usize,
    pub rows_written: usize,
    pub skipped: usize,
}

pub struct Pipeline<'a> {
    storage: &'a dyn Storage,
    config: &'a Config,
}

impl<'a> Pipeline<'a> {
    pub fn new(storage: &'a dyn Storage, config: &'a Config) -> Self {
        Self { storage, config }
    }

    /// Extract every raw record into a course record stored under the same name.
    /// Malformed records are reported and skipped; the batch continues.
    #[instrument(skip(self))]
    pub fn extract(&self) -> Result<ExtractResult> {
        let started = Instant::now();
        let sources = self.storage.raw_sources()?;
        info!("Processing {} course files", sources.len());

        let mut result = ExtractResult {
            total_records: sources.len(),
            ..Default::default()
        };

        for source in &sources {
            let record = match RawRecord::from_slice(&source.name, &source.bytes) {
                Ok(record) => record,
                Err(e) => {
                    error!("{}", e);
                    counter!(MetricName::RecordsMalformed.as_str()).increment(1);
                    result.errors.push(e.to_string());
                    continue;
                }
            };

            let course = extract(&record);
            if course.id.is_none() {
                warn!("{}: no course code found", source.name);
                counter!(MetricName::RecordsWithoutId.as_str()).increment(1);
                result.without_id += 1;
            }

            if let Err(e) = self.storage.save_course(&source.name, &course) {
                error!("Failed to save {}: {}", source.name, e);
                result.errors.push(format!("{}: {}", source.name, e));
                continue;
            }
            info!("{}: {} - {}", source.name, course.id_or_unknown(), course.name_or_unknown());
            counter!(MetricName::RecordsExtracted.as_str()).increment(1);
            result.extracted += 1;
        }

        histogram!(MetricName::StepDuration.as_str(), "step" => "extract")
            .record(started.elapsed().as_secs_f64());
        info!(
            "Extracted {} of {} records ({} errors)",
            result.extracted,
            result.total_records,
            result.errors.len()
        );
        Ok(result)
    }

    /// Build requirement sets from a flag table and persist one set per category
    #[instrument(skip(self, flag_table))]
    pub fn build_categories<R: Read>(&self, flag_table: R) -> Result<Categories> {
        let started = Instant::now();
        let programme = &self.config.programme;
        let table = FlagTable::from_reader(flag_table, &programme.categories)?;
        let categories = build_categories(&table, &programme.alternatives);

        for set in &categories.sets {
            self.storage.save_requirement_set(set)?;
            gauge!(MetricName::CategoryRequirements.as_str(), "category" => set.name.clone())
                .set(set.requirements.len() as f64);
            info!("{}: {} requirements", set.name, set.requirements.len());
        }

        histogram!(MetricName::StepDuration.as_str(), "step" => "categories")
            .record(started.elapsed().as_secs_f64());
        Ok(categories)
    }

    /// Load the configured requirement sets; a missing set reads as empty
    pub fn load_categories(&self) -> Result<Categories> {
        let mut sets = Vec::new();
        for name in &self.config.programme.categories {
            match self.storage.requirement_set(name)? {
                Some(set) => sets.push(set),
                None => {
                    warn!("No requirement set stored for '{}'", name);
                    sets.push(RequirementSet::new(name));
                }
            }
        }
        Ok(Categories { sets })
    }

    /// Join stored courses with stored categories and write the aggregate table
    #[instrument(skip(self, writer))]
    pub fn aggregate<W: Write>(&self, writer: W) -> Result<AggregateResult> {
        let started = Instant::now();
        let programme = &self.config.programme;
        let courses = self.storage.courses()?;
        let categories = self.load_categories()?;
        let rows = join(&courses, &categories, &programme.alternative_columns);

        let layout = AggregateLayout::new(
            &programme.categories,
            &programme.trailing_flags,
            &programme.alternative_columns,
        );
        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record(layout.header())?;
        for row in &rows {
            csv.write_record(layout.record(row))?;
        }
        csv.flush().map_err(CatalogError::from)?;

        counter!(MetricName::AggregateRows.as_str()).increment(rows.len() as u64);
        histogram!(MetricName::StepDuration.as_str(), "step" => "aggregate")
            .record(started.elapsed().as_secs_f64());
        info!("Generated aggregate table with {} courses", rows.len());

        Ok(AggregateResult {
            total_courses: courses.len(),
            rows_written: rows.len(),
            skipped: courses.len() - rows.len(),
        })
    }

    /// Write the aggregate table to `path`. The table is rendered in memory
    /// first; `path` is left untouched when aggregation fails.
    pub fn aggregate_to_file(&self, path: &Path) -> Result<AggregateResult> {
        let mut buffer = Vec::new();
        let result = self.aggregate(&mut buffer)?;
        fs::write(path, buffer)?;
        Ok(result)
    }

    /// Rewrite a legacy table against the stored canonical courses
    #[instrument(skip(self, legacy))]
    pub fn reconcile<R: Read>(&self, legacy: R) -> Result<ReconcileOutcome> {
        let started = Instant::now();
        let table = LegacyTable::from_reader(legacy)?;
        let courses = self.storage.courses()?;
        let outcome = reconcile(table, &courses, &self.config.reconcile)?;

        counter!(MetricName::RowsResolved.as_str()).increment(outcome.report.resolved.len() as u64);
        counter!(MetricName::RowsUnresolved.as_str())
            .increment(outcome.report.unresolved.len() as u64);
        histogram!(MetricName::StepDuration.as_str(), "step" => "reconcile")
            .record(started.elapsed().as_secs_f64());
        Ok(outcome)
    }

    /// Check raw record file names against their course codes
    #[instrument(skip(self))]
    pub fn validate(&self) -> Result<ValidationReport> {
        let sources = self.storage.raw_sources()?;
        let report = validate(&sources);
        counter!(MetricName::FilesInvalid.as_str()).increment(report.failures().count() as u64);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;
    use serde_json::json;

    fn record(code: &str, name: &str, content: &str) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "items": [
                { "rubriek": "rubriek-kop", "velden": [
                    { "veld": "cursus", "waarde": code },
                    { "veld": "cursus_korte_naam", "waarde": name }
                ]},
                { "rubriek": "rubriek-inhoud", "velden": [
                    { "veld": "item-inhoud-1", "waarde": content }
                ]}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_extract_reports_malformed_records_and_continues() {
        let storage = InMemoryStorage::new();
        storage.add_raw("FEB21011X.json", record("FEB21011X", "Econometrics 1", ""));
        storage.add_raw("broken.json", b"{\"items\": 12".to_vec());
        storage.add_raw("empty.json", b"{}".to_vec());
        let config = Config::default();

        let result = Pipeline::new(&storage, &config).extract().unwrap();

        assert_eq!(result.total_records, 3);
        assert_eq!(result.extracted, 2);
        assert_eq!(result.without_id, 1);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("broken.json"));
        assert_eq!(storage.courses().unwrap().len(), 2);
    }

    #[test]
    fn test_extract_keeps_record_with_broken_field_entries() {
        let storage = InMemoryStorage::new();
        let bytes = serde_json::to_vec(&json!({
            "items": [
                { "rubriek": "rubriek-kop", "velden": [
                    { "veld": "cursus", "waarde": "FEB22002X" },
                    { "veld": "cursus_korte_naam", "waarde": "Econometrics 2" }
                ]},
                { "rubriek": "rubriek-zoek", "velden": [null, { "veld": 17, "titel": "Study points", "waarde": "4 EC" }] }
            ]
        }))
        .unwrap();
        storage.add_raw("FEB22002X.json", bytes);
        let config = Config::default();

        let result = Pipeline::new(&storage, &config).extract().unwrap();

        assert_eq!(result.extracted, 1);
        assert!(result.errors.is_empty());
        let courses = storage.courses().unwrap();
        assert_eq!(courses[0].id.as_deref(), Some("FEB22002X"));
        assert_eq!(courses[0].name.as_deref(), Some("Econometrics 2"));
        assert_eq!(courses[0].credits, Some(4));
    }

    #[test]
    fn test_categories_then_aggregate() {
        let storage = InMemoryStorage::new();
        storage.add_raw("FEB21011X.json", record("FEB21011X", "Econometrics 1", ""));
        storage.add_raw(
            "FEB22002X.json",
            record("FEB22002X", "Econometrics 2", "<p>Requires FEB21011X.</p>"),
        );
        let config = Config::default();
        let pipeline = Pipeline::new(&storage, &config);

        pipeline.extract().unwrap();
        pipeline
            .build_categories("id,core\nFEB22002X,true\nFEB21011X,false\n".as_bytes())
            .unwrap();

        let mut out = Vec::new();
        let result = pipeline.aggregate(&mut out).unwrap();
        assert_eq!(result.rows_written, 2);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "id,course,credits,block_start,block_end,premaster,core,qf,or,econ,marketing,dependencies,extracurricular,qf_alternative,or_alternative"
        );
        assert_eq!(
            lines[1],
            "FEB21011X,Econometrics 1,Unknown,Unknown,Unknown,false,false,false,false,false,false,,false,,"
        );
        assert_eq!(
            lines[2],
            "FEB22002X,Econometrics 2,Unknown,Unknown,Unknown,false,true,false,false,false,false,FEB21011X,false,,"
        );
    }
}
