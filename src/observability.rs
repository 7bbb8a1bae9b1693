//! Metrics for catalogue runs.
//!
//! Runs are short-lived batches, so instead of serving an endpoint the
//! Prometheus recorder's snapshot is rendered to a text file when the run ends.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::error::Result;

/// All metric names used in the crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    RecordsExtracted,
    RecordsMalformed,
    RecordsWithoutId,
    CategoryRequirements,
    AggregateRows,
    RowsResolved,
    RowsUnresolved,
    FilesInvalid,
    StepDuration,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::RecordsExtracted => "catalog_records_extracted_total",
            MetricName::RecordsMalformed => "catalog_records_malformed_total",
            MetricName::RecordsWithoutId => "catalog_records_without_id_total",
            MetricName::CategoryRequirements => "catalog_category_requirements",
            MetricName::AggregateRows => "catalog_aggregate_rows_total",
            MetricName::RowsResolved => "catalog_rows_resolved_total",
            MetricName::RowsUnresolved => "catalog_rows_unresolved_total",
            MetricName::FilesInvalid => "catalog_files_invalid_total",
            MetricName::StepDuration => "catalog_step_duration_seconds",
        }
    }
}

/// Install the global Prometheus recorder. Returns `None` if one is already installed.
pub fn install_recorder() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Metrics recorder install failed (possibly already installed): {}", e);
            None
        }
    }
}

pub fn write_snapshot(handle: &PrometheusHandle, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, handle.render())?;
    info!("Wrote metrics snapshot to {}", path.display());
    Ok(())
}
