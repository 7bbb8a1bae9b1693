pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod observability;
pub mod pipeline;
pub mod storage;
pub mod types;

pub use config::Config;
pub use error::{CatalogError, Result};
pub use pipeline::processing::categories::{Categories, Requirement, RequirementSet};
pub use pipeline::processing::extract::extract;
pub use pipeline::processing::reconcile::{
    reconcile, LegacyTable, ReconcileOutcome, ReconcileReport,
};
pub use pipeline::processing::validate::{validate, ValidationReport, ValidationStatus};
pub use pipeline::Pipeline;
pub use storage::{FileStorage, InMemoryStorage, RawSource, Storage};
pub use types::{CourseRecord, RawRecord};
