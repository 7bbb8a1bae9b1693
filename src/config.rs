use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants;
use crate::error::{CatalogError, Result};

/// Environment variable naming the config file when `--config` is not given
pub const CONFIG_ENV_VAR: &str = "CATALOG_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// File the configuration was read from; `None` for built-in defaults
    #[serde(skip)]
    pub source: Option<PathBuf>,
    pub paths: PathsConfig,
    pub programme: ProgrammeConfig,
    pub reconcile: ReconcileConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Raw catalogue export, one JSON record per file
    pub input_dir: PathBuf,
    /// Extracted course records
    pub output_dir: PathBuf,
    /// Requirement sets, one JSON file per category
    pub programme_dir: PathBuf,
    /// Flag table read by `categories`, aggregate table written by `aggregate`
    pub course_table: PathBuf,
    /// Raw records checked by `validate`
    pub courses_dir: PathBuf,
    pub log_dir: PathBuf,
    pub metrics_file: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("input"),
            output_dir: PathBuf::from("output"),
            programme_dir: PathBuf::from("programme"),
            course_table: PathBuf::from("course.csv"),
            courses_dir: PathBuf::from("courses"),
            log_dir: PathBuf::from("logs"),
            metrics_file: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProgrammeConfig {
    /// Category flag columns, in aggregate column order
    pub categories: Vec<String>,
    /// Categories whose flag column is written after the dependencies column
    pub trailing_flags: Vec<String>,
    /// Categories that get a `<category>_alternative` column
    pub alternative_columns: Vec<String>,
    /// Interchangeable courses collapsed into a single requirement
    pub alternatives: Vec<AlternativeGroup>,
}

impl Default for ProgrammeConfig {
    fn default() -> Self {
        Self {
            categories: constants::default_categories(),
            trailing_flags: vec!["extracurricular".to_string()],
            alternative_columns: vec!["qf".to_string(), "or".to_string()],
            alternatives: vec![AlternativeGroup {
                category: "qf".to_string(),
                courses: vec!["FEB22017X".to_string(), "FEB21020X".to_string()],
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AlternativeGroup {
    pub category: String,
    pub courses: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Stripped from canonical names before fuzzy matching
    pub strip_prefix: String,
    /// Spelling and terminology variants applied to legacy names, in order
    pub variants: Vec<NameVariant>,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            strip_prefix: "introduction to ".to_string(),
            variants: vec![
                NameVariant::new("optimization", "optimisation"),
                NameVariant::new("multivariable stats", "multivariate statistics"),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NameVariant {
    pub from: String,
    pub to: String,
}

impl NameVariant {
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from an explicit path, the `CATALOG_CONFIG` variable,
    /// or `./config.toml`, falling back to built-in defaults when none exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from));

        let config = match explicit {
            Some(path) => Self::from_file(&path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => Config::default(),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            CatalogError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let mut config = Self::from_toml(&content)?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Reject references to categories that are not configured
    pub fn validate(&self) -> Result<()> {
        let programme = &self.programme;
        let known: HashSet<&str> = programme.categories.iter().map(String::as_str).collect();

        if known.len() != programme.categories.len() {
            return Err(CatalogError::Config(
                "Duplicate category in programme.categories".to_string(),
            ));
        }

        for name in programme
            .trailing_flags
            .iter()
            .chain(programme.alternative_columns.iter())
        {
            if !known.contains(name.as_str()) {
                return Err(CatalogError::Config(format!(
                    "Unknown category '{}' referenced in programme settings",
                    name
                )));
            }
        }

        for group in &programme.alternatives {
            if !known.contains(group.category.as_str()) {
                return Err(CatalogError::Config(format!(
                    "Alternative group references unknown category '{}'",
                    group.category
                )));
            }
            if group.courses.len() < 2 {
                return Err(CatalogError::Config(format!(
                    "Alternative group for '{}' needs at least two courses",
                    group.category
                )));
            }
            let mut seen = HashSet::new();
            if let Some(course) = group.courses.iter().find(|c| !seen.insert(c.as_str())) {
                return Err(CatalogError::Config(format!(
                    "Alternative group for '{}' lists {} more than once",
                    group.category, course
                )));
            }
        }

        Ok(())
    }
}
