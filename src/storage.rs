use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::config::PathsConfig;
use crate::error::Result;
use crate::pipeline::processing::categories::{Requirement, RequirementSet};
use crate::types::CourseRecord;

/// Raw bytes of one catalogue export file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSource {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl RawSource {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// File name without its extension, the external course identifier
    pub fn stem(&self) -> &str {
        Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.name)
    }
}

/// Storage trait for catalogue inputs and outputs
pub trait Storage {
    /// Raw records, ordered by file name
    fn raw_sources(&self) -> Result<Vec<RawSource>>;

    fn save_course(&self, name: &str, course: &CourseRecord) -> Result<()>;
    /// Extracted courses, ordered by file name
    fn courses(&self) -> Result<Vec<CourseRecord>>;

    fn save_requirement_set(&self, set: &RequirementSet) -> Result<()>;
    fn requirement_set(&self, name: &str) -> Result<Option<RequirementSet>>;
}

/// Directory-backed storage: one JSON file per record, course or category
#[derive(Debug, Clone)]
pub struct FileStorage {
    input_dir: PathBuf,
    output_dir: PathBuf,
    programme_dir: PathBuf,
}

impl FileStorage {
    pub fn new(
        input_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        programme_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            programme_dir: programme_dir.into(),
        }
    }

    pub fn from_paths(paths: &PathsConfig) -> Self {
        Self::new(&paths.input_dir, &paths.output_dir, &paths.programme_dir)
    }

    /// JSON files in a directory, sorted by file name
    fn json_files(dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("json") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    fn file_name(path: &Path) -> String {
        path.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

impl Storage for FileStorage {
    fn raw_sources(&self) -> Result<Vec<RawSource>> {
        let mut sources = Vec::new();
        for path in Self::json_files(&self.input_dir)? {
            let bytes = fs::read(&path)?;
            sources.push(RawSource::new(Self::file_name(&path), bytes));
        }
        debug!("Found {} raw records in {}", sources.len(), self.input_dir.display());
        Ok(sources)
    }

    fn save_course(&self, name: &str, course: &CourseRecord) -> Result<()> {
        fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(name);
        fs::write(&path, serde_json::to_string_pretty(course)?)?;
        debug!("Wrote course {} to {}", course.id_or_unknown(), path.display());
        Ok(())
    }

    fn courses(&self) -> Result<Vec<CourseRecord>> {
        let mut courses = Vec::new();
        for path in Self::json_files(&self.output_dir)? {
            let content = fs::read(&path)?;
            match serde_json::from_slice::<CourseRecord>(&content) {
                Ok(course) => courses.push(course),
                Err(e) => warn!("Skipping unreadable course file {}: {}", path.display(), e),
            }
        }
        Ok(courses)
    }

    fn save_requirement_set(&self, set: &RequirementSet) -> Result<()> {
        fs::create_dir_all(&self.programme_dir)?;
        let path = self.programme_dir.join(format!("{}.json", set.name));
        fs::write(&path, serde_json::to_string_pretty(&set.requirements)?)?;
        debug!("Wrote {} requirements to {}", set.requirements.len(), path.display());
        Ok(())
    }

    fn requirement_set(&self, name: &str) -> Result<Option<RequirementSet>> {
        let path = self.programme_dir.join(format!("{}.json", name));
        if !path.exists() {
            return Ok(None);
        }
        let requirements: Vec<Requirement> = serde_json::from_slice(&fs::read(&path)?)?;
        Ok(Some(RequirementSet {
            name: name.to_string(),
            requirements,
        }))
    }
}

/// In-memory storage implementation for development/testing
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    raw: Mutex<BTreeMap<String, Vec<u8>>>,
    courses: Mutex<BTreeMap<String, CourseRecord>>,
    sets: Mutex<HashMap<String, RequirementSet>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_raw(&self, name: &str, bytes: Vec<u8>) {
        self.raw
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string(), bytes);
    }
}

impl Storage for InMemoryStorage {
    fn raw_sources(&self) -> Result<Vec<RawSource>> {
        let raw = self.raw.lock().unwrap_or_else(|e| e.into_inner());
        Ok(raw
            .iter()
            .map(|(name, bytes)| RawSource::new(name.clone(), bytes.clone()))
            .collect())
    }

    fn save_course(&self, name: &str, course: &CourseRecord) -> Result<()> {
        self.courses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string(), course.clone());
        Ok(())
    }

    fn courses(&self) -> Result<Vec<CourseRecord>> {
        let courses = self.courses.lock().unwrap_or_else(|e| e.into_inner());
        Ok(courses.values().cloned().collect())
    }

    fn save_requirement_set(&self, set: &RequirementSet) -> Result<()> {
        self.sets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(set.name.clone(), set.clone());
        Ok(())
    }

    fn requirement_set(&self, name: &str) -> Result<Option<RequirementSet>> {
        let sets = self.sets.lock().unwrap_or_else(|e| e.into_inner());
        Ok(sets.get(name).cloned())
    }
}
