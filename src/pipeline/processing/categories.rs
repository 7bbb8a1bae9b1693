//! Programme categories: which courses satisfy which degree requirement.

use serde::{Deserialize, Serialize};
use std::io::Read;
use tracing::{debug, info, warn};

use crate::config::AlternativeGroup;
use crate::constants::ID_COLUMN;
use crate::error::{CatalogError, Result};

/// One degree obligation, satisfied by taking any one of its alternatives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    #[serde(rename = "requirement")]
    pub alternatives: Vec<String>,
}

impl Requirement {
    pub fn single(course_id: &str) -> Self {
        Self {
            alternatives: vec![course_id.to_string()],
        }
    }

    pub fn contains(&self, course_id: &str) -> bool {
        self.alternatives.iter().any(|a| a == course_id)
    }

    fn is_single(&self, course_id: &str) -> bool {
        self.alternatives.len() == 1 && self.alternatives[0] == course_id
    }
}

/// Requirements of one named category, in flag-table row order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementSet {
    pub name: String,
    pub requirements: Vec<Requirement>,
}

impl RequirementSet {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            requirements: Vec::new(),
        }
    }

    /// The first requirement the course takes part in
    pub fn requirement_for(&self, course_id: &str) -> Option<&Requirement> {
        self.requirements.iter().find(|r| r.contains(course_id))
    }

    pub fn contains(&self, course_id: &str) -> bool {
        self.requirement_for(course_id).is_some()
    }

    /// Collapse the singleton requirements of an alternative group into one.
    ///
    /// Requires at least two members of the group to be present. The merged
    /// requirement lists the present members in group order and takes the
    /// position of the first member present.
    pub fn merge_alternatives(&mut self, courses: &[String]) -> bool {
        let mut present: Vec<(usize, &String)> = Vec::new();
        for course in courses {
            let Some(pos) = self.requirements.iter().position(|r| r.is_single(course)) else {
                continue;
            };
            // a course listed twice in the group is merged once
            if present.iter().all(|(seen, _)| *seen != pos) {
                present.push((pos, course));
            }
        }

        if present.len() < 2 {
            return false;
        }

        let target = present[0].0;
        self.requirements[target] = Requirement {
            alternatives: present.iter().map(|(_, course)| (*course).clone()).collect(),
        };

        let mut redundant: Vec<usize> = present[1..].iter().map(|(pos, _)| *pos).collect();
        redundant.sort_unstable_by(|a, b| b.cmp(a));
        for pos in redundant {
            self.requirements.remove(pos);
        }
        true
    }
}

/// All configured categories, in configured order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Categories {
    pub sets: Vec<RequirementSet>,
}

impl Categories {
    pub fn get(&self, name: &str) -> Option<&RequirementSet> {
        self.sets.iter().find(|s| s.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut RequirementSet> {
        self.sets.iter_mut().find(|s| s.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sets.iter().map(|s| s.name.as_str())
    }
}

/// Boolean category flags per course id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagTable {
    pub categories: Vec<String>,
    pub rows: Vec<FlagRow>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagRow {
    pub id: String,
    /// One flag per entry of `FlagTable::categories`
    pub flags: Vec<bool>,
}

impl FlagTable {
    /// Read the configured category columns from a CSV with an `id` column.
    /// Other columns are ignored; a missing category column reads as all false.
    pub fn from_reader<R: Read>(reader: R, categories: &[String]) -> Result<Self> {
        let mut csv = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv.headers()?.clone();
        let id_index = headers
            .iter()
            .position(|h| h == ID_COLUMN)
            .ok_or_else(|| {
                CatalogError::MissingField(format!("'{}' column in flag table", ID_COLUMN))
            })?;

        let columns: Vec<Option<usize>> = categories
            .iter()
            .map(|category| {
                let index = headers.iter().position(|h| h == category);
                if index.is_none() {
                    warn!("Flag table has no '{}' column; category will be empty", category);
                }
                index
            })
            .collect();

        let mut rows = Vec::new();
        for record in csv.records() {
            let record = record?;
            let Some(id) = record.get(id_index).filter(|id| !id.is_empty()) else {
                debug!("Skipping flag table row without id");
                continue;
            };
            let flags = columns
                .iter()
                .map(|column| {
                    column
                        .and_then(|i| record.get(i))
                        .map_or(false, |v| v.eq_ignore_ascii_case("true"))
                })
                .collect();
            rows.push(FlagRow {
                id: id.to_string(),
                flags,
            });
        }

        Ok(Self {
            categories: categories.to_vec(),
            rows,
        })
    }
}

/// Group flagged courses into requirement sets and collapse alternative groups
pub fn build_categories(table: &FlagTable, alternatives: &[AlternativeGroup]) -> Categories {
    let mut categories = Categories {
        sets: table
            .categories
            .iter()
            .map(|name| RequirementSet::new(name))
            .collect(),
    };

    for row in &table.rows {
        for (set, flagged) in categories.sets.iter_mut().zip(&row.flags) {
            if *flagged {
                set.requirements.push(Requirement::single(&row.id));
            }
        }
    }

    for group in alternatives {
        match categories.get_mut(&group.category) {
            Some(set) => {
                if set.merge_alternatives(&group.courses) {
                    info!(
                        "Merged {} as alternative requirement for {}",
                        group.courses.join(", "),
                        group.category
                    );
                }
            }
            None => warn!("Alternative group references unknown category '{}'", group.category),
        }
    }

    categories
}
