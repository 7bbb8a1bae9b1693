use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::categories::Categories;
use crate::constants::{ALTERNATIVE_COLUMN_SUFFIX, DEPENDENCIES_COLUMN, LIST_SEPARATOR};
use crate::types::{or_unknown, CourseRecord};

/// A course joined with its programme category memberships
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateRow {
    pub id: String,
    pub course: Option<String>,
    pub credits: Option<u32>,
    pub block_start: Option<String>,
    pub block_end: Option<String>,
    pub premaster: bool,
    /// Membership per category, in category order
    pub memberships: Vec<(String, bool)>,
    pub dependencies: Vec<String>,
    /// Other courses sharing a requirement, per alternative category
    pub alternatives: Vec<(String, Vec<String>)>,
}

impl AggregateRow {
    pub fn is_member(&self, category: &str) -> bool {
        self.memberships
            .iter()
            .any(|(name, member)| name == category && *member)
    }

    pub fn alternatives_for(&self, category: &str) -> &[String] {
        self.alternatives
            .iter()
            .find(|(name, _)| name == category)
            .map(|(_, alts)| alts.as_slice())
            .unwrap_or_default()
    }
}

/// Join courses with their category memberships, sorted by course id.
///
/// Courses without a known id are skipped. When several records share an
/// id, the last one wins.
pub fn join(
    courses: &[CourseRecord],
    categories: &Categories,
    alternative_categories: &[String],
) -> Vec<AggregateRow> {
    let mut by_id: BTreeMap<&str, &CourseRecord> = BTreeMap::new();
    for course in courses {
        match course.id.as_deref() {
            Some(id) => {
                if by_id.insert(id, course).is_some() {
                    warn!("Duplicate course id {}; keeping the last record", id);
                }
            }
            None => warn!(
                "Skipping course '{}' without a course code",
                course.name_or_unknown()
            ),
        }
    }

    by_id
        .into_iter()
        .map(|(id, course)| {
            let memberships: Vec<(String, bool)> = categories
                .sets
                .iter()
                .map(|set| (set.name.clone(), set.contains(id)))
                .collect();

            let alternatives: Vec<(String, Vec<String>)> = alternative_categories
                .iter()
                .map(|name| {
                    let others: Vec<String> = categories
                        .get(name)
                        .and_then(|set| set.requirement_for(id))
                        .filter(|req| req.alternatives.len() > 1)
                        .map(|req| {
                            req.alternatives
                                .iter()
                                .filter(|alt| alt.as_str() != id)
                                .cloned()
                                .collect()
                        })
                        .unwrap_or_default();
                    (name.clone(), others)
                })
                .collect();

            let row = AggregateRow {
                id: id.to_string(),
                course: course.name.clone(),
                credits: course.credits,
                block_start: course.block_start.clone(),
                block_end: course.block_end.clone(),
                premaster: course.premaster,
                memberships,
                dependencies: course.dependencies.clone(),
                alternatives,
            };
            debug!(
                "Joined {} into {} categories",
                id,
                row.memberships.iter().filter(|(_, m)| *m).count()
            );
            row
        })
        .collect()
}

/// Column order of the aggregate table
#[derive(Debug, Clone)]
pub struct AggregateLayout {
    pub leading_flags: Vec<String>,
    pub trailing_flags: Vec<String>,
    pub alternative_columns: Vec<String>,
}

impl AggregateLayout {
    /// Split the configured categories around the dependencies column
    pub fn new(categories: &[String], trailing: &[String], alternative_columns: &[String]) -> Self {
        Self {
            leading_flags: categories
                .iter()
                .filter(|c| !trailing.contains(c))
                .cloned()
                .collect(),
            trailing_flags: categories
                .iter()
                .filter(|c| trailing.contains(c))
                .cloned()
                .collect(),
            alternative_columns: alternative_columns.to_vec(),
        }
    }

    pub fn header(&self) -> Vec<String> {
        let mut header: Vec<String> = [
            "id",
            "course",
            "credits",
            "block_start",
            "block_end",
            "premaster",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        header.extend(self.leading_flags.iter().cloned());
        header.push(DEPENDENCIES_COLUMN.to_string());
        header.extend(self.trailing_flags.iter().cloned());
        header.extend(
            self.alternative_columns
                .iter()
                .map(|c| format!("{}{}", c, ALTERNATIVE_COLUMN_SUFFIX)),
        );
        header
    }

    pub fn record(&self, row: &AggregateRow) -> Vec<String> {
        let mut record = vec![
            row.id.clone(),
            or_unknown(&row.course),
            or_unknown(&row.credits),
            or_unknown(&row.block_start),
            or_unknown(&row.block_end),
            row.premaster.to_string(),
        ];
        record.extend(self.leading_flags.iter().map(|c| row.is_member(c).to_string()));
        record.push(row.dependencies.join(LIST_SEPARATOR));
        record.extend(self.trailing_flags.iter().map(|c| row.is_member(c).to_string()));
        record.extend(
            self.alternative_columns
                .iter()
                .map(|c| row.alternatives_for(c).join(LIST_SEPARATOR)),
        );
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::processing::categories::{Requirement, RequirementSet};

    fn course(id: &str, deps: &[&str]) -> CourseRecord {
        CourseRecord {
            id: Some(id.to_string()),
            name: Some(format!("Course {}", id)),
            credits: Some(4),
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
            ..Default::default()
        }
    }

    fn categories() -> Categories {
        let mut core = RequirementSet::new("core");
        core.requirements.push(Requirement::single("FEB22002X"));
        let mut qf = RequirementSet::new("qf");
        qf.requirements.push(Requirement {
            alternatives: vec!["FEB22017X".to_string(), "FEB21020X".to_string()],
        });
        let or = RequirementSet::new("or");
        Categories {
            sets: vec![core, qf, or],
        }
    }

    fn alt_columns() -> Vec<String> {
        vec!["qf".to_string(), "or".to_string()]
    }

    #[test]
    fn test_rows_are_sorted_by_id() {
        let courses = vec![course("FEB22017X", &[]), course("FEB21020X", &[]), course("FEB22002X", &[])];
        let rows = join(&courses, &categories(), &alt_columns());

        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["FEB21020X", "FEB22002X", "FEB22017X"]);
    }

    #[test]
    fn test_membership_and_alternatives() {
        let courses = vec![course("FEB22017X", &[]), course("FEB21020X", &[]), course("FEB22002X", &[])];
        let rows = join(&courses, &categories(), &alt_columns());

        let micro = &rows[0];
        assert!(micro.is_member("qf"));
        assert!(!micro.is_member("core"));
        assert_eq!(micro.alternatives_for("qf"), ["FEB22017X".to_string()]);
        assert!(micro.alternatives_for("or").is_empty());

        let metrics = &rows[1];
        assert!(metrics.is_member("core"));
        assert!(metrics.alternatives_for("qf").is_empty());
    }

    #[test]
    fn test_unknown_ids_are_skipped_and_duplicates_keep_last() {
        let mut first = course("FEB22002X", &[]);
        first.name = Some("Old name".to_string());
        let second = course("FEB22002X", &["FEB11001X"]);
        let courses = vec![first, CourseRecord::default(), second];

        let rows = join(&courses, &categories(), &alt_columns());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].course.as_deref(), Some("Course FEB22002X"));
        assert_eq!(rows[0].dependencies, vec!["FEB11001X"]);
    }

    #[test]
    fn test_default_layout_header() {
        let categories: Vec<String> = ["core", "qf", "or", "econ", "marketing", "extracurricular"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let layout = AggregateLayout::new(&categories, &["extracurricular".to_string()], &alt_columns());

        assert_eq!(
            layout.header().join(","),
            "id,course,credits,block_start,block_end,premaster,core,qf,or,econ,marketing,\
             dependencies,extracurricular,qf_alternative,or_alternative"
        );
    }

    #[test]
    fn test_record_formats_unknowns_and_lists() {
        let layout = AggregateLayout::new(
            &["core".to_string(), "qf".to_string(), "or".to_string()],
            &[],
            &alt_columns(),
        );
        let mut micro = course("FEB21020X", &["FEB11001X", "FEB11002X"]);
        micro.credits = None;
        let rows = join(&[micro], &categories(), &alt_columns());

        assert_eq!(
            layout.record(&rows[0]),
            vec![
                "FEB21020X",
                "Course FEB21020X",
                "Unknown",
                "Unknown",
                "Unknown",
                "false",
                "false",
                "true",
                "false",
                "FEB11001X;FEB11002X",
                "FEB22017X",
                "",
            ]
        );
    }
}
