use std::collections::HashMap;

use crate::types::{Field, RawRecord, Section};

/// Lookup tables over a single raw record, built once per record.
///
/// Repeated section kinds or field keys resolve to their first occurrence.
#[derive(Debug, Default)]
pub struct RecordIndex<'a> {
    sections: HashMap<&'a str, SectionIndex<'a>>,
}

#[derive(Debug, Default)]
pub struct SectionIndex<'a> {
    by_key: HashMap<&'a str, &'a Field>,
    by_label: HashMap<&'a str, &'a Field>,
}

impl<'a> RecordIndex<'a> {
    pub fn new(record: &'a RawRecord) -> Self {
        let mut sections = HashMap::new();
        for section in &record.items {
            if let Some(kind) = section.kind.as_deref() {
                sections
                    .entry(kind)
                    .or_insert_with(|| SectionIndex::new(section));
            }
        }
        Self { sections }
    }

    pub fn section(&self, kind: &str) -> Option<&SectionIndex<'a>> {
        self.sections.get(kind)
    }

    /// Field by key within the first section of the given kind
    pub fn field(&self, kind: &str, key: &str) -> Option<&'a Field> {
        self.section(kind).and_then(|s| s.by_key(key))
    }

    /// Field by label within the first section of the given kind
    pub fn labelled(&self, kind: &str, label: &str) -> Option<&'a Field> {
        self.section(kind).and_then(|s| s.by_label(label))
    }
}

impl<'a> SectionIndex<'a> {
    fn new(section: &'a Section) -> Self {
        let mut by_key = HashMap::new();
        let mut by_label = HashMap::new();
        for field in section.fields() {
            if let Some(key) = field.key.as_deref() {
                by_key.entry(key).or_insert(field);
            }
            if let Some(label) = field.label.as_deref() {
                by_label.entry(label).or_insert(field);
            }
        }
        Self { by_key, by_label }
    }

    pub fn by_key(&self, key: &str) -> Option<&'a Field> {
        self.by_key.get(key).copied()
    }

    pub fn by_label(&self, label: &str) -> Option<&'a Field> {
        self.by_label.get(label).copied()
    }
}
