use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{CatalogError, Result};

/// One record of the catalogue export: an ordered list of sections.
///
/// Only the top-level document has to be well formed. Sections and fields
/// that are not objects are dropped, and non-string keys or labels read as
/// absent, so a bad entry only hides the attribute it would have carried.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(default, deserialize_with = "lenient_sections")]
    pub items: Vec<Section>,
}

/// A named group of fields, tagged by its section kind (`rubriek`)
#[derive(Debug, Clone, Default, Serialize)]
pub struct Section {
    #[serde(rename = "rubriek")]
    pub kind: Option<String>,
    #[serde(rename = "velden")]
    pub fields: Option<Vec<Field>>,
}

/// A single catalogue entry: key, human label and an arbitrary JSON value
#[derive(Debug, Clone, Default, Serialize)]
pub struct Field {
    #[serde(rename = "veld")]
    pub key: Option<String>,
    #[serde(rename = "titel")]
    pub label: Option<String>,
    #[serde(rename = "waarde")]
    pub value: serde_json::Value,
}

fn lenient_sections<'de, D>(deserializer: D) -> std::result::Result<Vec<Section>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value
        .as_array()
        .map(|items| items.iter().filter_map(Section::from_value).collect())
        .unwrap_or_default())
}

fn text_of(object: &serde_json::Map<String, serde_json::Value>, key: &str) -> Option<String> {
    object.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

impl RawRecord {
    /// Parse a record from raw bytes; `origin` names the source in errors
    pub fn from_slice(origin: &str, bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| CatalogError::malformed(origin, e))
    }
}

impl Section {
    fn from_value(value: &serde_json::Value) -> Option<Self> {
        let object = value.as_object()?;
        Some(Self {
            kind: text_of(object, "rubriek"),
            fields: object
                .get("velden")
                .and_then(|v| v.as_array())
                .map(|fields| fields.iter().filter_map(Field::from_value).collect()),
        })
    }

    pub fn fields(&self) -> &[Field] {
        self.fields.as_deref().unwrap_or_default()
    }
}

impl Field {
    fn from_value(value: &serde_json::Value) -> Option<Self> {
        let object = value.as_object()?;
        Some(Self {
            key: text_of(object, "veld"),
            label: text_of(object, "titel"),
            value: object.get("waarde").cloned().unwrap_or_default(),
        })
    }

    /// The value as non-empty text, if it is a string
    pub fn text(&self) -> Option<&str> {
        self.value.as_str().filter(|s| !s.is_empty())
    }

    /// The value as a list of nested entries, if it is an array
    pub fn entries(&self) -> Option<&[serde_json::Value]> {
        self.value.as_array().map(Vec::as_slice)
    }
}

/// Normalized course data. Unknown scalars are `None` and only become the
/// literal `"Unknown"` when serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseRecord {
    #[serde(with = "unknown_sentinel", default)]
    pub id: Option<String>,
    #[serde(with = "unknown_sentinel", default)]
    pub name: Option<String>,
    #[serde(with = "unknown_sentinel", default)]
    pub credits: Option<u32>,
    #[serde(with = "unknown_sentinel", default)]
    pub block_start: Option<String>,
    #[serde(with = "unknown_sentinel", default)]
    pub block_end: Option<String>,
    #[serde(with = "unknown_sentinel", default)]
    pub url: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub premaster: bool,
}

impl CourseRecord {
    pub fn id_or_unknown(&self) -> &str {
        self.id.as_deref().unwrap_or(crate::constants::UNKNOWN)
    }

    pub fn name_or_unknown(&self) -> &str {
        self.name.as_deref().unwrap_or(crate::constants::UNKNOWN)
    }
}

/// Render an optional scalar, substituting the unknown sentinel
pub fn or_unknown<T: ToString>(value: &Option<T>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => crate::constants::UNKNOWN.to_string(),
    }
}

/// Serde adapter mapping `None` to `"Unknown"` and back
pub mod unknown_sentinel {
    use crate::constants::UNKNOWN;
    use serde::de::{DeserializeOwned, Error};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Serialize,
        S: Serializer,
    {
        match value {
            Some(v) => v.serialize(serializer),
            None => serializer.serialize_str(UNKNOWN),
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        T: DeserializeOwned,
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        match value {
            serde_json::Value::Null => Ok(None),
            serde_json::Value::String(ref s) if s == UNKNOWN => Ok(None),
            other => serde_json::from_value(other).map(Some).map_err(D::Error::custom),
        }
    }
}
