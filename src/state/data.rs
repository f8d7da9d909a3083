//! Shared data structures for the dataset
//!
//! These structs represent the model that flows between the scanner,
//! the on-disk document, the editor window and the exporters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use tracing::warn;

use crate::error::{CatalogError, Result};

/// Name of the reserved identity attribute
pub const ID_ATTRIBUTE: &str = "ID";

/// A user-defined shared attribute
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Attribute {
    /// Column name, unique within the schema
    pub name: String,
    /// Free-form explanation shown next to the name
    pub description: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// One column of the schema as seen by readers
///
/// `Id` is the reserved identity column; it is never stored in the schema's
/// attribute list, so it cannot be edited, reordered or removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column<'a> {
    Id,
    Shared(&'a Attribute),
}

impl<'a> Column<'a> {
    pub fn name(&self) -> &'a str {
        match self {
            Column::Id => ID_ATTRIBUTE,
            Column::Shared(attr) => &attr.name,
        }
    }

    pub fn description(&self) -> &'a str {
        match self {
            Column::Id => "",
            Column::Shared(attr) => &attr.description,
        }
    }

    pub fn readonly(&self) -> bool {
        matches!(self, Column::Id)
    }
}

/// The shared attribute schema
///
/// Always starts with the `ID` column. Shared attribute names are
/// non-empty and unique.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    shared: Vec<Attribute>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// True for names that belong to the reserved identity column
    pub fn is_reserved(name: &str) -> bool {
        name == ID_ATTRIBUTE
    }

    /// Build a schema from a user submission.
    ///
    /// Names and descriptions are trimmed, blank rows and entries named `ID`
    /// are dropped, and a repeated name is rejected.
    pub fn validated(attributes: Vec<Attribute>) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut shared = Vec::with_capacity(attributes.len());

        for attr in attributes {
            let name = attr.name.trim();
            if name.is_empty() || Self::is_reserved(name) {
                continue;
            }
            if !seen.insert(name.to_string()) {
                return Err(CatalogError::SchemaViolation(format!(
                    "attribute '{}' appears more than once",
                    name
                )));
            }
            shared.push(Attribute {
                name: name.to_string(),
                description: attr.description.trim().to_string(),
            });
        }

        Ok(Self { shared })
    }

    /// Build a schema from a persisted document, repairing instead of failing.
    fn from_records(records: Vec<AttributeRecord>) -> Self {
        let mut seen = HashSet::new();
        let mut shared = Vec::with_capacity(records.len());

        for record in records {
            if record.name.is_empty() || Self::is_reserved(&record.name) {
                continue;
            }
            if !seen.insert(record.name.clone()) {
                warn!("Dropping duplicate attribute '{}' from stored schema", record.name);
                continue;
            }
            shared.push(Attribute {
                name: record.name,
                description: record.description.unwrap_or_default(),
            });
        }

        Self { shared }
    }

    /// All columns in display order, `ID` first
    pub fn columns(&self) -> impl Iterator<Item = Column<'_>> {
        std::iter::once(Column::Id).chain(self.shared.iter().map(Column::Shared))
    }

    /// All column names in display order, `ID` first
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns().map(|column| column.name())
    }

    /// The user-defined attributes, without `ID`
    pub fn shared(&self) -> &[Attribute] {
        &self.shared
    }

    /// Number of columns including `ID`
    pub fn len(&self) -> usize {
        self.shared.len() + 1
    }

    /// A schema always holds at least the `ID` column
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.shared.iter().find(|attr| attr.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        Self::is_reserved(name) || self.get(name).is_some()
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut Attribute> {
        self.shared.iter_mut().find(|attr| attr.name == name)
    }
}

/// On-disk shape of a schema entry
#[derive(Deserialize)]
struct AttributeRecord {
    name: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Serialize)]
struct AttributeRecordRef<'a> {
    name: &'a str,
    description: &'a str,
    readonly: bool,
}

impl Serialize for Schema {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.columns().map(|column| AttributeRecordRef {
            name: column.name(),
            description: column.description(),
            readonly: column.readonly(),
        }))
    }
}

impl<'de> Deserialize<'de> for Schema {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Vec::<AttributeRecord>::deserialize(deserializer).map(Schema::from_records)
    }
}

/// Represents a single image in the dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Identity derived from the filename; never changes once assigned
    pub id: String,
    /// Path to the backing image (older documents call this `image`)
    #[serde(alias = "image", default)]
    pub image_path: String,
    /// Attribute name to value; empty string means unset
    #[serde(default)]
    pub attribute_values: BTreeMap<String, String>,
    #[serde(default)]
    pub notes: String,
}

impl Item {
    /// A freshly discovered item with only its `ID` value set
    pub fn new(id: impl Into<String>, image_path: impl Into<String>) -> Self {
        let id = id.into();
        let mut attribute_values = BTreeMap::new();
        attribute_values.insert(ID_ATTRIBUTE.to_string(), id.clone());
        Self {
            id,
            image_path: image_path.into(),
            attribute_values,
            notes: String::new(),
        }
    }

    /// Value of an attribute, empty when unset
    pub fn value(&self, name: &str) -> &str {
        self.attribute_values.get(name).map(String::as_str).unwrap_or("")
    }

    /// Case-insensitive match against id, attribute names and values, and notes.
    /// An empty needle matches everything.
    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        let hit = |s: &str| s.to_lowercase().contains(&needle);

        hit(&self.id)
            || self
                .attribute_values
                .iter()
                .any(|(name, value)| hit(name) || hit(value))
            || hit(&self.notes)
    }
}

/// Ordering used for items everywhere: all-digit ids first in numeric
/// order, then everything else lexicographically.
pub fn compare_ids(a: &str, b: &str) -> Ordering {
    fn key(id: &str) -> (u8, u128, &str) {
        let numeric = !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit());
        match id.parse::<u128>() {
            Ok(n) if numeric => (0, n, id),
            _ => (1, 0, id),
        }
    }
    key(a).cmp(&key(b))
}

/// The whole dataset document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub attributes: Schema,
    #[serde(default, with = "timestamp")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn item(&self, id: &str) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn item_mut(&mut self, id: &str) -> Option<&mut Item> {
        self.items.iter_mut().find(|item| item.id == id)
    }

    /// Items matching a search term, in dataset order
    pub fn search(&self, term: &str) -> Vec<&Item> {
        self.items.iter().filter(|item| item.matches(term)).collect()
    }

    /// Restore the dataset invariants.
    ///
    /// Items are sorted and de-duplicated by id (first occurrence wins),
    /// every item gets `ID` = its id, and values for attributes that are not
    /// in the schema are dropped. Returns how many stale values were dropped.
    pub fn normalize(&mut self) -> usize {
        self.items.sort_by(|a, b| compare_ids(&a.id, &b.id));

        let before = self.items.len();
        self.items.dedup_by(|later, earlier| later.id == earlier.id);
        if self.items.len() != before {
            warn!(
                "Dropped {} items with duplicate ids",
                before - self.items.len()
            );
        }

        let schema = &self.attributes;
        let mut pruned = 0;
        for item in &mut self.items {
            item.attribute_values
                .insert(ID_ATTRIBUTE.to_string(), item.id.clone());
            let width = item.attribute_values.len();
            item.attribute_values.retain(|name, _| schema.contains(name));
            pruned += width - item.attribute_values.len();
        }
        pruned
    }
}

/// `last_updated` is written as RFC 3339 UTC, or `""` when never saved.
/// Older documents may hold a naive local ISO timestamp; it is read as UTC.
mod timestamp {
    use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(ts) => serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Ok(Some(ts.with_timezone(&Utc)));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| Some(naive.and_utc()))
            .map_err(|_| D::Error::custom(format!("invalid last_updated timestamp '{}'", raw)))
    }
}
