//! User edits to the dataset
//!
//! Schema edits (add, remove, rename shared attributes) and per-item value
//! edits (attribute values, notes). Every operation validates its whole
//! input before touching the dataset, so a rejected edit leaves it unchanged.

use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

use super::data::{Attribute, Dataset, Schema};
use crate::error::{CatalogError, Result};

/// Effect of a schema edit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaChange {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    /// Non-empty values deleted along with the removed attributes
    pub values_dropped: usize,
}

impl SchemaChange {
    pub fn is_destructive(&self) -> bool {
        !self.removed.is_empty()
    }
}

/// Work out what replacing the schema with `attributes` would do,
/// without changing anything.
pub fn preview_schema_edit(dataset: &Dataset, attributes: Vec<Attribute>) -> Result<SchemaChange> {
    plan_schema_edit(dataset, attributes).map(|(_, change)| change)
}

fn plan_schema_edit(dataset: &Dataset, attributes: Vec<Attribute>) -> Result<(Schema, SchemaChange)> {
    let schema = Schema::validated(attributes)?;
    let old = &dataset.attributes;

    let added: Vec<String> = schema
        .shared()
        .iter()
        .filter(|attr| old.get(&attr.name).is_none())
        .map(|attr| attr.name.clone())
        .collect();
    let removed: Vec<String> = old
        .shared()
        .iter()
        .filter(|attr| schema.get(&attr.name).is_none())
        .map(|attr| attr.name.clone())
        .collect();
    let values_dropped = dataset
        .items
        .iter()
        .flat_map(|item| removed.iter().map(move |name| item.value(name)))
        .filter(|value| !value.is_empty())
        .count();

    Ok((
        schema,
        SchemaChange {
            added,
            removed,
            values_dropped,
        },
    ))
}

/// Replace the shared schema with `attributes`.
///
/// `ID` stays first whatever is submitted. A submitted name that is new
/// becomes an empty column on every item; a name that disappeared is deleted
/// from the schema and from every item. A rename submitted this way is a
/// removal plus an addition and loses the old values; use
/// [`rename_attribute`] to keep them.
///
/// Duplicate names are rejected with `SchemaViolation`.
pub fn apply_schema_edit(dataset: &mut Dataset, attributes: Vec<Attribute>) -> Result<SchemaChange> {
    let (schema, change) = plan_schema_edit(dataset, attributes)?;

    for item in &mut dataset.items {
        for name in &change.removed {
            item.attribute_values.remove(name);
        }
    }
    dataset.attributes = schema;

    if !change.added.is_empty() {
        info!("Added attributes: {}", change.added.join(", "));
    }
    if change.is_destructive() {
        warn!(
            "Removed attributes {} ({} values deleted)",
            change.removed.join(", "),
            change.values_dropped
        );
    }

    Ok(change)
}

/// Rename a shared attribute, moving its values on every item.
///
/// Returns the number of items whose value moved.
pub fn rename_attribute(dataset: &mut Dataset, from: &str, to: &str) -> Result<usize> {
    let to = to.trim();
    if Schema::is_reserved(from) || Schema::is_reserved(to) {
        return Err(CatalogError::SchemaViolation(
            "the ID attribute cannot be renamed".into(),
        ));
    }
    if to.is_empty() {
        return Err(CatalogError::SchemaViolation(format!(
            "cannot rename '{}' to an empty name",
            from
        )));
    }
    if dataset.attributes.get(from).is_none() {
        return Err(CatalogError::SchemaViolation(format!(
            "unknown attribute '{}'",
            from
        )));
    }
    if from == to {
        return Ok(0);
    }
    if dataset.attributes.contains(to) {
        return Err(CatalogError::SchemaViolation(format!(
            "attribute '{}' already exists",
            to
        )));
    }

    if let Some(attr) = dataset.attributes.get_mut(from) {
        attr.name = to.to_string();
    }

    let mut moved = 0;
    for item in &mut dataset.items {
        if let Some(value) = item.attribute_values.remove(from) {
            item.attribute_values.insert(to.to_string(), value);
            moved += 1;
        }
    }

    info!("Renamed attribute '{}' to '{}' ({} values kept)", from, to, moved);
    Ok(moved)
}

/// A single change to one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueEdit {
    Attribute {
        item_id: String,
        attribute: String,
        value: String,
    },
    Notes {
        item_id: String,
        notes: String,
    },
}

impl ValueEdit {
    pub fn attribute(
        item_id: impl Into<String>,
        attribute: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        ValueEdit::Attribute {
            item_id: item_id.into(),
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    pub fn notes(item_id: impl Into<String>, notes: impl Into<String>) -> Self {
        ValueEdit::Notes {
            item_id: item_id.into(),
            notes: notes.into(),
        }
    }

    pub fn item_id(&self) -> &str {
        match self {
            ValueEdit::Attribute { item_id, .. } | ValueEdit::Notes { item_id, .. } => item_id,
        }
    }
}

/// Result of a batch of value edits
#[derive(Debug, Default)]
pub struct EditOutcome {
    pub applied: usize,
    /// Edits that were skipped; currently only `UnknownItemReference`
    pub warnings: Vec<CatalogError>,
}

/// Merge a batch of value edits into the dataset.
///
/// An edit naming an attribute outside the schema (or `ID`) rejects the
/// whole batch. An edit naming an unknown item is skipped and reported.
pub fn apply_value_edits(dataset: &mut Dataset, edits: Vec<ValueEdit>) -> Result<EditOutcome> {
    for edit in &edits {
        if let ValueEdit::Attribute { attribute, .. } = edit {
            if Schema::is_reserved(attribute) {
                return Err(CatalogError::SchemaViolation(
                    "the ID attribute is read-only".into(),
                ));
            }
            if !dataset.attributes.contains(attribute) {
                return Err(CatalogError::SchemaViolation(format!(
                    "unknown attribute '{}'; add it to the schema first",
                    attribute
                )));
            }
        }
    }

    let index: HashMap<String, usize> = dataset
        .items
        .iter()
        .enumerate()
        .map(|(position, item)| (item.id.clone(), position))
        .collect();

    let mut outcome = EditOutcome::default();
    let mut reported = HashSet::new();
    for edit in edits {
        let Some(&position) = index.get(edit.item_id()) else {
            if reported.insert(edit.item_id().to_string()) {
                warn!("Skipping edits for unknown item '{}'", edit.item_id());
                outcome
                    .warnings
                    .push(CatalogError::UnknownItemReference(edit.item_id().to_string()));
            }
            continue;
        };

        let item = &mut dataset.items[position];
        match edit {
            ValueEdit::Attribute {
                attribute, value, ..
            } => {
                item.attribute_values.insert(attribute, value);
            }
            ValueEdit::Notes { notes, .. } => {
                item.notes = notes;
            }
        }
        outcome.applied += 1;
    }

    Ok(outcome)
}
