//! Normalized three-table projection of a dataset
//!
//! - `items`: one row per item
//! - `attributes`: one row per shared attribute (the reserved `ID` is the
//!   items key and is not listed)
//! - `attribute_values`: one row per non-empty value; absence means unset

use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{CatalogError, Result};
use crate::state::data::{Attribute, Dataset, Item, Schema};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRow {
    pub id: String,
    pub image_path: String,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeRow {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeValueRow {
    pub item_id: String,
    pub attribute_name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationalExport {
    pub items: Vec<ItemRow>,
    pub attributes: Vec<AttributeRow>,
    pub attribute_values: Vec<AttributeValueRow>,
}

/// Project the dataset into tables.
///
/// Row order is fully determined by the dataset (item order, then schema
/// order), so exporting an unchanged dataset twice gives identical tables.
pub fn export_relational(dataset: &Dataset) -> RelationalExport {
    let items = dataset
        .items
        .iter()
        .map(|item| ItemRow {
            id: item.id.clone(),
            image_path: item.image_path.clone(),
            notes: item.notes.clone(),
        })
        .collect();

    let attributes = dataset
        .attributes
        .shared()
        .iter()
        .map(|attr| AttributeRow {
            name: attr.name.clone(),
            description: attr.description.clone(),
        })
        .collect();

    let attribute_values = dataset
        .items
        .iter()
        .flat_map(|item| {
            dataset.attributes.shared().iter().filter_map(move |attr| {
                let value = item.value(&attr.name);
                (!value.is_empty()).then(|| AttributeValueRow {
                    item_id: item.id.clone(),
                    attribute_name: attr.name.clone(),
                    value: value.to_string(),
                })
            })
        })
        .collect();

    RelationalExport {
        items,
        attributes,
        attribute_values,
    }
}

impl RelationalExport {
    /// Rebuild a dataset from the tables.
    ///
    /// Values for unknown items or attributes are skipped. Unset attributes
    /// come back as absent keys.
    pub fn to_dataset(&self) -> Result<Dataset> {
        let schema = Schema::validated(
            self.attributes
                .iter()
                .map(|row| Attribute::new(row.name.clone()).with_description(row.description.clone()))
                .collect(),
        )?;

        let mut dataset = Dataset {
            items: self
                .items
                .iter()
                .map(|row| {
                    let mut item = Item::new(row.id.clone(), row.image_path.clone());
                    item.notes = row.notes.clone();
                    item
                })
                .collect(),
            attributes: schema,
            last_updated: None,
        };
        dataset.normalize();

        for row in &self.attribute_values {
            if !dataset.attributes.contains(&row.attribute_name) {
                warn!("Skipping value for unknown attribute '{}'", row.attribute_name);
                continue;
            }
            match dataset.item_mut(&row.item_id) {
                Some(item) => {
                    item.attribute_values
                        .insert(row.attribute_name.clone(), row.value.clone());
                }
                None => warn!("{}", CatalogError::UnknownItemReference(row.item_id.clone())),
            }
        }

        Ok(dataset)
    }

    /// Write the tables as `items.csv`, `attributes.csv` and
    /// `attribute_values.csv` into `dir`.
    pub fn write_csv_dir(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;

        let mut writer = ::csv::Writer::from_path(dir.join("items.csv"))?;
        writer.write_record(["id", "image_path", "notes"])?;
        for row in &self.items {
            writer.write_record([&row.id, &row.image_path, &row.notes])?;
        }
        writer.flush()?;

        let mut writer = ::csv::Writer::from_path(dir.join("attributes.csv"))?;
        writer.write_record(["name", "description"])?;
        for row in &self.attributes {
            writer.write_record([&row.name, &row.description])?;
        }
        writer.flush()?;

        let mut writer = ::csv::Writer::from_path(dir.join("attribute_values.csv"))?;
        writer.write_record(["item_id", "attribute_name", "value"])?;
        for row in &self.attribute_values {
            writer.write_record([&row.item_id, &row.attribute_name, &row.value])?;
        }
        writer.flush()?;

        info!(
            "Exported {} items, {} attributes and {} values to {}",
            self.items.len(),
            self.attributes.len(),
            self.attribute_values.len(),
            dir.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::edit::{apply_schema_edit, apply_value_edits, ValueEdit};
    use tempfile::TempDir;

    fn shoes() -> Dataset {
        let mut dataset = Dataset {
            items: vec![
                Item::new("12", "images/shoe_12.jpg"),
                Item::new("45", "images/shoe_45.jpg"),
                Item::new("99", "images/shoe_99.jpg"),
            ],
            ..Dataset::default()
        };
        dataset.normalize();
        apply_schema_edit(
            &mut dataset,
            vec![
                Attribute::new("Color").with_description("main color"),
                Attribute::new("Size"),
            ],
        )
        .unwrap();
        apply_value_edits(
            &mut dataset,
            vec![
                ValueEdit::attribute("12", "Color", "Red"),
                ValueEdit::attribute("12", "Size", "42"),
                ValueEdit::attribute("45", "Size", ""),
                ValueEdit::notes("45", "box damaged"),
            ],
        )
        .unwrap();
        dataset
    }

    #[test]
    fn test_tables() {
        let export = export_relational(&shoes());

        assert_eq!(export.items.len(), 3);
        assert_eq!(export.items[1].notes, "box damaged");
        assert_eq!(
            export.attributes,
            vec![
                AttributeRow {
                    name: "Color".into(),
                    description: "main color".into()
                },
                AttributeRow {
                    name: "Size".into(),
                    description: "".into()
                },
            ]
        );
        let values: Vec<(&str, &str, &str)> = export
            .attribute_values
            .iter()
            .map(|r| (r.item_id.as_str(), r.attribute_name.as_str(), r.value.as_str()))
            .collect();
        assert_eq!(values, vec![("12", "Color", "Red"), ("12", "Size", "42")]);
    }

    #[test]
    fn test_blank_item_still_has_an_item_row() {
        let export = export_relational(&shoes());

        assert!(export.items.iter().any(|row| row.id == "99" && row.notes.is_empty()));
        assert!(export.attribute_values.iter().all(|row| row.item_id != "99"));
    }

    #[test]
    fn test_removed_attribute_has_no_value_rows() {
        let mut dataset = shoes();
        apply_schema_edit(&mut dataset, vec![Attribute::new("Size")]).unwrap();

        let export = export_relational(&dataset);
        assert!(export.attribute_values.iter().all(|row| row.attribute_name != "Color"));
        assert!(export.attributes.iter().all(|row| row.name != "Color"));
    }

    #[test]
    fn test_round_trip_modulo_empty_values() {
        let dataset = shoes();
        let rebuilt = export_relational(&dataset).to_dataset().unwrap();

        assert_eq!(rebuilt.attributes, dataset.attributes);
        for (original, back) in dataset.items.iter().zip(&rebuilt.items) {
            assert_eq!(original.id, back.id);
            assert_eq!(original.notes, back.notes);
            assert_eq!(original.image_path, back.image_path);
            for name in dataset.attributes.names() {
                assert_eq!(original.value(name), back.value(name));
            }
        }
        // "45" had Size set to "" which comes back absent
        assert!(!rebuilt.item("45").unwrap().attribute_values.contains_key("Size"));
    }

    #[test]
    fn test_export_is_idempotent() {
        let dataset = shoes();
        assert_eq!(export_relational(&dataset), export_relational(&dataset));
    }

    #[test]
    fn test_write_csv_dir() {
        let dir = TempDir::new().unwrap();
        export_relational(&shoes()).write_csv_dir(dir.path()).unwrap();

        let values = fs::read_to_string(dir.path().join("attribute_values.csv")).unwrap();
        assert_eq!(values, "item_id,attribute_name,value\n12,Color,Red\n12,Size,42\n");
        let attributes = fs::read_to_string(dir.path().join("attributes.csv")).unwrap();
        assert_eq!(attributes, "name,description\nColor,main color\nSize,\n");
        let items = fs::read_to_string(dir.path().join("items.csv")).unwrap();
        assert!(items.starts_with("id,image_path,notes\n12,images/shoe_12.jpg,\n"));
    }
}
