//! Flat CSV export: one row per item, one column per schema attribute

use std::io::Write;
use std::path::Path;
use tracing::info;

use crate::error::Result;
use crate::state::data::{Column, Dataset};

pub const NOTES_COLUMN: &str = "notes";
pub const IMAGE_PATH_COLUMN: &str = "image_path";

/// A rendered CSV table
///
/// Every row has exactly `header.len()` cells; unset values are empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Flatten the dataset.
///
/// Columns are the schema in order (`ID` first), then `notes`, then
/// `image_path` when asked for. Rows follow the dataset's item order.
pub fn export_csv(dataset: &Dataset, include_image_path: bool) -> CsvTable {
    let mut header: Vec<String> = dataset.attributes.names().map(String::from).collect();
    header.push(NOTES_COLUMN.to_string());
    if include_image_path {
        header.push(IMAGE_PATH_COLUMN.to_string());
    }

    let rows = dataset
        .items
        .iter()
        .map(|item| {
            let mut row: Vec<String> = dataset
                .attributes
                .columns()
                .map(|column| match column {
                    Column::Id => item.id.clone(),
                    Column::Shared(attr) => item.value(&attr.name).to_string(),
                })
                .collect();
            row.push(item.notes.clone());
            if include_image_path {
                row.push(item.image_path.clone());
            }
            row
        })
        .collect();

    CsvTable { header, rows }
}

impl CsvTable {
    pub fn width(&self) -> usize {
        self.header.len()
    }

    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = ::csv::Writer::from_writer(writer);
        writer.write_record(&self.header)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn write_file(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        self.write_to(file)?;
        info!("Exported {} items to {}", self.rows.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::data::{Attribute, Item, Schema};

    fn shoes() -> Dataset {
        let mut red = Item::new("12", "images/shoe_12.jpg");
        red.attribute_values.insert("Color".into(), "Red".into());
        red.notes = "laces, missing".into();
        Dataset {
            items: vec![red, Item::new("45", "images/shoe_45.jpg")],
            attributes: Schema::validated(vec![Attribute::new("Color"), Attribute::new("Size")])
                .unwrap(),
            last_updated: None,
        }
    }

    #[test]
    fn test_header_follows_schema() {
        let table = export_csv(&shoes(), false);
        assert_eq!(table.header, vec!["ID", "Color", "Size", "notes"]);

        let table = export_csv(&shoes(), true);
        assert_eq!(table.header, vec!["ID", "Color", "Size", "notes", "image_path"]);
        assert_eq!(table.rows[1][4], "images/shoe_45.jpg");
    }

    #[test]
    fn test_row_width_is_constant() {
        let dataset = shoes();
        for include in [false, true] {
            let table = export_csv(&dataset, include);
            let expected = dataset.attributes.len() + if include { 2 } else { 1 };
            assert_eq!(table.width(), expected);
            assert!(table.rows.iter().all(|row| row.len() == expected));
        }
    }

    #[test]
    fn test_unset_values_are_empty_cells() {
        let table = export_csv(&shoes(), false);
        assert_eq!(table.rows[0], vec!["12", "Red", "", "laces, missing"]);
        assert_eq!(table.rows[1], vec!["45", "", "", ""]);
    }

    #[test]
    fn test_written_csv_is_quoted() {
        let mut out = Vec::new();
        export_csv(&shoes(), false).write_to(&mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "ID,Color,Size,notes\n12,Red,,\"laces, missing\"\n45,,,\n"
        );
    }

    #[test]
    fn test_empty_dataset_still_has_header() {
        let mut out = Vec::new();
        export_csv(&Dataset::default(), false).write_to(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "ID,notes\n");
    }
}
