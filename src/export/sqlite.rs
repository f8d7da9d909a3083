use rusqlite::{params, Connection};
use std::path::Path;
use tracing::info;

use super::relational::{AttributeRow, AttributeValueRow, ItemRow, RelationalExport};
use crate::error::Result;

/// Write the relational tables into a SQLite database.
///
/// Tables are created if they don't exist and their contents are replaced
/// inside one transaction, so re-running against the same dataset leaves
/// the database with identical rows.
pub fn write_sqlite(export: &RelationalExport, path: &Path) -> Result<()> {
    let mut conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    let tx = conn.transaction()?;
    init_schema(&tx)?;

    // Children first so foreign keys never dangle
    tx.execute("DELETE FROM attribute_values", [])?;
    tx.execute("DELETE FROM items", [])?;
    tx.execute("DELETE FROM attributes", [])?;

    {
        let mut stmt = tx.prepare("INSERT INTO items (id, image_path, notes) VALUES (?1, ?2, ?3)")?;
        for row in &export.items {
            stmt.execute(params![row.id, row.image_path, row.notes])?;
        }

        let mut stmt = tx.prepare("INSERT INTO attributes (name, description) VALUES (?1, ?2)")?;
        for row in &export.attributes {
            stmt.execute(params![row.name, row.description])?;
        }

        let mut stmt = tx.prepare(
            "INSERT INTO attribute_values (item_id, attribute_name, value) VALUES (?1, ?2, ?3)",
        )?;
        for row in &export.attribute_values {
            stmt.execute(params![row.item_id, row.attribute_name, row.value])?;
        }
    }

    tx.commit()?;

    info!(
        "Exported {} items to SQLite database at {}",
        export.items.len(),
        path.display()
    );
    Ok(())
}

/// Create the three tables if they don't exist
fn init_schema(conn: &Connection) -> Result<()> {
    // One row per image
    conn.execute(
        "CREATE TABLE IF NOT EXISTS items (
            id              TEXT PRIMARY KEY,
            image_path      TEXT NOT NULL,
            notes           TEXT NOT NULL DEFAULT ''
        )",
        [],
    )?;

    // One row per shared attribute
    conn.execute(
        "CREATE TABLE IF NOT EXISTS attributes (
            name            TEXT PRIMARY KEY,
            description     TEXT NOT NULL DEFAULT ''
        )",
        [],
    )?;

    // One row per non-empty value
    conn.execute(
        "CREATE TABLE IF NOT EXISTS attribute_values (
            item_id         TEXT NOT NULL,
            attribute_name  TEXT NOT NULL,
            value           TEXT NOT NULL,
            PRIMARY KEY (item_id, attribute_name),
            FOREIGN KEY (item_id) REFERENCES items(id) ON DELETE CASCADE,
            FOREIGN KEY (attribute_name) REFERENCES attributes(name) ON DELETE CASCADE
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attribute_values_attribute
         ON attribute_values(attribute_name)",
        [],
    )?;

    Ok(())
}

/// Read the tables back, in the order they were written
pub fn read_sqlite(path: &Path) -> Result<RelationalExport> {
    let conn = Connection::open(path)?;

    let mut stmt = conn.prepare("SELECT id, image_path, notes FROM items ORDER BY rowid")?;
    let items = stmt
        .query_map([], |row| {
            Ok(ItemRow {
                id: row.get(0)?,
                image_path: row.get(1)?,
                notes: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut stmt = conn.prepare("SELECT name, description FROM attributes ORDER BY rowid")?;
    let attributes = stmt
        .query_map([], |row| {
            Ok(AttributeRow {
                name: row.get(0)?,
                description: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut stmt = conn.prepare(
        "SELECT item_id, attribute_name, value FROM attribute_values ORDER BY rowid",
    )?;
    let attribute_values = stmt
        .query_map([], |row| {
            Ok(AttributeValueRow {
                item_id: row.get(0)?,
                attribute_name: row.get(1)?,
                value: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(RelationalExport {
        items,
        attributes,
        attribute_values,
    })
}
