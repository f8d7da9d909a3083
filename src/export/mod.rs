//! Exporters
//!
//! Both exporters only read the dataset:
//! - Flat CSV, one row per item (csv.rs)
//! - Normalized items / attributes / attribute_values tables (relational.rs),
//!   written as CSV files or into SQLite (sqlite.rs)

pub mod csv;
pub mod relational;
pub mod sqlite;

pub use self::csv::{export_csv, CsvTable};
pub use self::relational::{export_relational, RelationalExport};
pub use self::sqlite::{read_sqlite, write_sqlite};
