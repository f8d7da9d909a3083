/// State management module
///
/// This module handles all dataset state, including:
/// - The data model: items, shared schema, timestamps (data.rs)
/// - The on-disk document and atomic saves (library.rs)
/// - Merging scans into a saved dataset (reconcile.rs)
/// - Schema and value edits (edit.rs)
/// - The session handle front ends hold (session.rs)
pub mod data;
pub mod edit;
pub mod library;
pub mod reconcile;
pub mod session;

pub use data::{Attribute, Column, Dataset, Item, Schema, ID_ATTRIBUTE};
pub use edit::{apply_schema_edit, apply_value_edits, rename_attribute, ValueEdit};
pub use library::{read_dataset, Library};
pub use reconcile::{reconcile, ReconcileReport};
pub use session::{RescanSummary, Session, Submission};
