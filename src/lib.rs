//! Build attribute-tagged image datasets.
//!
//! Scan a directory of images, keep one item per image with user-defined
//! shared attributes and notes, persist the dataset as a JSON document and
//! export it as flat CSV or as normalized relational tables.

pub mod config;
pub mod error;
pub mod export;
pub mod scan;
pub mod state;
pub mod ui;

pub use config::Settings;
pub use error::{CatalogError, Result};
pub use state::{Dataset, Session};
