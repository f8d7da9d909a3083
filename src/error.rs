//! Error types for the dataset builder

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Catalog error type
///
/// The first four variants are the failures the core reports on purpose;
/// the rest wrap the I/O and encoding layers underneath it.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// The directory handed to the scanner does not exist
    #[error("Image directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    /// The persisted dataset document could not be parsed
    #[error("Dataset file {} is corrupt: {source}", path.display())]
    DatasetFileCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A submitted schema or value edit breaks the attribute schema
    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    /// A value edit referenced an item id that is not in the dataset
    #[error("Unknown item reference: {0}")]
    UnknownItemReference(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl CatalogError {
    /// Process exit code the CLI reports for this failure
    pub fn exit_code(&self) -> u8 {
        match self {
            CatalogError::DirectoryNotFound(_) => 2,
            CatalogError::DatasetFileCorrupt { .. } => 3,
            CatalogError::SchemaViolation(_) => 4,
            _ => 1,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, CatalogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct() {
        let missing = CatalogError::DirectoryNotFound(PathBuf::from("/nope"));
        let corrupt = CatalogError::DatasetFileCorrupt {
            path: PathBuf::from("dataset_data.json"),
            source: serde_json::from_str::<serde_json::Value>("{").unwrap_err(),
        };
        let schema = CatalogError::SchemaViolation("duplicate attribute".into());
        let io = CatalogError::Io(io::Error::new(io::ErrorKind::Other, "disk"));

        assert_eq!(missing.exit_code(), 2);
        assert_eq!(corrupt.exit_code(), 3);
        assert_eq!(schema.exit_code(), 4);
        assert_eq!(io.exit_code(), 1);
    }

    #[test]
    fn test_messages_name_the_path() {
        let err = CatalogError::DirectoryNotFound(PathBuf::from("/data/shoes"));
        assert_eq!(err.to_string(), "Image directory not found: /data/shoes");
    }
}
