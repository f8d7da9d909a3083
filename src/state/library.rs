use chrono::Utc;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::data::Dataset;
use crate::config::Settings;
use crate::error::{CatalogError, Result};

/// The Library owns the on-disk dataset document of one output directory.
///
/// The document is read wholesale and rewritten wholesale: a save serializes
/// the full dataset in memory, writes it to a temporary file next to the
/// target and renames it over the old one, so a crash never leaves a
/// half-written document behind.
#[derive(Debug, Clone)]
pub struct Library {
    output_dir: PathBuf,
    data_path: PathBuf,
}

impl Library {
    /// Open the library for `output_dir`, creating the directory if needed.
    pub fn open(output_dir: impl Into<PathBuf>, data_file: &str) -> Result<Self> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir)?;
        let data_path = output_dir.join(data_file);

        debug!("Dataset document: {}", data_path.display());

        Ok(Library {
            output_dir,
            data_path,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::open(&settings.output_dir, &settings.data_file)
    }

    /// Get the path to the dataset document
    pub fn path(&self) -> &Path {
        &self.data_path
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Load the stored dataset, or `None` when there is none yet.
    ///
    /// A document that fails to parse is an error unless `recover_corrupt`
    /// is set; then it is copied aside to `<file>.corrupt` and treated as
    /// absent.
    pub fn load(&self, recover_corrupt: bool) -> Result<Option<Dataset>> {
        if !self.data_path.exists() {
            info!("No dataset at {}, starting fresh", self.data_path.display());
            return Ok(None);
        }

        match read_dataset(&self.data_path) {
            Ok(dataset) => {
                info!(
                    "📁 Loaded {} items and {} attributes from {}",
                    dataset.items.len(),
                    dataset.attributes.len(),
                    self.data_path.display()
                );
                Ok(Some(dataset))
            }
            Err(CatalogError::DatasetFileCorrupt { path, source }) if recover_corrupt => {
                let backup = corrupt_backup_path(&path);
                fs::copy(&path, &backup)?;
                warn!(
                    "Could not parse {} ({}). Kept a copy at {} and starting with an empty dataset.",
                    path.display(),
                    source,
                    backup.display()
                );
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Persist the dataset.
    ///
    /// Stale attribute values are pruned and `last_updated` is set to now.
    /// If writing fails the previous timestamp is put back.
    pub fn save(&self, dataset: &mut Dataset) -> Result<()> {
        let pruned = dataset.normalize();
        if pruned > 0 {
            warn!("Pruned {} values for attributes no longer in the schema", pruned);
        }

        let previous = dataset.last_updated.replace(Utc::now());
        let written = serde_json::to_vec_pretty(dataset)
            .map_err(CatalogError::from)
            .and_then(|mut bytes| {
                bytes.push(b'\n');
                write_atomic(&self.data_path, &bytes)
            });

        match written {
            Ok(()) => {
                info!("✅ Dataset saved to {}", self.data_path.display());
                Ok(())
            }
            Err(err) => {
                dataset.last_updated = previous;
                Err(err)
            }
        }
    }
}

/// Read and normalize a dataset document from any path
pub fn read_dataset(path: &Path) -> Result<Dataset> {
    let raw = fs::read(path)?;
    let mut dataset: Dataset =
        serde_json::from_slice(&raw).map_err(|source| CatalogError::DatasetFileCorrupt {
            path: path.to_path_buf(),
            source,
        })?;

    let pruned = dataset.normalize();
    if pruned > 0 {
        warn!(
            "Ignoring {} stored values for attributes missing from the schema in {}",
            pruned,
            path.display()
        );
    }
    Ok(dataset)
}

fn corrupt_backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".corrupt");
    path.with_file_name(name)
}

/// Write atomically (temp file + rename)
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut name = std::ffi::OsString::from(".");
    name.push(path.file_name().unwrap_or_default());
    name.push(".tmp");
    let temp_path = path.with_file_name(name);

    let written = fs::File::create(&temp_path).and_then(|mut file| {
        file.write_all(bytes)?;
        file.sync_all()
    });
    if let Err(err) = written.and_then(|()| fs::rename(&temp_path, path)) {
        let _ = fs::remove_file(&temp_path);
        return Err(err.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::data::{Attribute, Item, Schema};
    use tempfile::TempDir;

    fn sample() -> Dataset {
        let mut item = Item::new("12", "shoe_12.jpg");
        item.attribute_values.insert("Color".into(), "Red".into());
        Dataset {
            items: vec![item, Item::new("45", "shoe_45.jpg")],
            attributes: Schema::validated(vec![Attribute::new("Color")]).unwrap(),
            last_updated: None,
        }
    }

    #[test]
    fn test_load_absent_is_none() {
        let dir = TempDir::new().unwrap();
        let library = Library::open(dir.path().join("out"), "dataset_data.json").unwrap();

        assert!(dir.path().join("out").is_dir());
        assert!(library.load(false).unwrap().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let library = Library::open(dir.path(), "dataset_data.json").unwrap();

        let mut dataset = sample();
        library.save(&mut dataset).unwrap();
        assert!(dataset.last_updated.is_some());

        let loaded = library.load(false).unwrap().unwrap();
        assert_eq!(loaded, dataset);
        assert!(!dir.path().join(".dataset_data.json.tmp").exists());
    }

    #[test]
    fn test_save_prunes_stale_values() {
        let dir = TempDir::new().unwrap();
        let library = Library::open(dir.path(), "dataset_data.json").unwrap();

        let mut dataset = sample();
        dataset.items[1]
            .attribute_values
            .insert("Material".into(), "Suede".into());
        library.save(&mut dataset).unwrap();

        let raw = fs::read_to_string(library.path()).unwrap();
        assert!(!raw.contains("Material"));
        assert!(raw.contains("\"Color\": \"Red\""));
    }

    #[test]
    fn test_corrupt_file_is_an_error_by_default() {
        let dir = TempDir::new().unwrap();
        let library = Library::open(dir.path(), "dataset_data.json").unwrap();
        fs::write(library.path(), "{ \"items\": [").unwrap();

        let err = library.load(false).unwrap_err();
        assert!(matches!(err, CatalogError::DatasetFileCorrupt { .. }));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_corrupt_file_recovery_keeps_a_copy() {
        let dir = TempDir::new().unwrap();
        let library = Library::open(dir.path(), "dataset_data.json").unwrap();
        fs::write(library.path(), "not json").unwrap();

        assert!(library.load(true).unwrap().is_none());
        assert_eq!(
            fs::read_to_string(dir.path().join("dataset_data.json.corrupt")).unwrap(),
            "not json"
        );
    }

    #[test]
    fn test_non_utf8_document_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let library = Library::open(dir.path(), "dataset_data.json").unwrap();
        let bytes = b"{\"items\": [\xff\xfe";
        fs::write(library.path(), bytes).unwrap();

        let err = library.load(false).unwrap_err();
        assert!(matches!(err, CatalogError::DatasetFileCorrupt { .. }));
        assert_eq!(err.exit_code(), 3);

        assert!(library.load(true).unwrap().is_none());
        assert_eq!(
            fs::read(dir.path().join("dataset_data.json.corrupt")).unwrap(),
            bytes.to_vec()
        );
    }

    #[test]
    fn test_failed_save_keeps_previous_document() {
        let dir = TempDir::new().unwrap();
        let library = Library::open(dir.path(), "dataset_data.json").unwrap();
        let mut dataset = sample();
        library.save(&mut dataset).unwrap();
        let before = fs::read_to_string(library.path()).unwrap();
        let stamp = dataset.last_updated;

        // A directory where the temp file should go makes the write fail
        fs::create_dir(dir.path().join(".dataset_data.json.tmp")).unwrap();
        dataset.items[0].notes = "changed".into();
        assert!(library.save(&mut dataset).is_err());

        assert_eq!(fs::read_to_string(library.path()).unwrap(), before);
        assert_eq!(dataset.last_updated, stamp);
    }
}
