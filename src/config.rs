//! Settings shared by the scanner, the store and the editor

use std::path::PathBuf;

use crate::scan::identity::{self, IdExtractor};

/// Recognised image extensions, compared case-insensitively
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp"];

/// Default name of the dataset document inside the output directory
pub const DEFAULT_DATA_FILE: &str = "dataset_data.json";

/// Subdirectory of the output directory that receives mirrored images
pub const IMAGES_DIR: &str = "images";

/// Subdirectory of the output directory that caches editor thumbnails
pub const THUMBNAILS_DIR: &str = "thumbnails";

/// How item ids are derived from filenames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum IdScheme {
    /// First `_<digits>` run, falling back to the stem (`shoe_12.jpg` -> `12`)
    #[default]
    UnderscoreDigits,
    /// Filename without extension (`shoe_12.jpg` -> `shoe_12`)
    Stem,
}

impl IdScheme {
    pub fn extractor(self) -> IdExtractor {
        match self {
            IdScheme::UnderscoreDigits => identity::extract_id,
            IdScheme::Stem => identity::stem_id,
        }
    }
}

/// What reconciliation does with items whose image is gone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingPolicy {
    /// Keep them with all their values
    #[default]
    Retain,
    /// Delete them from the dataset
    Prune,
}

/// Everything needed to scan a directory into a dataset
#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory holding the source images
    pub image_dir: PathBuf,
    /// Directory holding the dataset document, mirrored images and thumbnails
    pub output_dir: PathBuf,
    /// Name of the dataset document inside `output_dir`
    pub data_file: String,
    pub id_scheme: IdScheme,
    pub missing: MissingPolicy,
    /// Treat an unreadable dataset document as absent instead of failing
    pub recover_corrupt: bool,
    /// Copy images into `output_dir/images` and store relative paths
    pub copy_images: bool,
}

impl Settings {
    pub fn new(image_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            image_dir: image_dir.into(),
            output_dir: output_dir.into(),
            data_file: DEFAULT_DATA_FILE.to_string(),
            id_scheme: IdScheme::default(),
            missing: MissingPolicy::default(),
            recover_corrupt: false,
            copy_images: false,
        }
    }

    pub fn data_path(&self) -> PathBuf {
        self.output_dir.join(&self.data_file)
    }

    pub fn images_dir(&self) -> PathBuf {
        self.output_dir.join(IMAGES_DIR)
    }

    pub fn thumbnails_dir(&self) -> PathBuf {
        self.output_dir.join(THUMBNAILS_DIR)
    }
}
