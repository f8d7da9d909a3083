//! Image directory scanner
//!
//! Lists the images directly inside a directory and assigns each one an
//! item id. Nothing on disk is modified.

use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::identity::IdExtractor;
use crate::config::IMAGE_EXTENSIONS;
use crate::error::{CatalogError, Result};
use crate::state::data::compare_ids;

/// One image found by the scanner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedImage {
    pub id: String,
    /// Filename only (e.g., "shoe_12.jpg")
    pub file_name: String,
    /// Path the item should point at
    pub image_path: String,
}

/// Two files that produced the same id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdCollision {
    pub id: String,
    /// File that won (later in filename order)
    pub kept: String,
    /// File that was discarded
    pub replaced: String,
}

/// Result of a directory scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOutcome {
    /// One entry per id, in item order
    pub images: Vec<ScannedImage>,
    pub collisions: Vec<IdCollision>,
}

/// Check if a path has one of the recognised image extensions
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Scan `directory` (not recursively) for images.
///
/// Files are visited in filename order; when two files map to the same id
/// the later one wins and the collision is reported.
pub fn scan(directory: &Path, extract_id: IdExtractor) -> Result<ScanOutcome> {
    if !directory.is_dir() {
        return Err(CatalogError::DirectoryNotFound(directory.to_path_buf()));
    }
    // Stored paths must not depend on the working directory
    let directory = directory.canonicalize()?;
    let directory = directory.as_path();

    info!("🔍 Scanning for images in {}", directory.display());

    let mut by_id: BTreeMap<String, ScannedImage> = BTreeMap::new();
    let mut collisions = Vec::new();

    let entries = WalkDir::new(directory)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!("Skipping unreadable entry: {}", err);
                None
            }
        });

    for entry in entries {
        let path = entry.path();
        if !path.is_file() || !is_image_file(path) {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy().into_owned();
        let id = extract_id(&file_name);
        let scanned = ScannedImage {
            id: id.clone(),
            image_path: path.to_string_lossy().into_owned(),
            file_name,
        };
        debug!("Found {} -> id {}", scanned.file_name, id);

        if let Some(previous) = by_id.insert(id.clone(), scanned) {
            let kept = by_id[&id].file_name.clone();
            warn!(
                "⚠️  Id collision for '{}': {} replaces {}",
                id, kept, previous.file_name
            );
            collisions.push(IdCollision {
                id,
                kept,
                replaced: previous.file_name,
            });
        }
    }

    let mut images: Vec<ScannedImage> = by_id.into_values().collect();
    images.sort_by(|a, b| compare_ids(&a.id, &b.id));

    info!("Found {} images in {}", images.len(), directory.display());

    Ok(ScanOutcome { images, collisions })
}
