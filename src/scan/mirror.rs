//! Copy scanned images next to the dataset document
//!
//! Keeps the output directory self-contained: items point at
//! `images/<file>` relative to it.

use std::fs;
use std::path::Path;
use tracing::{debug, info};

use super::scanner::ScannedImage;
use crate::config::IMAGES_DIR;
use crate::error::Result;

/// Copy every scanned image into `images_dir` and rewrite its path.
///
/// Existing copies are left alone so user-replaced files survive a rescan.
pub fn mirror_images(images: Vec<ScannedImage>, images_dir: &Path) -> Result<Vec<ScannedImage>> {
    fs::create_dir_all(images_dir)?;

    let mut copied = 0;
    let mirrored = images
        .into_iter()
        .map(|mut image| {
            let dest = images_dir.join(&image.file_name);
            if !dest.exists() {
                fs::copy(&image.image_path, &dest)?;
                debug!("Copied image: {} to {}", image.file_name, dest.display());
                copied += 1;
            }
            image.image_path = format!("{}/{}", IMAGES_DIR, image.file_name);
            Ok(image)
        })
        .collect::<Result<Vec<_>>>()?;

    if copied > 0 {
        info!("📁 Copied {} new images into {}", copied, images_dir.display());
    }

    Ok(mirrored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn scanned(dir: &Path, id: &str, name: &str) -> ScannedImage {
        let path = dir.join(name);
        fs::write(&path, format!("pixels of {}", name)).unwrap();
        ScannedImage {
            id: id.into(),
            file_name: name.into(),
            image_path: path.to_string_lossy().into_owned(),
        }
    }

    #[test]
    fn test_mirror_copies_and_rewrites_paths() {
        let source = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let images_dir = output.path().join("images");

        let images = vec![scanned(source.path(), "12", "shoe_12.jpg")];
        let mirrored = mirror_images(images, &images_dir).unwrap();

        assert_eq!(mirrored[0].image_path, "images/shoe_12.jpg");
        assert_eq!(
            fs::read_to_string(images_dir.join("shoe_12.jpg")).unwrap(),
            "pixels of shoe_12.jpg"
        );
    }

    #[test]
    fn test_existing_copy_is_kept() {
        let source = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let images_dir = output.path().join("images");
        fs::create_dir_all(&images_dir).unwrap();
        fs::write(images_dir.join("shoe_12.jpg"), "retouched").unwrap();

        let images = vec![scanned(source.path(), "12", "shoe_12.jpg")];
        mirror_images(images, &images_dir).unwrap();

        assert_eq!(
            fs::read_to_string(images_dir.join("shoe_12.jpg")).unwrap(),
            "retouched"
        );
    }
}
