use image::imageops::FilterType;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::Result;

/// Size of generated thumbnails (square bound)
const THUMBNAIL_SIZE: u32 = 256;

/// Where the thumbnail for an item lives (doesn't generate, just returns the expected path)
pub fn thumbnail_path(cache_dir: &Path, item_id: &str) -> PathBuf {
    cache_dir.join(format!("{}.jpg", item_id))
}

/// Resolve an item's `image_path` against the output directory.
///
/// Mirrored images are stored relative to it; scanned ones are absolute.
pub fn resolve_image_path(output_dir: &Path, image_path: &str) -> PathBuf {
    let path = Path::new(image_path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        output_dir.join(path)
    }
}

/// Check whether the cached thumbnail is at least as new as its source
fn is_fresh(source: &Path, thumbnail: &Path) -> bool {
    let modified = |path: &Path| fs::metadata(path).and_then(|m| m.modified()).ok();
    match (modified(source), modified(thumbnail)) {
        (Some(source), Some(thumb)) => thumb >= source,
        _ => false,
    }
}

/// Make sure a thumbnail exists for `source` and return its path.
///
/// The cached file is reused unless the source image is newer.
pub fn ensure_thumbnail(source: &Path, cache_dir: &Path, item_id: &str) -> Result<PathBuf> {
    let path = thumbnail_path(cache_dir, item_id);
    if is_fresh(source, &path) {
        return Ok(path);
    }

    fs::create_dir_all(cache_dir)?;

    let img = image::open(source)?;
    let thumbnail = img.resize(THUMBNAIL_SIZE, THUMBNAIL_SIZE, FilterType::Lanczos3);
    // JPEG has no alpha channel
    thumbnail.to_rgb8().save(&path)?;

    debug!("📸 Generated thumbnail: {}", path.display());
    Ok(path)
}

/// Same as `ensure_thumbnail`, on a blocking worker thread.
///
/// Errors are flattened to strings so the result can travel in a UI message.
pub async fn load_thumbnail(
    source: PathBuf,
    cache_dir: PathBuf,
    item_id: String,
) -> (String, std::result::Result<PathBuf, String>) {
    let id = item_id.clone();
    let result = tokio::task::spawn_blocking(move || {
        ensure_thumbnail(&source, &cache_dir, &item_id).map_err(|e| e.to_string())
    })
    .await
    .unwrap_or_else(|e| Err(format!("Thumbnail task failed: {}", e)));

    (id, result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn write_png(path: &Path, width: u32, height: u32) {
        RgbImage::new(width, height).save(path).unwrap();
    }

    #[test]
    fn test_thumbnail_fits_bound() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("shoe_12.png");
        write_png(&source, 512, 300);

        let path = ensure_thumbnail(&source, &dir.path().join("thumbnails"), "12").unwrap();

        assert_eq!(path, dir.path().join("thumbnails").join("12.jpg"));
        let (w, h) = image::image_dimensions(&path).unwrap();
        assert_eq!(w, THUMBNAIL_SIZE);
        assert!(h < THUMBNAIL_SIZE);
    }

    #[test]
    fn test_newer_source_regenerates() {
        let dir = TempDir::new().unwrap();
        let cache = dir.path().join("thumbnails");
        let source = dir.path().join("shoe_12.png");
        write_png(&source, 64, 64);
        let path = ensure_thumbnail(&source, &cache, "12").unwrap();
        assert!(is_fresh(&source, &path));

        write_png(&source, 128, 32);
        fs::File::options()
            .write(true)
            .open(&source)
            .unwrap()
            .set_modified(SystemTime::now() + Duration::from_secs(60))
            .unwrap();
        assert!(!is_fresh(&source, &path));

        ensure_thumbnail(&source, &cache, "12").unwrap();
        let (w, h) = image::image_dimensions(&path).unwrap();
        // Scaled up to the bound, aspect kept
        assert_eq!((w, h), (256, 64));
    }

    #[test]
    fn test_unreadable_source_is_an_error() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("broken.jpg");
        fs::write(&source, b"not an image").unwrap();

        assert!(ensure_thumbnail(&source, &dir.path().join("thumbnails"), "broken").is_err());
    }

    #[test]
    fn test_resolve_image_path() {
        let out = Path::new("/data/out");
        assert_eq!(
            resolve_image_path(out, "images/shoe_12.jpg"),
            PathBuf::from("/data/out/images/shoe_12.jpg")
        );
        assert_eq!(
            resolve_image_path(out, "/photos/shoe_12.jpg"),
            PathBuf::from("/photos/shoe_12.jpg")
        );
    }
}
