//! Item identity from filenames
//!
//! Filename conventions differ between datasets, so the extractor is a plain
//! function pointer that callers can swap out.

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// Strategy turning a filename into an item id
pub type IdExtractor = fn(&str) -> String;

static UNDERSCORE_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_(\d+)").expect("valid id pattern"));

/// Default extractor: the first run of digits after an underscore in the
/// stem, or the whole stem when there is none.
///
/// `shoe_12.jpg` -> `12`, `IMG_0042_v2.png` -> `0042`, `cover.png` -> `cover`
pub fn extract_id(filename: &str) -> String {
    let stem = stem_id(filename);
    UNDERSCORE_DIGITS
        .captures(&stem)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or(stem)
}

/// Filename without its extension
pub fn stem_id(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string())
}
