//! Filesystem side of the dataset
//!
//! - Item ids from filenames (identity.rs)
//! - Directory scanning (scanner.rs)
//! - Mirroring images into the output directory (mirror.rs)

pub mod identity;
pub mod mirror;
pub mod scanner;

pub use identity::{extract_id, stem_id, IdExtractor};
pub use mirror::mirror_images;
pub use scanner::{scan, IdCollision, ScanOutcome, ScannedImage};
