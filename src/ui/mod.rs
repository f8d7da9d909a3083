/// Desktop editor module
///
/// - The iced window: item cards, shared-attribute editor, search,
///   save, rescan and CSV export (editor.rs)
/// - Thumbnail cache under the output directory (thumbnail.rs)
pub mod editor;
pub mod thumbnail;

pub use editor::run;
