//! The working dataset of one output directory
//!
//! A `Session` is the explicit handle the editor (or any other front end)
//! holds: the library on disk, the scan settings and the current dataset.
//! It is loaded once and passed to whoever needs it; there is no global
//! state. One writer per output directory is assumed.

use tracing::info;

use super::data::{Attribute, Dataset};
use super::edit::{self, EditOutcome, SchemaChange, ValueEdit};
use super::library::Library;
use super::reconcile::{reconcile, ReconcileReport};
use crate::config::Settings;
use crate::error::Result;
use crate::scan::{self, IdCollision};

/// Everything a user save carries
#[derive(Debug, Clone, Default)]
pub struct Submission {
    /// Attribute renames `(from, to)`, applied first so values move along
    pub renames: Vec<(String, String)>,
    /// The complete shared schema after the edit
    pub attributes: Vec<Attribute>,
    pub edits: Vec<ValueEdit>,
}

/// What a save did
#[derive(Debug, Default)]
pub struct SaveOutcome {
    pub renamed_values: usize,
    pub schema: SchemaChange,
    pub edits: EditOutcome,
}

/// What a rescan did
#[derive(Debug, Clone, Default)]
pub struct RescanSummary {
    pub report: ReconcileReport,
    pub collisions: Vec<IdCollision>,
}

#[derive(Debug, Clone)]
pub struct Session {
    library: Library,
    settings: Settings,
    dataset: Dataset,
}

impl Session {
    /// Load the stored dataset, merge a fresh scan into it and save.
    pub fn open(settings: Settings) -> Result<(Self, RescanSummary)> {
        let library = Library::from_settings(&settings)?;
        let previous = library.load(settings.recover_corrupt)?;

        let (mut dataset, summary) = scan_and_merge(&settings, previous)?;
        library.save(&mut dataset)?;

        Ok((
            Session {
                library,
                settings,
                dataset,
            },
            summary,
        ))
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Re-run the scanner and reconciler against the current dataset and save.
    pub fn rescan(&mut self) -> Result<RescanSummary> {
        let (mut dataset, summary) = scan_and_merge(&self.settings, Some(self.dataset.clone()))?;
        self.library.save(&mut dataset)?;
        self.dataset = dataset;
        Ok(summary)
    }

    /// Apply a user save and persist it.
    ///
    /// The edits run against a copy; the session only adopts it once the
    /// document is on disk, so a rejected or failed save changes nothing.
    pub fn submit(&mut self, submission: Submission) -> Result<SaveOutcome> {
        let mut draft = self.dataset.clone();
        let mut outcome = SaveOutcome::default();

        for (from, to) in &submission.renames {
            outcome.renamed_values += edit::rename_attribute(&mut draft, from, to)?;
        }
        outcome.schema = edit::apply_schema_edit(&mut draft, submission.attributes)?;
        outcome.edits = edit::apply_value_edits(&mut draft, submission.edits)?;

        self.library.save(&mut draft)?;
        self.dataset = draft;

        info!(
            "Saved {} value edits across {} items",
            outcome.edits.applied,
            self.dataset.items.len()
        );
        Ok(outcome)
    }
}

fn scan_and_merge(settings: &Settings, previous: Option<Dataset>) -> Result<(Dataset, RescanSummary)> {
    let outcome = scan::scan(&settings.image_dir, settings.id_scheme.extractor())?;
    let images = if settings.copy_images {
        scan::mirror_images(outcome.images, &settings.images_dir())?
    } else {
        outcome.images
    };

    let (dataset, report) = reconcile(&images, previous, settings.missing);
    Ok((
        dataset,
        RescanSummary {
            report,
            collisions: outcome.collisions,
        },
    ))
}
