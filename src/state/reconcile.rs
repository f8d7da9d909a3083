//! Merge a fresh scan into a previously saved dataset
//!
//! Reconciliation never touches user data: attribute values and notes of
//! known items are carried over verbatim, the schema is carried over as is,
//! and items whose image disappeared are kept unless pruning was asked for.

use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

use super::data::{Dataset, Item};
use crate::config::MissingPolicy;
use crate::scan::ScannedImage;

/// What a reconciliation changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Ids seen for the first time
    pub added: Vec<String>,
    /// Known items whose image path changed
    pub moved: Vec<String>,
    /// Known items absent from the scan that were kept
    pub missing: Vec<String>,
    /// Known items absent from the scan that were deleted
    pub pruned: Vec<String>,
    /// Attribute values dropped because their attribute is not in the schema
    pub stale_values: usize,
}

/// Merge `scanned` into `previous` (or into a fresh dataset).
///
/// The result is normalized: items in id order, `ID` values set, values for
/// unknown attributes dropped. `last_updated` is left as it was; only a save
/// moves it.
pub fn reconcile(
    scanned: &[ScannedImage],
    previous: Option<Dataset>,
    policy: MissingPolicy,
) -> (Dataset, ReconcileReport) {
    let mut dataset = previous.unwrap_or_default();
    let mut report = ReconcileReport::default();

    let mut index: HashMap<String, usize> = HashMap::with_capacity(dataset.items.len());
    for (position, item) in dataset.items.iter().enumerate() {
        index.entry(item.id.clone()).or_insert(position);
    }

    let mut seen: HashSet<&str> = HashSet::with_capacity(scanned.len());
    for image in scanned {
        if !seen.insert(image.id.as_str()) {
            continue;
        }
        match index.get(&image.id) {
            Some(&position) => {
                let item = &mut dataset.items[position];
                if item.image_path != image.image_path {
                    item.image_path = image.image_path.clone();
                    report.moved.push(image.id.clone());
                }
            }
            None => {
                dataset
                    .items
                    .push(Item::new(image.id.clone(), image.image_path.clone()));
                report.added.push(image.id.clone());
            }
        }
    }

    let absent: Vec<String> = dataset
        .items
        .iter()
        .filter(|item| !seen.contains(item.id.as_str()))
        .map(|item| item.id.clone())
        .collect();

    match policy {
        MissingPolicy::Retain => {
            if !absent.is_empty() {
                warn!(
                    "{} items have no image in this scan and were kept: {}",
                    absent.len(),
                    absent.join(", ")
                );
            }
            report.missing = absent;
        }
        MissingPolicy::Prune => {
            dataset
                .items
                .retain(|item| seen.contains(item.id.as_str()));
            if !absent.is_empty() {
                warn!("Pruned {} items with no image: {}", absent.len(), absent.join(", "));
            }
            report.pruned = absent;
        }
    }

    report.stale_values = dataset.normalize();

    info!(
        "Reconciled {} scanned images: {} new, {} moved, {} missing, {} pruned. Dataset now contains {} items.",
        scanned.len(),
        report.added.len(),
        report.moved.len(),
        report.missing.len(),
        report.pruned.len(),
        dataset.items.len()
    );

    (dataset, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::data::{Attribute, Schema};

    fn scanned(entries: &[(&str, &str)]) -> Vec<ScannedImage> {
        entries
            .iter()
            .map(|(id, file)| ScannedImage {
                id: id.to_string(),
                file_name: file.to_string(),
                image_path: format!("/photos/{}", file),
            })
            .collect()
    }

    fn ids(dataset: &Dataset) -> Vec<&str> {
        dataset.items.iter().map(|i| i.id.as_str()).collect()
    }

    #[test]
    fn test_fresh_dataset() {
        let scan = scanned(&[("45", "shoe_45.jpg"), ("12", "shoe_12.jpg")]);
        let (dataset, report) = reconcile(&scan, None, MissingPolicy::Retain);

        assert_eq!(ids(&dataset), vec!["12", "45"]);
        assert_eq!(dataset.attributes.names().collect::<Vec<_>>(), vec!["ID"]);
        let item = dataset.item("12").unwrap();
        assert_eq!(item.value("ID"), "12");
        assert_eq!(item.attribute_values.len(), 1);
        assert_eq!(item.notes, "");
        assert_eq!(item.image_path, "/photos/shoe_12.jpg");
        assert_eq!(report.added, vec!["45", "12"]);
    }

    fn saved_shoes() -> Dataset {
        let scan = scanned(&[("12", "shoe_12.jpg"), ("45", "shoe_45.jpg")]);
        let (mut dataset, _) = reconcile(&scan, None, MissingPolicy::Retain);
        dataset.attributes = Schema::validated(vec![Attribute::new("Color")]).unwrap();
        let item = dataset.item_mut("12").unwrap();
        item.attribute_values.insert("Color".into(), "Red".into());
        item.notes = "left shoe only".into();
        dataset
    }

    #[test]
    fn test_rescan_keeps_user_data_for_missing_items() {
        let previous = saved_shoes();
        let scan = scanned(&[("45", "shoe_45.jpg"), ("99", "shoe_99.jpg")]);

        let (dataset, report) = reconcile(&scan, Some(previous.clone()), MissingPolicy::Retain);

        assert_eq!(ids(&dataset), vec!["12", "45", "99"]);
        assert_eq!(dataset.item("12"), previous.item("12"));
        assert_eq!(dataset.item("45"), previous.item("45"));
        let new = dataset.item("99").unwrap();
        assert_eq!(new.value("Color"), "");
        assert_eq!(new.attribute_values.len(), 1);
        assert_eq!(report.added, vec!["99"]);
        assert_eq!(report.missing, vec!["12"]);
        assert!(report.pruned.is_empty());
    }

    #[test]
    fn test_prune_mode_deletes_missing_items() {
        let scan = scanned(&[("45", "shoe_45.jpg")]);
        let (dataset, report) = reconcile(&scan, Some(saved_shoes()), MissingPolicy::Prune);

        assert_eq!(ids(&dataset), vec!["45"]);
        assert_eq!(report.pruned, vec!["12"]);
    }

    #[test]
    fn test_moved_image_updates_only_the_path() {
        let previous = saved_shoes();
        let scan = vec![ScannedImage {
            id: "12".into(),
            file_name: "shoe_12.png".into(),
            image_path: "/archive/shoe_12.png".into(),
        }];

        let (dataset, report) = reconcile(&scan, Some(previous.clone()), MissingPolicy::Retain);

        let item = dataset.item("12").unwrap();
        let before = previous.item("12").unwrap();
        assert_eq!(item.image_path, "/archive/shoe_12.png");
        assert_eq!(item.attribute_values, before.attribute_values);
        assert_eq!(item.notes, before.notes);
        assert_eq!(report.moved, vec!["12"]);
    }

    #[test]
    fn test_schema_is_carried_over() {
        let previous = saved_shoes();
        let scan = scanned(&[("12", "shoe_12.jpg")]);
        let (dataset, _) = reconcile(&scan, Some(previous.clone()), MissingPolicy::Retain);
        assert_eq!(dataset.attributes, previous.attributes);
    }

    #[test]
    fn test_stale_values_are_pruned_and_id_pinned() {
        let mut previous = saved_shoes();
        let item = previous.item_mut("45").unwrap();
        item.attribute_values.insert("Material".into(), "Suede".into());
        item.attribute_values.remove("ID");

        let scan = scanned(&[("12", "shoe_12.jpg"), ("45", "shoe_45.jpg")]);
        let (dataset, report) = reconcile(&scan, Some(previous), MissingPolicy::Retain);

        let item = dataset.item("45").unwrap();
        assert_eq!(item.value("ID"), "45");
        assert!(!item.attribute_values.contains_key("Material"));
        assert_eq!(report.stale_values, 1);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let scan = scanned(&[("45", "shoe_45.jpg"), ("99", "shoe_99.jpg")]);
        let (once, _) = reconcile(&scan, Some(saved_shoes()), MissingPolicy::Retain);
        let (twice, report) = reconcile(&scan, Some(once.clone()), MissingPolicy::Retain);

        assert_eq!(
            serde_json::to_vec(&once).unwrap(),
            serde_json::to_vec(&twice).unwrap()
        );
        assert!(report.added.is_empty());
        assert!(report.moved.is_empty());
    }

    #[test]
    fn test_last_updated_is_untouched() {
        let mut previous = saved_shoes();
        let stamp = chrono::Utc::now();
        previous.last_updated = Some(stamp);

        let (dataset, _) = reconcile(&[], Some(previous), MissingPolicy::Retain);
        assert_eq!(dataset.last_updated, Some(stamp));
    }
}
