use iced::widget::image::{Handle, Image};
use iced::widget::{
    button, column, container, horizontal_space, row, scrollable, text, text_input, Column, Row,
};
use iced::{Alignment, Element, Length, Task, Theme};
use rfd::{FileDialog, MessageButtons, MessageDialog, MessageDialogResult, MessageLevel};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{info, warn};

use super::thumbnail::{load_thumbnail, resolve_image_path};
use crate::export::csv::export_csv;
use crate::state::data::Attribute;
use crate::state::edit::ValueEdit;
use crate::state::session::{RescanSummary, Session, Submission};

/// Cards per row in the item grid
const CARDS_PER_ROW: usize = 3;
/// Displayed thumbnail edge in pixels
const CARD_IMAGE_SIZE: f32 = 200.0;

/// One row of the shared-attribute editor
#[derive(Debug, Clone)]
struct AttributeDraft {
    /// Stable key card values are stored under while the name is edited
    key: usize,
    /// Name in the saved schema, `None` for attributes added since
    original: Option<String>,
    name: String,
    description: String,
}

/// Unsaved state of one item card
#[derive(Debug, Clone)]
struct CardDraft {
    id: String,
    image_path: String,
    /// Values by attribute draft key
    values: HashMap<usize, String>,
    notes: String,
}

/// Main application state
struct Editor {
    /// The open dataset
    session: Session,
    attributes: Vec<AttributeDraft>,
    cards: Vec<CardDraft>,
    next_key: usize,
    search: String,
    thumbnails: HashMap<String, Handle>,
    /// Status message to display to the user
    status: String,
    /// True while a background rescan holds a copy of the session
    busy: bool,
}

/// Application messages (events)
#[derive(Debug, Clone)]
enum Message {
    SearchChanged(String),
    ClearSearch,
    AddAttribute,
    AttributeNameChanged(usize, String),
    AttributeDescriptionChanged(usize, String),
    /// User clicked remove on an attribute row
    RemoveAttribute(usize),
    ValueChanged(String, usize, String),
    NotesChanged(String, String),
    Save,
    /// Save, then scan the image directory again
    Rescan,
    /// Background rescan completed
    Rescanned(Result<(Box<Session>, RescanSummary), String>),
    ExportCsv,
    ThumbnailReady((String, Result<PathBuf, String>)),
}

impl Message {
    /// Messages that change drafts or the dataset
    fn is_edit(&self) -> bool {
        matches!(
            self,
            Message::AddAttribute
                | Message::AttributeNameChanged(..)
                | Message::AttributeDescriptionChanged(..)
                | Message::RemoveAttribute(_)
                | Message::ValueChanged(..)
                | Message::NotesChanged(..)
                | Message::Save
                | Message::Rescan
        )
    }
}

impl Editor {
    /// Create the editor for an already opened session
    fn new(session: Session) -> (Self, Task<Message>) {
        let status = format!("Ready. {} items in dataset.", session.dataset().items.len());
        let mut editor = Editor {
            session,
            attributes: Vec::new(),
            cards: Vec::new(),
            next_key: 0,
            search: String::new(),
            thumbnails: HashMap::new(),
            status,
            busy: false,
        };
        editor.reset_drafts();
        let task = editor.load_thumbnails();
        (editor, task)
    }

    /// Rebuild every draft from the session's dataset
    fn reset_drafts(&mut self) {
        let dataset = self.session.dataset();

        let mut attributes = Vec::new();
        for attr in dataset.attributes.shared() {
            attributes.push(AttributeDraft {
                key: self.next_key,
                original: Some(attr.name.clone()),
                name: attr.name.clone(),
                description: attr.description.clone(),
            });
            self.next_key += 1;
        }

        self.cards = dataset
            .items
            .iter()
            .map(|item| CardDraft {
                id: item.id.clone(),
                image_path: item.image_path.clone(),
                values: attributes
                    .iter()
                    .filter_map(|draft| {
                        let name = draft.original.as_deref()?;
                        Some((draft.key, item.value(name).to_string()))
                    })
                    .collect(),
                notes: item.notes.clone(),
            })
            .collect();
        self.attributes = attributes;
    }

    /// Queue thumbnail generation for every item without one
    fn load_thumbnails(&self) -> Task<Message> {
        let output_dir = self.session.library().output_dir().to_path_buf();
        let cache_dir = self.session.settings().thumbnails_dir();

        Task::batch(
            self.cards
                .iter()
                .filter(|card| !self.thumbnails.contains_key(&card.id))
                .map(|card| {
                    Task::perform(
                        load_thumbnail(
                            resolve_image_path(&output_dir, &card.image_path),
                            cache_dir.clone(),
                            card.id.clone(),
                        ),
                        Message::ThumbnailReady,
                    )
                }),
        )
    }

    /// Collect the drafts into one save
    fn submission(&self) -> Submission {
        let dataset = self.session.dataset();

        let renames = self
            .attributes
            .iter()
            .filter_map(|draft| {
                let original = draft.original.as_ref()?;
                let name = draft.name.trim();
                (!name.is_empty() && name != original.as_str())
                    .then(|| (original.clone(), name.to_string()))
            })
            .collect();

        let attributes = self
            .attributes
            .iter()
            .map(|draft| {
                Attribute::new(draft.name.trim()).with_description(draft.description.trim())
            })
            .collect();

        let mut edits = Vec::new();
        for card in &self.cards {
            let Some(item) = dataset.item(&card.id) else {
                continue;
            };
            for draft in &self.attributes {
                let name = draft.name.trim();
                if name.is_empty() {
                    continue;
                }
                let stored = draft.original.as_deref().map(|o| item.value(o)).unwrap_or("");
                let current = card.values.get(&draft.key).map(String::as_str).unwrap_or("");
                if current != stored {
                    edits.push(ValueEdit::attribute(&card.id, name, current));
                }
            }
            if card.notes != item.notes {
                edits.push(ValueEdit::notes(&card.id, &card.notes));
            }
        }

        Submission {
            renames,
            attributes,
            edits,
        }
    }

    /// Submit the drafts; the session only changes if the save succeeds
    fn save(&mut self) -> Result<String, String> {
        // Blanking a saved name would drop its values without the remove prompt
        if let Some(original) = self
            .attributes
            .iter()
            .filter(|draft| draft.name.trim().is_empty())
            .find_map(|draft| draft.original.as_ref())
        {
            return Err(format!(
                "attribute '{}' needs a name; use Remove to delete it",
                original
            ));
        }

        let submission = self.submission();
        let outcome = self.session.submit(submission).map_err(|e| e.to_string())?;
        self.reset_drafts();

        for warning in &outcome.edits.warnings {
            warn!("{}", warning);
        }
        Ok(format!(
            "✅ Saved. {} values updated, {} attributes added, {} removed.",
            outcome.edits.applied,
            outcome.schema.added.len(),
            outcome.schema.removed.len()
        ))
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        if self.busy && message.is_edit() {
            self.status = "Rescan in progress, editing is paused.".to_string();
            return Task::none();
        }

        match message {
            Message::SearchChanged(search) => {
                self.search = search;
                Task::none()
            }
            Message::ClearSearch => {
                self.search.clear();
                Task::none()
            }
            Message::AddAttribute => {
                self.attributes.push(AttributeDraft {
                    key: self.next_key,
                    original: None,
                    name: String::new(),
                    description: String::new(),
                });
                self.next_key += 1;
                Task::none()
            }
            Message::AttributeNameChanged(key, name) => {
                if let Some(draft) = self.attributes.iter_mut().find(|d| d.key == key) {
                    draft.name = name;
                }
                Task::none()
            }
            Message::AttributeDescriptionChanged(key, description) => {
                if let Some(draft) = self.attributes.iter_mut().find(|d| d.key == key) {
                    draft.description = description;
                }
                Task::none()
            }
            Message::RemoveAttribute(key) => {
                let Some(index) = self.attributes.iter().position(|d| d.key == key) else {
                    return Task::none();
                };
                let filled = self
                    .cards
                    .iter()
                    .filter(|card| card.values.get(&key).is_some_and(|v| !v.is_empty()))
                    .count();
                let label = if self.attributes[index].name.trim().is_empty() {
                    "this attribute".to_string()
                } else {
                    format!("'{}'", self.attributes[index].name.trim())
                };

                // Show a native confirmation dialog
                let confirmed = MessageDialog::new()
                    .set_level(MessageLevel::Warning)
                    .set_title("Remove attribute")
                    .set_description(format!(
                        "Remove {} from every item? {} filled values will be deleted when you save.",
                        label, filled
                    ))
                    .set_buttons(MessageButtons::YesNo)
                    .show();

                if matches!(confirmed, MessageDialogResult::Yes) {
                    self.attributes.remove(index);
                    for card in &mut self.cards {
                        card.values.remove(&key);
                    }
                    self.status = format!("Removed {}. Save to apply.", label);
                }
                Task::none()
            }
            Message::ValueChanged(id, key, value) => {
                if let Some(card) = self.cards.iter_mut().find(|c| c.id == id) {
                    card.values.insert(key, value);
                }
                Task::none()
            }
            Message::NotesChanged(id, notes) => {
                if let Some(card) = self.cards.iter_mut().find(|c| c.id == id) {
                    card.notes = notes;
                }
                Task::none()
            }
            Message::Save => {
                self.status = match self.save() {
                    Ok(status) => status,
                    Err(e) => format!("❌ Save failed: {}", e),
                };
                Task::none()
            }
            Message::Rescan => {
                if let Err(e) = self.save() {
                    self.status = format!("❌ Save failed, not rescanning: {}", e);
                    return Task::none();
                }

                self.busy = true;
                self.status = format!(
                    "Rescanning {}...",
                    self.session.settings().image_dir.display()
                );

                // Launch async rescan task on a copy of the session
                Task::perform(rescan_async(self.session.clone()), Message::Rescanned)
            }
            Message::Rescanned(result) => {
                self.busy = false;
                match result {
                    Ok((session, summary)) => {
                        self.session = *session;
                        self.reset_drafts();
                        let report = &summary.report;
                        self.status = format!(
                            "✅ Rescan complete! {} new, {} missing, {} moved, {} id collisions.",
                            report.added.len(),
                            report.missing.len(),
                            report.moved.len(),
                            summary.collisions.len()
                        );
                        info!("📊 Rescan summary: {}", self.status);
                        self.load_thumbnails()
                    }
                    Err(e) => {
                        self.status = format!("❌ Rescan failed: {}", e);
                        Task::none()
                    }
                }
            }
            Message::ExportCsv => {
                // Show the native save dialog
                let target = FileDialog::new()
                    .set_title("Export Dataset as CSV")
                    .set_file_name("dataset.csv")
                    .add_filter("CSV", &["csv"])
                    .save_file();

                if let Some(path) = target {
                    let table = export_csv(self.session.dataset(), true);
                    self.status = match table.write_file(&path) {
                        Ok(()) => format!(
                            "✅ Exported {} items to {}",
                            table.rows.len(),
                            path.display()
                        ),
                        Err(e) => format!("❌ Export failed: {}", e),
                    };
                }
                Task::none()
            }
            Message::ThumbnailReady((id, result)) => {
                match result {
                    Ok(path) => {
                        self.thumbnails.insert(id, Handle::from_path(path));
                    }
                    Err(e) => warn!("⚠️  No thumbnail for {}: {}", id, e),
                }
                Task::none()
            }
        }
    }

    /// Build the user interface
    fn view(&self) -> Element<Message> {
        let toolbar = row![
            text_input("Search items...", &self.search)
                .on_input(Message::SearchChanged)
                .padding(8)
                .width(Length::Fixed(320.0)),
            button("Clear").on_press(Message::ClearSearch).padding(8),
            horizontal_space(),
            button("Save").on_press_maybe((!self.busy).then_some(Message::Save)).padding(8),
            button("Rescan").on_press_maybe((!self.busy).then_some(Message::Rescan)).padding(8),
            button("Export CSV").on_press(Message::ExportCsv).padding(8),
        ]
        .spacing(10)
        .align_y(Alignment::Center);

        let content: Column<Message> = column![
            text("Dataset Builder").size(32),
            toolbar,
            self.view_schema(),
            self.view_cards(),
            text(&self.status).size(16),
        ]
        .spacing(20)
        .padding(20);

        container(scrollable(content))
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    /// Shared attribute editor
    fn view_schema(&self) -> Element<Message> {
        let mut rows = Column::new().spacing(8).push(text("Shared attributes").size(20));

        for draft in &self.attributes {
            let key = draft.key;
            let mut name = text_input("Name", &draft.name).width(Length::Fixed(200.0));
            let mut description = text_input("Description", &draft.description).width(Length::Fill);
            // Inputs without a handler render disabled
            if !self.busy {
                name = name.on_input(move |name| Message::AttributeNameChanged(key, name));
                description =
                    description.on_input(move |d| Message::AttributeDescriptionChanged(key, d));
            }
            rows = rows.push(
                row![
                    name,
                    description,
                    button("Remove")
                        .style(button::danger)
                        .on_press_maybe((!self.busy).then_some(Message::RemoveAttribute(key))),
                ]
                .spacing(10)
                .align_y(Alignment::Center),
            );
        }

        rows.push(
            button("Add Attribute").on_press_maybe((!self.busy).then_some(Message::AddAttribute)),
        )
        .into()
    }

    /// Cards matching the search box, including values not saved yet.
    ///
    /// Same rules as `Item::matches`: case-insensitive over id, attribute
    /// names and values, and notes. An empty search shows everything.
    fn visible_cards(&self) -> Vec<&CardDraft> {
        let needle = self.search.trim().to_lowercase();
        let hit = |s: &str| s.to_lowercase().contains(&needle);

        self.cards
            .iter()
            .filter(|card| {
                needle.is_empty()
                    || hit(&card.id)
                    || self.attributes.iter().any(|draft| {
                        card.values.get(&draft.key).is_some_and(|value| {
                            !value.is_empty() && (hit(value) || hit(&draft.name))
                        })
                    })
                    || hit(&card.notes)
            })
            .collect()
    }

    /// Item cards matching the search, a few per row
    fn view_cards(&self) -> Element<Message> {
        let visible = self.visible_cards();

        if visible.is_empty() {
            return text("No items match.").into();
        }

        let mut grid = Column::new().spacing(16);
        for chunk in visible.chunks(CARDS_PER_ROW) {
            let mut line = Row::new().spacing(16);
            for card in chunk {
                line = line.push(self.view_card(card));
            }
            grid = grid.push(line);
        }
        grid.into()
    }

    fn view_card<'a>(&'a self, card: &'a CardDraft) -> Element<'a, Message> {
        let picture: Element<Message> = match self.thumbnails.get(&card.id) {
            Some(handle) => Image::<Handle>::new(handle.clone())
                .width(Length::Fixed(CARD_IMAGE_SIZE))
                .height(Length::Fixed(CARD_IMAGE_SIZE))
                .into(),
            None => container(text("Loading..."))
                .width(Length::Fixed(CARD_IMAGE_SIZE))
                .height(Length::Fixed(CARD_IMAGE_SIZE))
                .center_x(Length::Fixed(CARD_IMAGE_SIZE))
                .center_y(Length::Fixed(CARD_IMAGE_SIZE))
                .into(),
        };

        let mut fields = Column::new()
            .spacing(6)
            .push(picture)
            .push(text(format!("ID: {}", card.id)).size(18));

        for draft in &self.attributes {
            let key = draft.key;
            let id = card.id.clone();
            let value = card.values.get(&key).map(String::as_str).unwrap_or("");
            let label = if draft.name.trim().is_empty() {
                "(unnamed)"
            } else {
                draft.name.as_str()
            };
            let mut input = text_input("", value);
            if !self.busy {
                input = input.on_input(move |v| Message::ValueChanged(id.clone(), key, v));
            }
            fields = fields.push(column![text(label).size(14), input].spacing(2));
        }

        let id = card.id.clone();
        let mut notes = text_input("Notes", &card.notes);
        if !self.busy {
            notes = notes.on_input(move |n| Message::NotesChanged(id.clone(), n));
        }
        fields = fields.push(column![text("Notes").size(14), notes].spacing(2));

        container(fields)
            .padding(10)
            .width(Length::Fixed(CARD_IMAGE_SIZE + 40.0))
            .style(container::rounded_box)
            .into()
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

/// Open the desktop editor on a loaded session
pub fn run(session: Session) -> iced::Result {
    info!(
        "🎨 Dataset editor opening with {} items",
        session.dataset().items.len()
    );

    iced::application("Dataset Builder", Editor::update, Editor::view)
        .theme(Editor::theme)
        .centered()
        .run_with(move || Editor::new(session))
}

/// Rescan on a blocking worker thread so the window stays responsive
async fn rescan_async(mut session: Session) -> Result<(Box<Session>, RescanSummary), String> {
    tokio::task::spawn_blocking(move || {
        let summary = session.rescan().map_err(|e| e.to_string())?;
        Ok((Box::new(session), summary))
    })
    .await
    .map_err(|e| format!("Rescan task failed: {}", e))?
}
