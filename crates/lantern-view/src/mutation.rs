//! Gesture-driven mutations with optimistic local updates.
//!
//! Drag-move and inline edit both follow the same shape: apply what we can
//! locally, fire a tool call, and reconcile in a spawned continuation once
//! the host answers. Continuations re-read the surface because anything may
//! have changed while the call was in flight.

use std::collections::BTreeMap;

use lantern_protocol::ToolCallError;
use lantern_render::{FieldAnchor, FieldKind};
use serde_json::{Map, Value};
use tokio::task::JoinHandle;

use crate::surface::{StatusLevel, Surface};
use crate::view::{View, lock};

/// A card being dragged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragOperation {
    pub card_id: String,
    pub source_container_id: String,
}

/// An open inline-edit modal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSession {
    pub card_id: String,
    /// Field values as displayed when the modal opened.
    pub original: Vec<FieldAnchor>,
    pub draft: BTreeMap<String, String>,
}

impl EditSession {
    fn new(card_id: &str, fields: Vec<FieldAnchor>) -> Self {
        let draft = fields
            .iter()
            .map(|f| (f.name.clone(), f.value.clone()))
            .collect();
        Self {
            card_id: card_id.to_string(),
            original: fields,
            draft,
        }
    }

    /// Fields whose draft differs from what was displayed.
    pub fn changed(&self) -> Vec<(&FieldAnchor, &str)> {
        self.original
            .iter()
            .filter_map(|field| {
                let draft = self.draft.get(&field.name)?;
                (*draft != field.value).then_some((field, draft.as_str()))
            })
            .collect()
    }
}

/// The single gesture slot. Starting a gesture replaces whatever was
/// tracked before.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Interaction {
    #[default]
    Idle,
    Dragging(DragOperation),
    Editing(EditSession),
}

impl<S: Surface + 'static> View<S> {
    pub fn interaction(&self) -> Interaction {
        lock(&self.interaction).clone()
    }

    /// Begin dragging a card. Returns `false` for cards outside a container.
    pub fn drag_start(&self, card_id: &str) -> bool {
        let Some(source) = lock(&self.surface)
            .card(card_id)
            .and_then(|card| card.container)
        else {
            tracing::debug!(card_id, "Drag start on a card without a container");
            return false;
        };

        let previous = std::mem::replace(
            &mut *lock(&self.interaction),
            Interaction::Dragging(DragOperation {
                card_id: card_id.to_string(),
                source_container_id: source,
            }),
        );
        if matches!(previous, Interaction::Editing(_)) {
            lock(&self.surface).close_editor();
        }
        tracing::debug!(card_id, "Drag started");
        true
    }

    /// Drag finished, whether or not it was dropped anywhere.
    pub fn drag_end(&self) {
        let mut interaction = lock(&self.interaction);
        if matches!(*interaction, Interaction::Dragging(_)) {
            *interaction = Interaction::Idle;
        }
    }

    /// Drop the dragged card on `container_id`.
    ///
    /// Moves the card immediately and returns the continuation that
    /// reconciles with the host, or `None` when the drop is a no-op.
    pub fn drop_on(&self, container_id: &str) -> Option<JoinHandle<Result<Value, ToolCallError>>> {
        let drag = {
            let mut interaction = lock(&self.interaction);
            match std::mem::take(&mut *interaction) {
                Interaction::Dragging(drag) => drag,
                other => {
                    *interaction = other;
                    return None;
                }
            }
        };

        if drag.source_container_id == container_id {
            tracing::debug!(card_id = %drag.card_id, "Dropped on its own container");
            return None;
        }

        let (binding, target_title) = {
            let mut surface = lock(&self.surface);
            let target = surface.container(container_id)?;
            let card = surface.card(&drag.card_id)?;
            if !surface.move_card(&drag.card_id, container_id) {
                return None;
            }
            (card.binding, target.title)
        };

        self.show_status(StatusLevel::Info, format!("Moving to {target_title}..."));
        tracing::info!(
            card_id = %drag.card_id,
            from = %drag.source_container_id,
            to = container_id,
            tool = %binding.tool,
            "Card moved, updating host"
        );

        let mut arguments = Map::new();
        arguments.insert(binding.id_argument.clone(), Value::from(drag.card_id.clone()));
        arguments.insert(binding.container_argument.clone(), Value::from(container_id));

        let view = self.clone();
        let target = container_id.to_string();
        Some(tokio::spawn(async move {
            let client = view.session.client().clone();
            let outcome = client.call(&binding.tool, Value::Object(arguments)).await;
            match &outcome {
                Ok(_) => {
                    view.show_status(StatusLevel::Success, format!("Moved to {target_title}"));
                }
                Err(e) => {
                    tracing::warn!(card_id = %drag.card_id, error = %e, "Move rejected");
                    view.show_status(StatusLevel::Error, format!("Failed to move card: {e}"));
                    if view.config.rollback_on_failure {
                        view.roll_back_move(&drag, &target);
                    }
                }
            }
            outcome
        }))
    }

    /// Put a card back where it came from, unless something else moved it
    /// in the meantime.
    fn roll_back_move(&self, drag: &DragOperation, target: &str) {
        let mut surface = lock(&self.surface);
        let still_there = surface
            .card(&drag.card_id)
            .is_some_and(|card| card.container.as_deref() == Some(target));
        if still_there && surface.move_card(&drag.card_id, &drag.source_container_id) {
            tracing::info!(card_id = %drag.card_id, "Move rolled back");
        }
    }

    /// Open the inline editor for a card, seeded with what it displays now.
    pub fn open_editor(&self, card_id: &str) -> bool {
        let card = {
            let mut surface = lock(&self.surface);
            let Some(card) = surface.card(card_id) else {
                return false;
            };
            if card.fields.is_empty() {
                tracing::debug!(card_id, "Card has no editable fields");
                return false;
            }
            surface.open_editor(card_id, &card.fields);
            card
        };

        *lock(&self.interaction) = Interaction::Editing(EditSession::new(card_id, card.fields));
        true
    }

    /// Update one field of the open editor's draft.
    pub fn edit_field(&self, field: &str, value: &str) -> bool {
        let mut interaction = lock(&self.interaction);
        let Interaction::Editing(session) = &mut *interaction else {
            return false;
        };
        match session.draft.get_mut(field) {
            Some(draft) => {
                *draft = value.to_string();
                true
            }
            None => false,
        }
    }

    pub fn cancel_edit(&self) {
        let was_editing = {
            let mut interaction = lock(&self.interaction);
            let editing = matches!(*interaction, Interaction::Editing(_));
            if editing {
                *interaction = Interaction::Idle;
            }
            editing
        };
        if was_editing {
            lock(&self.surface).close_editor();
        }
    }

    /// Save the open editor, sending only the fields that changed.
    ///
    /// Returns `None` when nothing was sent: no editor open, nothing changed
    /// (the modal just closes), or a number field did not parse (the modal
    /// stays open).
    pub fn save_edit(&self) -> Option<JoinHandle<Result<Value, ToolCallError>>> {
        let session = {
            let mut interaction = lock(&self.interaction);
            match std::mem::take(&mut *interaction) {
                Interaction::Editing(session) => session,
                other => {
                    *interaction = other;
                    return None;
                }
            }
        };

        let changed: Vec<(String, String, FieldKind)> = session
            .changed()
            .into_iter()
            .map(|(field, draft)| (field.name.clone(), draft.to_string(), field.kind))
            .collect();

        if changed.is_empty() {
            tracing::debug!(card_id = %session.card_id, "No changes to save");
            lock(&self.surface).close_editor();
            return None;
        }

        let card = lock(&self.surface).card(&session.card_id);
        let Some(card) = card else {
            tracing::warn!(card_id = %session.card_id, "Edited card is gone");
            lock(&self.surface).close_editor();
            return None;
        };

        let mut arguments = Map::new();
        arguments.insert(
            card.binding.id_argument.clone(),
            Value::from(session.card_id.clone()),
        );
        for (name, text, kind) in &changed {
            let value = match kind {
                FieldKind::Text => Value::from(text.clone()),
                FieldKind::Number => match parse_number(text) {
                    Some(number) => number,
                    None => {
                        let label = session
                            .original
                            .iter()
                            .find(|f| &f.name == name)
                            .map(|f| f.label.clone())
                            .unwrap_or_else(|| name.clone());
                        self.show_status(StatusLevel::Error, format!("{label} must be a number"));
                        *lock(&self.interaction) = Interaction::Editing(session);
                        return None;
                    }
                },
            };
            arguments.insert(name.clone(), value);
        }

        lock(&self.surface).close_editor();
        self.show_status(StatusLevel::Info, "Saving changes...");
        tracing::info!(
            card_id = %session.card_id,
            tool = %card.binding.tool,
            fields = changed.len(),
            "Saving inline edit"
        );

        let view = self.clone();
        let card_id = session.card_id;
        let tool = card.binding.tool;
        Some(tokio::spawn(async move {
            let client = view.session.client().clone();
            let outcome = client.call(&tool, Value::Object(arguments)).await;
            match &outcome {
                Ok(_) => {
                    {
                        let mut surface = lock(&view.surface);
                        for (name, text, _) in &changed {
                            if !surface.set_field(&card_id, name, text) {
                                tracing::debug!(
                                    card_id = %card_id,
                                    field = %name,
                                    "Field no longer displayed"
                                );
                            }
                        }
                    }
                    view.show_status(StatusLevel::Success, "Changes saved");
                }
                Err(e) => {
                    tracing::warn!(card_id = %card_id, error = %e, "Edit rejected");
                    view.show_status(StatusLevel::Error, format!("Failed to save changes: {e}"));
                }
            }
            outcome
        }))
    }
}

/// Parse a displayed number such as `$12,500` or `7.5`.
fn parse_number(text: &str) -> Option<Value> {
    let cleaned: String = text
        .chars()
        .filter(|c| !matches!(c, '$' | '€' | '£' | ',' | ' ' | '_'))
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    if let Ok(int) = cleaned.parse::<i64>() {
        return Some(Value::from(int));
    }
    let float = cleaned.parse::<f64>().ok().filter(|f| f.is_finite())?;
    serde_json::Number::from_f64(float).map(Value::Number)
}
