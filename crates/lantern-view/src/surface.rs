//! The document the view draws into.
//!
//! [`Surface`] is the seam between view logic and whatever actually shows the
//! markup: a webview shell, or the [`HeadlessSurface`] used by the binary and
//! the tests. Mutation continuations always read card state back through the
//! surface at callback time instead of trusting what they saw at dispatch.

use lantern_render::{CardAnchor, ContainerAnchor, FieldAnchor, LayoutIndex, Rendered};
use serde::Serialize;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusLevel {
    Info,
    Success,
    Error,
}

/// A short-lived message shown over the view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    pub id: u64,
    pub level: StatusLevel,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

pub trait Surface: Send {
    fn show_loading(&mut self);

    /// Replace the content with a rendered tree.
    fn mount(&mut self, rendered: &Rendered);

    /// Replace the whole view with a static error panel.
    fn show_error(&mut self, title: &str, message: &str);

    /// Current state of a card as displayed.
    fn card(&self, card_id: &str) -> Option<CardAnchor>;

    fn container(&self, container_id: &str) -> Option<ContainerAnchor>;

    /// Move a card node into another container. Returns `false` if either
    /// side no longer exists.
    fn move_card(&mut self, card_id: &str, container_id: &str) -> bool;

    /// Patch the displayed text of one card field in place.
    fn set_field(&mut self, card_id: &str, field: &str, text: &str) -> bool;

    fn show_status(&mut self, status: &Status);

    fn dismiss_status(&mut self, id: u64);

    fn open_editor(&mut self, card_id: &str, fields: &[FieldAnchor]);

    fn close_editor(&mut self);

    /// Scroll box of the current content.
    fn measure(&self) -> Size;
}

/// Every change applied to a surface, as streamed to an external shell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SurfaceOp {
    ShowLoading,
    Mount { markup: String },
    ShowError { title: String, message: String },
    MoveCard { card_id: String, container_id: String },
    SetField { card_id: String, field: String, text: String },
    ShowStatus { status: Status },
    DismissStatus { id: u64 },
    OpenEditor { card_id: String, fields: Vec<FieldAnchor> },
    CloseEditor,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Loading,
    /// `markup` is what was mounted and never changes afterwards. Moves and
    /// field patches land in `layout` and in the streamed [`SurfaceOp`]s.
    Mounted { markup: String, layout: LayoutIndex },
    Error { title: String, message: String },
}

/// An open inline-edit modal.
#[derive(Debug, Clone, PartialEq)]
pub struct Editor {
    pub card_id: String,
    pub fields: Vec<FieldAnchor>,
}

const ROW_HEIGHT: u32 = 28;
const PANEL_PADDING: u32 = 16;
const LOADING_HEIGHT: u32 = 120;
const ERROR_HEIGHT: u32 = 160;

/// Statuses kept in [`HeadlessSurface::status_history`]; older ones are dropped.
pub const STATUS_HISTORY_LIMIT: usize = 64;

/// Block-level tags counted as one row each when estimating height.
const BLOCK_TAGS: &[&str] = &[
    "<div", "<p", "<h1", "<h2", "<h3", "<h4", "<header", "<section", "<article", "<tr", "<dt",
    "<hr",
];

/// In-memory surface.
///
/// Keeps the mounted markup as a snapshot and tracks live state (card
/// placement, field text, statuses, the editor) in the layout index. With a
/// sink attached every operation is also forwarded as a [`SurfaceOp`], so a
/// shell holding the same markup replays moves and patches on its own DOM.
pub struct HeadlessSurface {
    content: Content,
    active_statuses: Vec<Status>,
    status_history: Vec<Status>,
    editor: Option<Editor>,
    viewport_width: u32,
    sink: Option<mpsc::UnboundedSender<SurfaceOp>>,
}

impl HeadlessSurface {
    pub fn new(viewport_width: u32) -> Self {
        Self {
            content: Content::Loading,
            active_statuses: Vec::new(),
            status_history: Vec::new(),
            editor: None,
            viewport_width,
            sink: None,
        }
    }

    /// Forward every operation to `sink`.
    pub fn with_sink(mut self, sink: mpsc::UnboundedSender<SurfaceOp>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    /// Markup as of the last mount. Card moves and field patches since then
    /// are only visible through [`HeadlessSurface::layout`].
    pub fn markup(&self) -> Option<&str> {
        match &self.content {
            Content::Mounted { markup, .. } => Some(markup),
            _ => None,
        }
    }

    pub fn layout(&self) -> Option<&LayoutIndex> {
        match &self.content {
            Content::Mounted { layout, .. } => Some(layout),
            _ => None,
        }
    }

    pub fn active_statuses(&self) -> &[Status] {
        &self.active_statuses
    }

    /// Recently shown statuses, oldest first, at most
    /// [`STATUS_HISTORY_LIMIT`] of them.
    pub fn status_history(&self) -> &[Status] {
        &self.status_history
    }

    pub fn editor(&self) -> Option<&Editor> {
        self.editor.as_ref()
    }

    fn emit(&self, op: SurfaceOp) {
        if let Some(sink) = &self.sink {
            if sink.send(op).is_err() {
                tracing::debug!("Surface sink closed");
            }
        }
    }

    fn layout_mut(&mut self) -> Option<&mut LayoutIndex> {
        match &mut self.content {
            Content::Mounted { layout, .. } => Some(layout),
            _ => None,
        }
    }
}

impl Surface for HeadlessSurface {
    fn show_loading(&mut self) {
        self.content = Content::Loading;
        self.editor = None;
        self.emit(SurfaceOp::ShowLoading);
    }

    fn mount(&mut self, rendered: &Rendered) {
        self.content = Content::Mounted {
            markup: rendered.markup.clone(),
            layout: rendered.layout.clone(),
        };
        self.editor = None;
        self.emit(SurfaceOp::Mount {
            markup: rendered.markup.clone(),
        });
    }

    fn show_error(&mut self, title: &str, message: &str) {
        self.content = Content::Error {
            title: title.to_string(),
            message: message.to_string(),
        };
        self.editor = None;
        self.emit(SurfaceOp::ShowError {
            title: title.to_string(),
            message: message.to_string(),
        });
    }

    fn card(&self, card_id: &str) -> Option<CardAnchor> {
        self.layout()?.card(card_id).cloned()
    }

    fn container(&self, container_id: &str) -> Option<ContainerAnchor> {
        self.layout()?.container(container_id).cloned()
    }

    fn move_card(&mut self, card_id: &str, container_id: &str) -> bool {
        let Some(layout) = self.layout_mut() else {
            return false;
        };
        if layout.container(container_id).is_none() {
            return false;
        }
        let Some(card) = layout.card_mut(card_id) else {
            return false;
        };
        let previous = card.container.replace(container_id.to_string());

        if let Some(previous) = previous {
            if let Some(source) = layout.container_mut(&previous) {
                source.cards.retain(|id| id != card_id);
            }
        }
        if let Some(target) = layout.container_mut(container_id) {
            target.cards.push(card_id.to_string());
        }

        self.emit(SurfaceOp::MoveCard {
            card_id: card_id.to_string(),
            container_id: container_id.to_string(),
        });
        true
    }

    fn set_field(&mut self, card_id: &str, field: &str, text: &str) -> bool {
        let Some(card) = self.layout_mut().and_then(|l| l.card_mut(card_id)) else {
            return false;
        };
        let Some(anchor) = card.fields.iter_mut().find(|f| f.name == field) else {
            return false;
        };
        anchor.value = text.to_string();

        self.emit(SurfaceOp::SetField {
            card_id: card_id.to_string(),
            field: field.to_string(),
            text: text.to_string(),
        });
        true
    }

    fn show_status(&mut self, status: &Status) {
        self.active_statuses.push(status.clone());
        if self.status_history.len() == STATUS_HISTORY_LIMIT {
            self.status_history.remove(0);
        }
        self.status_history.push(status.clone());
        self.emit(SurfaceOp::ShowStatus {
            status: status.clone(),
        });
    }

    fn dismiss_status(&mut self, id: u64) {
        let before = self.active_statuses.len();
        self.active_statuses.retain(|s| s.id != id);
        if self.active_statuses.len() != before {
            self.emit(SurfaceOp::DismissStatus { id });
        }
    }

    fn open_editor(&mut self, card_id: &str, fields: &[FieldAnchor]) {
        self.editor = Some(Editor {
            card_id: card_id.to_string(),
            fields: fields.to_vec(),
        });
        self.emit(SurfaceOp::OpenEditor {
            card_id: card_id.to_string(),
            fields: fields.to_vec(),
        });
    }

    fn close_editor(&mut self) {
        if self.editor.take().is_some() {
            self.emit(SurfaceOp::CloseEditor);
        }
    }

    /// Headless estimate: one row per block-level element of the mounted
    /// markup. Moves and patches keep the row count, so the snapshot is
    /// enough.
    fn measure(&self) -> Size {
        let height = match &self.content {
            Content::Loading => LOADING_HEIGHT,
            Content::Error { .. } => ERROR_HEIGHT,
            Content::Mounted { markup, .. } => {
                let rows: usize = BLOCK_TAGS.iter().map(|tag| count_tag(markup, tag)).sum();
                PANEL_PADDING * 2 + ROW_HEIGHT * rows as u32
            }
        };
        Size {
            width: self.viewport_width,
            height,
        }
    }
}

/// Count `tag` only where it is a whole tag name (`<p` must not match `<pre`).
fn count_tag(markup: &str, tag: &str) -> usize {
    markup
        .match_indices(tag)
        .filter(|(at, _)| {
            matches!(
                markup[at + tag.len()..].chars().next(),
                Some(' ' | '>' | '/')
            )
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lantern_render::{UiTree, render};
    use serde_json::json;

    fn mounted() -> HeadlessSurface {
        let tree = UiTree::from_value(&json!({
            "root": "board",
            "elements": {
                "board": {"key": "board", "type": "Board", "children": ["s1", "s2"]},
                "s1": {"key": "s1", "type": "Column", "props": {"id": "stage1", "title": "Lead"}, "children": ["c1"]},
                "s2": {"key": "s2", "type": "Column", "props": {"id": "stage2", "title": "Won"}},
                "c1": {"key": "c1", "type": "BoardCard", "props": {
                    "id": "opp1", "title": "Acme",
                    "fields": [{"name": "amount", "value": "5000"}]
                }}
            }
        }))
        .unwrap();
        let mut surface = HeadlessSurface::new(480);
        surface.mount(&render(&tree).unwrap());
        surface
    }

    #[test]
    fn move_card_updates_both_containers() {
        let mut surface = mounted();
        assert!(surface.move_card("opp1", "stage2"));

        assert_eq!(surface.card("opp1").unwrap().container.as_deref(), Some("stage2"));
        assert!(surface.container("stage1").unwrap().cards.is_empty());
        assert_eq!(surface.container("stage2").unwrap().cards, vec!["opp1"]);
    }

    #[test]
    fn move_to_unknown_container_is_refused() {
        let mut surface = mounted();
        assert!(!surface.move_card("opp1", "stage9"));
        assert!(!surface.move_card("ghost", "stage2"));
        assert_eq!(surface.card("opp1").unwrap().container.as_deref(), Some("stage1"));
    }

    #[test]
    fn set_field_patches_displayed_text() {
        let mut surface = mounted();
        assert!(surface.set_field("opp1", "amount", "7500"));
        assert_eq!(surface.card("opp1").unwrap().fields[0].value, "7500");
        assert!(!surface.set_field("opp1", "owner", "x"));
    }

    #[test]
    fn statuses_are_tracked_until_dismissed() {
        let mut surface = HeadlessSurface::new(480);
        let status = Status {
            id: 1,
            level: StatusLevel::Info,
            text: "Saving".into(),
        };
        surface.show_status(&status);
        assert_eq!(surface.active_statuses(), &[status.clone()]);

        surface.dismiss_status(1);
        assert!(surface.active_statuses().is_empty());
        assert_eq!(surface.status_history(), &[status]);
    }

    #[test]
    fn status_history_keeps_only_recent_entries() {
        let mut surface = HeadlessSurface::new(480);
        for id in 0..(STATUS_HISTORY_LIMIT as u64 + 6) {
            let status = Status {
                id,
                level: StatusLevel::Info,
                text: format!("status {id}"),
            };
            surface.show_status(&status);
            surface.dismiss_status(id);
        }

        let history = surface.status_history();
        assert_eq!(history.len(), STATUS_HISTORY_LIMIT);
        assert_eq!(history.first().unwrap().id, 6);
        assert_eq!(history.last().unwrap().id, STATUS_HISTORY_LIMIT as u64 + 5);
        assert!(surface.active_statuses().is_empty());
    }

    #[test]
    fn markup_stays_as_mounted_while_layout_tracks_changes() {
        let mut surface = mounted();
        let markup = surface.markup().unwrap().to_string();
        let size = surface.measure();

        assert!(surface.move_card("opp1", "stage2"));
        assert!(surface.set_field("opp1", "amount", "7500"));

        assert_eq!(surface.markup().unwrap(), markup);
        assert!(!markup.contains("7500"));
        assert_eq!(surface.measure(), size);
        let layout = surface.layout().unwrap();
        assert_eq!(layout.container("stage2").unwrap().cards, vec!["opp1"]);
        assert_eq!(layout.card("opp1").unwrap().fields[0].value, "7500");
    }

    #[test]
    fn sink_receives_operations() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut surface = HeadlessSurface::new(480).with_sink(tx);
        surface.show_loading();
        surface.show_error("Oops", "bad root");

        assert_eq!(rx.try_recv().unwrap(), SurfaceOp::ShowLoading);
        assert_eq!(
            rx.try_recv().unwrap(),
            SurfaceOp::ShowError {
                title: "Oops".into(),
                message: "bad root".into(),
            }
        );
    }

    #[test]
    fn measure_counts_block_rows() {
        let surface = mounted();
        let size = surface.measure();
        assert_eq!(size.width, 480);
        assert!(size.height > PANEL_PADDING * 2);
        assert_eq!(count_tag("<p>a</p><pre>b</pre>", "<p"), 1);
    }
}
