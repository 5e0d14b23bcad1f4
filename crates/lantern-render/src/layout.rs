use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const DEFAULT_MOVE_TOOL: &str = "update_opportunity";
pub const DEFAULT_ID_ARGUMENT: &str = "opportunityId";
pub const DEFAULT_CONTAINER_ARGUMENT: &str = "stageId";

/// Which host operation a card gesture calls, and how arguments are named.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolBinding {
    pub tool: String,
    pub id_argument: String,
    pub container_argument: String,
}

impl Default for ToolBinding {
    fn default() -> Self {
        Self {
            tool: DEFAULT_MOVE_TOOL.into(),
            id_argument: DEFAULT_ID_ARGUMENT.into(),
            container_argument: DEFAULT_CONTAINER_ARGUMENT.into(),
        }
    }
}

impl ToolBinding {
    /// Overlay any overrides given on a board or card.
    pub fn with_overrides(
        &self,
        tool: Option<&str>,
        id_argument: Option<&str>,
        container_argument: Option<&str>,
    ) -> Self {
        Self {
            tool: tool.unwrap_or(&self.tool).to_string(),
            id_argument: id_argument.unwrap_or(&self.id_argument).to_string(),
            container_argument: container_argument
                .unwrap_or(&self.container_argument)
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    #[default]
    Text,
    Number,
}

/// An editable field as displayed on a card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldAnchor {
    pub name: String,
    pub label: String,
    pub value: String,
    pub kind: FieldKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardAnchor {
    pub id: String,
    /// Enclosing drop container, if the card sits in one.
    pub container: Option<String>,
    pub fields: Vec<FieldAnchor>,
    pub binding: ToolBinding,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerAnchor {
    pub id: String,
    pub title: String,
    /// Card ids in display order.
    pub cards: Vec<String>,
}

/// The interactive anchors of a rendered view: what the markup exposes as
/// `data-container-id` / `data-card-id` nodes, in render order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutIndex {
    pub containers: Vec<ContainerAnchor>,
    pub cards: BTreeMap<String, CardAnchor>,
}

impl LayoutIndex {
    pub fn container(&self, id: &str) -> Option<&ContainerAnchor> {
        self.containers.iter().find(|c| c.id == id)
    }

    pub fn container_mut(&mut self, id: &str) -> Option<&mut ContainerAnchor> {
        self.containers.iter_mut().find(|c| c.id == id)
    }

    pub fn card(&self, id: &str) -> Option<&CardAnchor> {
        self.cards.get(id)
    }

    pub fn card_mut(&mut self, id: &str) -> Option<&mut CardAnchor> {
        self.cards.get_mut(id)
    }

    pub(crate) fn add_container(&mut self, id: &str, title: &str) {
        if self.container(id).is_none() {
            self.containers.push(ContainerAnchor {
                id: id.to_string(),
                title: title.to_string(),
                cards: Vec::new(),
            });
        }
    }

    pub(crate) fn add_card(&mut self, card: CardAnchor) {
        if let Some(container) = card.container.as_deref() {
            if let Some(anchor) = self.container_mut(container) {
                if !anchor.cards.contains(&card.id) {
                    anchor.cards.push(card.id.clone());
                }
            }
        }
        self.cards.insert(card.id.clone(), card);
    }
}
