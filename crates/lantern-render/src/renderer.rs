use std::collections::HashSet;

use maud::{Markup, PreEscaped};

use crate::component::{
    Component, cycle_fragment, malformed_element, missing_element, nesting_too_deep,
};
use crate::error::RenderError;
use crate::layout::{CardAnchor, FieldAnchor, LayoutIndex, ToolBinding};
use crate::tree::{UiElement, UiTree};

/// Output of a successful render.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub markup: String,
    pub layout: LayoutIndex,
    /// Localized defects that were rendered as inline fragments.
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    MissingElement { parent: String, key: String },
    UnknownComponent { key: String, tag: String },
    Cycle { parent: String, key: String },
    MalformedElement { key: String, reason: String },
    TooDeep { parent: String, key: String },
}

/// Deepest root-to-node path rendered before a subtree is cut off.
pub const MAX_DEPTH: usize = 256;

/// Render a tree from its root.
///
/// Only a missing root is an error. Dangling children, malformed entries,
/// unknown tags, cycles and subtrees nested past [`MAX_DEPTH`] degrade the
/// affected node and rendering continues.
pub fn render(tree: &UiTree) -> Result<Rendered, RenderError> {
    let root = tree
        .get(&tree.root)
        .ok_or_else(|| RenderError::MissingRoot(tree.root.clone()))?;

    let mut walker = Walker {
        tree,
        path: HashSet::new(),
        layout: LayoutIndex::default(),
        diagnostics: Vec::new(),
    };
    let markup = walker.node(&tree.root, root, &Scope::default());

    tracing::debug!(
        root = %tree.root,
        elements = tree.elements.len(),
        cards = walker.layout.cards.len(),
        diagnostics = walker.diagnostics.len(),
        "Rendered tree"
    );

    Ok(Rendered {
        markup: markup.into_string(),
        layout: walker.layout,
        diagnostics: walker.diagnostics,
    })
}

/// Context inherited from ancestors.
#[derive(Debug, Clone, Default)]
struct Scope {
    binding: ToolBinding,
    container: Option<String>,
}

struct Walker<'t> {
    tree: &'t UiTree,
    /// Keys on the current root-to-node path.
    path: HashSet<&'t str>,
    layout: LayoutIndex,
    diagnostics: Vec<Diagnostic>,
}

impl<'t> Walker<'t> {
    fn node(&mut self, key: &'t str, element: &'t UiElement, scope: &Scope) -> Markup {
        if let Some(reason) = self.tree.defect(key) {
            self.diagnostics.push(Diagnostic::MalformedElement {
                key: key.to_string(),
                reason: reason.to_string(),
            });
            return malformed_element(key, reason);
        }

        self.path.insert(key);

        let component = Component::from_element(element);
        if let Component::Unknown(tag) = &component {
            tracing::warn!(key, tag = %tag, "Unknown component tag");
            self.diagnostics.push(Diagnostic::UnknownComponent {
                key: key.to_string(),
                tag: tag.clone(),
            });
        }

        let child_scope = self.enter(&component, scope);

        let mut children = String::new();
        for child_key in &element.children {
            let child_key = child_key.as_str();
            match self.tree.get(child_key) {
                None => {
                    tracing::warn!(parent = key, key = child_key, "Missing child element");
                    self.diagnostics.push(Diagnostic::MissingElement {
                        parent: key.to_string(),
                        key: child_key.to_string(),
                    });
                    children.push_str(&missing_element(child_key).into_string());
                }
                Some(_) if self.path.contains(child_key) => {
                    tracing::warn!(parent = key, key = child_key, "Cyclic child reference");
                    self.diagnostics.push(Diagnostic::Cycle {
                        parent: key.to_string(),
                        key: child_key.to_string(),
                    });
                    children.push_str(&cycle_fragment(child_key).into_string());
                }
                Some(_) if self.path.len() >= MAX_DEPTH => {
                    tracing::warn!(parent = key, key = child_key, "Tree nested too deep");
                    self.diagnostics.push(Diagnostic::TooDeep {
                        parent: key.to_string(),
                        key: child_key.to_string(),
                    });
                    children.push_str(&nesting_too_deep(child_key).into_string());
                }
                Some(child) => {
                    let markup = self.node(child_key, child, &child_scope);
                    children.push_str(&markup.into_string());
                }
            }
        }

        let markup = component.render(key, &PreEscaped(children));
        self.path.remove(key);
        markup
    }

    /// Record interactive anchors and derive the scope for children.
    fn enter(&mut self, component: &Component, scope: &Scope) -> Scope {
        match component {
            Component::Board(props) => Scope {
                binding: scope.binding.with_overrides(
                    props.tool.as_deref(),
                    props.id_argument.as_deref(),
                    props.container_argument.as_deref(),
                ),
                container: None,
            },
            Component::Column(props) => {
                if props.id.is_empty() {
                    tracing::debug!("Column without id is not a drop target");
                    return Scope {
                        container: None,
                        ..scope.clone()
                    };
                }
                self.layout.add_container(&props.id, &props.title);
                Scope {
                    container: Some(props.id.clone()),
                    ..scope.clone()
                }
            }
            Component::BoardCard(props) => {
                if props.id.is_empty() {
                    tracing::debug!(title = %props.title, "Card without id is not interactive");
                } else {
                    self.layout.add_card(CardAnchor {
                        id: props.id.clone(),
                        container: scope.container.clone(),
                        fields: props
                            .fields
                            .iter()
                            .map(|field| FieldAnchor {
                                name: field.name.clone(),
                                label: field.label().to_string(),
                                value: field.value.as_str().to_string(),
                                kind: field.kind,
                            })
                            .collect(),
                        binding: scope.binding.with_overrides(
                            props.tool.as_deref(),
                            props.id_argument.as_deref(),
                            None,
                        ),
                    });
                }
                scope.clone()
            }
            _ => scope.clone(),
        }
    }
}
