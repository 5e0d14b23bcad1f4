//! Declarative UI rendering for Lantern.
//!
//! A host pushes a [`UiTree`]: a root key plus a flat map of elements that
//! reference their children by key. [`render`] walks that graph from the
//! root, dispatches each element through the [`Component`] registry and
//! returns the markup together with a [`LayoutIndex`] of the interactive
//! anchors (drop containers and draggable cards) the view binds gestures to.

pub mod component;
pub mod error;
pub mod layout;
pub mod renderer;
pub mod tree;

pub use component::{Component, error_panel, loading_placeholder};
pub use error::RenderError;
pub use layout::{CardAnchor, ContainerAnchor, FieldAnchor, FieldKind, LayoutIndex, ToolBinding};
pub use renderer::{Diagnostic, Rendered, render};
pub use tree::{UiElement, UiTree};
