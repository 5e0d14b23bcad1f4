//! Component registry: the closed set of element tags the renderer knows.
//!
//! Dispatch is a match on [`Component`]. Tags outside the set land in
//! [`Component::Unknown`] and render a localized error fragment instead of
//! failing the whole view.

use maud::{Markup, html};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::layout::FieldKind;
use crate::tree::UiElement;

// =============================================================================
// PROPS
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Vertical,
    Horizontal,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct StackProps {
    pub gap: Option<u32>,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GridProps {
    pub columns: u32,
}

impl Default for GridProps {
    fn default() -> Self {
        Self { columns: 2 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CardProps {
    pub title: Option<String>,
    pub subtitle: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HeadingProps {
    pub text: String,
    pub level: u8,
}

impl Default for HeadingProps {
    fn default() -> Self {
        Self {
            text: String::new(),
            level: 2,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TextProps {
    pub text: String,
    pub muted: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BadgeVariant {
    Active,
    Won,
    Lost,
    Pending,
    #[default]
    Neutral,
}

impl BadgeVariant {
    fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::to_ascii_lowercase).as_deref() {
            Some("active") => BadgeVariant::Active,
            Some("won") => BadgeVariant::Won,
            Some("lost") => BadgeVariant::Lost,
            Some("pending") => BadgeVariant::Pending,
            _ => BadgeVariant::Neutral,
        }
    }

    fn class(&self) -> &'static str {
        match self {
            BadgeVariant::Active => "lt-badge lt-badge-active",
            BadgeVariant::Won => "lt-badge lt-badge-won",
            BadgeVariant::Lost => "lt-badge lt-badge-lost",
            BadgeVariant::Pending => "lt-badge lt-badge-pending",
            BadgeVariant::Neutral => "lt-badge lt-badge-neutral",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct BadgeProps {
    pub label: String,
    pub variant: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MetricProps {
    pub label: String,
    pub value: Scalar,
    pub delta: Option<Scalar>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct KeyValueItem {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub value: Scalar,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct KeyValueProps {
    pub items: Vec<KeyValueItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TableColumn {
    pub key: String,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TableProps {
    pub columns: Vec<TableColumn>,
    pub rows: Vec<serde_json::Map<String, Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BoardProps {
    pub tool: Option<String>,
    pub id_argument: Option<String>,
    pub container_argument: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ColumnProps {
    pub id: String,
    pub title: String,
    pub total: Option<Scalar>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CardField {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub value: Scalar,
    #[serde(default)]
    pub kind: FieldKind,
}

impl CardField {
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BoardCardProps {
    pub id: String,
    pub title: String,
    pub fields: Vec<CardField>,
    pub tool: Option<String>,
    pub id_argument: Option<String>,
}

/// A prop that may arrive as a string, number, or boolean and is displayed
/// as text.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "Value")]
pub struct Scalar(pub String);

impl From<Value> for Scalar {
    fn from(value: Value) -> Self {
        Scalar(display_value(&value))
    }
}

impl Scalar {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Every element tag the renderer can draw.
#[derive(Debug, Clone, PartialEq)]
pub enum Component {
    Stack(StackProps),
    Grid(GridProps),
    Card(CardProps),
    Heading(HeadingProps),
    Text(TextProps),
    StatusBadge(BadgeProps),
    Metric(MetricProps),
    KeyValue(KeyValueProps),
    Table(TableProps),
    Divider,
    Board(BoardProps),
    Column(ColumnProps),
    BoardCard(BoardCardProps),
    Unknown(String),
}

impl Component {
    /// Resolve an element's tag and parse its props.
    pub fn from_element(element: &UiElement) -> Self {
        let props = &element.props;
        match element.kind.as_str() {
            "Stack" => Component::Stack(parse_props(element, props)),
            "Grid" => Component::Grid(parse_props(element, props)),
            "Card" => Component::Card(parse_props(element, props)),
            "Heading" => Component::Heading(parse_props(element, props)),
            "Text" => Component::Text(parse_props(element, props)),
            "StatusBadge" => Component::StatusBadge(parse_props(element, props)),
            "Metric" => Component::Metric(parse_props(element, props)),
            "KeyValue" => Component::KeyValue(parse_props(element, props)),
            "Table" => Component::Table(parse_props(element, props)),
            "Divider" => Component::Divider,
            "Board" => Component::Board(parse_props(element, props)),
            "Column" => Component::Column(parse_props(element, props)),
            "BoardCard" => Component::BoardCard(parse_props(element, props)),
            other => Component::Unknown(other.to_string()),
        }
    }

    /// Draw this node around its already-rendered children.
    pub fn render(&self, key: &str, children: &Markup) -> Markup {
        match self {
            Component::Stack(props) => stack(props, children),
            Component::Grid(props) => grid(props, children),
            Component::Card(props) => card(props, children),
            Component::Heading(props) => heading(props),
            Component::Text(props) => text(props),
            Component::StatusBadge(props) => status_badge(props),
            Component::Metric(props) => metric(props),
            Component::KeyValue(props) => key_value(props),
            Component::Table(props) => table(props),
            Component::Divider => html! { hr class="lt-divider"; },
            Component::Board(props) => board(props, children),
            Component::Column(props) => column(props, children),
            Component::BoardCard(props) => board_card(props, children),
            Component::Unknown(tag) => unknown_component(key, tag),
        }
    }
}

/// Props of the wrong shape fall back to the component's defaults.
fn parse_props<T: DeserializeOwned + Default>(element: &UiElement, props: &Value) -> T {
    if props.is_null() {
        return T::default();
    }
    serde_json::from_value(props.clone()).unwrap_or_else(|e| {
        tracing::debug!(
            key = %element.key,
            tag = %element.kind,
            error = %e,
            "Invalid props, using defaults"
        );
        T::default()
    })
}

// =============================================================================
// LAYOUT
// =============================================================================

fn stack(props: &StackProps, children: &Markup) -> Markup {
    let class = match props.direction {
        Direction::Vertical => "lt-stack",
        Direction::Horizontal => "lt-stack lt-stack-row",
    };
    let style = props.gap.map(|gap| format!("gap:{gap}px"));
    html! {
        div class=(class) style=[style] { (children) }
    }
}

fn grid(props: &GridProps, children: &Markup) -> Markup {
    let columns = props.columns.clamp(1, 12);
    html! {
        div class="lt-grid" style={ "grid-template-columns:repeat(" (columns) ",minmax(0,1fr))" } {
            (children)
        }
    }
}

fn card(props: &CardProps, children: &Markup) -> Markup {
    html! {
        div class="lt-card-panel" {
            @if props.title.is_some() || props.subtitle.is_some() {
                header class="lt-card-header" {
                    @if let Some(title) = &props.title {
                        h3 class="lt-card-title" { (title) }
                    }
                    @if let Some(subtitle) = &props.subtitle {
                        p class="lt-card-subtitle" { (subtitle) }
                    }
                }
            }
            div class="lt-card-body" { (children) }
        }
    }
}

// =============================================================================
// CONTENT
// =============================================================================

fn heading(props: &HeadingProps) -> Markup {
    match props.level.clamp(1, 4) {
        1 => html! { h1 class="lt-heading" { (props.text) } },
        2 => html! { h2 class="lt-heading" { (props.text) } },
        3 => html! { h3 class="lt-heading" { (props.text) } },
        _ => html! { h4 class="lt-heading" { (props.text) } },
    }
}

fn text(props: &TextProps) -> Markup {
    let class = if props.muted { "lt-text lt-muted" } else { "lt-text" };
    html! { p class=(class) { (props.text) } }
}

fn status_badge(props: &BadgeProps) -> Markup {
    let variant = BadgeVariant::parse(props.variant.as_deref());
    html! {
        span class=(variant.class()) { (props.label) }
    }
}

fn metric(props: &MetricProps) -> Markup {
    let delta_class = match &props.delta {
        Some(delta) if delta.as_str().starts_with('-') => "lt-metric-delta lt-negative",
        _ => "lt-metric-delta",
    };
    html! {
        div class="lt-metric" {
            span class="lt-metric-label" { (props.label) }
            span class="lt-metric-value" { (props.value.as_str()) }
            @if let Some(delta) = &props.delta {
                span class=(delta_class) { (delta.as_str()) }
            }
        }
    }
}

fn key_value(props: &KeyValueProps) -> Markup {
    html! {
        dl class="lt-kv" {
            @for item in &props.items {
                dt { (item.label) }
                dd { (item.value.as_str()) }
            }
        }
    }
}

fn table(props: &TableProps) -> Markup {
    html! {
        table class="lt-table" {
            thead {
                tr {
                    @for column in &props.columns {
                        th { (column.label.as_deref().unwrap_or(&column.key)) }
                    }
                }
            }
            tbody {
                @for row in &props.rows {
                    tr {
                        @for column in &props.columns {
                            td { (row.get(&column.key).map(display_value).unwrap_or_default()) }
                        }
                    }
                }
            }
        }
    }
}

// =============================================================================
// BOARD
// =============================================================================

fn board(props: &BoardProps, children: &Markup) -> Markup {
    html! {
        div class="lt-board"
            data-tool=[props.tool.as_deref()]
            data-id-argument=[props.id_argument.as_deref()]
            data-container-argument=[props.container_argument.as_deref()] {
            (children)
        }
    }
}

fn column(props: &ColumnProps, children: &Markup) -> Markup {
    html! {
        section class="lt-column" data-container-id=(props.id) {
            header class="lt-column-header" {
                span class="lt-column-title" { (props.title) }
                @if let Some(total) = &props.total {
                    span class="lt-column-total" { (total.as_str()) }
                }
            }
            div class="lt-column-body" { (children) }
        }
    }
}

fn board_card(props: &BoardCardProps, children: &Markup) -> Markup {
    html! {
        article class="lt-board-card" draggable="true" data-card-id=(props.id) {
            h4 class="lt-board-card-title" { (props.title) }
            @for field in &props.fields {
                div class="lt-field" data-field=(field.name) {
                    span class="lt-field-label" { (field.label()) }
                    span class="lt-field-value" { (field.value.as_str()) }
                }
            }
            (children)
        }
    }
}

// =============================================================================
// FRAGMENTS
// =============================================================================

fn unknown_component(key: &str, tag: &str) -> Markup {
    html! {
        div class="lt-inline-error" data-key=(key) {
            "Unknown component: " code { (tag) }
        }
    }
}

/// Placeholder for a child key that is not in the element map.
pub fn missing_element(key: &str) -> Markup {
    html! {
        div class="lt-inline-error lt-missing" data-key=(key) {
            "Missing element: " code { (key) }
        }
    }
}

/// Placeholder for a key revisited on its own render path.
pub fn cycle_fragment(key: &str) -> Markup {
    html! {
        div class="lt-inline-error lt-cycle" data-key=(key) {
            "Cyclic reference: " code { (key) }
        }
    }
}

/// Placeholder for an element entry that could not be read.
pub fn malformed_element(key: &str, reason: &str) -> Markup {
    html! {
        div class="lt-inline-error lt-malformed" data-key=(key) {
            "Malformed element " code { (key) } ": " (reason)
        }
    }
}

/// Placeholder for a subtree nested past the depth limit.
pub fn nesting_too_deep(key: &str) -> Markup {
    html! {
        div class="lt-inline-error lt-too-deep" data-key=(key) {
            "Nesting too deep at " code { (key) }
        }
    }
}

/// Full-panel error state that replaces the whole view.
pub fn error_panel(title: &str, message: &str) -> Markup {
    html! {
        div class="lt-error-panel" role="alert" {
            h2 class="lt-error-title" { (title) }
            p class="lt-error-message" { (message) }
        }
    }
}

/// Shown until the first tree arrives.
pub fn loading_placeholder() -> Markup {
    html! {
        div class="lt-loading" aria-busy="true" {
            div class="lt-spinner" {}
            p { "Loading..." }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn element(kind: &str, props: Value) -> UiElement {
        UiElement {
            key: "k".into(),
            kind: kind.into(),
            props,
            children: vec![],
        }
    }

    fn empty() -> Markup {
        html! {}
    }

    #[test]
    fn known_tags_dispatch_to_their_variant() {
        let badge = Component::from_element(&element("StatusBadge", json!({"label": "Active"})));
        assert!(matches!(badge, Component::StatusBadge(ref p) if p.label == "Active"));

        let divider = Component::from_element(&element("Divider", Value::Null));
        assert_eq!(divider, Component::Divider);
    }

    #[test]
    fn unknown_tag_renders_inline_error() {
        let component = Component::from_element(&element("Chart3D", json!({})));
        assert_eq!(component, Component::Unknown("Chart3D".into()));
        let markup = component.render("k", &empty()).into_string();
        assert!(markup.contains("lt-inline-error"));
        assert!(markup.contains("Chart3D"));
    }

    #[test]
    fn wrong_prop_types_fall_back_to_defaults() {
        let component = Component::from_element(&element("Grid", json!({"columns": "three"})));
        assert_eq!(component, Component::Grid(GridProps::default()));
    }

    #[test]
    fn text_is_escaped() {
        let markup =
            Component::from_element(&element("Text", json!({"text": "<script>x</script>"})))
                .render("k", &empty())
                .into_string();
        assert!(!markup.contains("<script>"));
        assert!(markup.contains("&lt;script&gt;"));
    }

    #[test]
    fn badge_variant_selects_class() {
        let markup = Component::from_element(&element(
            "StatusBadge",
            json!({"label": "Won", "variant": "WON"}),
        ))
        .render("k", &empty())
        .into_string();
        assert!(markup.contains("lt-badge-won"));
        assert!(markup.contains(">Won<"));
    }

    #[test]
    fn scalar_props_accept_numbers() {
        let markup = Component::from_element(&element(
            "Metric",
            json!({"label": "Pipeline", "value": 125000, "delta": "-4%"}),
        ))
        .render("k", &empty())
        .into_string();
        assert!(markup.contains("125000"));
        assert!(markup.contains("lt-negative"));
    }

    #[test]
    fn table_renders_cells_in_column_order() {
        let markup = Component::from_element(&element(
            "Table",
            json!({
                "columns": [{"key": "name", "label": "Name"}, {"key": "amount"}],
                "rows": [{"amount": 10, "name": "Acme"}]
            }),
        ))
        .render("k", &empty())
        .into_string();
        assert!(markup.contains("<th>Name</th><th>amount</th>"));
        assert!(markup.contains("<td>Acme</td><td>10</td>"));
    }

    #[test]
    fn board_carries_move_binding() {
        let markup = Component::from_element(&element(
            "Board",
            json!({"tool": "move_task", "containerArgument": "status"}),
        ))
        .render("k", &empty())
        .into_string();
        assert!(markup.contains(r#"data-tool="move_task""#));
        assert!(markup.contains(r#"data-container-argument="status""#));
        assert!(!markup.contains("data-id-argument"));
    }

    #[test]
    fn board_card_exposes_anchor_attributes() {
        let markup = Component::from_element(&element(
            "BoardCard",
            json!({
                "id": "opp1",
                "title": "Acme renewal",
                "fields": [{"name": "amount", "label": "Amount", "value": "$5,000", "kind": "number"}]
            }),
        ))
        .render("k", &empty())
        .into_string();
        assert!(markup.contains(r#"data-card-id="opp1""#));
        assert!(markup.contains(r#"draggable="true""#));
        assert!(markup.contains(r#"data-field="amount""#));
        assert!(markup.contains("$5,000"));
    }
}
