use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One node of the declarative view description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiElement {
    /// Unique within the tree. Filled from the map key when the host omits it.
    #[serde(default)]
    pub key: String,
    /// Tag selecting the component.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub props: Value,
    /// Ordered child keys; order is preserved in the output.
    #[serde(default)]
    pub children: Vec<String>,
}

impl UiElement {
    /// Read one map entry field by field. Returns the best-effort element
    /// and, when the entry is unusable, the reason.
    fn from_entry(map_key: &str, entry: &Value) -> (Self, Option<&'static str>) {
        let mut element = UiElement {
            key: map_key.to_string(),
            kind: String::new(),
            props: Value::Null,
            children: Vec::new(),
        };
        let Some(obj) = entry.as_object() else {
            return (element, Some("element is not an object"));
        };

        if let Some(key) = obj.get("key").and_then(Value::as_str).filter(|k| !k.is_empty()) {
            element.key = key.to_string();
        }
        element.props = obj.get("props").cloned().unwrap_or(Value::Null);
        element.children = obj
            .get("children")
            .and_then(Value::as_array)
            .map(|children| {
                children
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        match obj.get("type").and_then(Value::as_str) {
            Some(kind) => {
                element.kind = kind.to_string();
                (element, None)
            }
            None => (element, Some("missing component type")),
        }
    }
}

/// Key-addressed element graph pushed by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiTree {
    pub root: String,
    pub elements: BTreeMap<String, UiElement>,
    /// Elements that were kept as placeholders because their entry was
    /// malformed. Not part of the wire shape.
    #[serde(skip)]
    pub defects: BTreeMap<String, String>,
}

impl UiTree {
    /// Parse a value that is shaped like a tree: an object with a string
    /// `root` and an object `elements`. Anything else is `None`.
    ///
    /// Elements are read one by one. A malformed entry is kept under its
    /// map key with an empty tag and recorded in `defects`, so one bad
    /// element never hides the rest of the tree.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let root = obj.get("root")?.as_str()?.to_string();
        let entries = obj.get("elements")?.as_object()?;

        let mut elements = BTreeMap::new();
        let mut defects = BTreeMap::new();
        for (key, entry) in entries {
            let (element, defect) = UiElement::from_entry(key, entry);
            if let Some(reason) = defect {
                tracing::warn!(key = %key, reason, "Malformed element");
                defects.insert(key.clone(), reason.to_string());
            }
            elements.insert(key.clone(), element);
        }

        Some(Self {
            root,
            elements,
            defects,
        })
    }

    /// Why the element under `key` could not be read, if it could not.
    pub fn defect(&self, key: &str) -> Option<&str> {
        self.defects.get(key).map(String::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&UiElement> {
        self.elements.get(key)
    }
}
