//! Initial payload ingestion.
//!
//! Host integrations wrap the same tool result in different envelopes. Each
//! accepted envelope is an independent matcher; [`ingest`] tries them in a
//! fixed order and the first match wins.

use lantern_protocol::message::methods;
use lantern_render::UiTree;
use serde_json::Value;

/// Where a candidate payload came from.
#[derive(Debug, Clone, Copy)]
pub enum Incoming<'a> {
    /// Injected into the view before startup.
    Preloaded(&'a Value),
    /// A protocol notification.
    Notification { method: &'a str, params: &'a Value },
    /// A message without the `jsonrpc` marker.
    Legacy(&'a Value),
}

/// Which envelope a tree was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    Preloaded,
    StructuredContent,
    LegacyTree,
    ContentParts,
}

type Matcher = fn(&Incoming<'_>) -> Option<UiTree>;

const MATCHERS: [(PayloadShape, Matcher); 4] = [
    (PayloadShape::Preloaded, match_preloaded),
    (PayloadShape::StructuredContent, match_structured_content),
    (PayloadShape::LegacyTree, match_legacy_tree),
    (PayloadShape::ContentParts, match_content_parts),
];

/// Find a UI tree in `incoming`, trying each shape in order.
pub fn ingest(incoming: &Incoming<'_>) -> Option<(PayloadShape, UiTree)> {
    MATCHERS
        .iter()
        .find_map(|(shape, matcher)| matcher(incoming).map(|tree| (*shape, tree)))
}

/// A pre-injected object: the tree itself, or a tool result carrying it.
pub fn match_preloaded(incoming: &Incoming<'_>) -> Option<UiTree> {
    let Incoming::Preloaded(value) = incoming else {
        return None;
    };
    UiTree::from_value(value).or_else(|| structured_content(value))
}

/// `ui/notifications/tool-result` with the tree under `structuredContent`.
pub fn match_structured_content(incoming: &Incoming<'_>) -> Option<UiTree> {
    let Incoming::Notification { method, params } = incoming else {
        return None;
    };
    if *method != methods::TOOL_RESULT {
        return None;
    }
    structured_content(params)
}

/// A legacy message that is the tree.
pub fn match_legacy_tree(incoming: &Incoming<'_>) -> Option<UiTree> {
    let Incoming::Legacy(value) = incoming else {
        return None;
    };
    UiTree::from_value(value)
}

/// A tree inside a `content: [...]` list of parts, either as JSON text or as
/// an embedded object.
pub fn match_content_parts(incoming: &Incoming<'_>) -> Option<UiTree> {
    let envelope = match incoming {
        Incoming::Notification { method, params } if *method == methods::TOOL_RESULT => *params,
        Incoming::Legacy(value) => *value,
        _ => return None,
    };

    envelope
        .get("content")?
        .as_array()?
        .iter()
        .find_map(tree_from_part)
}

fn structured_content(value: &Value) -> Option<UiTree> {
    UiTree::from_value(value.get("structuredContent")?)
}

fn tree_from_part(part: &Value) -> Option<UiTree> {
    if let Some(text) = part.get("text").and_then(Value::as_str) {
        if let Ok(parsed) = serde_json::from_str::<Value>(text) {
            if let Some(tree) = UiTree::from_value(&parsed) {
                return Some(tree);
            }
        }
    }
    ["json", "data"]
        .iter()
        .filter_map(|slot| part.get(*slot))
        .find_map(UiTree::from_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree_value() -> Value {
        json!({
            "root": "a",
            "elements": {"a": {"key": "a", "type": "Text", "props": {"text": "hi"}}}
        })
    }

    #[test]
    fn preloaded_tree_is_accepted() {
        let value = tree_value();
        let (shape, tree) = ingest(&Incoming::Preloaded(&value)).unwrap();
        assert_eq!(shape, PayloadShape::Preloaded);
        assert_eq!(tree.root, "a");
    }

    #[test]
    fn preloaded_tool_result_is_accepted() {
        let value = json!({"structuredContent": tree_value()});
        let (shape, _) = ingest(&Incoming::Preloaded(&value)).unwrap();
        assert_eq!(shape, PayloadShape::Preloaded);
    }

    #[test]
    fn structured_content_wins_over_parts() {
        let params = json!({
            "structuredContent": tree_value(),
            "content": [{"type": "text", "text": tree_value().to_string()}]
        });
        let (shape, _) = ingest(&Incoming::Notification {
            method: methods::TOOL_RESULT,
            params: &params,
        })
        .unwrap();
        assert_eq!(shape, PayloadShape::StructuredContent);
    }

    #[test]
    fn structured_content_only_on_tool_result() {
        let params = json!({"structuredContent": tree_value()});
        assert!(
            ingest(&Incoming::Notification {
                method: methods::TOOL_INPUT,
                params: &params,
            })
            .is_none()
        );
    }

    #[test]
    fn legacy_message_that_is_the_tree() {
        let value = tree_value();
        let (shape, _) = ingest(&Incoming::Legacy(&value)).unwrap();
        assert_eq!(shape, PayloadShape::LegacyTree);
    }

    #[test]
    fn text_part_carrying_json_tree() {
        let params = json!({
            "content": [
                {"type": "text", "text": "Here is your pipeline"},
                {"type": "text", "text": tree_value().to_string()}
            ]
        });
        let (shape, tree) = ingest(&Incoming::Notification {
            method: methods::TOOL_RESULT,
            params: &params,
        })
        .unwrap();
        assert_eq!(shape, PayloadShape::ContentParts);
        assert_eq!(tree.root, "a");
    }

    #[test]
    fn object_part_in_legacy_envelope() {
        let value = json!({"content": [{"type": "json", "json": tree_value()}]});
        let (shape, _) = ingest(&Incoming::Legacy(&value)).unwrap();
        assert_eq!(shape, PayloadShape::ContentParts);
    }

    #[test]
    fn unrelated_payloads_do_not_match() {
        let value = json!({"type": "resize", "height": 20});
        assert!(ingest(&Incoming::Legacy(&value)).is_none());
        let params = json!({"content": [{"type": "text", "text": "no tree here"}]});
        assert!(
            ingest(&Incoming::Notification {
                method: methods::TOOL_RESULT,
                params: &params,
            })
            .is_none()
        );
    }
}
