use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

/// Protocol version advertised in the `ui/initialize` handshake.
pub const PROTOCOL_VERSION: &str = "2025-06-18";

/// Method names exchanged with the host.
pub mod methods {
    pub const INITIALIZE: &str = "ui/initialize";
    pub const INITIALIZED: &str = "ui/notifications/initialized";
    pub const TOOLS_CALL: &str = "tools/call";
    pub const SIZE_CHANGED: &str = "ui/notifications/size-changed";

    pub const TOOL_RESULT: &str = "ui/notifications/tool-result";
    pub const TOOL_INPUT: &str = "ui/notifications/tool-input";
    pub const TOOL_INPUT_PARTIAL: &str = "ui/notifications/tool-input-partial";
    pub const TOOL_CANCELLED: &str = "ui/notifications/tool-cancelled";
    pub const HOST_CONTEXT_CHANGED: &str = "ui/notifications/host-context-changed";
    pub const RESOURCE_TEARDOWN: &str = "ui/resource-teardown";
    pub const PING: &str = "ping";
}

/// Error object carried by a JSON-RPC error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    /// Build an error from whatever the host put in the `error` slot.
    ///
    /// Hosts are not consistent here: some send a bare string, some an object
    /// without a code.
    fn from_value(value: &Value) -> Self {
        if let Some(message) = value.as_str() {
            return Self {
                code: 0,
                message: message.to_string(),
                data: None,
            };
        }
        serde_json::from_value(value.clone()).unwrap_or_else(|_| Self {
            code: 0,
            message: value.to_string(),
            data: None,
        })
    }
}

/// Outbound wire envelope: `{jsonrpc, id?, method?, params?, result?, error?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Envelope {
    fn empty() -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id: None,
            method: None,
            params: None,
            result: None,
            error: None,
        }
    }

    pub fn request(id: u64, method: &str, params: Value) -> Self {
        Self {
            id: Some(Value::from(id)),
            method: Some(method.into()),
            params: Some(params),
            ..Self::empty()
        }
    }

    pub fn notification(method: &str, params: Value) -> Self {
        Self {
            method: Some(method.into()),
            params: Some(params),
            ..Self::empty()
        }
    }

    /// Success response echoing the request id verbatim.
    pub fn response(id: Value, result: Value) -> Self {
        Self {
            id: Some(id),
            result: Some(result),
            ..Self::empty()
        }
    }
}

/// A classified inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Reply to a request the view sent.
    Response {
        id: Value,
        outcome: Result<Value, RpcError>,
    },
    /// Host request that must be acknowledged under `id`.
    Request {
        id: Value,
        method: String,
        params: Value,
    },
    /// Fire-and-forget host notification.
    Notification { method: String, params: Value },
    /// Anything else that is still a JSON object. Hosts that predate the
    /// `jsonrpc` marker post bare payloads; the view matches these ad hoc.
    Legacy(Value),
}

impl Inbound {
    /// Classify a raw posted message. Non-objects are foreign and yield `None`.
    ///
    /// Protocol-mode cases are tried first; the legacy path is only taken
    /// when none of them match.
    pub fn classify(data: &Value) -> Option<Self> {
        let obj = data.as_object()?;

        if obj.get("jsonrpc").and_then(Value::as_str) == Some(JSONRPC_VERSION) {
            let id = obj.get("id").filter(|id| !id.is_null()).cloned();

            if let Some(id) = id.clone() {
                if let Some(error) = obj.get("error").filter(|e| !e.is_null()) {
                    return Some(Inbound::Response {
                        id,
                        outcome: Err(RpcError::from_value(error)),
                    });
                }
                if obj.contains_key("result") {
                    let result = obj.get("result").cloned().unwrap_or(Value::Null);
                    return Some(Inbound::Response {
                        id,
                        outcome: Ok(result),
                    });
                }
            }

            if let Some(method) = obj.get("method").and_then(Value::as_str) {
                let params = obj.get("params").cloned().unwrap_or(Value::Null);
                return Some(match id {
                    Some(id) => Inbound::Request {
                        id,
                        method: method.to_string(),
                        params,
                    },
                    None => Inbound::Notification {
                        method: method.to_string(),
                        params,
                    },
                });
            }
        }

        Some(Inbound::Legacy(data.clone()))
    }
}
