use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde_json::Value;

use crate::client::ToolClient;
use crate::error::ProtocolError;
use crate::message::{Envelope, Inbound, PROTOCOL_VERSION, methods};
use crate::origin::OriginPolicy;
use crate::transport::{Boundary, InboundFrame, Transport};

/// What the view advertises during the handshake.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub protocol_version: String,
    pub client_name: String,
    pub client_version: String,
    pub capabilities: Value,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.into(),
            client_name: "lantern".into(),
            client_version: env!("CARGO_PKG_VERSION").into(),
            capabilities: serde_json::json!({
                "tools": { "call": true },
                "sizeReporting": true,
            }),
        }
    }
}

/// Something the view layer has to act on after a frame was processed.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The handshake completed. Fires once per session.
    Initialized,
    /// A host notification; unknown methods are passed through for the view
    /// to ignore.
    Notification { method: String, params: Value },
    /// The host asked the view to tear down (already acknowledged).
    Teardown,
    /// A message without the `jsonrpc` marker.
    Legacy(Value),
}

/// Per-view protocol state machine.
///
/// Owns the handshake flag and routes responses to the [`ToolClient`].
/// One session exists per embedded view instance; nothing here is global.
pub struct ProtocolSession {
    transport: Arc<dyn Transport>,
    client: Arc<ToolClient>,
    boundary: Boundary,
    config: SessionConfig,
    initialized: AtomicBool,
    /// Id of the `ui/initialize` request, 0 until sent.
    handshake_id: AtomicU64,
}

impl ProtocolSession {
    pub fn new(
        transport: Arc<dyn Transport>,
        client: Arc<ToolClient>,
        policy: OriginPolicy,
        config: SessionConfig,
    ) -> Self {
        Self {
            transport,
            client,
            boundary: Boundary::new(policy),
            config,
            initialized: AtomicBool::new(false),
            handshake_id: AtomicU64::new(0),
        }
    }

    pub fn client(&self) -> &Arc<ToolClient> {
        &self.client
    }

    /// Whether a parent context is present.
    pub fn is_embedded(&self) -> bool {
        self.transport.has_parent()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Send the `ui/initialize` request when embedded.
    ///
    /// Returns `false` when there is no parent and the handshake is skipped.
    pub fn start(&self) -> Result<bool, ProtocolError> {
        if !self.is_embedded() {
            tracing::info!("No parent context, skipping handshake");
            return Ok(false);
        }

        let id = self.client.next_id();
        self.handshake_id.store(id, Ordering::Release);

        let params = serde_json::json!({
            "protocolVersion": self.config.protocol_version,
            "clientInfo": {
                "name": self.config.client_name,
                "version": self.config.client_version,
            },
            "capabilities": self.config.capabilities,
        });

        tracing::info!(id, protocol_version = %self.config.protocol_version, "Sending initialize");
        self.transport
            .post(Envelope::request(id, methods::INITIALIZE, params))?;
        Ok(true)
    }

    /// Process one inbound frame.
    pub async fn handle_frame(&self, frame: &InboundFrame) -> Option<SessionEvent> {
        match self.boundary.admit(frame)? {
            Inbound::Response { id, outcome } => {
                let Some(id) = id.as_u64() else {
                    tracing::debug!(id = %id, "Response with non-numeric id, ignoring");
                    return None;
                };

                let handshake_id = self.handshake_id.load(Ordering::Acquire);
                if handshake_id != 0 && id == handshake_id {
                    if let Err(error) = &outcome {
                        tracing::warn!(
                            message = %error.message,
                            "Host answered initialize with an error"
                        );
                    }
                    return self.complete_handshake();
                }

                self.client.settle(id, outcome);
                None
            }
            Inbound::Request { id, method, .. } => self.handle_request(id, &method),
            Inbound::Notification { method, params } => {
                tracing::debug!(method = %method, "Host notification");
                Some(SessionEvent::Notification { method, params })
            }
            Inbound::Legacy(data) => Some(SessionEvent::Legacy(data)),
        }
    }

    /// Any response to the handshake flips the session, once.
    fn complete_handshake(&self) -> Option<SessionEvent> {
        if self
            .initialized
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Duplicate initialize response, ignoring");
            return None;
        }

        tracing::info!("Handshake complete");
        if let Err(e) = self
            .transport
            .post(Envelope::notification(methods::INITIALIZED, serde_json::json!({})))
        {
            tracing::warn!(error = %e, "Failed to send initialized notification");
        }
        Some(SessionEvent::Initialized)
    }

    fn handle_request(&self, id: Value, method: &str) -> Option<SessionEvent> {
        match method {
            methods::RESOURCE_TEARDOWN | methods::PING => {
                // The host's RPC layer waits on this ack.
                if let Err(e) = self
                    .transport
                    .post(Envelope::response(id, serde_json::json!({})))
                {
                    tracing::warn!(method, error = %e, "Failed to acknowledge host request");
                }
                if method == methods::RESOURCE_TEARDOWN {
                    tracing::info!("Host requested teardown");
                    Some(SessionEvent::Teardown)
                } else {
                    None
                }
            }
            other => {
                tracing::debug!(method = other, "Ignoring unknown host request");
                None
            }
        }
    }

    /// Tell the host how much room the view needs.
    pub fn notify_size(&self, width: u32, height: u32) -> Result<(), ProtocolError> {
        tracing::debug!(width, height, "Reporting size");
        self.transport.post(Envelope::notification(
            methods::SIZE_CHANGED,
            serde_json::json!({ "width": width, "height": height }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::DEFAULT_TOOL_TIMEOUT;
    use crate::transport::ChannelTransport;
    use serde_json::json;
    use tokio::sync::mpsc::UnboundedReceiver;

    const HOST: &str = "https://host.example";

    fn embedded() -> (ProtocolSession, UnboundedReceiver<Envelope>) {
        let (transport, rx) = ChannelTransport::new();
        let transport: Arc<dyn Transport> = Arc::new(transport);
        let client = Arc::new(ToolClient::new(transport.clone(), DEFAULT_TOOL_TIMEOUT));
        let session = ProtocolSession::new(
            transport,
            client,
            OriginPolicy::new([HOST]),
            SessionConfig::default(),
        );
        (session, rx)
    }

    fn frame(data: Value) -> InboundFrame {
        InboundFrame::new(HOST, data)
    }

    #[tokio::test]
    async fn handshake_sends_initialize_then_initialized_once() {
        let (session, mut rx) = embedded();
        assert!(session.start().unwrap());

        let init = rx.recv().await.unwrap();
        assert_eq!(init.method.as_deref(), Some(methods::INITIALIZE));
        let params = init.params.clone().unwrap();
        assert_eq!(params["protocolVersion"], PROTOCOL_VERSION);
        let id = init.id.clone().unwrap();

        let event = session
            .handle_frame(&frame(json!({"jsonrpc":"2.0","id":id,"result":{}})))
            .await;
        assert_eq!(event, Some(SessionEvent::Initialized));
        assert!(session.is_initialized());

        let initialized = rx.recv().await.unwrap();
        assert_eq!(initialized.method.as_deref(), Some(methods::INITIALIZED));
        assert!(initialized.id.is_none());

        // A second response must not re-fire the notification.
        let again = session
            .handle_frame(&frame(json!({"jsonrpc":"2.0","id":id,"result":{}})))
            .await;
        assert_eq!(again, None);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn error_response_to_initialize_still_completes_handshake() {
        let (session, mut rx) = embedded();
        session.start().unwrap();
        let id = rx.recv().await.unwrap().id.unwrap();

        let event = session
            .handle_frame(&frame(
                json!({"jsonrpc":"2.0","id":id,"error":{"code":-32601,"message":"nope"}}),
            ))
            .await;
        assert_eq!(event, Some(SessionEvent::Initialized));
    }

    #[tokio::test]
    async fn detached_session_skips_handshake() {
        let transport: Arc<dyn Transport> = Arc::new(ChannelTransport::detached());
        let client = Arc::new(ToolClient::new(transport.clone(), DEFAULT_TOOL_TIMEOUT));
        let session = ProtocolSession::new(
            transport,
            client,
            OriginPolicy::default(),
            SessionConfig::default(),
        );

        assert!(!session.start().unwrap());
        assert!(!session.is_initialized());
    }

    #[tokio::test]
    async fn ping_and_teardown_are_acknowledged_under_same_id() {
        let (session, mut rx) = embedded();

        let event = session
            .handle_frame(&frame(json!({"jsonrpc":"2.0","id":"p-1","method":"ping"})))
            .await;
        assert_eq!(event, None);
        assert_eq!(rx.recv().await.unwrap(), Envelope::response(json!("p-1"), json!({})));

        let event = session
            .handle_frame(&frame(
                json!({"jsonrpc":"2.0","id":9,"method":"ui/resource-teardown","params":{}}),
            ))
            .await;
        assert_eq!(event, Some(SessionEvent::Teardown));
        assert_eq!(rx.recv().await.unwrap(), Envelope::response(json!(9), json!({})));
    }

    #[tokio::test]
    async fn unknown_request_is_ignored() {
        let (session, mut rx) = embedded();
        let event = session
            .handle_frame(&frame(json!({"jsonrpc":"2.0","id":2,"method":"ui/open-link"})))
            .await;
        assert_eq!(event, None);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn foreign_origin_has_no_effect() {
        let (session, mut rx) = embedded();
        let event = session
            .handle_frame(&InboundFrame::new(
                "https://evil.example",
                json!({"jsonrpc":"2.0","id":1,"method":"ping"}),
            ))
            .await;
        assert_eq!(event, None);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn notifications_and_legacy_messages_surface_as_events() {
        let (session, _rx) = embedded();

        let event = session
            .handle_frame(&frame(
                json!({"jsonrpc":"2.0","method":"ui/notifications/tool-input","params":{"q":1}}),
            ))
            .await;
        assert_eq!(
            event,
            Some(SessionEvent::Notification {
                method: methods::TOOL_INPUT.into(),
                params: json!({"q": 1}),
            })
        );

        let legacy = json!({"root":"a","elements":{}});
        let event = session.handle_frame(&frame(legacy.clone())).await;
        assert_eq!(event, Some(SessionEvent::Legacy(legacy)));
    }

    #[tokio::test]
    async fn size_notification_shape() {
        let (session, mut rx) = embedded();
        session.notify_size(320, 240).unwrap();
        let sent = rx.recv().await.unwrap();
        assert_eq!(
            sent,
            Envelope::notification(methods::SIZE_CHANGED, json!({"width": 320, "height": 240}))
        );
    }
}
