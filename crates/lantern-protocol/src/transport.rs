use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::ProtocolError;
use crate::message::{Envelope, Inbound};
use crate::origin::OriginPolicy;

/// A message posted across the context boundary, tagged with its sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundFrame {
    pub origin: String,
    pub data: Value,
}

impl InboundFrame {
    pub fn new(origin: impl Into<String>, data: Value) -> Self {
        Self {
            origin: origin.into(),
            data,
        }
    }
}

/// Outbound half of the cross-context channel.
///
/// Posting is fire-and-forget: there is no delivery receipt, replies come
/// back as separate inbound frames.
pub trait Transport: Send + Sync {
    /// Whether a parent context exists to receive messages.
    fn has_parent(&self) -> bool;

    fn post(&self, message: Envelope) -> Result<(), ProtocolError>;
}

/// In-process transport backed by an unbounded channel.
///
/// Used by the stdio binary (a writer task drains the receiver) and by tests
/// that play the host role.
pub struct ChannelTransport {
    tx: Option<mpsc::UnboundedSender<Envelope>>,
}

impl ChannelTransport {
    /// Transport with a parent on the other end of the returned receiver.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Envelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Transport with no parent. Posts are dropped.
    pub fn detached() -> Self {
        Self { tx: None }
    }
}

impl Transport for ChannelTransport {
    fn has_parent(&self) -> bool {
        self.tx.is_some()
    }

    fn post(&self, message: Envelope) -> Result<(), ProtocolError> {
        match &self.tx {
            Some(tx) => tx.send(message).map_err(|_| ProtocolError::TransportClosed),
            None => {
                tracing::debug!(method = ?message.method, "No parent, dropping outbound message");
                Ok(())
            }
        }
    }
}

/// Inbound side of the boundary: origin check, then classification.
#[derive(Debug, Clone)]
pub struct Boundary {
    policy: OriginPolicy,
}

impl Boundary {
    pub fn new(policy: OriginPolicy) -> Self {
        Self { policy }
    }

    /// Admit a frame, or `None` if it is from a foreign origin or not a
    /// message at all.
    pub fn admit(&self, frame: &InboundFrame) -> Option<Inbound> {
        if !self.policy.permits(&frame.origin) {
            tracing::warn!(
                origin = %frame.origin,
                "Dropping message from origin outside allow-list"
            );
            return None;
        }

        let inbound = Inbound::classify(&frame.data);
        if inbound.is_none() {
            tracing::debug!(origin = %frame.origin, "Ignoring non-object message");
        }
        inbound
    }
}
